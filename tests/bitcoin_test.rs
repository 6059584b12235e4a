//! Bitcoin Wallet Manager Integration Tests
//!
//! Fee estimation from dummy-signed sizes, change computation and the full
//! build → sign → assemble → broadcast path against an in-memory network.
//!
//! Run with: cargo test --test bitcoin_test -- --nocapture

mod common;

use bitcoin::consensus::encode::deserialize;
use bitcoin::{Address, Network};
use common::{init_logging, MockNetwork, TestSigner};
use multichain_wallet::fee::utxo::sats_fee;
use multichain_wallet::fee::FeeQuote;
use multichain_wallet::provider::PendingReport;
use multichain_wallet::{
    AccountInfo, Addresses, Amount, AmountType, Blockchain, ChainState, SdkConfig,
    TransactionBuilder, TransactionError, UnspentOutput, Wallet, WalletManager,
};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;

const DESTINATION: &str = "1BvBMSEYstWetqTFn5Au4m4GFg7xJaNVN2";
const BITCOIN: Blockchain = Blockchain::Bitcoin { testnet: false };

fn sats(value: u64) -> Amount {
    Amount::from_smallest_unit(AmountType::Coin, value.into(), 8, "BTC").unwrap()
}

/// Legacy P2PKH wallet holding a single 100,000 sat output
fn setup(signer: &TestSigner) -> (WalletManager, Arc<MockNetwork>) {
    let key = bitcoin::PublicKey::new(signer.secp_public_key());
    let address = Address::p2pkh(key, Network::Bitcoin);

    let network = MockNetwork::new();
    network.set_info(AccountInfo {
        coin_balance: Decimal::new(100_000, 8),
        pending: PendingReport::Complete(Vec::new()),
        ..Default::default()
    });
    network.set_utxos(vec![UnspentOutput {
        transaction_hash: "ab".repeat(32),
        output_index: 1,
        amount: 100_000,
        output_script: address.script_pubkey().to_bytes(),
        address: address.to_string(),
        assets: Vec::new(),
    }]);
    network.set_quote(FeeQuote::Utxo { rates: [10, 10, 10] });

    let wallet = Wallet::new(
        BITCOIN,
        Addresses::single(address.to_string(), signer.public_key()),
    );
    let manager = WalletManager::new(wallet, network.providers(), SdkConfig::default()).unwrap();
    (manager, network)
}

// ============================================================================
// Test 1: Fee From Dummy-Signed Size, Then Exact Change
// ============================================================================

#[tokio::test]
async fn test_fee_estimation_and_change() -> anyhow::Result<()> {
    init_logging();
    let signer = TestSigner::new(0x11);
    let (mut manager, network) = setup(&signer);
    manager.update().await?;

    let amount = sats(50_000);
    let fees = manager.get_fee(&amount, DESTINATION).await?;

    // 1 P2PKH input, 2 P2PKH outputs: 225 vbytes at 10 sat/vB
    assert_eq!(fees.len(), 3);
    for fee in &fees {
        assert_eq!(fee.amount.to_smallest_unit()?, 2_250);
    }

    let tx = manager
        .create_transaction(amount, fees[1].clone(), DESTINATION, None, None)?;
    let result = manager.send(&tx, &signer).await?;
    assert_eq!(result.hash, "hash-1");

    let raw = &network.submitted()[0];
    let decoded: bitcoin::Transaction = deserialize(raw)?;
    assert_eq!(decoded.input.len(), 1);
    assert_eq!(decoded.output[0].value.to_sat(), 50_000);
    assert_eq!(decoded.output[1].value.to_sat(), 100_000 - 50_000 - 2_250);
    assert_eq!(
        decoded.output[0].script_pubkey,
        Address::from_str(DESTINATION)?.assume_checked().script_pubkey()
    );

    let pending = manager.wallet().pending_transactions();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].hash, "hash-1");
    assert!(!pending[0].is_incoming);
    Ok(())
}

// ============================================================================
// Test 2: Determinism and Round-Trip of the Builder
// ============================================================================

#[tokio::test]
async fn test_build_is_deterministic() -> anyhow::Result<()> {
    init_logging();
    let signer = TestSigner::new(0x12);
    let (mut manager, _network) = setup(&signer);
    manager.update().await?;

    let fees = manager.get_fee(&sats(30_000), DESTINATION).await?;
    let tx = manager
        .create_transaction(sats(30_000), fees[0].clone(), DESTINATION, None, None)?;

    let config = SdkConfig::default();
    let builder = multichain_wallet::ChainBuilder::new(BITCOIN, &signer.public_key(), &config)?;
    let state: &ChainState = manager.chain_state();

    let first = builder.build_for_sign(&tx, state)?;
    let second = builder.build_for_sign(&tx, state)?;
    assert_eq!(first.hashes, second.hashes);

    let signatures: Vec<Vec<u8>> = first.hashes.iter().map(|h| signer.sign_hash(h)).collect();
    let raw = builder.build_for_send(first.state, &signatures)?;
    let decoded: bitcoin::Transaction = deserialize(&raw)?;

    let fee_sats = tx.fee.amount.to_smallest_unit_u64()?;
    assert_eq!(decoded.output[0].value.to_sat(), 30_000);
    assert_eq!(decoded.output[1].value.to_sat(), 100_000 - 30_000 - fee_sats);
    assert!(!decoded.input[0].script_sig.is_empty());
    Ok(())
}

// ============================================================================
// Test 3: Dust Validation Before Building
// ============================================================================

#[tokio::test]
async fn test_dust_amount_rejected() -> anyhow::Result<()> {
    init_logging();
    let signer = TestSigner::new(0x13);
    let (mut manager, network) = setup(&signer);
    manager.update().await?;

    let fee = sats_fee(&BITCOIN, 2_250, 10)?;
    let errors = manager
        .create_transaction(sats(500), fee, DESTINATION, None, None)
        .unwrap_err();
    assert!(matches!(
        errors.0.as_slice(),
        [TransactionError::DustAmount { .. }]
    ));
    assert!(network.submitted().is_empty());
    Ok(())
}
