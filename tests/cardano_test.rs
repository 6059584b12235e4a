//! Cardano Wallet Manager Integration Tests
//!
//! Linear size-based fees and the min-ADA rule that sends all ADA along
//! with a token when the change would be too small to exist.
//!
//! Run with: cargo test --test cardano_test -- --nocapture

mod common;

use bitcoin::bech32::{Bech32, Hrp};
use common::{init_logging, MockNetwork, TestSigner};
use multichain_wallet::builder::cbor;
use multichain_wallet::fee::FeeQuote;
use multichain_wallet::utxo::{AssetId, UnspentAsset};
use multichain_wallet::{
    AccountInfo, Addresses, Amount, Blockchain, PublicKey, SdkConfig, Token, TransactionError,
    UnspentOutput, Wallet, WalletManager,
};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;

const POLICY: &str = "aa";
const NAME: &str = "74657374";

fn address(byte: u8) -> String {
    bitcoin::bech32::encode::<Bech32>(Hrp::parse("addr").unwrap(), &[byte; 57]).unwrap()
}

fn token() -> Token {
    Token::new("Test", "TST", format!("{}{}", POLICY, NAME), 0)
}

/// One output of `lovelace` carrying 10 test tokens
async fn setup(lovelace: u64) -> anyhow::Result<(WalletManager, Arc<MockNetwork>)> {
    let network = MockNetwork::new();
    network.set_info(AccountInfo {
        coin_balance: Decimal::new(i64::try_from(lovelace)?, 6),
        token_balances: HashMap::from([(token(), Decimal::TEN)]),
        ..Default::default()
    });
    network.set_utxos(vec![UnspentOutput {
        transaction_hash: hex::encode([1u8; 32]),
        output_index: 0,
        amount: lovelace,
        output_script: Vec::new(),
        address: address(1),
        assets: vec![UnspentAsset {
            id: AssetId {
                policy_id: POLICY.to_string(),
                asset_name_hex: NAME.to_string(),
            },
            amount: 10,
        }],
    }]);
    network.set_quote(FeeQuote::Cardano);

    let wallet = Wallet::new(
        Blockchain::Cardano,
        Addresses::single(address(1), PublicKey::new(vec![7u8; 64])),
    );
    let mut manager = WalletManager::new(wallet, network.providers(), SdkConfig::default())?
        .with_tokens(vec![token()]);
    manager.update().await?;
    Ok((manager, network))
}

// ============================================================================
// Test 1: Token Transfer Takes All ADA When Change Would Be Too Small
// ============================================================================

#[tokio::test]
async fn test_token_transfer_absorbs_small_change() -> anyhow::Result<()> {
    init_logging();
    let signer = TestSigner::new(0x51);
    let (mut manager, network) = setup(2_000_000).await?;

    let amount = Amount::token(&token(), Decimal::TEN);
    let fees = manager.get_fee(&amount, &address(2)).await?;
    assert_eq!(fees.len(), 1);
    let fee = fees[0].amount.to_smallest_unit_u64()?;

    let tx = manager.create_transaction(amount, fees[0].clone(), address(2), None, None)?;
    manager.send(&tx, &signer).await?;

    let raw = network.submitted().remove(0);
    let decoded = cbor::decode(&raw)?;
    let body = &decoded
        .as_array()
        .ok_or_else(|| anyhow::anyhow!("not an array"))?[0];

    let outputs = cbor::get(body, 1)
        .and_then(cbor::Value::as_array)
        .ok_or_else(|| anyhow::anyhow!("missing outputs"))?;
    assert_eq!(outputs.len(), 1, "no change output expected");

    let value = outputs[0]
        .as_array()
        .and_then(|output| output[1].as_array())
        .ok_or_else(|| anyhow::anyhow!("output without multi-asset value"))?;
    assert_eq!(cbor::as_unsigned(&value[0]), Some(2_000_000 - fee));
    assert_eq!(cbor::get(body, 2).and_then(cbor::as_unsigned), Some(fee));

    // Fee is linear in the size of the transaction actually sent
    let params = SdkConfig::default().cardano;
    assert_eq!(fee, params.min_fee_a * raw.len() as u64 + params.min_fee_b);
    Ok(())
}

// ============================================================================
// Test 2: ADA Below the Minimum Output
// ============================================================================

#[tokio::test]
async fn test_dust_ada_amount_rejected() -> anyhow::Result<()> {
    init_logging();
    let (manager, _network) = setup(5_000_000).await?;

    let amount = Amount::coin(&Blockchain::Cardano, Decimal::new(5, 1));
    let fees = manager.get_fee(&amount, &address(2)).await?;
    let errors = manager.validate(&amount, Some(&fees[0]));

    assert_eq!(errors.0.len(), 1);
    assert!(matches!(errors.0[0], TransactionError::DustAmount { .. }));
    Ok(())
}
