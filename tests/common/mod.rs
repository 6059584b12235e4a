//! Common test utilities for wallet manager integration tests
//!
//! This module provides shared test infrastructure including:
//! - An in-memory network implementing every provider trait
//! - A deterministic secp256k1 signer and a malformed one
//! - Logging setup

#![allow(dead_code)]

use async_trait::async_trait;
use multichain_wallet::fee::FeeQuote;
use multichain_wallet::provider::{
    AccountInfo, AccountSequence, BalanceProvider, BroadcastProvider, FeeQuoteProvider,
    NonceProvider, Signer, UtxoProvider,
};
use multichain_wallet::{
    Amount, ProviderError, Providers, PublicKey, SignatureError, Token, UnspentOutput,
};
use secp256k1::{Message, SecretKey, SECP256K1};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub fn init_logging() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init()
        .ok();
}

// ============================================================================
// Signers
// ============================================================================

/// Signs with a fixed secret key
pub struct TestSigner {
    secret: SecretKey,
    pub calls: AtomicUsize,
}

impl TestSigner {
    pub fn new(byte: u8) -> Self {
        Self {
            secret: SecretKey::from_slice(&[byte; 32]).expect("valid secret"),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn secp_public_key(&self) -> secp256k1::PublicKey {
        secp256k1::PublicKey::from_secret_key_global(&self.secret)
    }

    /// Compressed SEC1 key as the wallet stores it
    pub fn public_key(&self) -> PublicKey {
        PublicKey::new(self.secp_public_key().serialize().to_vec())
    }

    pub fn sign_hash(&self, hash: &[u8]) -> Vec<u8> {
        let digest: [u8; 32] = hash.try_into().expect("32-byte hash");
        SECP256K1
            .sign_ecdsa(&Message::from_digest(digest), &self.secret)
            .serialize_compact()
            .to_vec()
    }
}

#[async_trait]
impl Signer for TestSigner {
    async fn sign(
        &self,
        hashes: &[Vec<u8>],
        _public_key: &PublicKey,
    ) -> Result<Vec<Vec<u8>>, SignatureError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(hashes.iter().map(|hash| self.sign_hash(hash)).collect())
    }
}

/// Returns signatures of a fixed, usually wrong, length
pub struct FixedLengthSigner(pub usize);

#[async_trait]
impl Signer for FixedLengthSigner {
    async fn sign(
        &self,
        hashes: &[Vec<u8>],
        _public_key: &PublicKey,
    ) -> Result<Vec<Vec<u8>>, SignatureError> {
        Ok(hashes.iter().map(|_| vec![0x11; self.0]).collect())
    }
}

// ============================================================================
// In-memory network
// ============================================================================

#[derive(Default)]
pub struct MockNetwork {
    pub info: Mutex<AccountInfo>,
    pub utxos: Mutex<Vec<UnspentOutput>>,
    pub quote: Mutex<Option<FeeQuote>>,
    pub nonce: Mutex<u64>,
    pub sequence: Mutex<Option<AccountSequence>>,
    pub fail_fetch: AtomicBool,
    pub fail_broadcast: AtomicBool,
    pub submitted: Mutex<Vec<Vec<u8>>>,
    pub calls: AtomicUsize,
}

impl MockNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_info(&self, info: AccountInfo) {
        *self.info.lock().unwrap() = info;
    }

    pub fn set_utxos(&self, utxos: Vec<UnspentOutput>) {
        *self.utxos.lock().unwrap() = utxos;
    }

    pub fn set_quote(&self, quote: FeeQuote) {
        *self.quote.lock().unwrap() = Some(quote);
    }

    pub fn submitted(&self) -> Vec<Vec<u8>> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn enter(&self) -> Result<(), ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(ProviderError::Request("connection refused".to_string()));
        }
        Ok(())
    }

    /// Every provider role served by this network
    pub fn providers(self: &Arc<Self>) -> Providers {
        Providers::new(self.clone(), self.clone(), self.clone())
            .with_utxo(self.clone())
            .with_nonce(self.clone())
    }
}

#[async_trait]
impl BalanceProvider for MockNetwork {
    async fn get_info(&self, _address: &str, _tokens: &[Token]) -> Result<AccountInfo, ProviderError> {
        self.enter()?;
        Ok(self.info.lock().unwrap().clone())
    }
}

#[async_trait]
impl UtxoProvider for MockNetwork {
    async fn get_unspent_outputs(&self, _address: &str) -> Result<Vec<UnspentOutput>, ProviderError> {
        self.enter()?;
        Ok(self.utxos.lock().unwrap().clone())
    }
}

#[async_trait]
impl FeeQuoteProvider for MockNetwork {
    async fn get_fee_quote(&self, _amount: &Amount, _destination: &str) -> Result<FeeQuote, ProviderError> {
        self.enter()?;
        self.quote
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ProviderError::Parse("no quote configured".to_string()))
    }
}

#[async_trait]
impl NonceProvider for MockNetwork {
    async fn get_nonce(&self, _address: &str) -> Result<u64, ProviderError> {
        self.enter()?;
        Ok(*self.nonce.lock().unwrap())
    }

    async fn get_sequence(&self, address: &str) -> Result<AccountSequence, ProviderError> {
        let configured = *self.sequence.lock().unwrap();
        match configured {
            Some(sequence) => {
                self.enter()?;
                Ok(sequence)
            }
            None => Ok(AccountSequence {
                account_number: None,
                sequence: self.get_nonce(address).await?,
            }),
        }
    }
}

#[async_trait]
impl BroadcastProvider for MockNetwork {
    async fn submit(&self, raw_transaction: &[u8]) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_broadcast.load(Ordering::SeqCst) {
            return Err(ProviderError::Status {
                code: 400,
                message: "bad-txns-inputs-missingorspent".to_string(),
            });
        }
        self.submitted.lock().unwrap().push(raw_transaction.to_vec());
        Ok(format!("hash-{}", self.submitted.lock().unwrap().len()))
    }
}
