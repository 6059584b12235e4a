//! Error types for wallet operations
//!
//! One enum per failure class so callers can tell a local validation problem
//! from a build problem, a signer problem, or a transient network failure.

use crate::amount::{Amount, AmountType};
use thiserror::Error;

/// Arithmetic and conversion failures on [`Amount`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("Amount type mismatch: {left} vs {right}")]
    TypeMismatch { left: AmountType, right: AmountType },

    #[error("Amount overflow converting {value} with {decimals} decimals")]
    Overflow { value: String, decimals: u32 },

    #[error("Negative amount cannot be encoded: {0}")]
    Negative(String),
}

/// A single local validation failure
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransactionError {
    #[error("Invalid amount")]
    InvalidAmount,

    #[error("Amount exceeds balance")]
    AmountExceedsBalance,

    #[error("Invalid fee")]
    InvalidFee,

    #[error("Fee exceeds balance")]
    FeeExceedsBalance,

    #[error("Total (amount + fee) exceeds balance")]
    TotalExceedsBalance,

    #[error("Amount is below the dust limit of {minimum}")]
    DustAmount { minimum: Amount },

    #[error("Change is below the dust limit of {minimum}")]
    DustChange { minimum: Amount },
}

/// Every validation failure found for one transaction
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TransactionErrors(pub Vec<TransactionError>);

impl TransactionErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, error: &TransactionError) -> bool {
        self.0.contains(error)
    }

    pub fn push_if_some(&mut self, error: Option<TransactionError>) {
        if let Some(error) = error {
            self.0.push(error);
        }
    }
}

impl std::fmt::Display for TransactionErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let messages: Vec<String> = self.0.iter().map(|e| e.to_string()).collect();
        write!(f, "{}", messages.join("; "))
    }
}

impl std::error::Error for TransactionErrors {}

/// Failures while turning a [`crate::Transaction`] into a signable payload
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuildError {
    #[error("Fee parameters mismatch: expected {expected}, got {actual}")]
    FeeParametersMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Missing chain state: {0}")]
    MissingChainState(String),

    #[error("Unsupported amount type: {0}")]
    UnsupportedAmountType(AmountType),

    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(#[from] AmountError),

    #[error("Encoding error: {0}")]
    Encoding(String),
}

/// Problems with what the external signer returned
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Signature count mismatch: expected {expected}, got {actual}")]
    CountMismatch { expected: usize, actual: usize },

    #[error("Invalid signature length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Malformed signature: {0}")]
    Malformed(String),

    #[error("Could not recover public key from signature")]
    RecoveryFailed,

    #[error("Signer failed: {0}")]
    Signer(String),
}

/// Resource checks specific to mana-metered chains
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KoinosError {
    #[error("Coin balance is lower than the fee")]
    InsufficientBalance,

    #[error("Mana is lower than the fee")]
    InsufficientMana,

    #[error("Transfer amount exceeds mana left after the fee")]
    ManaFeeExceedsBalance,
}

/// Transient failures talking to a network collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("HTTP {code}: {message}")]
    Status { code: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        ProviderError::Request(e.to_string())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WalletError {
    #[error("Amount error: {0}")]
    Amount(#[from] AmountError),

    #[error("Validation failed: {0}")]
    Validation(#[from] TransactionErrors),

    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    #[error("Signature error: {0}")]
    Signature(#[from] SignatureError),

    #[error("Koinos error: {0}")]
    Koinos(#[from] KoinosError),

    #[error("Network error: {0}")]
    Network(#[from] ProviderError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not supported: {0}")]
    NotSupported(String),
}

/// A failed `send()`; `raw_transaction` is set when the failure happened at broadcast
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{error}")]
pub struct SendError {
    pub error: WalletError,
    pub raw_transaction: Option<String>,
}

impl SendError {
    pub fn new(error: impl Into<WalletError>) -> Self {
        Self {
            error: error.into(),
            raw_transaction: None,
        }
    }

    pub fn at_broadcast(error: impl Into<WalletError>, raw_transaction: &[u8]) -> Self {
        Self {
            error: error.into(),
            raw_transaction: Some(hex::encode(raw_transaction)),
        }
    }
}

macro_rules! send_error_from {
    ($($source:ty),* $(,)?) => {
        $(
            impl From<$source> for SendError {
                fn from(e: $source) -> Self {
                    SendError::new(e)
                }
            }
        )*
    };
}

send_error_from!(
    WalletError,
    AmountError,
    TransactionErrors,
    BuildError,
    SignatureError,
    KoinosError,
    ProviderError,
);
