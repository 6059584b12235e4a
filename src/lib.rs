//! Multichain Wallet: transaction building and fee/balance reconciliation
//!
//! This crate turns a transfer intent into the exact bytes a chain expects,
//! prices it in that chain's fee model, and keeps a wallet's balances and
//! pending transactions in step with the network. Private keys never enter
//! the crate: builders hand out hashes and take back 64-byte signatures from
//! an external [`provider::Signer`].
//!
//! # Architecture
//!
//! - **Builders**: one per chain family (Bitcoin, Ethereum with Mantle and XDC
//!   variants, Cosmos, Koinos, Cardano), pure and synchronous
//! - **Fee Engine**: EIP-1559/legacy gas, fee rate × size, Cosmos gas,
//!   Koinos mana and Cardano linear fees
//! - **Wallet Manager**: the async orchestration layer over provider traits
//!
//! # Example
//!
//! ```ignore
//! use multichain_wallet::{Providers, SdkConfig, WalletManager};
//!
//! let config = SdkConfig::from_env();
//! let esplora = Arc::new(EsploraProvider::from_config(blockchain, &config));
//! let mut manager = WalletManager::new(wallet, Providers::esplora(esplora), config)?;
//!
//! manager.update().await?;
//! let fees = manager.get_fee(&amount, destination).await?;
//! let tx = manager.create_transaction(amount, fees[1].clone(), destination, None, None)?;
//! let result = manager.send(&tx, &signer).await?;
//! ```

// Public modules
pub mod amount;
pub mod blockchain;
pub mod builder;
pub mod config;
pub mod error;
pub mod fee;
pub mod manager;
pub mod provider;
pub mod transaction;
pub mod utxo;
pub mod validation;
pub mod wallet;

// Re-exports for convenience
pub use amount::{Amount, AmountType, Token};
pub use blockchain::{Blockchain, ChainFamily, CosmosChain, KoinosNetworkParams};
pub use builder::{BuildState, ChainBuilder, ChainState, SigningPayload, TransactionBuilder};
pub use config::SdkConfig;
pub use error::{
    AmountError, BuildError, KoinosError, ProviderError, SendError, SignatureError,
    TransactionError, TransactionErrors, WalletError,
};
pub use fee::{Fee, FeeEngine, FeeParameters, FeeQuote};
pub use manager::{NetworkSnapshot, Providers, SharedWalletManager, WalletManager};
pub use provider::{
    AccountInfo, ApiSwitchNotifier, ApiSwitchObserver, EsploraProvider, PendingReport, Signer,
};
pub use transaction::{PendingTransactionRecord, SendResult, Transaction, TransactionParams};
pub use utxo::{UnspentOutput, UnspentOutputSet};
pub use validation::TransactionValidator;
pub use wallet::{Addresses, PublicKey, Wallet};

// Common result type
pub type Result<T> = std::result::Result<T, WalletError>;
