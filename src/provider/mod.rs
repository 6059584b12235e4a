//! Network collaborators consumed by [`crate::WalletManager`]
//!
//! Only the traits live here; HTTP plumbing belongs to implementations such as
//! [`esplora::EsploraProvider`]. Every method is a suspension point and every
//! failure comes back as a [`ProviderError`] for the caller to retry.

pub mod esplora;

pub use esplora::EsploraProvider;

use crate::amount::{Amount, Token};
use crate::blockchain::Blockchain;
use crate::error::{ProviderError, SignatureError};
use crate::fee::FeeQuote;
use crate::transaction::NetworkPendingTransaction;
use crate::utxo::UnspentOutput;
use crate::wallet::PublicKey;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// How a provider reports in-flight transactions
#[derive(Debug, Clone, PartialEq)]
pub enum PendingReport {
    /// Every pending transaction of the address; anything else is settled
    Complete(Vec<NetworkPendingTransaction>),
    /// Hashes seen confirmed since the last refresh
    Confirmed(Vec<String>),
    /// Account nonces: `tx_count` counts mined transactions only
    Counts {
        tx_count: u64,
        pending_tx_count: u64,
        pending: Vec<NetworkPendingTransaction>,
    },
}

impl Default for PendingReport {
    fn default() -> Self {
        PendingReport::Complete(Vec::new())
    }
}

/// Balances of one address, in display units
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountInfo {
    pub coin_balance: Decimal,
    pub token_balances: HashMap<Token, Decimal>,
    /// Fee resources keyed by name, e.g. Koinos mana
    pub fee_resources: HashMap<String, Decimal>,
    pub pending: PendingReport,
}

/// Cosmos-style account counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountSequence {
    pub account_number: Option<u64>,
    pub sequence: u64,
}

#[async_trait]
pub trait BalanceProvider: Send + Sync {
    async fn get_info(&self, address: &str, tokens: &[Token]) -> Result<AccountInfo, ProviderError>;
}

#[async_trait]
pub trait UtxoProvider: Send + Sync {
    async fn get_unspent_outputs(&self, address: &str) -> Result<Vec<UnspentOutput>, ProviderError>;
}

#[async_trait]
pub trait FeeQuoteProvider: Send + Sync {
    async fn get_fee_quote(&self, amount: &Amount, destination: &str) -> Result<FeeQuote, ProviderError>;
}

#[async_trait]
pub trait NonceProvider: Send + Sync {
    /// Next EVM nonce, or the last nonce used on Koinos
    async fn get_nonce(&self, address: &str) -> Result<u64, ProviderError>;

    async fn get_sequence(&self, address: &str) -> Result<AccountSequence, ProviderError> {
        Ok(AccountSequence {
            account_number: None,
            sequence: self.get_nonce(address).await?,
        })
    }
}

#[async_trait]
pub trait BroadcastProvider: Send + Sync {
    /// Submits raw transaction bytes and returns the network's transaction hash
    async fn submit(&self, raw_transaction: &[u8]) -> Result<String, ProviderError>;
}

/// External signer, possibly a hardware device
///
/// Returns one 64-byte compact signature per hash, in order. Failures are
/// reported as-is and never retried by the caller.
#[async_trait]
pub trait Signer: Send + Sync {
    async fn sign(
        &self,
        hashes: &[Vec<u8>],
        public_key: &PublicKey,
    ) -> Result<Vec<Vec<u8>>, SignatureError>;
}

/// Told when a provider moves to another API host
pub trait ApiSwitchObserver: Send + Sync {
    fn api_switched(&self, blockchain: Blockchain, host: &str);
}

/// Shared slot providers notify through; the manager fills it
#[derive(Clone, Default)]
pub struct ApiSwitchNotifier {
    observer: Arc<RwLock<Option<Arc<dyn ApiSwitchObserver>>>>,
}

impl ApiSwitchNotifier {
    pub fn set(&self, observer: Arc<dyn ApiSwitchObserver>) {
        if let Ok(mut slot) = self.observer.write() {
            *slot = Some(observer);
        }
    }

    pub fn notify(&self, blockchain: Blockchain, host: &str) {
        log::info!("{} switched API host to {}", blockchain, host);

        let observer = self.observer.read().ok().and_then(|slot| slot.clone());
        if let Some(observer) = observer {
            observer.api_switched(blockchain, host);
        }
    }
}

impl std::fmt::Debug for ApiSwitchNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registered = self
            .observer
            .read()
            .map(|slot| slot.is_some())
            .unwrap_or(false);
        f.debug_struct("ApiSwitchNotifier")
            .field("registered", &registered)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl ApiSwitchObserver for Recorder {
        fn api_switched(&self, _blockchain: Blockchain, host: &str) {
            self.0.lock().unwrap().push(host.to_string());
        }
    }

    #[test]
    fn test_notifier_reaches_observer_set_later() {
        let notifier = ApiSwitchNotifier::default();
        let provider_side = notifier.clone();

        provider_side.notify(Blockchain::Bitcoin { testnet: false }, "ignored");

        let recorder = Arc::new(Recorder::default());
        notifier.set(recorder.clone());
        provider_side.notify(Blockchain::Bitcoin { testnet: false }, "https://backup");

        assert_eq!(*recorder.0.lock().unwrap(), vec!["https://backup".to_string()]);
    }
}
