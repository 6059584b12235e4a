//! Wallet Manager - Orchestration Layer
//!
//! Owns one [`Wallet`] and its chain-state snapshot. `update()` refreshes both
//! from the providers; `send()` runs build, sign, assemble and broadcast
//! strictly in sequence and commits nothing unless the broadcast succeeds.

use crate::amount::{Amount, AmountType, Token};
use crate::blockchain::{Blockchain, ChainFamily, CosmosChain, KOINOS_MANA};
use crate::builder::{koinos, mantle, ChainBuilder, ChainState, TransactionBuilder};
use crate::config::SdkConfig;
use crate::error::{ProviderError, SendError, TransactionError, TransactionErrors, WalletError};
use crate::fee::{Fee, FeeEngine};
use crate::provider::{
    AccountInfo, AccountSequence, ApiSwitchNotifier, ApiSwitchObserver, BalanceProvider,
    BroadcastProvider, EsploraProvider, FeeQuoteProvider, NonceProvider, PendingReport, Signer,
    UtxoProvider,
};
use crate::transaction::{PendingTransactionRecord, SendResult, Transaction};
use crate::utxo::{UnspentOutput, UnspentOutputSet};
use crate::validation::TransactionValidator;
use crate::wallet::Wallet;
use chrono::Utc;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{RwLock, RwLockReadGuard};
use tokio::task::AbortHandle;

/// Network collaborators of one wallet
#[derive(Clone)]
pub struct Providers {
    pub balance: Arc<dyn BalanceProvider>,
    pub fees: Arc<dyn FeeQuoteProvider>,
    pub broadcast: Arc<dyn BroadcastProvider>,
    pub utxo: Option<Arc<dyn UtxoProvider>>,
    pub nonce: Option<Arc<dyn NonceProvider>>,
}

impl Providers {
    pub fn new(
        balance: Arc<dyn BalanceProvider>,
        fees: Arc<dyn FeeQuoteProvider>,
        broadcast: Arc<dyn BroadcastProvider>,
    ) -> Self {
        Self {
            balance,
            fees,
            broadcast,
            utxo: None,
            nonce: None,
        }
    }

    pub fn with_utxo(mut self, provider: Arc<dyn UtxoProvider>) -> Self {
        self.utxo = Some(provider);
        self
    }

    pub fn with_nonce(mut self, provider: Arc<dyn NonceProvider>) -> Self {
        self.nonce = Some(provider);
        self
    }

    /// One Esplora adapter serving every role of a Bitcoin wallet
    pub fn esplora(provider: Arc<EsploraProvider>) -> Self {
        Self {
            balance: provider.clone(),
            fees: provider.clone(),
            broadcast: provider.clone(),
            utxo: Some(provider),
            nonce: None,
        }
    }
}

/// Everything one `update()` learned from the network
#[derive(Debug, Clone, Default)]
pub struct NetworkSnapshot {
    pub info: AccountInfo,
    pub unspent_outputs: Option<Vec<UnspentOutput>>,
    pub nonce: Option<u64>,
    pub sequence: Option<AccountSequence>,
}

/// The network half of an update, detached from the manager so it can run
/// without holding any lock on it
#[derive(Clone)]
pub struct UpdateFetcher {
    blockchain: Blockchain,
    address: String,
    tokens: Vec<Token>,
    providers: Providers,
}

impl UpdateFetcher {
    pub async fn fetch(&self) -> Result<NetworkSnapshot, WalletError> {
        log::debug!("Fetching {} state for {}", self.blockchain, self.address);

        let info = self.providers.balance.get_info(&self.address, &self.tokens);

        let unspent_outputs = async {
            match &self.providers.utxo {
                Some(provider) => provider.get_unspent_outputs(&self.address).await.map(Some),
                None => Ok(None),
            }
        };

        let counters = async {
            match (&self.providers.nonce, self.blockchain) {
                (Some(provider), Blockchain::Cosmos { .. }) => provider
                    .get_sequence(&self.address)
                    .await
                    .map(|sequence| (None, Some(sequence))),
                (Some(provider), _) => provider
                    .get_nonce(&self.address)
                    .await
                    .map(|nonce| (Some(nonce), None)),
                (None, _) => Ok((None, None)),
            }
        };

        // Independent requests; the first failure fails the whole update
        let (info, unspent_outputs, (nonce, sequence)) =
            futures::try_join!(info, unspent_outputs, counters)?;

        Ok(NetworkSnapshot {
            info,
            unspent_outputs,
            nonce,
            sequence,
        })
    }
}

pub struct WalletManager {
    wallet: Wallet,
    config: SdkConfig,
    builder: ChainBuilder,
    fee_engine: FeeEngine,
    providers: Providers,
    chain_state: ChainState,
    tokens: Vec<Token>,
    notifier: ApiSwitchNotifier,
}

impl WalletManager {
    // ============================================================================
    // Constructor
    // ============================================================================

    pub fn new(wallet: Wallet, providers: Providers, config: SdkConfig) -> Result<Self, WalletError> {
        let blockchain = wallet.blockchain;
        let builder = ChainBuilder::new(blockchain, wallet.public_key(), &config)?;

        let mut fee_engine = FeeEngine::new(blockchain, config.clone());
        if let Blockchain::Cosmos { testnet } = blockchain {
            fee_engine = fee_engine.with_cosmos_chain(CosmosChain::cosmos_hub(testnet));
        }

        Ok(Self {
            wallet,
            config,
            builder,
            fee_engine,
            providers,
            chain_state: ChainState::default(),
            tokens: Vec::new(),
            notifier: ApiSwitchNotifier::default(),
        })
    }

    /// Tokens whose balances `update()` asks for
    pub fn with_tokens(mut self, tokens: Vec<Token>) -> Self {
        self.tokens = tokens;
        self
    }

    /// Share the notifier the providers were built with
    pub fn with_notifier(mut self, notifier: ApiSwitchNotifier) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn set_api_switch_observer(&self, observer: Arc<dyn ApiSwitchObserver>) {
        self.notifier.set(observer);
    }

    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    pub fn chain_state(&self) -> &ChainState {
        &self.chain_state
    }

    // ============================================================================
    // Update
    // ============================================================================

    pub fn fetcher(&self) -> UpdateFetcher {
        UpdateFetcher {
            blockchain: self.wallet.blockchain,
            address: self.wallet.address().to_string(),
            tokens: self.tokens.clone(),
            providers: self.providers.clone(),
        }
    }

    pub async fn update(&mut self) -> Result<(), WalletError> {
        let result = self.fetcher().fetch().await;
        self.apply_update(result)
    }

    /// Commit a fetch result; a failed fetch leaves every balance unknown
    pub fn apply_update(&mut self, result: Result<NetworkSnapshot, WalletError>) -> Result<(), WalletError> {
        let blockchain = self.wallet.blockchain;
        let snapshot = match result {
            Ok(snapshot) => snapshot,
            Err(error) => {
                log::warn!("Update of {} failed, clearing balances: {}", blockchain, error);
                self.wallet.clear_amounts();
                return Err(error);
            }
        };
        let NetworkSnapshot {
            info,
            unspent_outputs,
            nonce,
            sequence,
        } = snapshot;

        self.wallet.clear_amounts();
        self.wallet.add_coin_value(info.coin_balance);
        for (token, value) in &info.token_balances {
            self.wallet.add_token_value(token, *value);
        }
        for (name, value) in &info.fee_resources {
            self.wallet
                .add_amount(Amount::fee_resource(name, *value, blockchain.decimal_count()));
        }

        if let Some(outputs) = unspent_outputs {
            self.chain_state.unspent_outputs = UnspentOutputSet::new(outputs);
        }

        let counted_nonce = match &info.pending {
            PendingReport::Counts { tx_count, .. } => Some(*tx_count),
            _ => None,
        };
        if let Some(nonce) = nonce.or(counted_nonce) {
            self.chain_state.nonce = Some(nonce);
        }

        if let Some(sequence) = sequence {
            self.chain_state.sequence = Some(sequence.sequence);
            if sequence.account_number.is_some() {
                self.chain_state.account_number = sequence.account_number;
            }
        }

        self.reconcile_pending(info.pending);

        log::info!(
            "Updated {}: {} amount(s), {} pending transaction(s)",
            blockchain,
            self.wallet.amounts().len(),
            self.wallet.pending_transactions().len()
        );
        Ok(())
    }

    fn reconcile_pending(&mut self, report: PendingReport) {
        let blockchain = self.wallet.blockchain;

        match report {
            PendingReport::Complete(pending) => {
                self.wallet.clear_pending_transactions();
                for tx in &pending {
                    self.wallet
                        .add_pending_transaction(PendingTransactionRecord::from_network(tx, &blockchain));
                }
            }
            PendingReport::Confirmed(hashes) => {
                self.wallet
                    .remove_pending_where(|hash| hashes.iter().any(|confirmed| confirmed == hash));
            }
            PendingReport::Counts {
                tx_count,
                pending_tx_count,
                pending,
            } => {
                if tx_count == pending_tx_count {
                    self.wallet.clear_pending_transactions();
                } else if !pending.is_empty() {
                    self.wallet.clear_pending_transactions();
                    for tx in &pending {
                        self.wallet.add_pending_transaction(
                            PendingTransactionRecord::from_network(tx, &blockchain),
                        );
                    }
                }
                // Nonces disagree but no details: local records stay until they converge
            }
        }
    }

    // ============================================================================
    // Validation
    // ============================================================================

    fn validator(&self) -> TransactionValidator<'_> {
        TransactionValidator::new(&self.wallet, self.wallet.blockchain.dust_value(&self.config))
    }

    pub fn validate_amount(&self, amount: &Amount) -> Option<TransactionError> {
        self.validator().validate_amount(amount)
    }

    pub fn validate_fee(&self, fee: &Fee) -> Option<TransactionError> {
        self.validator().validate_fee(&fee.amount)
    }

    pub fn validate(&self, amount: &Amount, fee: Option<&Fee>) -> TransactionErrors {
        self.validator().validate(amount, fee.map(|fee| &fee.amount))
    }

    /// A validated transfer from the default address, change returning to it
    /// unless overridden
    pub fn create_transaction(
        &self,
        amount: Amount,
        fee: Fee,
        destination: impl Into<String>,
        source: Option<String>,
        change: Option<String>,
    ) -> Result<Transaction, TransactionErrors> {
        let errors = self.validate(&amount, Some(&fee));
        if !errors.is_empty() {
            return Err(errors);
        }

        let own = self.wallet.address().to_string();
        Ok(Transaction::new(
            amount,
            fee,
            source.unwrap_or_else(|| own.clone()),
            destination,
            change.unwrap_or(own),
        ))
    }

    // ============================================================================
    // Fees
    // ============================================================================

    /// Fee tiers for sending `amount` to `destination`
    pub async fn get_fee(&self, amount: &Amount, destination: &str) -> Result<Vec<Fee>, WalletError> {
        let blockchain = self.wallet.blockchain;
        let quoted_amount = match &self.builder {
            ChainBuilder::Mantle(_) => {
                mantle::adjusted_value(&blockchain, amount, self.wallet.coin_balance())?
            }
            _ => amount.clone(),
        };

        let quote = self
            .providers
            .fees
            .get_fee_quote(&quoted_amount, destination)
            .await?;

        let draft = || {
            Transaction::new(
                amount.clone(),
                Fee::from_amount(blockchain.zero_fee()),
                self.wallet.address(),
                destination,
                self.wallet.address(),
            )
        };
        let utxos = &self.chain_state.unspent_outputs;

        match &self.builder {
            ChainBuilder::Bitcoin(builder) => {
                let transaction = draft();
                let estimator = builder.size_estimator(&transaction, utxos);
                self.fee_engine.compute(&quote, amount, Some(&estimator))
            }
            ChainBuilder::Cardano(builder) => {
                let transaction = draft();
                let estimator = builder.size_estimator(&transaction, utxos);
                self.fee_engine.compute(&quote, amount, Some(&estimator))
            }
            ChainBuilder::Mantle(builder) => self
                .fee_engine
                .compute(&quote, amount, None)?
                .iter()
                .map(|fee| builder.map_quoted_fee(fee))
                .collect(),
            _ => self.fee_engine.compute(&quote, amount, None),
        }
    }

    // ============================================================================
    // Send
    // ============================================================================

    pub async fn send(
        &mut self,
        transaction: &Transaction,
        signer: &dyn Signer,
    ) -> Result<SendResult, SendError> {
        let blockchain = self.wallet.blockchain;

        if blockchain.family() == ChainFamily::ResourceMetered {
            let mana = AmountType::FeeResource(KOINOS_MANA.to_string());
            koinos::validate_resources(
                &transaction.amount,
                &transaction.fee.amount,
                self.wallet.coin_balance(),
                self.wallet.amount(&mana),
            )?;
        }

        log::info!(
            "Sending {} to {} on {} (fee {})",
            transaction.amount,
            transaction.destination_address,
            blockchain,
            transaction.fee.amount
        );

        let payload = self.builder.build_for_sign(transaction, &self.chain_state)?;
        log::debug!("Requesting {} signature(s)", payload.hashes.len());

        let signatures = signer
            .sign(&payload.hashes, self.wallet.public_key())
            .await?;
        let raw_transaction = self.builder.build_for_send(payload.state, &signatures)?;

        let hash = self
            .providers
            .broadcast
            .submit(&raw_transaction)
            .await
            .map_err(|e| {
                log::warn!("Broadcast on {} failed: {}", blockchain, e);
                SendError::at_broadcast(e, &raw_transaction)
            })?;
        log::info!("Broadcast {} on {}", hash, blockchain);

        self.wallet.add_pending_transaction(PendingTransactionRecord::from_sent(
            transaction,
            hash.clone(),
            Utc::now(),
        ));

        Ok(SendResult { hash })
    }
}

/// A manager shared between tasks
///
/// A new `update()` aborts the one still in flight; the aborted caller gets
/// [`ProviderError::Cancelled`]. Fetching happens outside the lock, so an
/// aborted update never commits anything.
#[derive(Clone)]
pub struct SharedWalletManager {
    inner: Arc<RwLock<WalletManager>>,
    in_flight: Arc<Mutex<Option<AbortHandle>>>,
}

impl SharedWalletManager {
    pub fn new(manager: WalletManager) -> Self {
        Self {
            inner: Arc::new(RwLock::new(manager)),
            in_flight: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, WalletManager> {
        self.inner.read().await
    }

    pub async fn update(&self) -> Result<(), WalletError> {
        let fetcher = self.inner.read().await.fetcher();
        let inner = self.inner.clone();

        // Abort, spawn and record under one lock so the slot always holds the newest update
        let task = {
            let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(previous) = slot.take() {
                if !previous.is_finished() {
                    log::debug!("Cancelling the in-flight update");
                    previous.abort();
                }
            }
            let task = tokio::spawn(async move {
                let result = fetcher.fetch().await;
                inner.write().await.apply_update(result)
            });
            *slot = Some(task.abort_handle());
            task
        };

        match task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(ProviderError::Cancelled.into()),
            Err(e) => Err(ProviderError::Request(e.to_string()).into()),
        }
    }

    pub async fn get_fee(&self, amount: &Amount, destination: &str) -> Result<Vec<Fee>, WalletError> {
        self.inner.read().await.get_fee(amount, destination).await
    }

    pub async fn send(
        &self,
        transaction: &Transaction,
        signer: &dyn Signer,
    ) -> Result<SendResult, SendError> {
        self.inner.write().await.send(transaction, signer).await
    }
}
