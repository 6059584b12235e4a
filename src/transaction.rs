//! Transfer intents and the records kept for them after broadcast

use crate::amount::Amount;
use crate::blockchain::Blockchain;
use crate::fee::Fee;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Chain-specific overrides attached to a [`Transaction`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TransactionParams {
    Ethereum(EthereumTransactionParams),
    Cosmos(CosmosTransactionParams),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EthereumTransactionParams {
    /// Raw calldata; replaces the ERC-20 `transfer` payload when set
    pub data: Option<Vec<u8>>,
    pub gas_limit: Option<u64>,
    pub nonce: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CosmosTransactionParams {
    pub memo: String,
}

impl TransactionParams {
    pub fn ethereum(&self) -> Option<&EthereumTransactionParams> {
        match self {
            TransactionParams::Ethereum(params) => Some(params),
            _ => None,
        }
    }

    pub fn cosmos(&self) -> Option<&CosmosTransactionParams> {
        match self {
            TransactionParams::Cosmos(params) => Some(params),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    Unconfirmed,
    Confirmed,
    Failed,
}

/// A transfer intent, prior to signing
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub amount: Amount,
    pub fee: Fee,
    pub source_address: String,
    pub destination_address: String,
    pub change_address: String,
    pub contract_address: Option<String>,
    pub params: Option<TransactionParams>,
    pub date: Option<DateTime<Utc>>,
    pub status: TransactionStatus,
    pub hash: Option<String>,
}

impl Transaction {
    pub fn new(
        amount: Amount,
        fee: Fee,
        source_address: impl Into<String>,
        destination_address: impl Into<String>,
        change_address: impl Into<String>,
    ) -> Self {
        let contract_address = amount
            .amount_type
            .token()
            .map(|token| token.contract_address.clone());

        Self {
            amount,
            fee,
            source_address: source_address.into(),
            destination_address: destination_address.into(),
            change_address: change_address.into(),
            contract_address,
            params: None,
            date: None,
            status: TransactionStatus::Unconfirmed,
            hash: None,
        }
    }

    pub fn with_params(mut self, params: TransactionParams) -> Self {
        self.params = Some(params);
        self
    }

    pub fn ethereum_params(&self) -> Option<&EthereumTransactionParams> {
        self.params.as_ref().and_then(TransactionParams::ethereum)
    }

    pub fn cosmos_params(&self) -> Option<&CosmosTransactionParams> {
        self.params.as_ref().and_then(TransactionParams::cosmos)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionType {
    Transfer,
    Operation,
}

/// A broadcast transaction waiting to be seen confirmed on chain
#[derive(Debug, Clone, PartialEq)]
pub struct PendingTransactionRecord {
    pub hash: String,
    pub source: String,
    pub destination: String,
    pub amount: Amount,
    pub fee: Fee,
    pub date: DateTime<Utc>,
    pub is_incoming: bool,
    pub transaction_type: TransactionType,
    pub params: Option<TransactionParams>,
}

impl PendingTransactionRecord {
    /// Record for a transaction this wallet just broadcast
    pub fn from_sent(transaction: &Transaction, hash: impl Into<String>, date: DateTime<Utc>) -> Self {
        Self {
            hash: hash.into(),
            source: transaction.source_address.clone(),
            destination: transaction.destination_address.clone(),
            amount: transaction.amount.clone(),
            fee: transaction.fee.clone(),
            date,
            is_incoming: false,
            transaction_type: TransactionType::Transfer,
            params: transaction.params.clone(),
        }
    }

    /// Record for a pending transaction reported by a network provider
    pub fn from_network(pending: &NetworkPendingTransaction, blockchain: &Blockchain) -> Self {
        let amount = Amount::coin(blockchain, pending.value);
        let fee = Fee::from_amount(Amount::coin(blockchain, pending.fee.unwrap_or_default()));

        Self {
            hash: pending.hash.clone(),
            source: pending.source.clone(),
            destination: pending.destination.clone(),
            amount,
            fee,
            date: pending.date,
            is_incoming: pending.is_incoming,
            transaction_type: TransactionType::Transfer,
            params: None,
        }
    }
}

/// Pending transaction as a provider reports it, in coin units
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkPendingTransaction {
    pub hash: String,
    pub source: String,
    pub destination: String,
    pub value: rust_decimal::Decimal,
    pub fee: Option<rust_decimal::Decimal>,
    pub date: DateTime<Utc>,
    pub is_incoming: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendResult {
    pub hash: String,
}
