//! In-memory wallet state: addresses, balances and pending transactions
//!
//! Only [`crate::WalletManager`] mutates a `Wallet`; builders receive it by
//! shared reference.

use crate::amount::{Amount, AmountType, Token};
use crate::blockchain::Blockchain;
use crate::transaction::PendingTransactionRecord;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Raw public key bytes as the signer knows them
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PublicKey {
    pub bytes: Vec<u8>,
}

impl PublicKey {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressType {
    Default,
    Legacy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletAddress {
    pub value: String,
    pub address_type: AddressType,
    pub public_key: PublicKey,
}

impl WalletAddress {
    pub fn new(value: impl Into<String>, address_type: AddressType, public_key: PublicKey) -> Self {
        Self {
            value: value.into(),
            address_type,
            public_key,
        }
    }
}

/// A wallet always has exactly one default address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Addresses {
    pub default: WalletAddress,
    pub legacy: Option<WalletAddress>,
}

impl Addresses {
    pub fn single(address: impl Into<String>, public_key: PublicKey) -> Self {
        Self {
            default: WalletAddress::new(address, AddressType::Default, public_key),
            legacy: None,
        }
    }

    pub fn all(&self) -> impl Iterator<Item = &WalletAddress> {
        std::iter::once(&self.default).chain(self.legacy.iter())
    }

    pub fn contains(&self, address: &str) -> bool {
        self.all().any(|a| a.value == address)
    }
}

#[derive(Debug, Clone)]
pub struct Wallet {
    pub blockchain: Blockchain,
    pub addresses: Addresses,
    amounts: HashMap<AmountType, Amount>,
    transactions: Vec<PendingTransactionRecord>,
}

impl Wallet {
    pub fn new(blockchain: Blockchain, addresses: Addresses) -> Self {
        Self {
            blockchain,
            addresses,
            amounts: HashMap::new(),
            transactions: Vec::new(),
        }
    }

    pub fn address(&self) -> &str {
        &self.addresses.default.value
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.addresses.default.public_key
    }

    pub fn amount(&self, amount_type: &AmountType) -> Option<&Amount> {
        self.amounts.get(amount_type)
    }

    pub fn amounts(&self) -> &HashMap<AmountType, Amount> {
        &self.amounts
    }

    pub fn coin_balance(&self) -> Option<&Amount> {
        self.amount(&AmountType::Coin)
    }

    pub fn add_amount(&mut self, amount: Amount) {
        self.amounts.insert(amount.amount_type.clone(), amount);
    }

    pub fn add_coin_value(&mut self, value: Decimal) {
        self.add_amount(Amount::coin(&self.blockchain, value));
    }

    pub fn add_token_value(&mut self, token: &Token, value: Decimal) {
        self.add_amount(Amount::token(token, value));
    }

    /// Forget every balance; callers must treat them as unknown
    pub fn clear_amounts(&mut self) {
        self.amounts.clear();
    }

    pub fn pending_transactions(&self) -> &[PendingTransactionRecord] {
        &self.transactions
    }

    pub fn has_pending_tx(&self) -> bool {
        !self.transactions.is_empty()
    }

    pub fn has_pending_tx_for(&self, amount_type: &AmountType) -> bool {
        self.transactions
            .iter()
            .any(|tx| &tx.amount.amount_type == amount_type)
    }

    /// Outgoing amount plus fee still in flight, in coin units
    pub fn pending_balance(&self) -> Decimal {
        self.transactions
            .iter()
            .filter(|tx| !tx.is_incoming && self.addresses.contains(&tx.source))
            .filter(|tx| tx.amount.amount_type.is_coin())
            .map(|tx| tx.amount.value + tx.fee.amount.value)
            .sum()
    }

    /// Returns false for a hash already recorded or a transfer between own addresses
    pub fn add_pending_transaction(&mut self, record: PendingTransactionRecord) -> bool {
        if self.transactions.iter().any(|tx| tx.hash == record.hash) {
            return false;
        }

        if self.addresses.contains(&record.source) && self.addresses.contains(&record.destination)
        {
            return false;
        }

        self.transactions.push(record);
        true
    }

    pub fn remove_pending_where(&mut self, mut confirmed: impl FnMut(&str) -> bool) {
        self.transactions.retain(|tx| !confirmed(&tx.hash));
    }

    pub fn clear_pending_transactions(&mut self) {
        self.transactions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fee::Fee;
    use crate::transaction::TransactionType;
    use chrono::Utc;

    fn wallet() -> Wallet {
        Wallet::new(
            Blockchain::Ethereum { testnet: false },
            Addresses::single("0xme", PublicKey::new(vec![2u8; 33])),
        )
    }

    fn record(hash: &str, source: &str, destination: &str) -> PendingTransactionRecord {
        let blockchain = Blockchain::Ethereum { testnet: false };
        PendingTransactionRecord {
            hash: hash.to_string(),
            source: source.to_string(),
            destination: destination.to_string(),
            amount: Amount::coin(&blockchain, Decimal::ONE),
            fee: Fee::from_amount(Amount::coin(&blockchain, Decimal::new(1, 3))),
            date: Utc::now(),
            is_incoming: false,
            transaction_type: TransactionType::Transfer,
            params: None,
        }
    }

    #[test]
    fn test_duplicate_and_self_transfers_are_not_recorded() {
        let mut wallet = wallet();

        assert!(wallet.add_pending_transaction(record("0x1", "0xme", "0xyou")));
        assert!(!wallet.add_pending_transaction(record("0x1", "0xme", "0xyou")));
        assert!(!wallet.add_pending_transaction(record("0x2", "0xme", "0xme")));
        assert_eq!(wallet.pending_transactions().len(), 1);
        assert_eq!(wallet.pending_balance(), Decimal::new(1001, 3));
    }

    #[test]
    fn test_remove_confirmed() {
        let mut wallet = wallet();
        wallet.add_pending_transaction(record("0x1", "0xme", "0xyou"));
        wallet.add_pending_transaction(record("0x2", "0xme", "0xyou"));

        wallet.remove_pending_where(|hash| hash == "0x1");
        assert_eq!(wallet.pending_transactions()[0].hash, "0x2");
    }

    #[test]
    fn test_clear_amounts() {
        let mut wallet = wallet();
        wallet.add_coin_value(Decimal::TEN);
        assert_eq!(wallet.coin_balance().map(|a| a.value), Some(Decimal::TEN));

        wallet.clear_amounts();
        assert!(wallet.coin_balance().is_none());
    }
}
