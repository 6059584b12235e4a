//! XDC Network: Ethereum builder over `xdc`-prefixed addresses

use super::ethereum::EthereumTransactionBuilder;
use super::{BuildState, ChainState, SigningPayload, TransactionBuilder};
use crate::error::WalletError;
use crate::transaction::Transaction;

const XDC_PREFIX: &str = "xdc";

/// `xdc…` becomes `0x…`; any other address passes through
pub fn to_eth_address(address: &str) -> String {
    match address.get(..XDC_PREFIX.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(XDC_PREFIX) => {
            format!("0x{}", &address[XDC_PREFIX.len()..])
        }
        _ => address.to_string(),
    }
}

/// `0x…` becomes `xdc…`
pub fn to_xdc_address(address: &str) -> String {
    match address.strip_prefix("0x") {
        Some(rest) => format!("{}{}", XDC_PREFIX, rest),
        None => address.to_string(),
    }
}

pub struct XdcTransactionBuilder {
    inner: EthereumTransactionBuilder,
}

impl XdcTransactionBuilder {
    pub fn new(inner: EthereumTransactionBuilder) -> Self {
        Self { inner }
    }
}

impl TransactionBuilder for XdcTransactionBuilder {
    fn build_for_sign(
        &self,
        transaction: &Transaction,
        chain_state: &ChainState,
    ) -> Result<SigningPayload, WalletError> {
        let mut transaction = transaction.clone();
        transaction.source_address = to_eth_address(&transaction.source_address);
        transaction.destination_address = to_eth_address(&transaction.destination_address);
        transaction.change_address = to_eth_address(&transaction.change_address);
        transaction.contract_address = transaction.contract_address.as_deref().map(to_eth_address);

        self.inner.build_for_sign(&transaction, chain_state)
    }

    fn build_for_send(
        &self,
        state: BuildState,
        signatures: &[Vec<u8>],
    ) -> Result<Vec<u8>, WalletError> {
        self.inner.build_for_send(state, signatures)
    }
}
