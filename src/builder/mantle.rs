//! Mantle L2: Ethereum builder with gas-limit corrections
//!
//! Mantle's gas estimate is off in both directions: the quoted limit is too
//! low to pass estimation and the charged amount is lower than quoted. Fees
//! are scaled up when quoted and scaled down when signed.

use super::ethereum::EthereumTransactionBuilder;
use super::{BuildState, ChainState, SigningPayload, TransactionBuilder};
use crate::amount::{Amount, AmountType};
use crate::blockchain::Blockchain;
use crate::config::MantleConfig;
use crate::error::WalletError;
use crate::fee::Fee;
use crate::transaction::Transaction;

/// Same fee with its gas limit scaled by `multiplier` and the amount recomputed
pub fn map_fee(fee: &Fee, blockchain: &Blockchain, multiplier: f64) -> Result<Fee, WalletError> {
    let parameters = fee.ethereum_parameters()?.with_multiplied_gas_limit(multiplier);
    Ok(parameters.to_fee(blockchain)?)
}

/// Value to quote fees for: a full-balance send loses one smallest unit
///
/// Sending exactly the balance fails estimation on Mantle, so a value equal to
/// the coin balance (within one unit) is lowered by one unit.
pub fn adjusted_value(
    blockchain: &Blockchain,
    value: &Amount,
    balance: Option<&Amount>,
) -> Result<Amount, WalletError> {
    if !matches!(value.amount_type, AmountType::Coin) {
        return Ok(value.clone());
    }

    let delta = blockchain.minimum_value();
    let full_balance = match balance {
        Some(balance) => balance.is_equal(value, delta)?,
        None => false,
    };

    if full_balance {
        log::debug!("Subtracting {} from a full-balance Mantle transfer", delta);
        Ok(value.checked_sub(&value.with_value(delta))?)
    } else {
        Ok(value.clone())
    }
}

pub struct MantleTransactionBuilder {
    inner: EthereumTransactionBuilder,
    blockchain: Blockchain,
    config: MantleConfig,
}

impl MantleTransactionBuilder {
    pub fn new(inner: EthereumTransactionBuilder, blockchain: Blockchain, config: MantleConfig) -> Self {
        Self {
            inner,
            blockchain,
            config,
        }
    }

    /// Applied to every quoted fee tier
    pub fn map_quoted_fee(&self, fee: &Fee) -> Result<Fee, WalletError> {
        map_fee(fee, &self.blockchain, self.config.fee_gas_limit_multiplier)
    }
}

impl TransactionBuilder for MantleTransactionBuilder {
    fn build_for_sign(
        &self,
        transaction: &Transaction,
        chain_state: &ChainState,
    ) -> Result<SigningPayload, WalletError> {
        let mut transaction = transaction.clone();
        transaction.fee = map_fee(
            &transaction.fee,
            &self.blockchain,
            self.config.sign_gas_limit_multiplier,
        )?;
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
