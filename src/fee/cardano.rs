//! Cardano linear fee: `min_fee_a × size + min_fee_b`

use super::{Fee, SizeEstimator};
use crate::amount::{Amount, AmountType};
use crate::blockchain::Blockchain;
use crate::config::CardanoProtocolParams;
use crate::error::WalletError;

pub fn linear_fee(params: &CardanoProtocolParams, size: u64) -> u64 {
    params
        .min_fee_a
        .saturating_mul(size)
        .saturating_add(params.min_fee_b)
}

/// Fee for the transaction the estimator describes, in ADA
///
/// The CBOR fee field grows with its value, so size is re-measured once with
/// the first-pass fee in place.
pub fn fee(
    blockchain: &Blockchain,
    params: &CardanoProtocolParams,
    estimator: &dyn SizeEstimator,
) -> Result<Fee, WalletError> {
    let first = estimator.estimate_size(&lovelace_fee(blockchain, 0)?)?;
    let draft = linear_fee(params, first);
    let second = estimator.estimate_size(&lovelace_fee(blockchain, draft)?)?;

    lovelace_fee(blockchain, linear_fee(params, second))
}

pub fn lovelace_fee(blockchain: &Blockchain, lovelace: u64) -> Result<Fee, WalletError> {
    let amount = Amount::from_smallest_unit(
        AmountType::Coin,
        u128::from(lovelace),
        blockchain.decimal_count(),
        blockchain.currency_symbol(),
    )?;
    Ok(Fee::from_amount(amount))
}
