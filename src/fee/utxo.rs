//! Fee-rate × size pricing for Bitcoin-like chains

use super::{Fee, FeeParameters, SizeEstimator};
use crate::amount::{Amount, AmountType};
use crate::blockchain::Blockchain;
use crate::config::UtxoPolicy;
use crate::error::WalletError;

/// One fee per quoted rate (sat/vB), each floored at the relay minimum
///
/// Size is measured twice: once with a zero fee, then again with the fee
/// from the first pass, since a larger fee can drop the change output.
pub fn fees(
    blockchain: &Blockchain,
    policy: &UtxoPolicy,
    rates: &[u64; 3],
    estimator: &dyn SizeEstimator,
) -> Result<Vec<Fee>, WalletError> {
    rates
        .iter()
        .map(|&rate| {
            let first = estimator.estimate_size(&sats_fee(blockchain, 0, rate)?)?;
            let draft = fee_for_size(policy, rate, first);
            let second = estimator.estimate_size(&sats_fee(blockchain, draft, rate)?)?;
            let sats = fee_for_size(policy, rate, second);

            log::debug!(
                "{} sat/vB × {} vB = {} sats (relay floor {})",
                rate,
                second,
                sats,
                policy.min_relay_fee_sats
            );

            sats_fee(blockchain, sats, rate)
        })
        .collect()
}

/// `max(rate × size, min_relay_fee)`
pub fn fee_for_size(policy: &UtxoPolicy, rate: u64, size: u64) -> u64 {
    rate.saturating_mul(size).max(policy.min_relay_fee_sats)
}

pub fn sats_fee(blockchain: &Blockchain, sats: u64, rate: u64) -> Result<Fee, WalletError> {
    let amount = Amount::from_smallest_unit(
        AmountType::Coin,
        u128::from(sats),
        blockchain.decimal_count(),
        blockchain.currency_symbol(),
    )?;
    Ok(Fee::new(amount, FeeParameters::Bitcoin { rate }))
}
