//! Koinos mana pricing from the chain's current resource costs

use super::Fee;
use crate::amount::{Amount, AmountType};
use crate::blockchain::{Blockchain, KOINOS_MANA};
use crate::config::KoinosResourceLimits;
use crate::error::AmountError;

/// Per-unit resource prices returned by `chain.get_resource_limits`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResourceCosts {
    pub disk_storage_cost: u64,
    pub network_bandwidth_cost: u64,
    pub compute_bandwidth_cost: u64,
}

/// `maxDisk × diskCost + maxNetwork × networkCost + maxCompute × computeCost`
pub fn rc_limit(limits: &KoinosResourceLimits, costs: &ResourceCosts) -> Option<u128> {
    let disk = u128::from(limits.max_disk_storage_limit)
        .checked_mul(u128::from(costs.disk_storage_cost))?;
    let network = u128::from(limits.max_network_limit)
        .checked_mul(u128::from(costs.network_bandwidth_cost))?;
    let compute = u128::from(limits.max_compute_limit)
        .checked_mul(u128::from(costs.compute_bandwidth_cost))?;
    disk.checked_add(network)?.checked_add(compute)
}

/// Single mana-denominated fee; Koinos offers no tiers
pub fn fee(
    blockchain: &Blockchain,
    limits: &KoinosResourceLimits,
    costs: &ResourceCosts,
) -> Result<Fee, AmountError> {
    let decimals = blockchain.decimal_count();
    let units = rc_limit(limits, costs).ok_or_else(|| AmountError::Overflow {
        value: format!("{:?}", costs),
        decimals,
    })?;
    let amount = Amount::from_smallest_unit(
        AmountType::FeeResource(KOINOS_MANA.to_string()),
        units,
        decimals,
        KOINOS_MANA,
    )?;
    Ok(Fee::from_amount(amount))
}
