//! EVM gas pricing, legacy and EIP-1559

use super::{Fee, FeeParameters};
use crate::amount::{Amount, AmountType};
use crate::blockchain::Blockchain;
use crate::error::AmountError;
use serde::{Deserialize, Serialize};

/// Gas limit of a plain coin transfer
pub const DEFAULT_COIN_GAS_LIMIT: u64 = 21_000;
/// Gas limit used for ERC-20 transfers when no estimate is available
pub const DEFAULT_TOKEN_GAS_LIMIT: u64 = 60_000;

/// One EIP-1559 tier as quoted by the node, in wei per gas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eip1559Quote {
    pub max: u128,
    pub priority: u128,
}

impl Eip1559Quote {
    pub fn base_fee(&self) -> u128 {
        self.max.saturating_sub(self.priority)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EthereumFeeParameters {
    Legacy {
        gas_limit: u64,
        gas_price: u128,
    },
    Eip1559 {
        gas_limit: u64,
        max_fee_per_gas: u128,
        priority_fee: u128,
    },
}

impl EthereumFeeParameters {
    pub fn gas_limit(&self) -> u64 {
        match self {
            EthereumFeeParameters::Legacy { gas_limit, .. }
            | EthereumFeeParameters::Eip1559 { gas_limit, .. } => *gas_limit,
        }
    }

    pub fn with_gas_limit(&self, gas_limit: u64) -> Self {
        match *self {
            EthereumFeeParameters::Legacy { gas_price, .. } => EthereumFeeParameters::Legacy {
                gas_limit,
                gas_price,
            },
            EthereumFeeParameters::Eip1559 {
                max_fee_per_gas,
                priority_fee,
                ..
            } => EthereumFeeParameters::Eip1559 {
                gas_limit,
                max_fee_per_gas,
                priority_fee,
            },
        }
    }

    /// `ceil(gas_limit × multiplier)`
    pub fn with_multiplied_gas_limit(&self, multiplier: f64) -> Self {
        let scaled = (self.gas_limit() as f64 * multiplier).ceil();
        self.with_gas_limit(scaled as u64)
    }

    /// Fee in wei: `gasLimit × gasPrice` or `gasLimit × (baseFee + priorityFee)`
    pub fn fee_in_wei(&self) -> Option<u128> {
        match *self {
            EthereumFeeParameters::Legacy {
                gas_limit,
                gas_price,
            } => u128::from(gas_limit).checked_mul(gas_price),
            EthereumFeeParameters::Eip1559 {
                gas_limit,
                max_fee_per_gas,
                priority_fee,
            } => {
                let base_fee = max_fee_per_gas.saturating_sub(priority_fee);
                u128::from(gas_limit).checked_mul(base_fee.checked_add(priority_fee)?)
            }
        }
    }

    pub fn to_fee(&self, blockchain: &Blockchain) -> Result<Fee, AmountError> {
        let wei = self.fee_in_wei().ok_or_else(|| AmountError::Overflow {
            value: format!("{} gas", self.gas_limit()),
            decimals: blockchain.decimal_count(),
        })?;
        let amount = Amount::from_smallest_unit(
            AmountType::Coin,
            wei,
            blockchain.decimal_count(),
            blockchain.currency_symbol(),
        )?;
        Ok(Fee::new(amount, FeeParameters::Ethereum(*self)))
    }
}

/// Three tiers from three gas-price quotes
pub fn legacy_fees(
    blockchain: &Blockchain,
    gas_limit: u64,
    gas_prices: &[u128; 3],
) -> Result<Vec<Fee>, AmountError> {
    gas_prices
        .iter()
        .map(|&gas_price| {
            EthereumFeeParameters::Legacy {
                gas_limit,
                gas_price,
            }
            .to_fee(blockchain)
        })
        .collect()
}

/// Three tiers from three `{max, priority}` quotes
pub fn eip1559_fees(
    blockchain: &Blockchain,
    gas_limit: u64,
    quotes: &[Eip1559Quote; 3],
) -> Result<Vec<Fee>, AmountError> {
    quotes
        .iter()
        .map(|quote| {
            EthereumFeeParameters::Eip1559 {
                gas_limit,
                max_fee_per_gas: quote.base_fee() + quote.priority,
                priority_fee: quote.priority,
            }
            .to_fee(blockchain)
        })
        .collect()
}
