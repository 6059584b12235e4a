//! Cosmos-SDK fees: gas × price × multipliers, plus tax and extra fee

use super::{Fee, FeeParameters};
use crate::amount::{Amount, AmountType};
use crate::blockchain::{Blockchain, CosmosChain, FeePaidCurrency};
use crate::error::{AmountError, BuildError, WalletError};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

/// One fee per configured gas price
pub fn fees(
    blockchain: &Blockchain,
    chain: &CosmosChain,
    amount: &Amount,
    estimated_gas: u64,
) -> Result<Vec<Fee>, WalletError> {
    let gas = estimated_gas.saturating_mul(chain.gas_multiplier);
    let tax = tax(chain, amount)?;
    let (fee_type, fee_decimals, fee_symbol) = fee_currency(blockchain, amount)?;

    chain
        .gas_prices
        .iter()
        .map(|gas_price| {
            let smallest = (gas as f64 * gas_price * chain.fee_multiplier) as u64;
            let smallest = smallest.saturating_add(tax);

            let mut value = Amount::from_smallest_unit(
                fee_type.clone(),
                u128::from(smallest),
                fee_decimals,
                fee_symbol.clone(),
            )?
            .value;
            if let Some(extra) = chain.extra_fee {
                value += extra;
            }

            let amount = Amount::new(
                fee_type.clone(),
                blockchain.round_fee(value),
                fee_decimals,
                fee_symbol.clone(),
            );
            Ok(Fee::new(amount, FeeParameters::Cosmos { gas }))
        })
        .collect()
}

/// Transfer tax in smallest token units, when the token carries one
fn tax(chain: &CosmosChain, amount: &Amount) -> Result<u64, WalletError> {
    let Some(token) = amount.amount_type.token() else {
        return Ok(0);
    };
    let Some(percent) = chain.tax_percent_by_contract.get(&token.contract_address) else {
        return Ok(0);
    };

    let smallest = Decimal::from_u128(amount.to_smallest_unit()?).ok_or_else(|| {
        AmountError::Overflow {
            value: amount.value.to_string(),
            decimals: amount.decimals,
        }
    })?;
    Ok((smallest * percent / Decimal::ONE_HUNDRED)
        .trunc()
        .to_u64()
        .unwrap_or(u64::MAX))
}

fn fee_currency(
    blockchain: &Blockchain,
    amount: &Amount,
) -> Result<(AmountType, u32, String), WalletError> {
    let coin = (
        AmountType::Coin,
        blockchain.decimal_count(),
        blockchain.currency_symbol().to_string(),
    );

    match blockchain.fee_paid_currency() {
        FeePaidCurrency::SameCurrency => Ok((
            amount.amount_type.clone(),
            amount.decimals,
            amount.currency_symbol.clone(),
        )),
        FeePaidCurrency::Coin => Ok(coin),
        FeePaidCurrency::Token(token) => Ok((
            AmountType::Token(token.clone()),
            token.decimal_count,
            token.symbol,
        )),
        FeePaidCurrency::FeeResource(name) => Err(BuildError::UnsupportedAmountType(
            AmountType::FeeResource(name),
        )
        .into()),
    }
}
