//! Typed amounts
//!
//! An [`Amount`] keeps a human-scale decimal value (`1.5` BTC) together with
//! the decimal exponent of its currency. Conversion to smallest-unit integers
//! happens only at the wire boundary via [`Amount::to_smallest_unit`].

use crate::blockchain::Blockchain;
use crate::error::AmountError;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A fungible token tracked by a wallet (ERC-20 contract, Cardano policy, Cosmos denom)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token {
    pub name: String,
    pub symbol: String,
    /// Contract address, policy id (+ asset name hex) or denomination
    pub contract_address: String,
    pub decimal_count: u32,
}

impl Token {
    pub fn new(
        name: impl Into<String>,
        symbol: impl Into<String>,
        contract_address: impl Into<String>,
        decimal_count: u32,
    ) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            contract_address: contract_address.into(),
            decimal_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AmountType {
    Coin,
    Token(Token),
    /// Chain resource spent on fees, e.g. Koinos "Mana"
    FeeResource(String),
    Reserve,
}

impl AmountType {
    pub fn token(&self) -> Option<&Token> {
        match self {
            AmountType::Token(token) => Some(token),
            _ => None,
        }
    }

    pub fn is_coin(&self) -> bool {
        matches!(self, AmountType::Coin)
    }
}

impl fmt::Display for AmountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AmountType::Coin => write!(f, "coin"),
            AmountType::Token(token) => write!(f, "token({})", token.symbol),
            AmountType::FeeResource(name) => write!(f, "feeResource({})", name),
            AmountType::Reserve => write!(f, "reserve"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Amount {
    pub amount_type: AmountType,
    pub value: Decimal,
    pub decimals: u32,
    pub currency_symbol: String,
}

impl Amount {
    pub fn new(
        amount_type: AmountType,
        value: Decimal,
        decimals: u32,
        currency_symbol: impl Into<String>,
    ) -> Self {
        Self {
            amount_type,
            value,
            decimals,
            currency_symbol: currency_symbol.into(),
        }
    }

    /// Native coin amount of `blockchain`
    pub fn coin(blockchain: &Blockchain, value: Decimal) -> Self {
        Self::new(
            AmountType::Coin,
            value,
            blockchain.decimal_count(),
            blockchain.currency_symbol(),
        )
    }

    pub fn zero_coin(blockchain: &Blockchain) -> Self {
        Self::coin(blockchain, Decimal::ZERO)
    }

    pub fn token(token: &Token, value: Decimal) -> Self {
        Self::new(
            AmountType::Token(token.clone()),
            value,
            token.decimal_count,
            token.symbol.clone(),
        )
    }

    pub fn fee_resource(name: &str, value: Decimal, decimals: u32) -> Self {
        Self::new(AmountType::FeeResource(name.to_string()), value, decimals, name)
    }

    /// Same type, decimals and symbol as `self`, different value
    pub fn with_value(&self, value: Decimal) -> Self {
        Self {
            value,
            ..self.clone()
        }
    }

    /// Build an amount from a smallest-unit integer (satoshi, wei, lovelace)
    pub fn from_smallest_unit(
        amount_type: AmountType,
        units: u128,
        decimals: u32,
        currency_symbol: impl Into<String>,
    ) -> Result<Self, AmountError> {
        let overflow = || AmountError::Overflow {
            value: units.to_string(),
            decimals,
        };
        let signed = i128::try_from(units).map_err(|_| overflow())?;
        let value = Decimal::try_from_i128_with_scale(signed, decimals).map_err(|_| overflow())?;

        Ok(Self::new(amount_type, value.normalize(), decimals, currency_symbol))
    }

    /// `round(value × 10^decimals)`, rounding half away from zero
    pub fn to_smallest_unit(&self) -> Result<u128, AmountError> {
        if self.value.is_sign_negative() && !self.value.is_zero() {
            return Err(AmountError::Negative(self.value.to_string()));
        }

        let overflow = || AmountError::Overflow {
            value: self.value.to_string(),
            decimals: self.decimals,
        };

        let multiplier = 10i128.checked_pow(self.decimals).ok_or_else(overflow)?;
        let multiplier =
            Decimal::try_from_i128_with_scale(multiplier, 0).map_err(|_| overflow())?;

        self.value
            .checked_mul(multiplier)
            .ok_or_else(overflow)?
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_u128()
            .ok_or_else(overflow)
    }

    /// [`Self::to_smallest_unit`] narrowed to `u64` (satoshi, lovelace, mana)
    pub fn to_smallest_unit_u64(&self) -> Result<u64, AmountError> {
        let units = self.to_smallest_unit()?;
        u64::try_from(units).map_err(|_| AmountError::Overflow {
            value: self.value.to_string(),
            decimals: self.decimals,
        })
    }

    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    fn ensure_same_type(&self, other: &Amount) -> Result<(), AmountError> {
        if self.amount_type != other.amount_type {
            return Err(AmountError::TypeMismatch {
                left: self.amount_type.clone(),
                right: other.amount_type.clone(),
            });
        }
        Ok(())
    }

    pub fn checked_add(&self, other: &Amount) -> Result<Amount, AmountError> {
        self.ensure_same_type(other)?;
        let value = self.value.checked_add(other.value).ok_or_else(|| AmountError::Overflow {
            value: format!("{} + {}", self.value, other.value),
            decimals: self.decimals,
        })?;
        Ok(self.with_value(value))
    }

    pub fn checked_sub(&self, other: &Amount) -> Result<Amount, AmountError> {
        self.ensure_same_type(other)?;
        let value = self.value.checked_sub(other.value).ok_or_else(|| AmountError::Overflow {
            value: format!("{} - {}", self.value, other.value),
            decimals: self.decimals,
        })?;
        Ok(self.with_value(value))
    }

    pub fn compare(&self, other: &Amount) -> Result<Ordering, AmountError> {
        self.ensure_same_type(other)?;
        Ok(self.value.cmp(&other.value))
    }

    /// `|self - other| <= delta`; catches "full balance minus imprecise dust" cases
    pub fn is_equal(&self, other: &Amount, delta: Decimal) -> Result<bool, AmountError> {
        let difference = self.checked_sub(other)?;
        Ok(difference.value.abs() <= delta)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value.normalize(), self.currency_symbol)
    }
}
