//! Balance and dust checks run before a transaction reaches a builder
//!
//! All violations are collected so the caller sees every problem at once.

use crate::amount::Amount;
use crate::error::{TransactionError, TransactionErrors};
use crate::wallet::Wallet;

pub struct TransactionValidator<'a> {
    wallet: &'a Wallet,
    dust: Option<Amount>,
}

impl<'a> TransactionValidator<'a> {
    pub fn new(wallet: &'a Wallet, dust: Option<Amount>) -> Self {
        Self { wallet, dust }
    }

    fn is_covered(&self, amount: &Amount) -> bool {
        self.wallet
            .amount(&amount.amount_type)
            .is_some_and(|balance| balance.value >= amount.value)
    }

    pub fn validate_amount(&self, amount: &Amount) -> Option<TransactionError> {
        if amount.value.is_sign_negative() && !amount.is_zero() {
            return Some(TransactionError::InvalidAmount);
        }
        if !self.is_covered(amount) {
            return Some(TransactionError::AmountExceedsBalance);
        }
        None
    }

    pub fn validate_fee(&self, fee: &Amount) -> Option<TransactionError> {
        if fee.value.is_sign_negative() && !fee.is_zero() {
            return Some(TransactionError::InvalidFee);
        }
        if !self.is_covered(fee) {
            return Some(TransactionError::FeeExceedsBalance);
        }
        None
    }

    /// Fee errors first, then amount errors, then combined and dust errors
    pub fn validate(&self, amount: &Amount, fee: Option<&Amount>) -> TransactionErrors {
        let mut errors = TransactionErrors::default();
        let amount_error = self.validate_amount(amount);

        let Some(fee) = fee else {
            errors.push_if_some(amount_error);
            return errors;
        };

        errors.push_if_some(self.validate_fee(fee));
        errors.push_if_some(amount_error);

        // Fees in another currency (tokens, mana) do not add up with the amount
        let total = amount.checked_add(fee).ok();
        if let Some(total) = &total {
            if self.validate_amount(total).is_some() {
                errors.0.push(TransactionError::TotalExceedsBalance);
            }
        }

        if let Some(dust) = &self.dust {
            if dust.amount_type == amount.amount_type {
                if amount.value < dust.value {
                    errors.0.push(TransactionError::DustAmount {
                        minimum: dust.clone(),
                    });
                }

                let spent = total.as_ref().unwrap_or(amount);
                if let Some(balance) = self.wallet.amount(&dust.amount_type) {
                    let change = balance.value - spent.value;
                    if !change.is_zero() && change < dust.value {
                        errors.0.push(TransactionError::DustChange {
                            minimum: dust.clone(),
                        });
                    }
                }
            }
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::Token;
    use crate::blockchain::Blockchain;
    use crate::config::SdkConfig;
    use crate::wallet::{Addresses, PublicKey};
    use rust_decimal::Decimal;

    fn dec(value: &str) -> Decimal {
        value.parse().unwrap()
    }

    fn wallet(blockchain: Blockchain, balance: &str) -> Wallet {
        let mut wallet = Wallet::new(
            blockchain,
            Addresses::single("source", PublicKey::new(vec![2u8; 33])),
        );
        wallet.add_coin_value(dec(balance));
        wallet
    }

    #[test]
    fn test_total_exceeds_balance_alone() {
        let blockchain = Blockchain::Ethereum { testnet: false };
        let wallet = wallet(blockchain, "10");
        let validator = TransactionValidator::new(&wallet, None);

        let errors = validator.validate(
            &Amount::coin(&blockchain, dec("3")),
            Some(&Amount::coin(&blockchain, dec("8"))),
        );
        assert_eq!(errors.0, vec![TransactionError::TotalExceedsBalance]);
    }

    #[test]
    fn test_fee_error_precedes_amount_error() {
        let blockchain = Blockchain::Ethereum { testnet: false };
        let wallet = wallet(blockchain, "1");
        let validator = TransactionValidator::new(&wallet, None);

        let errors = validator.validate(
            &Amount::coin(&blockchain, dec("2")),
            Some(&Amount::coin(&blockchain, dec("-1"))),
        );
        assert_eq!(
            errors.0,
            vec![
                TransactionError::InvalidFee,
                TransactionError::AmountExceedsBalance,
                TransactionError::TotalExceedsBalance,
            ]
        );
    }

    #[test]
    fn test_token_amount_skips_total() {
        let blockchain = Blockchain::Ethereum { testnet: false };
        let token = Token::new("Tether", "USDT", "0xdac17f958d2ee523a2206206994597c13d831ec7", 6);
        let mut wallet = wallet(blockchain, "0.01");
        wallet.add_token_value(&token, dec("5"));
        let validator = TransactionValidator::new(&wallet, None);

        let errors = validator.validate(
            &Amount::token(&token, dec("5")),
            Some(&Amount::coin(&blockchain, dec("0.01"))),
        );
        assert!(errors.is_empty());
    }

    #[test]
    fn test_dust_amount_and_change() {
        let blockchain = Blockchain::Bitcoin { testnet: false };
        let wallet = wallet(blockchain, "0.001");
        let dust = blockchain.dust_value(&SdkConfig::default());
        let validator = TransactionValidator::new(&wallet, dust);

        let errors = validator.validate(
            &Amount::coin(&blockchain, dec("0.000005")),
            Some(&Amount::coin(&blockchain, dec("0.00001"))),
        );
        assert!(matches!(errors.0[..], [TransactionError::DustAmount { .. }]));

        // 0.001 - 0.000985 - 0.00001 = 0.000005 left behind
        let errors = validator.validate(
            &Amount::coin(&blockchain, dec("0.000985")),
            Some(&Amount::coin(&blockchain, dec("0.00001"))),
        );
        assert!(matches!(errors.0[..], [TransactionError::DustChange { .. }]));

        // spending everything leaves no change at all
        let errors = validator.validate(
            &Amount::coin(&blockchain, dec("0.00099")),
            Some(&Amount::coin(&blockchain, dec("0.00001"))),
        );
        assert!(errors.is_empty());
    }

    #[test]
    fn test_missing_balance_is_not_covered() {
        let blockchain = Blockchain::Ethereum { testnet: false };
        let wallet = Wallet::new(
            blockchain,
            Addresses::single("source", PublicKey::new(vec![2u8; 33])),
        );
        let validator = TransactionValidator::new(&wallet, None);

        assert_eq!(
            validator.validate_amount(&Amount::coin(&blockchain, dec("0"))),
            Some(TransactionError::AmountExceedsBalance)
        );
    }
}
