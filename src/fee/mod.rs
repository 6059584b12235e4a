//! Fees and the per-family fee engine
//!
//! Everything here is a pure function of network quotes supplied by the
//! caller. Fetching those quotes is the job of [`crate::provider::FeeQuoteProvider`].

pub mod cardano;
pub mod cosmos;
pub mod evm;
pub mod koinos;
pub mod utxo;

pub use evm::{Eip1559Quote, EthereumFeeParameters};

use crate::amount::{Amount, AmountType};
use crate::blockchain::{Blockchain, CosmosChain};
use crate::config::SdkConfig;
use crate::error::{BuildError, WalletError};
use serde::{Deserialize, Serialize};

/// Chain-specific knobs a fee was computed from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FeeParameters {
    /// The amount alone describes the fee (Koinos mana, Cardano lovelace)
    None,
    Ethereum(EthereumFeeParameters),
    /// Fee rate in sat/vB the absolute fee was derived from
    Bitcoin { rate: u64 },
    Cosmos { gas: u64 },
}

impl FeeParameters {
    pub fn kind(&self) -> &'static str {
        match self {
            FeeParameters::None => "none",
            FeeParameters::Ethereum(_) => "ethereum",
            FeeParameters::Bitcoin { .. } => "bitcoin",
            FeeParameters::Cosmos { .. } => "cosmos",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fee {
    pub amount: Amount,
    pub parameters: FeeParameters,
}

impl Fee {
    pub fn new(amount: Amount, parameters: FeeParameters) -> Self {
        Self { amount, parameters }
    }

    pub fn from_amount(amount: Amount) -> Self {
        Self::new(amount, FeeParameters::None)
    }

    pub fn ethereum_parameters(&self) -> Result<&EthereumFeeParameters, BuildError> {
        match &self.parameters {
            FeeParameters::Ethereum(params) => Ok(params),
            other => Err(mismatch("ethereum", other)),
        }
    }

    pub fn bitcoin_rate(&self) -> Result<u64, BuildError> {
        match &self.parameters {
            FeeParameters::Bitcoin { rate } => Ok(*rate),
            other => Err(mismatch("bitcoin", other)),
        }
    }

    pub fn cosmos_gas(&self) -> Result<u64, BuildError> {
        match &self.parameters {
            FeeParameters::Cosmos { gas } => Ok(*gas),
            other => Err(mismatch("cosmos", other)),
        }
    }

    /// Succeeds for fees that carry no parameters beyond their amount
    pub fn none_parameters(&self) -> Result<(), BuildError> {
        match &self.parameters {
            FeeParameters::None => Ok(()),
            other => Err(mismatch("none", other)),
        }
    }

    /// The fee must be denominated in `expected`
    pub fn require_amount_type(&self, expected: &AmountType) -> Result<(), BuildError> {
        if &self.amount.amount_type == expected {
            Ok(())
        } else {
            Err(BuildError::UnsupportedAmountType(self.amount.amount_type.clone()))
        }
    }
}

fn mismatch(expected: &'static str, actual: &FeeParameters) -> BuildError {
    BuildError::FeeParametersMismatch {
        expected,
        actual: actual.kind(),
    }
}

/// Network fee quotes as reported by a [`crate::provider::FeeQuoteProvider`]
#[derive(Debug, Clone, PartialEq)]
pub enum FeeQuote {
    /// Gas prices in wei for the low, market and fast tiers
    EvmLegacy { gas_limit: u64, gas_prices: [u128; 3] },
    EvmEip1559 { gas_limit: u64, quotes: [Eip1559Quote; 3] },
    /// Fee rates in sat/vB for the minimal, normal and priority tiers
    Utxo { rates: [u64; 3] },
    Cosmos { estimated_gas: u64 },
    Koinos(koinos::ResourceCosts),
    /// Cardano fees depend on size only; quotes come from protocol parameters
    Cardano,
}

/// Size of the dummy-signed transaction, needed by size-priced families
pub trait SizeEstimator {
    fn estimate_size(&self, fee: &Fee) -> Result<u64, WalletError>;
}

/// Dispatches a [`FeeQuote`] to the family formula for one chain
pub struct FeeEngine {
    blockchain: Blockchain,
    config: SdkConfig,
    cosmos: Option<CosmosChain>,
}

impl FeeEngine {
    pub fn new(blockchain: Blockchain, config: SdkConfig) -> Self {
        Self {
            blockchain,
            config,
            cosmos: None,
        }
    }

    pub fn with_cosmos_chain(mut self, chain: CosmosChain) -> Self {
        self.cosmos = Some(chain);
        self
    }

    /// Fee tiers for sending `amount` under the given quote
    pub fn compute(
        &self,
        quote: &FeeQuote,
        amount: &Amount,
        size: Option<&dyn SizeEstimator>,
    ) -> Result<Vec<Fee>, WalletError> {
        let fees = match quote {
            FeeQuote::EvmLegacy {
                gas_limit,
                gas_prices,
            } => evm::legacy_fees(&self.blockchain, *gas_limit, gas_prices)?,
            FeeQuote::EvmEip1559 { gas_limit, quotes } => {
                evm::eip1559_fees(&self.blockchain, *gas_limit, quotes)?
            }
            FeeQuote::Utxo { rates } => {
                let estimator = size.ok_or_else(|| {
                    BuildError::MissingChainState("size estimator for UTXO fee".to_string())
                })?;
                utxo::fees(&self.blockchain, &self.config.utxo, rates, estimator)?
            }
            FeeQuote::Cosmos { estimated_gas } => {
                let chain = self.cosmos.as_ref().ok_or_else(|| {
                    BuildError::MissingChainState("cosmos chain parameters".to_string())
                })?;
                cosmos::fees(&self.blockchain, chain, amount, *estimated_gas)?
            }
            FeeQuote::Koinos(costs) => {
                vec![koinos::fee(&self.blockchain, &self.config.koinos, costs)?]
            }
            FeeQuote::Cardano => {
                let estimator = size.ok_or_else(|| {
                    BuildError::MissingChainState("size estimator for Cardano fee".to_string())
                })?;
                vec![cardano::fee(&self.blockchain, &self.config.cardano, estimator)?]
            }
        };

        log::debug!(
            "Computed {} fee tier(s) for {}: {}",
            fees.len(),
            self.blockchain,
            fees.iter()
                .map(|fee| fee.amount.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(fees)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_downcast_fails_explicitly() {
        let blockchain = Blockchain::Bitcoin { testnet: false };
        let fee = Fee::new(Amount::zero_coin(&blockchain), FeeParameters::Bitcoin { rate: 10 });

        assert_eq!(fee.bitcoin_rate().unwrap(), 10);
        assert_eq!(
            fee.ethereum_parameters().unwrap_err(),
            BuildError::FeeParametersMismatch {
                expected: "ethereum",
                actual: "bitcoin"
            }
        );
        assert!(fee.cosmos_gas().is_err());
    }

    #[test]
    fn test_size_priced_quote_requires_estimator() {
        let blockchain = Blockchain::Bitcoin { testnet: false };
        let engine = FeeEngine::new(blockchain, SdkConfig::default());
        let amount = Amount::coin(&blockchain, Decimal::ONE);

        let result = engine.compute(&FeeQuote::Utxo { rates: [1, 2, 3] }, &amount, None);
        assert!(matches!(
            result,
            Err(WalletError::Build(BuildError::MissingChainState(_)))
        ));
    }
}
