//! Chain identity and the per-chain metadata the builders need
//!
//! This is intentionally narrow: one representative chain per family plus the
//! two EVM variants that need wrapped builders (Mantle, XDC).

use crate::amount::{Amount, Token};
use crate::config::SdkConfig;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Blockchain {
    Bitcoin { testnet: bool },
    Ethereum { testnet: bool },
    Mantle { testnet: bool },
    Xdc { testnet: bool },
    Cosmos { testnet: bool },
    Koinos { testnet: bool },
    Cardano,
}

/// Transaction model a chain belongs to; selects builder and fee engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainFamily {
    /// Bitcoin-like: inputs are previous outputs, spent with script signatures
    UtxoScript,
    /// Ethereum-like and Cosmos-like: one account, replay protection by nonce/sequence
    AccountNonce,
    /// Koinos: fees are paid in a regenerating resource (mana)
    ResourceMetered,
    /// Cardano: UTXO with native multi-asset bundles and min-ADA rules
    MultiAssetLedger,
}

/// Which currency a chain charges fees in
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeePaidCurrency {
    SameCurrency,
    Coin,
    Token(Token),
    FeeResource(String),
}

pub const KOINOS_MANA: &str = "Mana";

impl Blockchain {
    pub fn family(&self) -> ChainFamily {
        match self {
            Blockchain::Bitcoin { .. } => ChainFamily::UtxoScript,
            Blockchain::Ethereum { .. }
            | Blockchain::Mantle { .. }
            | Blockchain::Xdc { .. }
            | Blockchain::Cosmos { .. } => ChainFamily::AccountNonce,
            Blockchain::Koinos { .. } => ChainFamily::ResourceMetered,
            Blockchain::Cardano => ChainFamily::MultiAssetLedger,
        }
    }

    pub fn is_testnet(&self) -> bool {
        match self {
            Blockchain::Bitcoin { testnet }
            | Blockchain::Ethereum { testnet }
            | Blockchain::Mantle { testnet }
            | Blockchain::Xdc { testnet }
            | Blockchain::Cosmos { testnet }
            | Blockchain::Koinos { testnet } => *testnet,
            Blockchain::Cardano => false,
        }
    }

    pub fn is_evm(&self) -> bool {
        matches!(
            self,
            Blockchain::Ethereum { .. } | Blockchain::Mantle { .. } | Blockchain::Xdc { .. }
        )
    }

    pub fn decimal_count(&self) -> u32 {
        match self {
            Blockchain::Bitcoin { .. } | Blockchain::Koinos { .. } => 8,
            Blockchain::Ethereum { .. } | Blockchain::Mantle { .. } | Blockchain::Xdc { .. } => 18,
            Blockchain::Cosmos { .. } | Blockchain::Cardano => 6,
        }
    }

    pub fn currency_symbol(&self) -> &'static str {
        match self {
            Blockchain::Bitcoin { .. } => "BTC",
            Blockchain::Ethereum { .. } => "ETH",
            Blockchain::Mantle { .. } => "MNT",
            Blockchain::Xdc { .. } => "XDC",
            Blockchain::Cosmos { .. } => "ATOM",
            Blockchain::Koinos { .. } => "KOIN",
            Blockchain::Cardano => "ADA",
        }
    }

    /// One smallest unit, e.g. `0.00000001` BTC
    pub fn minimum_value(&self) -> Decimal {
        Decimal::new(1, self.decimal_count())
    }

    /// EIP-155 chain id for EVM chains
    pub fn chain_id(&self) -> Option<u64> {
        match self {
            Blockchain::Ethereum { testnet } => Some(if *testnet { 11_155_111 } else { 1 }),
            Blockchain::Mantle { testnet } => Some(if *testnet { 5_003 } else { 5_000 }),
            Blockchain::Xdc { testnet } => Some(if *testnet { 51 } else { 50 }),
            _ => None,
        }
    }

    /// Static per-chain capability; never chosen per transaction
    pub fn supports_eip1559(&self) -> bool {
        matches!(self, Blockchain::Ethereum { .. } | Blockchain::Mantle { .. })
    }

    pub fn fee_paid_currency(&self) -> FeePaidCurrency {
        match self {
            Blockchain::Koinos { .. } => FeePaidCurrency::FeeResource(KOINOS_MANA.to_string()),
            Blockchain::Cosmos { .. } => FeePaidCurrency::Coin,
            _ => FeePaidCurrency::SameCurrency,
        }
    }

    pub fn bitcoin_network(&self) -> Option<bitcoin::Network> {
        match self {
            Blockchain::Bitcoin { testnet: false } => Some(bitcoin::Network::Bitcoin),
            Blockchain::Bitcoin { testnet: true } => Some(bitcoin::Network::Testnet),
            _ => None,
        }
    }

    /// Round a fee to the chain's precision, never down
    pub fn round_fee(&self, value: Decimal) -> Decimal {
        value.round_dp_with_strategy(
            self.decimal_count(),
            rust_decimal::RoundingStrategy::AwayFromZero,
        )
    }

    pub fn zero_fee(&self) -> Amount {
        Amount::zero_coin(self)
    }

    /// Smallest output the chain relays, for UTXO chains
    pub fn dust_value(&self, config: &SdkConfig) -> Option<Amount> {
        let units = match self {
            Blockchain::Bitcoin { .. } => config.utxo.dust_threshold_sats,
            Blockchain::Cardano => config.cardano.min_utxo_value,
            _ => return None,
        };
        Some(Amount::coin(self, Decimal::new(i64::try_from(units).ok()?, self.decimal_count())))
    }
}

impl fmt::Display for Blockchain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Blockchain::Bitcoin { .. } => "Bitcoin",
            Blockchain::Ethereum { .. } => "Ethereum",
            Blockchain::Mantle { .. } => "Mantle",
            Blockchain::Xdc { .. } => "XDC Network",
            Blockchain::Cosmos { .. } => "Cosmos",
            Blockchain::Koinos { .. } => "Koinos",
            Blockchain::Cardano => "Cardano",
        };
        if self.is_testnet() {
            write!(f, "{} Testnet", name)
        } else {
            write!(f, "{}", name)
        }
    }
}

/// Cosmos-SDK chain parameters used by the builder and fee engine
#[derive(Debug, Clone)]
pub struct CosmosChain {
    pub chain_id: String,
    pub smallest_denomination: String,
    /// Gas price per tier (low, market, fast) in smallest units
    pub gas_prices: Vec<f64>,
    pub gas_multiplier: u64,
    pub fee_multiplier: f64,
    /// Transfer tax in percent keyed by token contract/denom
    pub tax_percent_by_contract: HashMap<String, Decimal>,
    /// Flat extra fee added to every transfer, in coin units
    pub extra_fee: Option<Decimal>,
}

impl CosmosChain {
    pub fn cosmos_hub(testnet: bool) -> Self {
        Self {
            chain_id: if testnet {
                "theta-testnet-001".to_string()
            } else {
                "cosmoshub-4".to_string()
            },
            smallest_denomination: "uatom".to_string(),
            gas_prices: vec![0.01, 0.025, 0.03],
            gas_multiplier: 2,
            fee_multiplier: 1.5,
            tax_percent_by_contract: HashMap::new(),
            extra_fee: None,
        }
    }

    /// Denomination a given amount is transferred in
    pub fn denomination(&self, amount: &Amount) -> String {
        match amount.amount_type.token() {
            Some(token) => token.contract_address.clone(),
            None => self.smallest_denomination.clone(),
        }
    }
}

/// Koinos network constants
#[derive(Debug, Clone)]
pub struct KoinosNetworkParams {
    /// Base64-URL encoded chain id
    pub chain_id: String,
    /// Base58 KOIN contract id
    pub koin_contract_id: String,
}

impl KoinosNetworkParams {
    pub fn new(testnet: bool) -> Self {
        if testnet {
            Self {
                chain_id: "EiBncD4pKRIQWco_WRqo5Q-xnXR7JuO3PtZv983mKdKHSQ==".to_string(),
                koin_contract_id: "1FaSvLjQJsCJKq5ybmGsMMQs8RQYyVv8ju".to_string(),
            }
        } else {
            Self {
                chain_id: "EiBZK_GGVP0H_fXVAM3j6EAuz3-B-l3ejxRSewi7qIBfSA==".to_string(),
                koin_contract_id: "15DJN4a8SgrbGhhGksSBASiSYjGnMU8dGL".to_string(),
            }
        }
    }
}
