//! SDK configuration
//!
//! Every empirically derived chain constant lives here instead of being
//! hardcoded in a builder, so deployments can revise them without a release.
//! Defaults match current mainnet behaviour.
use crate::error::WalletError;
use serde::{Deserialize, Serialize};
use std::env;

/// Gas-limit correction applied to Mantle transactions
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MantleConfig {
    /// Applied to the estimated gas limit when quoting fees
    pub fee_gas_limit_multiplier: f64,
    /// Applied to the quoted gas limit right before signing
    pub sign_gas_limit_multiplier: f64,
}

impl Default for MantleConfig {
    fn default() -> Self {
        Self {
            fee_gas_limit_multiplier: 1.6,
            sign_gas_limit_multiplier: 0.7,
        }
    }
}

/// Cardano protocol parameters for min-ADA and linear fee formulas
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CardanoProtocolParams {
    /// Minimum lovelace in any output
    pub min_utxo_value: u64,
    pub utxo_entry_size_without_val: u64,
    pub policy_id_size: u64,
    /// Fee coefficient per transaction byte
    pub min_fee_a: u64,
    /// Constant fee term
    pub min_fee_b: u64,
    /// Absolute validity slot
    pub ttl: u64,
}

impl Default for CardanoProtocolParams {
    fn default() -> Self {
        Self {
            min_utxo_value: 1_000_000,
            utxo_entry_size_without_val: 27,
            policy_id_size: 28,
            min_fee_a: 44,
            min_fee_b: 155_381,
            ttl: 190_000_000,
        }
    }
}

/// Upper resource limits used to price a Koinos transfer in mana
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KoinosResourceLimits {
    pub max_disk_storage_limit: u64,
    pub max_network_limit: u64,
    pub max_compute_limit: u64,
}

impl Default for KoinosResourceLimits {
    fn default() -> Self {
        Self {
            max_disk_storage_limit: 118,
            max_network_limit: 408,
            max_compute_limit: 1_000_000,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UtxoPolicy {
    /// Outputs below this many satoshis are never created
    pub dust_threshold_sats: u64,
    /// Fee floor regardless of fee rate
    pub min_relay_fee_sats: u64,
}

impl Default for UtxoPolicy {
    fn default() -> Self {
        Self {
            dust_threshold_sats: 546,
            min_relay_fee_sats: 1_000,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SdkConfig {
    pub esplora_url: String,
    pub mantle: MantleConfig,
    pub cardano: CardanoProtocolParams,
    pub koinos: KoinosResourceLimits,
    pub utxo: UtxoPolicy,
}

impl SdkConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `ESPLORA_URL`: Esplora API endpoint (defaults to mempool.space)
    /// - `MANTLE_FEE_GAS_LIMIT_MULTIPLIER`, `MANTLE_SIGN_GAS_LIMIT_MULTIPLIER`
    /// - `UTXO_DUST_THRESHOLD`, `UTXO_MIN_RELAY_FEE` (satoshis)
    ///
    /// Unparseable values are logged and replaced by defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let esplora_url = env::var("ESPLORA_URL").unwrap_or_else(|_| {
            log::info!("Esplora URL: {} (default)", defaults.esplora_url);
            defaults.esplora_url.clone()
        });

        let mantle = MantleConfig {
            fee_gas_limit_multiplier: env_or(
                "MANTLE_FEE_GAS_LIMIT_MULTIPLIER",
                defaults.mantle.fee_gas_limit_multiplier,
            ),
            sign_gas_limit_multiplier: env_or(
                "MANTLE_SIGN_GAS_LIMIT_MULTIPLIER",
                defaults.mantle.sign_gas_limit_multiplier,
            ),
        };

        let utxo = UtxoPolicy {
            dust_threshold_sats: env_or("UTXO_DUST_THRESHOLD", defaults.utxo.dust_threshold_sats),
            min_relay_fee_sats: env_or("UTXO_MIN_RELAY_FEE", defaults.utxo.min_relay_fee_sats),
        };

        Self {
            esplora_url,
            mantle,
            utxo,
            ..defaults
        }
    }

    /// Parse a TOML document; missing tables and keys fall back to defaults
    pub fn from_toml_str(source: &str) -> Result<Self, WalletError> {
        toml::from_str(source).map_err(|e| WalletError::Config(e.to_string()))
    }
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            esplora_url: "https://mempool.space/api".to_string(),
            mantle: MantleConfig::default(),
            cardano: CardanoProtocolParams::default(),
            koinos: KoinosResourceLimits::default(),
            utxo: UtxoPolicy::default(),
        }
    }
}

fn env_or<T: std::str::FromStr + std::fmt::Display>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => match raw.parse() {
            Ok(value) => {
                log::info!("{} = {}", key, value);
                value
            }
            Err(_) => {
                log::warn!("Ignoring invalid {}='{}', using {}", key, raw, default);
                default
            }
        },
        Err(_) => default,
    }
}
