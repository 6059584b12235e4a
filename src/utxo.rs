//! Spendable outputs for UTXO chains
//!
//! The set is replaced wholesale on each refresh and only read during a build.

use crate::config::CardanoProtocolParams;
use crate::error::BuildError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Native asset identity on a multi-asset ledger
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetId {
    pub policy_id: String,
    pub asset_name_hex: String,
}

impl AssetId {
    /// Token contract addresses are the policy id, optionally followed by the asset name
    pub fn matches_contract(&self, contract_address: &str) -> bool {
        contract_address.starts_with(&self.policy_id)
    }

    fn name_len(&self) -> u64 {
        (self.asset_name_hex.len() / 2) as u64
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnspentAsset {
    pub id: AssetId,
    pub amount: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnspentOutput {
    pub transaction_hash: String,
    pub output_index: u32,
    /// Smallest units (satoshi, lovelace)
    pub amount: u64,
    /// Locking script, empty for chains that lock by address only
    pub output_script: Vec<u8>,
    pub address: String,
    pub assets: Vec<UnspentAsset>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnspentOutputSet {
    outputs: Vec<UnspentOutput>,
}

impl UnspentOutputSet {
    pub fn new(outputs: Vec<UnspentOutput>) -> Self {
        Self { outputs }
    }

    pub fn outputs(&self) -> &[UnspentOutput] {
        &self.outputs
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.outputs.iter().map(|o| o.amount).sum()
    }

    fn require_outputs(&self) -> Result<(), BuildError> {
        if self.outputs.is_empty() {
            return Err(BuildError::MissingChainState(
                "no unspent outputs".to_string(),
            ));
        }
        Ok(())
    }

    /// Accumulate outputs in their existing order until they cover `target`
    pub fn select_inputs(&self, target: u64) -> Result<Vec<UnspentOutput>, BuildError> {
        self.require_outputs()?;

        let mut selected = Vec::new();
        let mut total = 0u64;

        for output in &self.outputs {
            selected.push(output.clone());
            total = total.saturating_add(output.amount);

            if total >= target {
                return Ok(selected);
            }
        }

        Err(BuildError::InsufficientFunds(format!(
            "Need {} units, but only have {}",
            target, total
        )))
    }

    /// `sum(selected) - target - fee`
    pub fn compute_change(
        selected: &[UnspentOutput],
        target: u64,
        fee: u64,
    ) -> Result<u64, BuildError> {
        let total: u64 = selected.iter().map(|o| o.amount).sum();
        total
            .checked_sub(target)
            .and_then(|rest| rest.checked_sub(fee))
            .ok_or_else(|| {
                BuildError::InsufficientFunds(format!(
                    "Inputs of {} cannot cover {} plus fee {}",
                    total, target, fee
                ))
            })
    }

    /// First asset whose policy id prefixes `contract_address`
    pub fn find_asset(&self, contract_address: &str) -> Result<&AssetId, BuildError> {
        self.outputs
            .iter()
            .flat_map(|o| o.assets.iter())
            .map(|a| &a.id)
            .find(|id| id.matches_contract(contract_address))
            .ok_or_else(|| BuildError::AssetNotFound(contract_address.to_string()))
    }

    /// Total per asset across all outputs, optionally leaving one asset out
    pub fn asset_balances(&self, exclude: Option<&AssetId>) -> BTreeMap<AssetId, u64> {
        let mut balances = BTreeMap::new();
        for asset in self.outputs.iter().flat_map(|o| o.assets.iter()) {
            if Some(&asset.id) == exclude {
                continue;
            }
            *balances.entry(asset.id.clone()).or_insert(0u64) += asset.amount;
        }
        balances
    }

    /// Protocol minimum ADA for a change output carrying every asset but `exclude`
    pub fn min_ada_for_change(
        &self,
        exclude: Option<&AssetId>,
        params: &CardanoProtocolParams,
    ) -> u64 {
        let balances = self.asset_balances(exclude);
        let bundle: Vec<&AssetId> = balances
            .iter()
            .filter(|(_, amount)| **amount > 0)
            .map(|(id, _)| id)
            .collect();
        min_ada_for_bundle(&bundle, params)
    }
}

/// Alonzo-era minimum ADA for an output holding `bundle`
///
/// `max(minUtxo, (minUtxo / entrySize) × (entrySize + 6 + words(12·assets + nameBytes + 28·policies)))`
pub fn min_ada_for_bundle(bundle: &[&AssetId], params: &CardanoProtocolParams) -> u64 {
    if bundle.is_empty() {
        return params.min_utxo_value;
    }

    let policies: BTreeSet<&str> = bundle.iter().map(|id| id.policy_id.as_str()).collect();
    let assets: BTreeSet<&AssetId> = bundle.iter().copied().collect();
    let name_bytes: u64 = assets.iter().map(|id| id.name_len()).sum();

    let bundle_bytes =
        assets.len() as u64 * 12 + name_bytes + policies.len() as u64 * params.policy_id_size;
    let size = 6 + bundle_bytes.div_ceil(8);

    let per_word = params.min_utxo_value / params.utxo_entry_size_without_val.max(1);
    params
        .min_utxo_value
        .max(per_word * (params.utxo_entry_size_without_val + size))
}
