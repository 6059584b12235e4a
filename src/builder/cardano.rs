//! Cardano (Alonzo-era) transfers of ADA and native assets
//!
//! Every unspent output of the wallet is spent; whatever is not sent returns
//! in a single change output carrying the remaining ADA and assets. Outputs
//! holding assets must carry the protocol minimum ADA, which shapes how much
//! ADA accompanies a token transfer (see [`CardanoTransactionBuilder::spending_ada_value`]).

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use std::collections::BTreeMap;

use super::cbor::{self, uint, Value};
use super::{check_signatures, unexpected_state, BuildState, ChainState, SigningPayload, TransactionBuilder};
use crate::amount::{Amount, AmountType};
use crate::config::CardanoProtocolParams;
use crate::error::{BuildError, WalletError};
use crate::fee::{Fee, SizeEstimator};
use crate::transaction::Transaction;
use crate::utxo::{min_ada_for_bundle, AssetId, UnspentOutputSet};
use crate::wallet::PublicKey;

type Blake2b256 = Blake2b<U32>;

const VKEY_LENGTH: usize = 32;

/// Policy id → asset name → quantity, both keys hex
type MultiAsset = BTreeMap<String, BTreeMap<String, u64>>;

#[derive(Debug, Clone, PartialEq)]
pub struct UnsignedCardanoTransaction {
    pub body: Value,
    pub hash: [u8; 32],
}

pub struct CardanoTransactionBuilder {
    vkey: Vec<u8>,
    params: CardanoProtocolParams,
}

impl CardanoTransactionBuilder {
    pub fn new(public_key: &PublicKey, params: CardanoProtocolParams) -> Result<Self, WalletError> {
        // Extended keys carry the chain code after the 32-byte verification key
        let vkey = public_key
            .bytes
            .get(..VKEY_LENGTH)
            .ok_or_else(|| {
                BuildError::Encoding(format!(
                    "Invalid public key length {}",
                    public_key.bytes.len()
                ))
            })?
            .to_vec();

        Ok(Self { vkey, params })
    }

    /// ADA that accompanies the transfer, in lovelace
    ///
    /// For a coin transfer this is the amount itself. A token transfer sends
    /// the minimum ADA its output needs, unless the ADA left over would be too
    /// small for a valid change output, in which case all ADA but the fee goes
    /// along with the token.
    pub fn spending_ada_value(
        &self,
        amount: &Amount,
        fee_lovelace: u64,
        utxos: &UnspentOutputSet,
    ) -> Result<u64, WalletError> {
        let units = amount.to_smallest_unit_u64()?;

        let token = match &amount.amount_type {
            AmountType::Coin => return Ok(units),
            AmountType::Token(token) => token,
            other => return Err(BuildError::UnsupportedAmountType(other.clone()).into()),
        };

        let asset = utxos.find_asset(&token.contract_address)?;
        let token_balance: u64 = utxos
            .outputs()
            .iter()
            .flat_map(|o| o.assets.iter())
            .filter(|a| a.id.policy_id == asset.policy_id)
            .map(|a| a.amount)
            .sum();
        let spends_all_tokens = token_balance == units;

        let min_change =
            utxos.min_ada_for_change(spends_all_tokens.then_some(asset), &self.params);
        let min_amount = min_ada_for_bundle(&[asset], &self.params);
        let ada_balance = utxos.total();

        if min_amount > ada_balance {
            return Ok(min_amount);
        }

        let change = ada_balance - min_amount;
        if change > 0 && change < min_change {
            log::debug!(
                "Change of {} lovelace is below the {} minimum, sending all ADA with the token",
                change,
                min_change
            );
            return Ok(ada_balance.saturating_sub(fee_lovelace));
        }

        Ok(min_amount)
    }

    fn decode_address(address: &str) -> Result<Vec<u8>, BuildError> {
        match bitcoin::bech32::decode(address) {
            Ok((_, data)) => Ok(data),
            // Byron addresses are base58
            Err(_) => bitcoin::base58::decode(address)
                .map_err(|e| BuildError::InvalidAddress(format!("{}: {}", address, e))),
        }
    }

    fn build(
        &self,
        transaction: &Transaction,
        utxos: &UnspentOutputSet,
        estimate: bool,
    ) -> Result<UnsignedCardanoTransaction, WalletError> {
        if utxos.is_empty() {
            return Err(BuildError::MissingChainState("no unspent outputs".to_string()).into());
        }

        transaction.fee.none_parameters()?;
        transaction.fee.require_amount_type(&AmountType::Coin)?;

        let fee = transaction.fee.amount.to_smallest_unit_u64()?;
        let balance = utxos.total();
        let mut ada_value = self.spending_ada_value(&transaction.amount, fee, utxos)?;
        if estimate {
            ada_value = ada_value.min(balance);
        }

        let destination = Self::decode_address(&transaction.destination_address)?;
        let change_address = Self::decode_address(&transaction.change_address)?;

        let mut change_assets = utxos.asset_balances(None);
        let sent_assets = match &transaction.amount.amount_type {
            AmountType::Token(token) => {
                let asset = utxos.find_asset(&token.contract_address)?.clone();
                let units = transaction.amount.to_smallest_unit_u64()?;
                let held = change_assets.get(&asset).copied().unwrap_or(0);
                let remaining = held.checked_sub(units).ok_or_else(|| {
                    BuildError::InsufficientFunds(format!(
                        "Need {} of {}, but only have {}",
                        units, token.symbol, held
                    ))
                })?;
                change_assets.insert(asset.clone(), remaining);
                multi_asset([(&asset, units)])
            }
            _ => MultiAsset::new(),
        };
        let change_assets = multi_asset(change_assets.iter().map(|(id, amount)| (id, *amount)));

        let spent = ada_value.saturating_add(fee);
        let change = match balance.checked_sub(spent) {
            Some(change) => change,
            None if estimate => 0,
            None => {
                return Err(BuildError::InsufficientFunds(format!(
                    "Need {} lovelace, but only have {}",
                    spent, balance
                ))
                .into())
            }
        };

        if !change_assets.is_empty() && change == 0 && !estimate {
            return Err(BuildError::InsufficientFunds(
                "No ADA left to carry the remaining assets".to_string(),
            )
            .into());
        }

        let inputs = utxos
            .outputs()
            .iter()
            .map(|o| {
                let hash = hex::decode(&o.transaction_hash).map_err(|e| {
                    BuildError::Encoding(format!("Invalid tx hash {}: {}", o.transaction_hash, e))
                })?;
                Ok(Value::Array(vec![
                    Value::Bytes(hash),
                    uint(u64::from(o.output_index)),
                ]))
            })
            .collect::<Result<Vec<_>, BuildError>>()?;

        let mut outputs = vec![output(destination, ada_value, &sent_assets)?];
        if change > 0 || !change_assets.is_empty() {
            outputs.push(output(change_address, change, &change_assets)?);
        }

        let body = Value::Map(vec![
            (uint(0), Value::Array(inputs)),
            (uint(1), Value::Array(outputs)),
            (uint(2), uint(fee)),
            (uint(3), uint(self.params.ttl)),
        ]);
        let hash = Blake2b256::digest(cbor::encode(&body)?).into();

        Ok(UnsignedCardanoTransaction { body, hash })
    }

    fn encode_signed(
        &self,
        unsigned: UnsignedCardanoTransaction,
        signature: &[u8],
    ) -> Result<Vec<u8>, BuildError> {
        let witness = Value::Array(vec![
            Value::Bytes(self.vkey.clone()),
            Value::Bytes(signature.to_vec()),
        ]);
        let witness_set = Value::Map(vec![(uint(0), Value::Array(vec![witness]))]);

        cbor::encode(&Value::Array(vec![
            unsigned.body,
            witness_set,
            Value::Bool(true),
            Value::Null,
        ]))
    }

    /// Serialized size with a placeholder signature
    pub fn estimate_size(
        &self,
        transaction: &Transaction,
        utxos: &UnspentOutputSet,
    ) -> Result<u64, WalletError> {
        let unsigned = self.build(transaction, utxos, true)?;
        let signed = self.encode_signed(unsigned, &[0u8; super::SIGNATURE_LENGTH])?;
        Ok(signed.len() as u64)
    }

    pub fn size_estimator<'a>(
        &'a self,
        transaction: &'a Transaction,
        utxos: &'a UnspentOutputSet,
    ) -> CardanoSizeEstimator<'a> {
        CardanoSizeEstimator {
            builder: self,
            transaction,
            utxos,
        }
    }
}

fn multi_asset<'a>(assets: impl IntoIterator<Item = (&'a AssetId, u64)>) -> MultiAsset {
    let mut grouped = MultiAsset::new();
    for (id, amount) in assets {
        if amount == 0 {
            continue;
        }
        grouped
            .entry(id.policy_id.clone())
            .or_default()
            .insert(id.asset_name_hex.clone(), amount);
    }
    grouped
}

fn output(address: Vec<u8>, lovelace: u64, assets: &MultiAsset) -> Result<Value, BuildError> {
    if assets.is_empty() {
        return Ok(Value::Array(vec![Value::Bytes(address), uint(lovelace)]));
    }

    let hex_bytes = |s: &str| {
        hex::decode(s).map_err(|e| BuildError::Encoding(format!("Invalid asset hex {}: {}", s, e)))
    };
    let policies = assets
        .iter()
        .map(|(policy, names)| {
            let names = names
                .iter()
                .map(|(name, amount)| Ok((Value::Bytes(hex_bytes(name)?), uint(*amount))))
                .collect::<Result<Vec<_>, BuildError>>()?;
            Ok((Value::Bytes(hex_bytes(policy)?), Value::Map(names)))
        })
        .collect::<Result<Vec<_>, BuildError>>()?;

    Ok(Value::Array(vec![
        Value::Bytes(address),
        Value::Array(vec![uint(lovelace), Value::Map(policies)]),
    ]))
}

impl TransactionBuilder for CardanoTransactionBuilder {
    fn build_for_sign(
        &self,
        transaction: &Transaction,
        chain_state: &ChainState,
    ) -> Result<SigningPayload, WalletError> {
        let unsigned = self.build(transaction, &chain_state.unspent_outputs, false)?;
        Ok(SigningPayload {
            hashes: vec![unsigned.hash.to_vec()],
            state: BuildState::Cardano(unsigned),
        })
    }

    fn build_for_send(
        &self,
        state: BuildState,
        signatures: &[Vec<u8>],
    ) -> Result<Vec<u8>, WalletError> {
        let unsigned = match state {
            BuildState::Cardano(unsigned) => unsigned,
            other => return Err(unexpected_state("cardano", &other)),
        };
        check_signatures(signatures, 1)?;
        Ok(self.encode_signed(unsigned, &signatures[0])?)
    }
}

pub struct CardanoSizeEstimator<'a> {
    builder: &'a CardanoTransactionBuilder,
    transaction: &'a Transaction,
    utxos: &'a UnspentOutputSet,
}

impl SizeEstimator for CardanoSizeEstimator<'_> {
    fn estimate_size(&self, fee: &Fee) -> Result<u64, WalletError> {
        let mut transaction = self.transaction.clone();
        transaction.fee = fee.clone();
        self.builder.estimate_size(&transaction, self.utxos)
    }
}
