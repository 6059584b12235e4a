use bitcoin::blockdata::script::{Builder, PushBytesBuf, ScriptBuf};
use bitcoin::blockdata::transaction::{Transaction as BtcTransaction, TxIn, TxOut};
use bitcoin::blockdata::witness::Witness;
use bitcoin::hashes::Hash;
use bitcoin::secp256k1::ecdsa::Signature;
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::transaction::{OutPoint, Sequence};
use bitcoin::{absolute, Address, Network};
use std::str::FromStr;

use super::{check_signatures, unexpected_state, BuildState, ChainState, SigningPayload, TransactionBuilder};
use crate::amount::AmountType;
use crate::blockchain::Blockchain;
use crate::config::UtxoPolicy;
use crate::error::{BuildError, SignatureError, WalletError};
use crate::fee::{Fee, SizeEstimator};
use crate::transaction::Transaction;
use crate::utxo::{UnspentOutput, UnspentOutputSet};
use crate::wallet::PublicKey;

/// How an input is unlocked, decided by the script of the output it spends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    P2pkh,
    P2wpkh,
}

#[derive(Debug, Clone)]
pub struct UnsignedBitcoinTransaction {
    pub tx: BtcTransaction,
    pub input_kinds: Vec<InputKind>,
}

pub struct BitcoinTransactionBuilder {
    network: Network,
    public_key: bitcoin::PublicKey,
    policy: UtxoPolicy,
}

impl BitcoinTransactionBuilder {
    pub fn new(
        blockchain: Blockchain,
        public_key: &PublicKey,
        policy: UtxoPolicy,
    ) -> Result<Self, WalletError> {
        let network = blockchain
            .bitcoin_network()
            .ok_or_else(|| WalletError::NotSupported(format!("{} is not a Bitcoin chain", blockchain)))?;
        let public_key = bitcoin::PublicKey::from_slice(&public_key.bytes)
            .map_err(|e| BuildError::Encoding(format!("Invalid public key: {}", e)))?;

        Ok(Self {
            network,
            public_key,
            policy,
        })
    }

    fn parse_address(&self, address: &str) -> Result<Address, BuildError> {
        Address::from_str(address)
            .and_then(|a| a.require_network(self.network))
            .map_err(|e| BuildError::InvalidAddress(format!("{}: {}", address, e)))
    }

    /// Unsigned transaction spending greedily selected outputs
    ///
    /// With `lenient` set, a shortfall selects every output instead of failing,
    /// so a size can still be measured for fee estimation.
    fn build(
        &self,
        transaction: &Transaction,
        utxos: &UnspentOutputSet,
        lenient: bool,
    ) -> Result<UnsignedBitcoinTransaction, WalletError> {
        if !matches!(transaction.amount.amount_type, AmountType::Coin) {
            return Err(BuildError::UnsupportedAmountType(transaction.amount.amount_type.clone()).into());
        }
        transaction.fee.bitcoin_rate()?;

        let amount_sats = transaction.amount.to_smallest_unit_u64()?;
        let fee_sats = transaction.fee.amount.to_smallest_unit_u64()?;
        let target = amount_sats.saturating_add(fee_sats);

        let destination = self.parse_address(&transaction.destination_address)?;
        let change_address = self.parse_address(&transaction.change_address)?;

        let selected = match utxos.select_inputs(target) {
            Ok(selected) => selected,
            Err(BuildError::InsufficientFunds(_)) if lenient => utxos.outputs().to_vec(),
            Err(e) => return Err(e.into()),
        };
        let change = if lenient {
            selected
                .iter()
                .map(|o| o.amount)
                .sum::<u64>()
                .saturating_sub(target)
        } else {
            UnspentOutputSet::compute_change(&selected, amount_sats, fee_sats)?
        };

        let mut tx = BtcTransaction {
            version: bitcoin::transaction::Version::TWO,
            lock_time: absolute::LockTime::ZERO,
            input: vec![],
            output: vec![],
        };
        let mut input_kinds = Vec::with_capacity(selected.len());

        for utxo in &selected {
            input_kinds.push(input_kind(utxo)?);
            tx.input.push(TxIn {
                previous_output: OutPoint {
                    txid: utxo.transaction_hash.parse().map_err(|e| {
                        BuildError::Encoding(format!("Invalid txid {}: {}", utxo.transaction_hash, e))
                    })?,
                    vout: utxo.output_index,
                },
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            });
        }

        tx.output.push(TxOut {
            value: bitcoin::Amount::from_sat(amount_sats),
            script_pubkey: destination.script_pubkey(),
        });

        if change >= self.policy.dust_threshold_sats {
            tx.output.push(TxOut {
                value: bitcoin::Amount::from_sat(change),
                script_pubkey: change_address.script_pubkey(),
            });
        } else if change > 0 {
            log::debug!(
                "Dropping {} sats change below dust threshold {}",
                change,
                self.policy.dust_threshold_sats
            );
        }

        Ok(UnsignedBitcoinTransaction { tx, input_kinds })
    }

    fn sighashes(
        &self,
        unsigned: &UnsignedBitcoinTransaction,
        utxos: &[UnspentOutput],
    ) -> Result<Vec<Vec<u8>>, WalletError> {
        let mut cache = SighashCache::new(&unsigned.tx);
        let mut hashes = Vec::with_capacity(unsigned.tx.input.len());

        for (index, (kind, utxo)) in unsigned.input_kinds.iter().zip(utxos).enumerate() {
            let script = ScriptBuf::from_bytes(utxo.output_script.clone());
            let hash = match kind {
                InputKind::P2pkh => cache
                    .legacy_signature_hash(index, &script, EcdsaSighashType::All.to_u32())
                    .map_err(|e| BuildError::Encoding(e.to_string()))?
                    .to_byte_array(),
                InputKind::P2wpkh => cache
                    .p2wpkh_signature_hash(
                        index,
                        &script,
                        bitcoin::Amount::from_sat(utxo.amount),
                        EcdsaSighashType::All,
                    )
                    .map_err(|e| BuildError::Encoding(e.to_string()))?
                    .to_byte_array(),
            };
            hashes.push(hash.to_vec());
        }

        Ok(hashes)
    }

    fn apply_signatures(
        &self,
        mut unsigned: UnsignedBitcoinTransaction,
        signatures: &[Vec<u8>],
    ) -> Result<BtcTransaction, WalletError> {
        check_signatures(signatures, unsigned.tx.input.len())?;

        for ((input, kind), raw) in unsigned
            .tx
            .input
            .iter_mut()
            .zip(&unsigned.input_kinds)
            .zip(signatures)
        {
            let signature = Signature::from_compact(raw)
                .map_err(|e| SignatureError::Malformed(e.to_string()))?;
            let signature = bitcoin::ecdsa::Signature {
                signature,
                sighash_type: EcdsaSighashType::All,
            };

            match kind {
                InputKind::P2pkh => {
                    let push = PushBytesBuf::try_from(signature.to_vec())
                        .map_err(|e| SignatureError::Malformed(e.to_string()))?;
                    input.script_sig = Builder::new()
                        .push_slice(push)
                        .push_key(&self.public_key)
                        .into_script();
                }
                InputKind::P2wpkh => {
                    input.witness = Witness::p2wpkh(&signature, &self.public_key.inner);
                }
            }
        }

        Ok(unsigned.tx)
    }

    /// Virtual size of `transaction` signed with placeholder signatures
    pub fn estimate_size(
        &self,
        transaction: &Transaction,
        utxos: &UnspentOutputSet,
    ) -> Result<u64, WalletError> {
        let unsigned = self.build(transaction, utxos, true)?;
        let dummy = vec![vec![0x01u8; super::SIGNATURE_LENGTH]; unsigned.tx.input.len()];
        let signed = self.apply_signatures(unsigned, &dummy)?;
        Ok(signed.vsize() as u64)
    }

    /// Adapter the fee engine measures candidate fees with
    pub fn size_estimator<'a>(
        &'a self,
        transaction: &'a Transaction,
        utxos: &'a UnspentOutputSet,
    ) -> BitcoinSizeEstimator<'a> {
        BitcoinSizeEstimator {
            builder: self,
            transaction,
            utxos,
        }
    }
}

fn input_kind(utxo: &UnspentOutput) -> Result<InputKind, BuildError> {
    let script = ScriptBuf::from_bytes(utxo.output_script.clone());
    if script.is_p2wpkh() {
        Ok(InputKind::P2wpkh)
    } else if script.is_p2pkh() {
        Ok(InputKind::P2pkh)
    } else {
        Err(BuildError::Encoding(format!(
            "Unsupported output script for {}:{}",
            utxo.transaction_hash, utxo.output_index
        )))
    }
}

impl TransactionBuilder for BitcoinTransactionBuilder {
    fn build_for_sign(
        &self,
        transaction: &Transaction,
        chain_state: &ChainState,
    ) -> Result<SigningPayload, WalletError> {
        let unsigned = self.build(transaction, &chain_state.unspent_outputs, false)?;

        // Inputs were selected as a prefix of the set, in order
        let spent = &chain_state.unspent_outputs.outputs()[..unsigned.tx.input.len()];
        let hashes = self.sighashes(&unsigned, spent)?;

        Ok(SigningPayload {
            hashes,
            state: BuildState::Bitcoin(unsigned),
        })
    }

    fn build_for_send(
        &self,
        state: BuildState,
        signatures: &[Vec<u8>],
    ) -> Result<Vec<u8>, WalletError> {
        let unsigned = match state {
            BuildState::Bitcoin(unsigned) => unsigned,
            other => return Err(unexpected_state("bitcoin", &other)),
        };
        let signed = self.apply_signatures(unsigned, signatures)?;
        Ok(bitcoin::consensus::encode::serialize(&signed))
    }
}

pub struct BitcoinSizeEstimator<'a> {
    builder: &'a BitcoinTransactionBuilder,
    transaction: &'a Transaction,
    utxos: &'a UnspentOutputSet,
}

impl SizeEstimator for BitcoinSizeEstimator<'_> {
    fn estimate_size(&self, fee: &Fee) -> Result<u64, WalletError> {
        let mut transaction = self.transaction.clone();
        transaction.fee = fee.clone();
        self.builder.estimate_size(&transaction, self.utxos)
    }
}
