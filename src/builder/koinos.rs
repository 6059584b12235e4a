//! Koinos KOIN transfers
//!
//! A transaction is a protobuf header plus one `call_contract` operation
//! against the KOIN token contract. Fees are paid in mana: the header's
//! `rc_limit` caps how much mana the transaction may consume.

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use prost::Message;
use sha2::{Digest, Sha256};

use super::{check_signatures, recovery_id, unexpected_state, BuildState, ChainState, SigningPayload, TransactionBuilder};
use crate::amount::{Amount, AmountType};
use crate::blockchain::{KoinosNetworkParams, KOINOS_MANA};
use crate::error::{BuildError, KoinosError, WalletError};
use crate::transaction::Transaction;
use crate::wallet::PublicKey;

/// `transfer` entry point of the KOIN contract
pub const TRANSFER_ENTRY_POINT: u32 = 0x27f5_76ca;
const SHA256_MULTIHASH: [u8; 2] = [0x12, 0x20];
const COMPACT_RECOVERY_OFFSET: u8 = 31;

pub mod proto {
    //! Wire types from `koinos/protocol/protocol.proto`

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct ValueType {
        #[prost(uint64, optional, tag = "5")]
        pub uint64_value: Option<u64>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct TransferArguments {
        #[prost(bytes = "vec", tag = "1")]
        pub from: Vec<u8>,
        #[prost(bytes = "vec", tag = "2")]
        pub to: Vec<u8>,
        #[prost(uint64, tag = "3")]
        pub value: u64,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct CallContractOperation {
        #[prost(bytes = "vec", tag = "1")]
        pub contract_id: Vec<u8>,
        #[prost(uint32, tag = "2")]
        pub entry_point: u32,
        #[prost(bytes = "vec", tag = "3")]
        pub args: Vec<u8>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct Operation {
        #[prost(message, optional, tag = "2")]
        pub call_contract: Option<CallContractOperation>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct TransactionHeader {
        #[prost(bytes = "vec", tag = "1")]
        pub chain_id: Vec<u8>,
        #[prost(uint64, tag = "2")]
        pub rc_limit: u64,
        #[prost(bytes = "vec", tag = "3")]
        pub nonce: Vec<u8>,
        #[prost(bytes = "vec", tag = "4")]
        pub operation_merkle_root: Vec<u8>,
        #[prost(bytes = "vec", tag = "5")]
        pub payer: Vec<u8>,
        #[prost(bytes = "vec", tag = "6")]
        pub payee: Vec<u8>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct Transaction {
        #[prost(bytes = "vec", tag = "1")]
        pub id: Vec<u8>,
        #[prost(message, optional, tag = "2")]
        pub header: Option<TransactionHeader>,
        #[prost(message, repeated, tag = "3")]
        pub operations: Vec<Operation>,
        #[prost(bytes = "vec", repeated, tag = "4")]
        pub signatures: Vec<Vec<u8>>,
    }
}

fn sha256_multihash(data: &[u8]) -> Vec<u8> {
    let mut out = SHA256_MULTIHASH.to_vec();
    out.extend_from_slice(&Sha256::digest(data));
    out
}

/// Fee checks made before any network call, in this order
pub fn validate_resources(
    amount: &Amount,
    fee: &Amount,
    balance: Option<&Amount>,
    mana: Option<&Amount>,
) -> Result<(), KoinosError> {
    let balance = balance.map(|a| a.value).unwrap_or_default();
    let mana = mana.map(|a| a.value).unwrap_or_default();

    if balance < fee.value {
        return Err(KoinosError::InsufficientBalance);
    }
    if mana < fee.value {
        return Err(KoinosError::InsufficientMana);
    }
    match mana.checked_sub(fee.value) {
        Some(left) if amount.value <= left => {}
        _ => return Err(KoinosError::ManaFeeExceedsBalance),
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnsignedKoinosTransaction {
    pub id: Vec<u8>,
    pub header: proto::TransactionHeader,
    pub operation: proto::Operation,
    pub hash: [u8; 32],
}

impl UnsignedKoinosTransaction {
    /// Transaction id as the node reports it
    pub fn id_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.id))
    }
}

pub struct KoinosTransactionBuilder {
    network: KoinosNetworkParams,
    public_key: secp256k1::PublicKey,
}

impl KoinosTransactionBuilder {
    pub fn new(network: KoinosNetworkParams, public_key: &PublicKey) -> Result<Self, WalletError> {
        let public_key = secp256k1::PublicKey::from_slice(&public_key.bytes)
            .map_err(|e| BuildError::Encoding(format!("Invalid public key: {}", e)))?;
        Ok(Self {
            network,
            public_key,
        })
    }

    /// Base58check address to its raw 25 bytes
    fn decode_address(address: &str) -> Result<Vec<u8>, BuildError> {
        bitcoin::base58::decode(address)
            .map_err(|e| BuildError::InvalidAddress(format!("{}: {}", address, e)))
    }

    fn build(&self, transaction: &Transaction, nonce: u64) -> Result<UnsignedKoinosTransaction, BuildError> {
        transaction.fee.none_parameters()?;
        transaction
            .fee
            .require_amount_type(&AmountType::FeeResource(KOINOS_MANA.to_string()))?;
        if !matches!(transaction.amount.amount_type, AmountType::Coin) {
            return Err(BuildError::UnsupportedAmountType(
                transaction.amount.amount_type.clone(),
            ));
        }

        let from = Self::decode_address(&transaction.source_address)?;
        let to = Self::decode_address(&transaction.destination_address)?;
        let contract_id = Self::decode_address(&self.network.koin_contract_id)?;
        let chain_id = URL_SAFE
            .decode(&self.network.chain_id)
            .map_err(|e| BuildError::Encoding(format!("Invalid chain id: {}", e)))?;

        let args = proto::TransferArguments {
            from: from.clone(),
            to,
            value: transaction.amount.to_smallest_unit_u64()?,
        };
        let operation = proto::Operation {
            call_contract: Some(proto::CallContractOperation {
                contract_id,
                entry_point: TRANSFER_ENTRY_POINT,
                args: args.encode_to_vec(),
            }),
        };

        let header = proto::TransactionHeader {
            chain_id,
            rc_limit: transaction.fee.amount.to_smallest_unit_u64()?,
            nonce: proto::ValueType {
                uint64_value: Some(nonce),
            }
            .encode_to_vec(),
            operation_merkle_root: sha256_multihash(&operation.encode_to_vec()),
            payer: from,
            payee: Vec::new(),
        };

        let header_bytes = header.encode_to_vec();
        Ok(UnsignedKoinosTransaction {
            id: sha256_multihash(&header_bytes),
            hash: Sha256::digest(&header_bytes).into(),
            header,
            operation,
        })
    }
}

impl TransactionBuilder for KoinosTransactionBuilder {
    fn build_for_sign(
        &self,
        transaction: &Transaction,
        chain_state: &ChainState,
    ) -> Result<SigningPayload, WalletError> {
        let current = chain_state
            .nonce
            .ok_or_else(|| BuildError::MissingChainState("nonce".to_string()))?;
        let nonce = current
            .checked_add(1)
            .ok_or_else(|| BuildError::Encoding(format!("Nonce {} cannot be incremented", current)))?;
        let unsigned = self.build(transaction, nonce)?;

        log::debug!(
            "Koinos transaction {} nonce {} rc_limit {}",
            unsigned.id_hex(),
            nonce,
            unsigned.header.rc_limit
        );

        Ok(SigningPayload {
            hashes: vec![unsigned.hash.to_vec()],
            state: BuildState::Koinos(unsigned),
        })
    }

    fn build_for_send(
        &self,
        state: BuildState,
        signatures: &[Vec<u8>],
    ) -> Result<Vec<u8>, WalletError> {
        let unsigned = match state {
            BuildState::Koinos(unsigned) => unsigned,
            other => return Err(unexpected_state("koinos", &other)),
        };
        check_signatures(signatures, 1)?;

        let recid = recovery_id(&unsigned.hash, &signatures[0], &self.public_key)?;
        let mut signature = Vec::with_capacity(65);
        signature.push(COMPACT_RECOVERY_OFFSET + recid);
        signature.extend_from_slice(&signatures[0]);

        let transaction = proto::Transaction {
            id: unsigned.id,
            header: Some(unsigned.header),
            operations: vec![unsigned.operation],
            signatures: vec![signature],
        };
        Ok(transaction.encode_to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::Blockchain;
    use crate::fee::{Fee, FeeParameters};
    use rust_decimal::Decimal;
    use secp256k1::SecretKey;

    fn address(byte: u8) -> String {
        let mut payload = vec![0u8];
        payload.extend_from_slice(&[byte; 20]);
        bitcoin::base58::encode_check(&payload)
    }

    fn secret() -> SecretKey {
        SecretKey::from_slice(&[0x61; 32]).unwrap()
    }

    fn builder() -> KoinosTransactionBuilder {
        let public_key = secp256k1::PublicKey::from_secret_key_global(&secret());
        KoinosTransactionBuilder::new(
            KoinosNetworkParams::new(false),
            &PublicKey::new(public_key.serialize().to_vec()),
        )
        .unwrap()
    }

    fn mana(value: Decimal) -> Amount {
        Amount::fee_resource(KOINOS_MANA, value, 8)
    }

    fn transaction() -> Transaction {
        let blockchain = Blockchain::Koinos { testnet: false };
        Transaction::new(
            Amount::coin(&blockchain, Decimal::new(5, 1)),
            Fee::from_amount(mana(Decimal::new(3, 1))),
            address(1),
            address(2),
            address(1),
        )
    }

    #[test]
    fn test_nonce_value_type_encoding() {
        let nonce = proto::ValueType {
            uint64_value: Some(1),
        }
        .encode_to_vec();
        assert_eq!(URL_SAFE.encode(nonce), "KAE=");
    }

    #[test]
    fn test_resource_checks_in_order() {
        let koin = |v: i64| Amount::coin(&Blockchain::Koinos { testnet: false }, Decimal::new(v, 0));
        let mana = |v: i64| mana(Decimal::new(v, 0));

        assert_eq!(
            validate_resources(&koin(1), &mana(5), Some(&koin(4)), Some(&mana(1))),
            Err(KoinosError::InsufficientBalance)
        );
        assert_eq!(
            validate_resources(&koin(1), &mana(5), Some(&koin(10)), Some(&mana(4))),
            Err(KoinosError::InsufficientMana)
        );
        assert_eq!(
            validate_resources(&koin(6), &mana(5), Some(&koin(10)), Some(&mana(10))),
            Err(KoinosError::ManaFeeExceedsBalance)
        );
        assert_eq!(
            validate_resources(&koin(5), &mana(5), Some(&koin(10)), Some(&mana(10))),
            Ok(())
        );
    }

    #[test]
    fn test_header_uses_next_nonce_and_mana_limit() {
        let payload = builder()
            .build_for_sign(
                &transaction(),
                &ChainState {
                    nonce: Some(0),
                    ..Default::default()
                },
            )
            .unwrap();
        let BuildState::Koinos(unsigned) = &payload.state else {
            panic!("unexpected state");
        };

        assert_eq!(URL_SAFE.encode(&unsigned.header.nonce), "KAE=");
        assert_eq!(unsigned.header.rc_limit, 30_000_000);
        assert_eq!(unsigned.header.payer.len(), 25);
        assert_eq!(&unsigned.id[..2], &SHA256_MULTIHASH);
        assert_eq!(&unsigned.header.operation_merkle_root[..2], &SHA256_MULTIHASH);
    }

    #[test]
    fn test_signed_transaction_decodes() {
        let builder = builder();
        let payload = builder
            .build_for_sign(
                &transaction(),
                &ChainState {
                    nonce: Some(4),
                    ..Default::default()
                },
            )
            .unwrap();

        let message = secp256k1::Message::from_digest_slice(&payload.hashes[0]).unwrap();
        let (_, compact) = secp256k1::SECP256K1
            .sign_ecdsa_recoverable(&message, &secret())
            .serialize_compact();
        let raw = builder
            .build_for_send(payload.state, &[compact.to_vec()])
            .unwrap();

        let decoded = proto::Transaction::decode(raw.as_slice()).unwrap();
        let signature = &decoded.signatures[0];
        assert_eq!(signature.len(), 65);
        assert!(signature[0] == 31 || signature[0] == 32);
        assert_eq!(&signature[1..], &compact[..]);

        let call = decoded.operations[0].call_contract.as_ref().unwrap();
        assert_eq!(call.entry_point, TRANSFER_ENTRY_POINT);
        let args = proto::TransferArguments::decode(call.args.as_slice()).unwrap();
        assert_eq!(args.value, 50_000_000);
    }

    fn build_error(transaction: &Transaction, nonce: u64) -> Option<BuildError> {
        match builder().build_for_sign(
            transaction,
            &ChainState {
                nonce: Some(nonce),
                ..Default::default()
            },
        ) {
            Err(WalletError::Build(error)) => Some(error),
            _ => None,
        }
    }

    #[test]
    fn test_fee_must_be_parameterless_mana() {
        let blockchain = Blockchain::Koinos { testnet: false };

        let mut bitcoin_fee = transaction();
        bitcoin_fee.fee = Fee::new(
            Amount::coin(&blockchain, Decimal::ONE),
            FeeParameters::Bitcoin { rate: 10 },
        );
        assert!(matches!(
            build_error(&bitcoin_fee, 3),
            Some(BuildError::FeeParametersMismatch { .. })
        ));

        let mut coin_fee = transaction();
        coin_fee.fee = Fee::from_amount(Amount::coin(&blockchain, Decimal::ONE));
        assert_eq!(
            build_error(&coin_fee, 3),
            Some(BuildError::UnsupportedAmountType(AmountType::Coin))
        );
    }

    #[test]
    fn test_reserve_amount_rejected() {
        let mut reserve = transaction();
        reserve.amount = Amount::new(AmountType::Reserve, Decimal::ONE, 8, "KOIN");
        assert_eq!(
            build_error(&reserve, 0),
            Some(BuildError::UnsupportedAmountType(AmountType::Reserve))
        );
    }

    #[test]
    fn test_exhausted_nonce() {
        assert!(matches!(
            build_error(&transaction(), u64::MAX),
            Some(BuildError::Encoding(_))
        ));
    }
}
