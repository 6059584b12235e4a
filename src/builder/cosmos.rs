//! Cosmos SDK bank transfers, signed in `SIGN_MODE_DIRECT`

use prost::Message;
use sha2::{Digest, Sha256};

use super::{check_signatures, unexpected_state, BuildState, ChainState, SigningPayload, TransactionBuilder};
use crate::amount::AmountType;
use crate::blockchain::CosmosChain;
use crate::error::{BuildError, WalletError};
use crate::transaction::Transaction;
use crate::wallet::PublicKey;

const MSG_SEND_TYPE_URL: &str = "/cosmos.bank.v1beta1.MsgSend";
const SECP256K1_PUBKEY_TYPE_URL: &str = "/cosmos.crypto.secp256k1.PubKey";
const SIGN_MODE_DIRECT: i32 = 1;

pub mod proto {
    //! Wire types from `cosmos.tx.v1beta1` and `cosmos.bank.v1beta1`

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct Coin {
        #[prost(string, tag = "1")]
        pub denom: String,
        #[prost(string, tag = "2")]
        pub amount: String,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct MsgSend {
        #[prost(string, tag = "1")]
        pub from_address: String,
        #[prost(string, tag = "2")]
        pub to_address: String,
        #[prost(message, repeated, tag = "3")]
        pub amount: Vec<Coin>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct Any {
        #[prost(string, tag = "1")]
        pub type_url: String,
        #[prost(bytes = "vec", tag = "2")]
        pub value: Vec<u8>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct TxBody {
        #[prost(message, repeated, tag = "1")]
        pub messages: Vec<Any>,
        #[prost(string, tag = "2")]
        pub memo: String,
        #[prost(uint64, tag = "3")]
        pub timeout_height: u64,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct PubKey {
        #[prost(bytes = "vec", tag = "1")]
        pub key: Vec<u8>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct Single {
        #[prost(int32, tag = "1")]
        pub mode: i32,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct ModeInfo {
        #[prost(message, optional, tag = "1")]
        pub single: Option<Single>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct SignerInfo {
        #[prost(message, optional, tag = "1")]
        pub public_key: Option<Any>,
        #[prost(message, optional, tag = "2")]
        pub mode_info: Option<ModeInfo>,
        #[prost(uint64, tag = "3")]
        pub sequence: u64,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct Fee {
        #[prost(message, repeated, tag = "1")]
        pub amount: Vec<Coin>,
        #[prost(uint64, tag = "2")]
        pub gas_limit: u64,
        #[prost(string, tag = "3")]
        pub payer: String,
        #[prost(string, tag = "4")]
        pub granter: String,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct AuthInfo {
        #[prost(message, repeated, tag = "1")]
        pub signer_infos: Vec<SignerInfo>,
        #[prost(message, optional, tag = "2")]
        pub fee: Option<Fee>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct SignDoc {
        #[prost(bytes = "vec", tag = "1")]
        pub body_bytes: Vec<u8>,
        #[prost(bytes = "vec", tag = "2")]
        pub auth_info_bytes: Vec<u8>,
        #[prost(string, tag = "3")]
        pub chain_id: String,
        #[prost(uint64, tag = "4")]
        pub account_number: u64,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct TxRaw {
        #[prost(bytes = "vec", tag = "1")]
        pub body_bytes: Vec<u8>,
        #[prost(bytes = "vec", tag = "2")]
        pub auth_info_bytes: Vec<u8>,
        #[prost(bytes = "vec", repeated, tag = "3")]
        pub signatures: Vec<Vec<u8>>,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnsignedCosmosTransaction {
    pub body_bytes: Vec<u8>,
    pub auth_info_bytes: Vec<u8>,
}

pub struct CosmosTransactionBuilder {
    chain: CosmosChain,
    public_key: Vec<u8>,
}

impl CosmosTransactionBuilder {
    pub fn new(chain: CosmosChain, public_key: &PublicKey) -> Result<Self, WalletError> {
        // Cosmos signers always carry the compressed key
        let key = secp256k1::PublicKey::from_slice(&public_key.bytes)
            .map_err(|e| BuildError::Encoding(format!("Invalid public key: {}", e)))?;

        Ok(Self {
            chain,
            public_key: key.serialize().to_vec(),
        })
    }

    fn body(&self, transaction: &Transaction) -> Result<proto::TxBody, BuildError> {
        if !matches!(
            transaction.amount.amount_type,
            AmountType::Coin | AmountType::Token(_)
        ) {
            return Err(BuildError::UnsupportedAmountType(
                transaction.amount.amount_type.clone(),
            ));
        }

        let send = proto::MsgSend {
            from_address: transaction.source_address.clone(),
            to_address: transaction.destination_address.clone(),
            amount: vec![proto::Coin {
                denom: self.chain.denomination(&transaction.amount),
                amount: transaction.amount.to_smallest_unit()?.to_string(),
            }],
        };

        Ok(proto::TxBody {
            messages: vec![proto::Any {
                type_url: MSG_SEND_TYPE_URL.to_string(),
                value: send.encode_to_vec(),
            }],
            memo: transaction
                .cosmos_params()
                .map(|p| p.memo.clone())
                .unwrap_or_default(),
            timeout_height: 0,
        })
    }

    fn auth_info(&self, transaction: &Transaction, sequence: u64) -> Result<proto::AuthInfo, BuildError> {
        let gas_limit = transaction.fee.cosmos_gas()?;
        let public_key = proto::PubKey {
            key: self.public_key.clone(),
        };

        Ok(proto::AuthInfo {
            signer_infos: vec![proto::SignerInfo {
                public_key: Some(proto::Any {
                    type_url: SECP256K1_PUBKEY_TYPE_URL.to_string(),
                    value: public_key.encode_to_vec(),
                }),
                mode_info: Some(proto::ModeInfo {
                    single: Some(proto::Single {
                        mode: SIGN_MODE_DIRECT,
                    }),
                }),
                sequence,
            }],
            fee: Some(proto::Fee {
                amount: vec![proto::Coin {
                    denom: self.chain.denomination(&transaction.fee.amount),
                    amount: transaction.fee.amount.to_smallest_unit()?.to_string(),
                }],
                gas_limit,
                payer: String::new(),
                granter: String::new(),
            }),
        })
    }
}

impl TransactionBuilder for CosmosTransactionBuilder {
    fn build_for_sign(
        &self,
        transaction: &Transaction,
        chain_state: &ChainState,
    ) -> Result<SigningPayload, WalletError> {
        let account_number = chain_state
            .account_number
            .ok_or_else(|| BuildError::MissingChainState("account number".to_string()))?;
        let sequence = chain_state
            .sequence
            .ok_or_else(|| BuildError::MissingChainState("sequence".to_string()))?;

        let body_bytes = self.body(transaction)?.encode_to_vec();
        let auth_info_bytes = self.auth_info(transaction, sequence)?.encode_to_vec();

        let sign_doc = proto::SignDoc {
            body_bytes: body_bytes.clone(),
            auth_info_bytes: auth_info_bytes.clone(),
            chain_id: self.chain.chain_id.clone(),
            account_number,
        };
        let hash = Sha256::digest(sign_doc.encode_to_vec()).to_vec();

        Ok(SigningPayload {
            hashes: vec![hash],
            state: BuildState::Cosmos(UnsignedCosmosTransaction {
                body_bytes,
                auth_info_bytes,
            }),
        })
    }

    fn build_for_send(
        &self,
        state: BuildState,
        signatures: &[Vec<u8>],
    ) -> Result<Vec<u8>, WalletError> {
        let unsigned = match state {
            BuildState::Cosmos(unsigned) => unsigned,
            other => return Err(unexpected_state("cosmos", &other)),
        };
        check_signatures(signatures, 1)?;

        let raw = proto::TxRaw {
            body_bytes: unsigned.body_bytes,
            auth_info_bytes: unsigned.auth_info_bytes,
            signatures: signatures.to_vec(),
        };
        Ok(raw.encode_to_vec())
    }
}
