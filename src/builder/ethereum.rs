//! EVM account transactions: legacy EIP-155 and EIP-1559 (type 2)

use rlp::RlpStream;
use sha3::{Digest, Keccak256};

use super::{check_signatures, recovery_id, unexpected_state, BuildState, ChainState, SigningPayload, TransactionBuilder};
use crate::amount::AmountType;
use crate::blockchain::Blockchain;
use crate::error::{BuildError, WalletError};
use crate::fee::EthereumFeeParameters;
use crate::transaction::Transaction;
use crate::wallet::PublicKey;

const TRANSFER_SELECTOR: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];
const APPROVE_SELECTOR: [u8; 4] = [0x09, 0x5e, 0xa7, 0xb3];
const EIP1559_TYPE: u8 = 0x02;

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

/// `0x`-prefixed, 20-byte hex address
pub fn parse_address(address: &str) -> Result<[u8; 20], BuildError> {
    let invalid = || BuildError::InvalidAddress(address.to_string());
    let stripped = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .ok_or_else(invalid)?;
    let bytes = hex::decode(stripped).map_err(|_| invalid())?;
    bytes.try_into().map_err(|_| invalid())
}

fn abi_word_address(address: &[u8; 20]) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address);
    word
}

fn abi_word_uint(value: u128) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

fn call_data(selector: [u8; 4], address: &[u8; 20], value: u128) -> Vec<u8> {
    let mut data = Vec::with_capacity(68);
    data.extend_from_slice(&selector);
    data.extend_from_slice(&abi_word_address(address));
    data.extend_from_slice(&abi_word_uint(value));
    data
}

/// ERC-20 `transfer(address,uint256)` calldata
pub fn token_transfer_data(destination: &str, value: u128) -> Result<Vec<u8>, BuildError> {
    Ok(call_data(TRANSFER_SELECTOR, &parse_address(destination)?, value))
}

/// ERC-20 `approve(address,uint256)` calldata
pub fn approve_data(spender: &str, value: u128) -> Result<Vec<u8>, BuildError> {
    Ok(call_data(APPROVE_SELECTOR, &parse_address(spender)?, value))
}

/// Everything that goes into the signing preimage, plus its hash
#[derive(Debug, Clone, PartialEq)]
pub struct UnsignedEthereumTransaction {
    pub chain_id: u64,
    pub nonce: u64,
    pub fee: EthereumFeeParameters,
    pub to: [u8; 20],
    pub value: u128,
    pub data: Vec<u8>,
    pub hash: [u8; 32],
}

impl UnsignedEthereumTransaction {
    fn new(
        chain_id: u64,
        nonce: u64,
        fee: EthereumFeeParameters,
        to: [u8; 20],
        value: u128,
        data: Vec<u8>,
    ) -> Self {
        let mut tx = Self {
            chain_id,
            nonce,
            fee,
            to,
            value,
            data,
            hash: [0u8; 32],
        };
        tx.hash = keccak256(&tx.preimage());
        tx
    }

    fn is_typed(&self) -> bool {
        matches!(self.fee, EthereumFeeParameters::Eip1559 { .. })
    }

    /// Fields shared by the preimage and the signed encoding
    fn append_fields(&self, stream: &mut RlpStream) {
        match self.fee {
            EthereumFeeParameters::Legacy {
                gas_limit,
                gas_price,
            } => {
                stream.append(&self.nonce);
                stream.append(&gas_price);
                stream.append(&gas_limit);
            }
            EthereumFeeParameters::Eip1559 {
                gas_limit,
                max_fee_per_gas,
                priority_fee,
            } => {
                stream.append(&self.chain_id);
                stream.append(&self.nonce);
                stream.append(&priority_fee);
                stream.append(&max_fee_per_gas);
                stream.append(&gas_limit);
            }
        }
        stream.append(&self.to.as_slice());
        stream.append(&self.value);
        stream.append(&self.data);
        if self.is_typed() {
            // Empty access list
            stream.begin_list(0);
        }
    }

    fn field_count(&self) -> usize {
        if self.is_typed() {
            9
        } else {
            6
        }
    }

    fn preimage(&self) -> Vec<u8> {
        // EIP-155 appends chainId, 0, 0 to legacy transactions
        let trailer = if self.is_typed() { 0 } else { 3 };
        let mut stream = RlpStream::new_list(self.field_count() + trailer);
        self.append_fields(&mut stream);
        if !self.is_typed() {
            stream.append(&self.chain_id);
            stream.append(&0u8);
            stream.append(&0u8);
        }
        self.envelope(stream.out().to_vec())
    }

    fn encode_signed(&self, recovery_id: u8, signature: &[u8]) -> Vec<u8> {
        let (r, s) = signature.split_at(32);
        let mut stream = RlpStream::new_list(self.field_count() + 3);
        self.append_fields(&mut stream);

        if self.is_typed() {
            stream.append(&recovery_id);
        } else {
            let v = u128::from(recovery_id) + u128::from(self.chain_id) * 2 + 35;
            stream.append(&v);
        }
        stream.append(&trim_leading_zeros(r));
        stream.append(&trim_leading_zeros(s));
        self.envelope(stream.out().to_vec())
    }

    /// Typed transactions are prefixed with their type byte
    fn envelope(&self, payload: Vec<u8>) -> Vec<u8> {
        if !self.is_typed() {
            return payload;
        }
        let mut out = Vec::with_capacity(payload.len() + 1);
        out.push(EIP1559_TYPE);
        out.extend_from_slice(&payload);
        out
    }
}

/// Signature scalars are RLP integers: no leading zero bytes
fn trim_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().take_while(|&&b| b == 0).count();
    &bytes[start..]
}

pub struct EthereumTransactionBuilder {
    blockchain: Blockchain,
    chain_id: u64,
    public_key: secp256k1::PublicKey,
}

impl EthereumTransactionBuilder {
    pub fn new(blockchain: Blockchain, public_key: &PublicKey) -> Result<Self, WalletError> {
        let chain_id = blockchain
            .chain_id()
            .ok_or_else(|| WalletError::NotSupported(format!("{} is not an EVM chain", blockchain)))?;
        let public_key = secp256k1::PublicKey::from_slice(&public_key.bytes)
            .map_err(|e| BuildError::Encoding(format!("Invalid public key: {}", e)))?;

        Ok(Self {
            blockchain,
            chain_id,
            public_key,
        })
    }

    pub fn blockchain(&self) -> Blockchain {
        self.blockchain
    }

    fn fee_parameters(&self, transaction: &Transaction) -> Result<EthereumFeeParameters, BuildError> {
        let params = *transaction.fee.ethereum_parameters()?;
        if matches!(params, EthereumFeeParameters::Eip1559 { .. })
            && !self.blockchain.supports_eip1559()
        {
            return Err(BuildError::FeeParametersMismatch {
                expected: "legacy",
                actual: "eip1559",
            });
        }

        Ok(match transaction.ethereum_params().and_then(|p| p.gas_limit) {
            Some(gas_limit) => params.with_gas_limit(gas_limit),
            None => params,
        })
    }

    /// Unsigned transaction for `transaction` with the given nonce
    pub fn build(
        &self,
        transaction: &Transaction,
        nonce: u64,
    ) -> Result<UnsignedEthereumTransaction, WalletError> {
        let fee = self.fee_parameters(transaction)?;
        let custom_data = transaction.ethereum_params().and_then(|p| p.data.clone());
        let units = transaction.amount.to_smallest_unit()?;

        let (to, value, data) = match &transaction.amount.amount_type {
            AmountType::Coin => (
                parse_address(&transaction.destination_address)?,
                units,
                custom_data.unwrap_or_default(),
            ),
            AmountType::Token(token) => {
                let contract = transaction
                    .contract_address
                    .as_deref()
                    .unwrap_or(&token.contract_address);
                let data = match custom_data {
                    Some(data) => data,
                    None => token_transfer_data(&transaction.destination_address, units)?,
                };
                (parse_address(contract)?, 0, data)
            }
            other => return Err(BuildError::UnsupportedAmountType(other.clone()).into()),
        };

        Ok(UnsignedEthereumTransaction::new(
            self.chain_id,
            nonce,
            fee,
            to,
            value,
            data,
        ))
    }
}

impl TransactionBuilder for EthereumTransactionBuilder {
    fn build_for_sign(
        &self,
        transaction: &Transaction,
        chain_state: &ChainState,
    ) -> Result<SigningPayload, WalletError> {
        let nonce = transaction
            .ethereum_params()
            .and_then(|p| p.nonce)
            .or(chain_state.nonce)
            .ok_or_else(|| BuildError::MissingChainState("nonce".to_string()))?;

        let unsigned = self.build(transaction, nonce)?;
        log::debug!(
            "{} transaction nonce {} gas limit {} ({})",
            self.blockchain,
            nonce,
            unsigned.fee.gas_limit(),
            if unsigned.is_typed() { "eip1559" } else { "legacy" }
        );

        Ok(SigningPayload {
            hashes: vec![unsigned.hash.to_vec()],
            state: BuildState::Ethereum(unsigned),
        })
    }

    fn build_for_send(
        &self,
        state: BuildState,
        signatures: &[Vec<u8>],
    ) -> Result<Vec<u8>, WalletError> {
        let unsigned = match state {
            BuildState::Ethereum(unsigned) => unsigned,
            other => return Err(unexpected_state("ethereum", &other)),
        };
        check_signatures(signatures, 1)?;

        let signature = &signatures[0];
        let recid = recovery_id(&unsigned.hash, signature, &self.public_key)?;
        Ok(unsigned.encode_signed(recid, signature))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::{Amount, Token};
    use crate::fee::Fee;
    use crate::transaction::{EthereumTransactionParams, TransactionParams};
    use rust_decimal::Decimal;
    use crate::error::SignatureError;
    use secp256k1::{Message, SecretKey, SECP256K1};

    const DESTINATION: &str = "0x3535353535353535353535353535353535353535";

    fn secret() -> SecretKey {
        SecretKey::from_slice(&[0x46; 32]).unwrap()
    }

    fn builder(blockchain: Blockchain) -> EthereumTransactionBuilder {
        let public_key = secp256k1::PublicKey::from_secret_key_global(&secret());
        EthereumTransactionBuilder::new(blockchain, &PublicKey::new(public_key.serialize().to_vec()))
            .unwrap()
    }

    fn legacy_fee(blockchain: &Blockchain) -> Fee {
        EthereumFeeParameters::Legacy {
            gas_limit: 21_000,
            gas_price: 20_000_000_000,
        }
        .to_fee(blockchain)
        .unwrap()
    }

    fn sign(hash: &[u8]) -> Vec<u8> {
        let message = Message::from_digest_slice(hash).unwrap();
        let (_, compact) = SECP256K1
            .sign_ecdsa_recoverable(&message, &secret())
            .serialize_compact();
        compact.to_vec()
    }

    #[test]
    fn test_eip155_preimage_matches_reference_vector() {
        // EIP-155 example: nonce 9, 20 gwei, 21000 gas, 1 ether, chain 1
        let blockchain = Blockchain::Ethereum { testnet: false };
        let tx = Transaction::new(
            Amount::coin(&blockchain, Decimal::ONE),
            legacy_fee(&blockchain),
            "0xsource",
            DESTINATION,
            "0xsource",
        );
        let unsigned = builder(blockchain).build(&tx, 9).unwrap();

        assert_eq!(
            hex::encode(unsigned.preimage()),
            "ec098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a764000080018080"
        );
        assert_eq!(
            hex::encode(unsigned.hash),
            "daf5a779ae972f972197303d7b574746c7ef83eadac0f2791ad23db92e4c8e53"
        );
    }

    #[test]
    fn test_token_transfer_payload() {
        let blockchain = Blockchain::Ethereum { testnet: false };
        let token = Token::new("Tether", "USDT", "0xdac17f958d2ee523a2206206994597c13d831ec7", 6);
        let tx = Transaction::new(
            Amount::token(&token, Decimal::new(15, 1)),
            legacy_fee(&blockchain),
            "0xsource",
            DESTINATION,
            "0xsource",
        );
        let unsigned = builder(blockchain).build(&tx, 0).unwrap();

        assert_eq!(unsigned.value, 0);
        assert_eq!(hex::encode(unsigned.to), "dac17f958d2ee523a2206206994597c13d831ec7");
        assert_eq!(&unsigned.data[..4], &TRANSFER_SELECTOR);
        assert_eq!(&unsigned.data[16..36], &[0x35; 20]);
        assert_eq!(unsigned.data[67], 0x60); // 1_500_000 = 0x16e360
        assert_eq!(unsigned.data.len(), 68);
    }

    #[test]
    fn test_eip1559_on_legacy_chain_is_rejected() {
        let blockchain = Blockchain::Xdc { testnet: false };
        let fee = EthereumFeeParameters::Eip1559 {
            gas_limit: 21_000,
            max_fee_per_gas: 2,
            priority_fee: 1,
        }
        .to_fee(&blockchain)
        .unwrap();
        let tx = Transaction::new(
            Amount::coin(&blockchain, Decimal::ONE),
            fee,
            "0xsource",
            DESTINATION,
            "0xsource",
        );

        let result = builder(blockchain).build_for_sign(
            &tx,
            &ChainState {
                nonce: Some(0),
                ..Default::default()
            },
        );
        assert!(matches!(
            result,
            Err(WalletError::Build(BuildError::FeeParametersMismatch { .. }))
        ));
    }

    #[test]
    fn test_missing_nonce() {
        let blockchain = Blockchain::Ethereum { testnet: false };
        let tx = Transaction::new(
            Amount::coin(&blockchain, Decimal::ONE),
            legacy_fee(&blockchain),
            "0xsource",
            DESTINATION,
            "0xsource",
        );

        let result = builder(blockchain).build_for_sign(&tx, &ChainState::default());
        assert!(matches!(
            result,
            Err(WalletError::Build(BuildError::MissingChainState(_)))
        ));
    }

    #[test]
    fn test_signed_legacy_transaction_decodes() {
        let blockchain = Blockchain::Ethereum { testnet: false };
        let tx = Transaction::new(
            Amount::coin(&blockchain, Decimal::ONE),
            legacy_fee(&blockchain),
            "0xsource",
            DESTINATION,
            "0xsource",
        )
        .with_params(TransactionParams::Ethereum(EthereumTransactionParams {
            nonce: Some(9),
            ..Default::default()
        }));

        let builder = builder(blockchain);
        let payload = builder.build_for_sign(&tx, &ChainState::default()).unwrap();
        let signature = sign(&payload.hashes[0]);
        let raw = builder.build_for_send(payload.state, &[signature]).unwrap();

        let fields = rlp::Rlp::new(&raw);
        assert_eq!(fields.item_count().unwrap(), 9);
        assert_eq!(fields.val_at::<u64>(0).unwrap(), 9);
        assert_eq!(fields.at(3).unwrap().data().unwrap(), &[0x35u8; 20][..]);
        let v = fields.val_at::<u64>(6).unwrap();
        assert!(v == 37 || v == 38);
    }

    #[test]
    fn test_foreign_signature_fails_recovery() {
        let blockchain = Blockchain::Ethereum { testnet: false };
        let tx = Transaction::new(
            Amount::coin(&blockchain, Decimal::ONE),
            legacy_fee(&blockchain),
            "0xsource",
            DESTINATION,
            "0xsource",
        );
        let builder = builder(blockchain);
        let payload = builder
            .build_for_sign(
                &tx,
                &ChainState {
                    nonce: Some(1),
                    ..Default::default()
                },
            )
            .unwrap();

        let other = SecretKey::from_slice(&[0x47; 32]).unwrap();
        let message = Message::from_digest_slice(&payload.hashes[0]).unwrap();
        let (_, compact) = SECP256K1
            .sign_ecdsa_recoverable(&message, &other)
            .serialize_compact();

        assert!(matches!(
            builder.build_for_send(payload.state, &[compact.to_vec()]),
            Err(WalletError::Signature(SignatureError::RecoveryFailed))
        ));
    }

    #[test]
    fn test_approve_selector() {
        let data = approve_data(DESTINATION, 1).unwrap();
        assert_eq!(&data[..4], &APPROVE_SELECTOR);
        assert_eq!(data[67], 1);
        assert!(approve_data("0x1234", 1).is_err());
    }

    #[test]
    fn test_reserve_amount_rejected() {
        // Mantle and XDC delegate to this builder
        for blockchain in [
            Blockchain::Ethereum { testnet: false },
            Blockchain::Xdc { testnet: false },
        ] {
            let tx = Transaction::new(
                Amount::new(AmountType::Reserve, Decimal::ONE, 18, "ETH"),
                legacy_fee(&blockchain),
                "0xsource",
                DESTINATION,
                "0xsource",
            );
            let result = builder(blockchain).build_for_sign(
                &tx,
                &ChainState {
                    nonce: Some(0),
                    ..Default::default()
                },
            );
            assert_eq!(
                result.err(),
                Some(WalletError::Build(BuildError::UnsupportedAmountType(
                    AmountType::Reserve
                )))
            );
        }
    }
}
