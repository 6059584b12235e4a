//! Transaction builders
//!
//! Every chain family turns a [`Transaction`] into one or more hashes for the
//! external signer (`build_for_sign`) and, once the signatures come back,
//! into the exact wire bytes to broadcast (`build_for_send`). Builders are
//! stateless: chain state (UTXOs, nonce, sequence) is passed in as a
//! [`ChainState`] snapshot and never mutated.

pub mod bitcoin;
pub mod cardano;
pub mod cbor;
pub mod cosmos;
pub mod ethereum;
pub mod koinos;
pub mod mantle;
pub mod xdc;

use crate::blockchain::{Blockchain, CosmosChain, KoinosNetworkParams};
use crate::config::SdkConfig;
use crate::error::{SignatureError, WalletError};
use crate::transaction::Transaction;
use crate::utxo::UnspentOutputSet;
use crate::wallet::PublicKey;

/// Compact `r ‖ s` signature length shared by every supported scheme
pub const SIGNATURE_LENGTH: usize = 64;

/// Network state a build depends on
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChainState {
    pub unspent_outputs: UnspentOutputSet,
    /// Next EVM nonce, or the last used Koinos nonce
    pub nonce: Option<u64>,
    pub account_number: Option<u64>,
    pub sequence: Option<u64>,
}

/// What the signer must sign, plus everything needed to finish the build
#[derive(Debug, Clone)]
pub struct SigningPayload {
    pub hashes: Vec<Vec<u8>>,
    pub state: BuildState,
}

/// Intermediate build result, opaque to callers
#[derive(Debug, Clone)]
pub enum BuildState {
    Bitcoin(bitcoin::UnsignedBitcoinTransaction),
    Ethereum(ethereum::UnsignedEthereumTransaction),
    Cosmos(cosmos::UnsignedCosmosTransaction),
    Koinos(koinos::UnsignedKoinosTransaction),
    Cardano(cardano::UnsignedCardanoTransaction),
}

impl BuildState {
    fn kind(&self) -> &'static str {
        match self {
            BuildState::Bitcoin(_) => "bitcoin",
            BuildState::Ethereum(_) => "ethereum",
            BuildState::Cosmos(_) => "cosmos",
            BuildState::Koinos(_) => "koinos",
            BuildState::Cardano(_) => "cardano",
        }
    }
}

pub trait TransactionBuilder: Send + Sync {
    fn build_for_sign(
        &self,
        transaction: &Transaction,
        chain_state: &ChainState,
    ) -> Result<SigningPayload, WalletError>;

    fn build_for_send(
        &self,
        state: BuildState,
        signatures: &[Vec<u8>],
    ) -> Result<Vec<u8>, WalletError>;
}

/// One signature per hash, each exactly [`SIGNATURE_LENGTH`] bytes
pub fn check_signatures(signatures: &[Vec<u8>], expected: usize) -> Result<(), SignatureError> {
    if signatures.len() != expected {
        return Err(SignatureError::CountMismatch {
            expected,
            actual: signatures.len(),
        });
    }

    for signature in signatures {
        if signature.len() != SIGNATURE_LENGTH {
            return Err(SignatureError::InvalidLength {
                expected: SIGNATURE_LENGTH,
                actual: signature.len(),
            });
        }
    }
    Ok(())
}

/// Recovery id under which `signature` over `hash` recovers to `public_key`
fn recovery_id(
    hash: &[u8; 32],
    signature: &[u8],
    public_key: &secp256k1::PublicKey,
) -> Result<u8, SignatureError> {
    use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};

    let message = secp256k1::Message::from_digest(*hash);
    for id in 0..=3 {
        let recovery_id =
            RecoveryId::from_i32(id).map_err(|e| SignatureError::Malformed(e.to_string()))?;
        let Ok(recoverable) = RecoverableSignature::from_compact(signature, recovery_id) else {
            continue;
        };
        if secp256k1::SECP256K1.recover_ecdsa(&message, &recoverable).ok() == Some(*public_key) {
            return Ok(id as u8);
        }
    }
    Err(SignatureError::RecoveryFailed)
}

fn unexpected_state(expected: &str, state: &BuildState) -> WalletError {
    WalletError::Build(crate::error::BuildError::Encoding(format!(
        "expected {} build state, got {}",
        expected,
        state.kind()
    )))
}

/// The builder for one chain, tagged by family
pub enum ChainBuilder {
    Bitcoin(bitcoin::BitcoinTransactionBuilder),
    Ethereum(ethereum::EthereumTransactionBuilder),
    Mantle(mantle::MantleTransactionBuilder),
    Xdc(xdc::XdcTransactionBuilder),
    Cosmos(cosmos::CosmosTransactionBuilder),
    Koinos(koinos::KoinosTransactionBuilder),
    Cardano(cardano::CardanoTransactionBuilder),
}

impl ChainBuilder {
    /// Builder for `blockchain` with default chain parameters
    pub fn new(
        blockchain: Blockchain,
        public_key: &PublicKey,
        config: &SdkConfig,
    ) -> Result<Self, WalletError> {
        let builder = match blockchain {
            Blockchain::Bitcoin { .. } => ChainBuilder::Bitcoin(
                bitcoin::BitcoinTransactionBuilder::new(blockchain, public_key, config.utxo.clone())?,
            ),
            Blockchain::Ethereum { .. } => ChainBuilder::Ethereum(
                ethereum::EthereumTransactionBuilder::new(blockchain, public_key)?,
            ),
            Blockchain::Mantle { .. } => ChainBuilder::Mantle(mantle::MantleTransactionBuilder::new(
                ethereum::EthereumTransactionBuilder::new(blockchain, public_key)?,
                blockchain,
                config.mantle.clone(),
            )),
            Blockchain::Xdc { .. } => ChainBuilder::Xdc(xdc::XdcTransactionBuilder::new(
                ethereum::EthereumTransactionBuilder::new(blockchain, public_key)?,
            )),
            Blockchain::Cosmos { testnet } => {
                ChainBuilder::Cosmos(cosmos::CosmosTransactionBuilder::new(
                    CosmosChain::cosmos_hub(testnet),
                    public_key,
                )?)
            }
            Blockchain::Koinos { testnet } => {
                ChainBuilder::Koinos(koinos::KoinosTransactionBuilder::new(
                    KoinosNetworkParams::new(testnet),
                    public_key,
                )?)
            }
            Blockchain::Cardano => ChainBuilder::Cardano(cardano::CardanoTransactionBuilder::new(
                public_key,
                config.cardano.clone(),
            )?),
        };
        Ok(builder)
    }

    fn inner(&self) -> &dyn TransactionBuilder {
        match self {
            ChainBuilder::Bitcoin(builder) => builder,
            ChainBuilder::Ethereum(builder) => builder,
            ChainBuilder::Mantle(builder) => builder,
            ChainBuilder::Xdc(builder) => builder,
            ChainBuilder::Cosmos(builder) => builder,
            ChainBuilder::Koinos(builder) => builder,
            ChainBuilder::Cardano(builder) => builder,
        }
    }
}

impl TransactionBuilder for ChainBuilder {
    fn build_for_sign(
        &self,
        transaction: &Transaction,
        chain_state: &ChainState,
    ) -> Result<SigningPayload, WalletError> {
        self.inner().build_for_sign(transaction, chain_state)
    }

    fn build_for_send(
        &self,
        state: BuildState,
        signatures: &[Vec<u8>],
    ) -> Result<Vec<u8>, WalletError> {
        self.inner().build_for_send(state, signatures)
    }
}
