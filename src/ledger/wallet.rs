//! Wallet management and transaction signing.
//!
//! # Security
//! - Private keys are loaded ONLY from environment variables or explicit input
//! - Keys are never logged or serialized

use alloy::primitives::{hex, Address, B256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use thiserror::Error;

use crate::ledger::transaction::{sign_doc_hash, AuthInfo, SignedTx, SignerData, UnsignedTx};

/// Environment variable name for the private key.
pub const PRIVATE_KEY_ENV_VAR: &str = "SEQUENCER_PRIVATE_KEY";

/// Errors produced while loading keys or signing.
#[derive(Debug, Error)]
pub enum SigningError {
    #[error("invalid private key: {0}")]
    InvalidKey(String),

    #[error("environment variable {0} not set")]
    MissingKey(&'static str),

    #[error("could not encode sign doc: {0}")]
    Encode(String),

    #[error("signing failed: {0}")]
    Signature(String),
}

/// Produces signed transactions for one account.
///
/// Implementations must be pure: the same inputs give an equivalent signed
/// tx and nothing else is touched.
pub trait TxSigner: Send + Sync {
    /// Address whose account state the signatures are valid for.
    fn address(&self) -> String;

    fn sign_tx(&self, tx: &UnsignedTx, signer_data: &SignerData) -> Result<SignedTx, SigningError>;
}

/// secp256k1 signing key.
#[derive(Clone)]
pub struct Wallet {
    /// The underlying signer (private key).
    signer: PrivateKeySigner,
}

impl Wallet {
    /// Create a wallet from a hex-encoded private key string.
    ///
    /// Accepts the key with or without a `0x` prefix.
    pub fn from_private_key(private_key_hex: &str) -> Result<Self, SigningError> {
        let key_hex = private_key_hex.strip_prefix("0x").unwrap_or(private_key_hex);

        let signer: PrivateKeySigner = key_hex
            .parse()
            .map_err(|e| SigningError::InvalidKey(format!("{}", e)))?;

        tracing::info!(address = %signer.address(), "Wallet initialized");

        Ok(Self { signer })
    }

    /// Load wallet from `SEQUENCER_PRIVATE_KEY`.
    pub fn from_env() -> Result<Self, SigningError> {
        let private_key =
            std::env::var(PRIVATE_KEY_ENV_VAR).map_err(|_| SigningError::MissingKey(PRIVATE_KEY_ENV_VAR))?;
        Self::from_private_key(&private_key)
    }

    pub fn eth_address(&self) -> Address {
        self.signer.address()
    }

    /// Sign a 32-byte digest.
    pub fn sign_hash(&self, hash: &B256) -> Result<alloy::signers::Signature, SigningError> {
        self.signer
            .sign_hash_sync(hash)
            .map_err(|e| SigningError::Signature(e.to_string()))
    }
}

impl TxSigner for Wallet {
    fn address(&self) -> String {
        self.signer.address().to_string()
    }

    fn sign_tx(&self, tx: &UnsignedTx, signer_data: &SignerData) -> Result<SignedTx, SigningError> {
        let digest = sign_doc_hash(tx, signer_data).map_err(|e| SigningError::Encode(e.to_string()))?;
        let signature = self.sign_hash(&digest)?;

        Ok(SignedTx {
            body: tx.body.clone(),
            auth_info: AuthInfo {
                fee: tx.fee.clone(),
                sequence: signer_data.sequence,
            },
            signature: hex::encode(signature.as_bytes()),
        })
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.signer.address())
            .finish_non_exhaustive()
    }
}
