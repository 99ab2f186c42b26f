//! Error types for key material, signing, and transaction compilation.

use thiserror::Error;

use crate::ids::Pubkey;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid length for {kind}: expected {expected}, got {actual}")]
    InvalidLength {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("invalid base58: {0}")]
    InvalidBase58(String),
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("invalid field `{0}`")]
    InvalidField(&'static str),
    #[error("{0}")]
    Message(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid length for {kind}: expected {expected}, got {actual}")]
    InvalidLength {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("invalid keypair: {0}")]
    InvalidKeypair(String),
    #[error("invalid public key")]
    InvalidPublicKey,
    #[error("invalid signature")]
    InvalidSignature,
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("transaction fee payer required")]
    MissingFeePayer,
    #[error("transaction recent checkpoint required")]
    MissingRecentCheckpoint,
    #[error("unknown signer: {0}")]
    UnknownSigner(Pubkey),
    #[error("missing signature for {0}")]
    MissingSignature(Pubkey),
    #[error("signature verification failed for {0}")]
    InvalidSignature(Pubkey),
    #[error("too many {kind}: {count} exceeds {max}")]
    TooMany {
        kind: &'static str,
        count: usize,
        max: usize,
    },
    #[error("malformed transaction: {0}")]
    Malformed(String),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}
