//! Oracle and proof error types

use thiserror::Error;
use traffic_core::Handle;

/// Why a decryption proof was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProofError {
    #[error("Proof decode error: {0}")]
    Decode(String),

    #[error("Proof too large: {size} bytes (max {max})")]
    Oversized { size: usize, max: usize },

    #[error("Signer set epoch mismatch: proof is for epoch {actual}, verifier expects {expected}")]
    EpochMismatch { expected: u64, actual: u64 },

    #[error("Unknown signer index {0}")]
    UnknownSigner(u32),

    #[error("Signer {0} signed more than once")]
    DuplicateSigner(u32),

    #[error("Invalid signature from signer {0}")]
    BadSignature(u32),

    #[error("Not enough signatures: {valid} valid, threshold {threshold}")]
    BelowThreshold { valid: usize, threshold: usize },
}

#[derive(Error, Debug)]
pub enum OracleError {
    #[error("Handle {0} is not publicly decryptable")]
    NotPubliclyDecryptable(Handle),

    #[error("Unknown handle {0}")]
    UnknownHandle(Handle),

    #[error("Malformed ciphertext: expected {expected} bytes, got {actual}")]
    MalformedCiphertext { expected: usize, actual: usize },

    #[error("Invalid input proof: {0}")]
    InvalidInputProof(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Invalid threshold {threshold} for {signers} signers")]
    InvalidThreshold { threshold: usize, signers: usize },

    #[error("Proof error: {0}")]
    Proof(#[from] ProofError),

    #[error("Encoding error: {0}")]
    Encoding(#[from] bincode::Error),
}
