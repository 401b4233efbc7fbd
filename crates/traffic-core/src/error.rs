//! Ledger error types
//!
//! Every variant is a precondition failure detected before any mutation, so a
//! call that returns an error has left the ledger exactly as it found it.

use thiserror::Error;

use crate::RecordKind;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Duplicate record: {kind} '{id}' already exists")]
    DuplicateRecord { kind: RecordKind, id: String },

    #[error("Record not found: {kind} '{id}'")]
    RecordNotFound { kind: RecordKind, id: String },

    #[error("Already verified: {kind} '{id}'")]
    AlreadyVerified { kind: RecordKind, id: String },

    #[error("Invalid ciphertext for field '{field}'")]
    InvalidCiphertext { field: &'static str },

    #[error("Invalid decryption proof for field '{field}'")]
    InvalidDecryptionProof { field: &'static str },

    #[error("Malformed plaintext for field '{field}': expected a 32-byte word holding a u32")]
    MalformedPlaintext { field: &'static str },

    #[error("Field count mismatch for {kind}: expected {expected}, got {actual}")]
    FieldCountMismatch {
        kind: RecordKind,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid record id: {0}")]
    InvalidRecordId(String),
}

impl Error {
    /// Stable machine-readable code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Error::DuplicateRecord { .. } => "DUPLICATE_RECORD",
            Error::RecordNotFound { .. } => "RECORD_NOT_FOUND",
            Error::AlreadyVerified { .. } => "ALREADY_VERIFIED",
            Error::InvalidCiphertext { .. } => "INVALID_CIPHERTEXT",
            Error::InvalidDecryptionProof { .. } => "INVALID_DECRYPTION_PROOF",
            Error::MalformedPlaintext { .. } => "MALFORMED_PLAINTEXT",
            Error::FieldCountMismatch { .. } => "FIELD_COUNT_MISMATCH",
            Error::InvalidRecordId(_) => "INVALID_RECORD_ID",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = Error::DuplicateRecord {
            kind: RecordKind::Telemetry,
            id: "car1".into(),
        };
        assert_eq!(err.to_string(), "Duplicate record: telemetry 'car1' already exists");
        assert_eq!(err.code(), "DUPLICATE_RECORD");

        let err = Error::InvalidDecryptionProof { field: "position" };
        assert_eq!(err.to_string(), "Invalid decryption proof for field 'position'");
        assert_eq!(err.code(), "INVALID_DECRYPTION_PROOF");
    }
}
