//! traffic-oracle: Development backend for the encrypted record ledger
//!
//! The ledger treats the encryption scheme as opaque. This crate provides a
//! working stand-in for each external collaborator so the protocol can be run
//! end to end:
//!
//! - [`InputVerifier`]: ciphertext service. Checks coprocessor-signed input
//!   proofs, derives handles and keeps the access-control list.
//! - [`KmsSignerSet`]: decryption proof verifier. Requires a threshold of
//!   distinct KMS signatures over `(epoch, handle, plaintext)`.
//! - [`DecryptionOracle`]: decrypts publicly decryptable handles and signs the
//!   result with its KMS keys.
//! - [`DevEncryptor`]: client-side encryption plus input proof.
//!
//! # Not an HE scheme
//!
//! Ciphertexts are a keyed XOR keystream over the 4-byte value. They hide the
//! value from anyone without the network key and nothing more; homomorphic
//! evaluation is out of scope. Signatures are real ed25519.

mod dev;
mod encryptor;
mod error;
mod input;
mod keys;
mod kms;
mod oracle;

pub use dev::{
    DevNetwork, DEFAULT_EPOCH, DEFAULT_KMS_SIGNERS, DEFAULT_THRESHOLD, DEV_LEDGER_ADDRESS, DEV_SEED,
};
pub use encryptor::{DevEncryptor, CIPHERTEXT_SIZE, NONCE_SIZE};
pub use error::{OracleError, ProofError};
pub use input::{derive_handle, input_digest, AclEntry, CiphertextRegistry, InputVerifier};
pub use keys::{derive_secret, derive_signing_key, parse_verifying_key};
pub use kms::{decryption_digest, DecryptionProof, KmsSignerSet, SignerSignature, MAX_PROOF_SIZE};
pub use oracle::{DecryptionOracle, DecryptionResponse};

/// Domain separation tags for every hash this crate signs or derives
pub mod domains {
    pub const INPUT: &[u8] = b"traffic-ledger/input/v1";
    pub const HANDLE: &[u8] = b"traffic-ledger/handle/v1";
    pub const DECRYPT: &[u8] = b"traffic-ledger/decrypt/v1";
    pub const KEYSTREAM: &[u8] = b"traffic-ledger/keystream/v1";
    pub const DEV_KEY: &[u8] = b"traffic-ledger/dev-key/v1";
}
