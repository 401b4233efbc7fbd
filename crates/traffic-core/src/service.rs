//! Narrow interfaces to the external collaborators
//!
//! The ledger never sees ciphertext internals or key material. It hands
//! external inputs to a [`CiphertextService`] and gets back handles, and it
//! asks a [`DecryptionVerifier`] whether a published plaintext is the true
//! decryption of one stored handle.

use serde::{Deserialize, Serialize};

use crate::{types::hex_bytes, Address, Handle};

/// Externally produced ciphertext plus its proof of well-formedness
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedInput {
    #[serde(with = "hex_bytes")]
    pub ciphertext: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub proof: Vec<u8>,
}

impl EncryptedInput {
    pub fn new(ciphertext: Vec<u8>, proof: Vec<u8>) -> Self {
        Self { ciphertext, proof }
    }
}

/// Oracle output for one handle: plaintext bytes plus decryption proof
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealedValue {
    #[serde(with = "hex_bytes")]
    pub plaintext: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub proof: Vec<u8>,
}

impl RevealedValue {
    pub fn new(plaintext: Vec<u8>, proof: Vec<u8>) -> Self {
        Self { plaintext, proof }
    }
}

/// Converts external ciphertexts into handles and holds their access control.
pub trait CiphertextService {
    /// Validate `ciphertext` against `proof` for `submitter` and return its handle.
    ///
    /// Returns [`Handle::UNINITIALIZED`] when the proof is malformed or does not
    /// match the input. Stores nothing: a submission that fails on a later
    /// field must leave the service untouched.
    fn verify_input(&self, ciphertext: &[u8], proof: &[u8], submitter: &Address) -> Handle;

    /// Store a verified `ciphertext` under `handle`
    fn register(&mut self, handle: &Handle, ciphertext: &[u8]);

    /// Grant `account` permission to operate on `handle`
    fn allow(&mut self, handle: &Handle, account: &Address);

    /// Authorize the decryption oracle to publish the plaintext of `handle`
    fn make_publicly_decryptable(&mut self, handle: &Handle);
}

/// Checks a decryption proof against one stored handle.
pub trait DecryptionVerifier {
    type Error: std::fmt::Display;

    /// Succeeds only if `proof` attests that `plaintext` is the decryption of
    /// exactly `handle`.
    fn verify(&self, handle: &Handle, plaintext: &[u8], proof: &[u8]) -> Result<(), Self::Error>;
}
