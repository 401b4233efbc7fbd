//! Ciphertext service: input proof checks, handle derivation, access control
//!
//! An input proof is a coprocessor ed25519 signature over
//! `keccak256(INPUT || ledger || submitter || ciphertext)`, so a proof is only
//! good for the submitter and ledger it was produced for.

use std::collections::{HashMap, HashSet};

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use traffic_core::constants::HANDLE_TYPE_EUINT32;
use traffic_core::{keccak256, Address, CiphertextService, Handle};

use crate::{domains, OracleError, CIPHERTEXT_SIZE};

/// Digest the coprocessor signs for an input
pub fn input_digest(ledger: &Address, submitter: &Address, ciphertext: &[u8]) -> [u8; 32] {
    keccak256(&[
        domains::INPUT,
        ledger.as_bytes().as_slice(),
        submitter.as_bytes().as_slice(),
        ciphertext,
    ])
}

/// Handle for a ciphertext registered with `ledger`; never uninitialized
pub fn derive_handle(ledger: &Address, ciphertext: &[u8]) -> Handle {
    let mut bytes = keccak256(&[domains::HANDLE, ledger.as_bytes().as_slice(), ciphertext]);
    bytes[31] = HANDLE_TYPE_EUINT32;
    Handle(bytes)
}

/// Per-handle permissions
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AclEntry {
    pub allowed: HashSet<Address>,
    pub public: bool,
}

/// Ciphertexts by handle. Persisted alongside the record store so pending
/// handles stay decryptable across restarts.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiphertextRegistry {
    entries: HashMap<Handle, Vec<u8>>,
}

impl CiphertextRegistry {
    pub fn get(&self, handle: &Handle) -> Option<&[u8]> {
        self.entries.get(handle).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Development ciphertext service
pub struct InputVerifier {
    ledger: Address,
    coprocessor: VerifyingKey,
    registry: CiphertextRegistry,
    acl: HashMap<Handle, AclEntry>,
}

impl InputVerifier {
    pub fn new(ledger: Address, coprocessor: VerifyingKey) -> Self {
        Self::with_registry(ledger, coprocessor, CiphertextRegistry::default())
    }

    /// Resume with previously registered ciphertexts. The ACL starts empty.
    pub fn with_registry(
        ledger: Address,
        coprocessor: VerifyingKey,
        registry: CiphertextRegistry,
    ) -> Self {
        Self {
            ledger,
            coprocessor,
            registry,
            acl: HashMap::new(),
        }
    }

    fn check(&self, ciphertext: &[u8], proof: &[u8], submitter: &Address) -> Result<(), OracleError> {
        if ciphertext.len() != CIPHERTEXT_SIZE {
            return Err(OracleError::MalformedCiphertext {
                expected: CIPHERTEXT_SIZE,
                actual: ciphertext.len(),
            });
        }
        let signature =
            Signature::from_slice(proof).map_err(|e| OracleError::InvalidInputProof(e.to_string()))?;
        let digest = input_digest(&self.ledger, submitter, ciphertext);
        self.coprocessor
            .verify(&digest, &signature)
            .map_err(|e| OracleError::InvalidInputProof(e.to_string()))
    }

    pub fn ciphertext(&self, handle: &Handle) -> Option<&[u8]> {
        self.registry.get(handle)
    }

    pub fn registry(&self) -> &CiphertextRegistry {
        &self.registry
    }

    pub fn is_allowed(&self, handle: &Handle, account: &Address) -> bool {
        self.acl
            .get(handle)
            .is_some_and(|entry| entry.allowed.contains(account))
    }

    pub fn is_publicly_decryptable(&self, handle: &Handle) -> bool {
        self.acl.get(handle).is_some_and(|entry| entry.public)
    }

    pub fn acl_entry(&self, handle: &Handle) -> Option<&AclEntry> {
        self.acl.get(handle)
    }
}

impl CiphertextService for InputVerifier {
    fn verify_input(&self, ciphertext: &[u8], proof: &[u8], submitter: &Address) -> Handle {
        if let Err(e) = self.check(ciphertext, proof, submitter) {
            tracing::debug!(submitter = %submitter, error = %e, "Input proof rejected");
            return Handle::UNINITIALIZED;
        }
        derive_handle(&self.ledger, ciphertext)
    }

    fn register(&mut self, handle: &Handle, ciphertext: &[u8]) {
        self.registry
            .entries
            .entry(*handle)
            .or_insert_with(|| ciphertext.to_vec());
    }

    fn allow(&mut self, handle: &Handle, account: &Address) {
        self.acl.entry(*handle).or_default().allowed.insert(*account);
    }

    fn make_publicly_decryptable(&mut self, handle: &Handle) {
        self.acl.entry(*handle).or_default().public = true;
    }
}
