//! KMS signer set: threshold verification of decryption proofs
//!
//! A decryption proof is a bincode-encoded [`DecryptionProof`]: the signer set
//! epoch plus one ed25519 signature per participating KMS signer, each over
//! `keccak256(DECRYPT || epoch || handle || plaintext)`. Because the handle is
//! part of the signed digest, a proof cannot be moved to another handle.

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use traffic_core::{keccak256, DecryptionVerifier, Handle};

use crate::{domains, OracleError, ProofError};

/// Largest encoded proof accepted before decoding
pub const MAX_PROOF_SIZE: usize = 16 * 1024;

/// Digest every KMS signer signs for one decryption
pub fn decryption_digest(epoch: u64, handle: &Handle, plaintext: &[u8]) -> [u8; 32] {
    keccak256(&[
        domains::DECRYPT,
        epoch.to_be_bytes().as_slice(),
        handle.as_bytes().as_slice(),
        plaintext,
    ])
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerSignature {
    /// Index into the signer set
    pub signer: u32,
    /// 64-byte ed25519 signature
    pub signature: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptionProof {
    pub epoch: u64,
    pub signatures: Vec<SignerSignature>,
}

impl DecryptionProof {
    pub fn to_bytes(&self) -> Result<Vec<u8>, OracleError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProofError> {
        if bytes.len() > MAX_PROOF_SIZE {
            return Err(ProofError::Oversized {
                size: bytes.len(),
                max: MAX_PROOF_SIZE,
            });
        }
        bincode::deserialize(bytes).map_err(|e| ProofError::Decode(e.to_string()))
    }
}

/// Current KMS signer set with its threshold
#[derive(Debug, Clone)]
pub struct KmsSignerSet {
    epoch: u64,
    threshold: usize,
    signers: Vec<VerifyingKey>,
}

impl KmsSignerSet {
    /// Signers must be distinct and `1 <= threshold <= signers.len()`
    pub fn new(epoch: u64, threshold: usize, signers: Vec<VerifyingKey>) -> Result<Self, OracleError> {
        if threshold == 0 || threshold > signers.len() {
            return Err(OracleError::InvalidThreshold {
                threshold,
                signers: signers.len(),
            });
        }
        for (i, key) in signers.iter().enumerate() {
            if signers[..i].iter().any(|other| other.as_bytes() == key.as_bytes()) {
                return Err(OracleError::InvalidKey(format!(
                    "signer {} is listed twice",
                    i
                )));
            }
        }
        Ok(Self {
            epoch,
            threshold,
            signers,
        })
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn signers(&self) -> &[VerifyingKey] {
        &self.signers
    }

    /// Check an encoded proof for `(handle, plaintext)`.
    ///
    /// Every listed signature must come from a distinct known signer and be
    /// valid; there must be at least `threshold` of them.
    pub fn verify_proof(&self, handle: &Handle, plaintext: &[u8], proof: &[u8]) -> Result<(), ProofError> {
        let proof = DecryptionProof::from_bytes(proof)?;
        if proof.epoch != self.epoch {
            return Err(ProofError::EpochMismatch {
                expected: self.epoch,
                actual: proof.epoch,
            });
        }

        let digest = decryption_digest(self.epoch, handle, plaintext);
        let mut seen = vec![false; self.signers.len()];
        for entry in &proof.signatures {
            let index = entry.signer as usize;
            let key = self
                .signers
                .get(index)
                .ok_or(ProofError::UnknownSigner(entry.signer))?;
            if seen[index] {
                return Err(ProofError::DuplicateSigner(entry.signer));
            }
            seen[index] = true;

            let signature = Signature::from_slice(&entry.signature)
                .map_err(|_| ProofError::BadSignature(entry.signer))?;
            key.verify(&digest, &signature)
                .map_err(|_| ProofError::BadSignature(entry.signer))?;
        }

        let valid = proof.signatures.len();
        if valid < self.threshold {
            return Err(ProofError::BelowThreshold {
                valid,
                threshold: self.threshold,
            });
        }
        Ok(())
    }
}

impl DecryptionVerifier for KmsSignerSet {
    type Error = ProofError;

    fn verify(&self, handle: &Handle, plaintext: &[u8], proof: &[u8]) -> Result<(), ProofError> {
        self.verify_proof(handle, plaintext, proof)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derive_signing_key;
    use ed25519_dalek::{Signer, SigningKey};
    use traffic_core::encode_u32_word;

    fn keys(n: u32) -> Vec<SigningKey> {
        (0..n).map(|i| derive_signing_key(b"kms-test", "kms", i)).collect()
    }

    fn signer_set(keys: &[SigningKey], threshold: usize) -> KmsSignerSet {
        KmsSignerSet::new(1, threshold, keys.iter().map(|k| k.verifying_key()).collect()).unwrap()
    }

    fn sign(keys: &[SigningKey], which: &[u32], epoch: u64, handle: &Handle, plaintext: &[u8]) -> Vec<u8> {
        let digest = decryption_digest(epoch, handle, plaintext);
        DecryptionProof {
            epoch,
            signatures: which
                .iter()
                .map(|&i| SignerSignature {
                    signer: i,
                    signature: keys[i as usize].sign(&digest).to_bytes().to_vec(),
                })
                .collect(),
        }
        .to_bytes()
        .unwrap()
    }

    const HANDLE: Handle = Handle([0x42u8; 32]);

    #[test]
    fn test_threshold_met() {
        let keys = keys(3);
        let set = signer_set(&keys, 2);
        let plaintext = encode_u32_word(42);

        let proof = sign(&keys, &[0, 2], 1, &HANDLE, &plaintext);
        assert!(set.verify_proof(&HANDLE, &plaintext, &proof).is_ok());
    }

    #[test]
    fn test_below_threshold() {
        let keys = keys(3);
        let set = signer_set(&keys, 2);
        let plaintext = encode_u32_word(42);

        let proof = sign(&keys, &[1], 1, &HANDLE, &plaintext);
        assert_eq!(
            set.verify_proof(&HANDLE, &plaintext, &proof),
            Err(ProofError::BelowThreshold { valid: 1, threshold: 2 })
        );
    }

    #[test]
    fn test_duplicate_signer_does_not_count_twice() {
        let keys = keys(3);
        let set = signer_set(&keys, 2);
        let plaintext = encode_u32_word(42);

        let proof = sign(&keys, &[1, 1], 1, &HANDLE, &plaintext);
        assert_eq!(
            set.verify_proof(&HANDLE, &plaintext, &proof),
            Err(ProofError::DuplicateSigner(1))
        );
    }

    #[test]
    fn test_bound_to_handle_and_plaintext() {
        let keys = keys(2);
        let set = signer_set(&keys, 2);
        let plaintext = encode_u32_word(42);
        let proof = sign(&keys, &[0, 1], 1, &HANDLE, &plaintext);

        let other_handle = Handle([0x43u8; 32]);
        assert_eq!(
            set.verify_proof(&other_handle, &plaintext, &proof),
            Err(ProofError::BadSignature(0))
        );
        assert_eq!(
            set.verify_proof(&HANDLE, &encode_u32_word(43), &proof),
            Err(ProofError::BadSignature(0))
        );
    }

    #[test]
    fn test_stale_epoch_rejected() {
        let keys = keys(2);
        let set = signer_set(&keys, 1);
        let plaintext = encode_u32_word(42);

        let proof = sign(&keys, &[0], 0, &HANDLE, &plaintext);
        assert_eq!(
            set.verify_proof(&HANDLE, &plaintext, &proof),
            Err(ProofError::EpochMismatch { expected: 1, actual: 0 })
        );
    }

    #[test]
    fn test_outsider_rejected() {
        let keys = keys(2);
        let set = signer_set(&keys, 1);
        let plaintext = encode_u32_word(42);

        let outsider = derive_signing_key(b"elsewhere", "kms", 0);
        let digest = decryption_digest(1, &HANDLE, &plaintext);
        let proof = DecryptionProof {
            epoch: 1,
            signatures: vec![SignerSignature {
                signer: 0,
                signature: outsider.sign(&digest).to_bytes().to_vec(),
            }],
        }
        .to_bytes()
        .unwrap();
        assert_eq!(
            set.verify_proof(&HANDLE, &plaintext, &proof),
            Err(ProofError::BadSignature(0))
        );

        let proof = sign(&keys, &[0], 1, &HANDLE, &plaintext);
        let mut decoded = DecryptionProof::from_bytes(&proof).unwrap();
        decoded.signatures[0].signer = 9;
        assert_eq!(
            set.verify_proof(&HANDLE, &plaintext, &decoded.to_bytes().unwrap()),
            Err(ProofError::UnknownSigner(9))
        );
    }

    #[test]
    fn test_garbage_proof() {
        let keys = keys(1);
        let set = signer_set(&keys, 1);
        assert!(matches!(
            set.verify_proof(&HANDLE, &[], &[1, 2, 3]),
            Err(ProofError::Decode(_))
        ));
        assert!(matches!(
            set.verify_proof(&HANDLE, &[], &vec![0u8; MAX_PROOF_SIZE + 1]),
            Err(ProofError::Oversized { .. })
        ));
    }

    #[test]
    fn test_invalid_configuration() {
        let keys = keys(2);
        let verifying: Vec<_> = keys.iter().map(|k| k.verifying_key()).collect();
        assert!(matches!(
            KmsSignerSet::new(1, 0, verifying.clone()),
            Err(OracleError::InvalidThreshold { .. })
        ));
        assert!(matches!(
            KmsSignerSet::new(1, 3, verifying.clone()),
            Err(OracleError::InvalidThreshold { .. })
        ));
        assert!(matches!(
            KmsSignerSet::new(1, 1, vec![verifying[0], verifying[0]]),
            Err(OracleError::InvalidKey(_))
        ));
    }
}
