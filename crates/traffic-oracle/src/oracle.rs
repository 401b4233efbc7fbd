//! Reference decryption oracle
//!
//! Holds the network key and a set of KMS signing keys. Only handles the ACL
//! marks publicly decryptable are served.

use ed25519_dalek::{Signer, SigningKey};
use serde::{Deserialize, Serialize};
use traffic_core::{encode_u32_word, hex_bytes, Handle, RevealedValue};

use crate::encryptor::open;
use crate::{decryption_digest, DecryptionProof, InputVerifier, OracleError, SignerSignature};

/// Plaintext word for one handle plus the KMS proof over it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptionResponse {
    pub handle: Handle,
    #[serde(with = "hex_bytes")]
    pub plaintext: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub proof: Vec<u8>,
}

impl DecryptionResponse {
    /// The part the ledger's verification call takes
    pub fn revealed(&self) -> RevealedValue {
        RevealedValue::new(self.plaintext.clone(), self.proof.clone())
    }
}

impl From<DecryptionResponse> for RevealedValue {
    fn from(response: DecryptionResponse) -> Self {
        RevealedValue::new(response.plaintext, response.proof)
    }
}

pub struct DecryptionOracle {
    network_key: [u8; 32],
    epoch: u64,
    signers: Vec<(u32, SigningKey)>,
}

impl DecryptionOracle {
    /// `signers` pairs each key with its index in the verifier's signer set
    pub fn new(network_key: [u8; 32], epoch: u64, signers: Vec<(u32, SigningKey)>) -> Self {
        Self {
            network_key,
            epoch,
            signers,
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn signer_count(&self) -> usize {
        self.signers.len()
    }

    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<u32, OracleError> {
        open(&self.network_key, ciphertext)
    }

    /// Encoded proof that `plaintext` is the decryption of `handle`
    pub fn sign(&self, handle: &Handle, plaintext: &[u8]) -> Result<Vec<u8>, OracleError> {
        let digest = decryption_digest(self.epoch, handle, plaintext);
        let signatures = self
            .signers
            .iter()
            .map(|(index, key)| SignerSignature {
                signer: *index,
                signature: key.sign(&digest).to_bytes().to_vec(),
            })
            .collect();
        DecryptionProof {
            epoch: self.epoch,
            signatures,
        }
        .to_bytes()
    }

    /// Decrypt a ciphertext the caller already fetched and sign the result.
    /// No ACL check; see [`Self::public_decrypt`].
    pub fn decrypt_and_sign(
        &self,
        handle: &Handle,
        ciphertext: &[u8],
    ) -> Result<DecryptionResponse, OracleError> {
        let value = self.decrypt(ciphertext)?;
        let plaintext = encode_u32_word(value).to_vec();
        let proof = self.sign(handle, &plaintext)?;
        Ok(DecryptionResponse {
            handle: *handle,
            plaintext,
            proof,
        })
    }

    /// Serve a public decryption request against the ciphertext service
    pub fn public_decrypt(
        &self,
        service: &InputVerifier,
        handle: &Handle,
    ) -> Result<DecryptionResponse, OracleError> {
        if !service.is_publicly_decryptable(handle) {
            return Err(OracleError::NotPubliclyDecryptable(*handle));
        }
        let ciphertext = service
            .ciphertext(handle)
            .ok_or(OracleError::UnknownHandle(*handle))?;
        let response = self.decrypt_and_sign(handle, ciphertext)?;
        tracing::debug!(handle = %handle, epoch = self.epoch, "Public decryption served");
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DevNetwork;
    use traffic_core::{decode_u32_word, Address, CiphertextService, DecryptionVerifier};

    const LEDGER: Address = Address([0xeeu8; 20]);
    const ALICE: Address = Address([0xa1u8; 20]);

    #[test]
    fn test_public_decrypt_verifies() {
        let network = DevNetwork::new(b"test", LEDGER);
        let mut service = network.input_verifier();
        let oracle = network.oracle();
        let verifier = network.kms_signer_set().unwrap();

        let input = network.encryptor().encrypt(42, &ALICE);
        let handle = service.verify_input(&input.ciphertext, &input.proof, &ALICE);
        service.register(&handle, &input.ciphertext);
        service.make_publicly_decryptable(&handle);

        let response = oracle.public_decrypt(&service, &handle).unwrap();
        assert_eq!(response.handle, handle);
        assert_eq!(decode_u32_word(&response.plaintext), Some(42));
        assert!(verifier
            .verify(&handle, &response.plaintext, &response.proof)
            .is_ok());
    }

    #[test]
    fn test_refuses_non_public_handle() {
        let network = DevNetwork::new(b"test", LEDGER);
        let mut service = network.input_verifier();
        let oracle = network.oracle();

        let input = network.encryptor().encrypt(42, &ALICE);
        let handle = service.verify_input(&input.ciphertext, &input.proof, &ALICE);
        service.register(&handle, &input.ciphertext);
        service.allow(&handle, &LEDGER);

        assert!(matches!(
            oracle.public_decrypt(&service, &handle),
            Err(OracleError::NotPubliclyDecryptable(h)) if h == handle
        ));
    }

    #[test]
    fn test_unknown_handle() {
        let network = DevNetwork::new(b"test", LEDGER);
        let mut service = network.input_verifier();
        let oracle = network.oracle();

        let handle = Handle([0x55u8; 32]);
        service.make_publicly_decryptable(&handle);
        assert!(matches!(
            oracle.public_decrypt(&service, &handle),
            Err(OracleError::UnknownHandle(_))
        ));
    }

    #[test]
    fn test_other_network_proof_rejected() {
        let network = DevNetwork::new(b"test", LEDGER);
        let rogue = DevNetwork::new(b"rogue", LEDGER);
        let verifier = network.kms_signer_set().unwrap();

        let ciphertext = network.encryptor().encrypt(9, &ALICE).ciphertext;
        let handle = Handle([0x10u8; 32]);
        let forged = rogue.oracle().sign(&handle, &encode_u32_word(9)).unwrap();
        assert!(verifier.verify(&handle, &encode_u32_word(9), &forged).is_err());

        let genuine = network.oracle().decrypt_and_sign(&handle, &ciphertext).unwrap();
        assert!(verifier
            .verify(&handle, &genuine.plaintext, &genuine.proof)
            .is_ok());
    }
}
