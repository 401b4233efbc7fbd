//! Client-side encryption with input proofs
//!
//! Ciphertext layout: `nonce (16) || value_be (4) XOR keystream (4)` where
//! `keystream = keccak256(KEYSTREAM || network_key || nonce)[..4]`.

use ed25519_dalek::{Signer, SigningKey};
use rand::Rng;
use traffic_core::{keccak256, Address, EncryptedInput};

use crate::{domains, input_digest, OracleError};

pub const NONCE_SIZE: usize = 16;

/// Nonce plus 4 encrypted value bytes
pub const CIPHERTEXT_SIZE: usize = NONCE_SIZE + 4;

fn keystream(network_key: &[u8; 32], nonce: &[u8]) -> [u8; 4] {
    let block = keccak256(&[domains::KEYSTREAM, network_key.as_slice(), nonce]);
    [block[0], block[1], block[2], block[3]]
}

pub(crate) fn seal(network_key: &[u8; 32], nonce: &[u8; NONCE_SIZE], value: u32) -> Vec<u8> {
    let stream = keystream(network_key, nonce);
    let mut out = Vec::with_capacity(CIPHERTEXT_SIZE);
    out.extend_from_slice(nonce);
    out.extend(value.to_be_bytes().iter().zip(stream).map(|(v, k)| v ^ k));
    out
}

pub(crate) fn open(network_key: &[u8; 32], ciphertext: &[u8]) -> Result<u32, OracleError> {
    if ciphertext.len() != CIPHERTEXT_SIZE {
        return Err(OracleError::MalformedCiphertext {
            expected: CIPHERTEXT_SIZE,
            actual: ciphertext.len(),
        });
    }
    let (nonce, body) = ciphertext.split_at(NONCE_SIZE);
    let stream = keystream(network_key, nonce);
    let mut value = [0u8; 4];
    for (i, byte) in value.iter_mut().enumerate() {
        *byte = body[i] ^ stream[i];
    }
    Ok(u32::from_be_bytes(value))
}

/// Encrypts values for one ledger and attaches coprocessor input proofs
pub struct DevEncryptor {
    ledger: Address,
    network_key: [u8; 32],
    coprocessor: SigningKey,
}

impl DevEncryptor {
    pub fn new(ledger: Address, network_key: [u8; 32], coprocessor: SigningKey) -> Self {
        Self {
            ledger,
            network_key,
            coprocessor,
        }
    }

    /// Encrypt `value` for `submitter` with a random nonce
    pub fn encrypt(&self, value: u32, submitter: &Address) -> EncryptedInput {
        let mut nonce = [0u8; NONCE_SIZE];
        rand::thread_rng().fill(&mut nonce);
        self.encrypt_with_nonce(value, submitter, nonce)
    }

    pub fn encrypt_with_nonce(
        &self,
        value: u32,
        submitter: &Address,
        nonce: [u8; NONCE_SIZE],
    ) -> EncryptedInput {
        let ciphertext = seal(&self.network_key, &nonce, value);
        let digest = input_digest(&self.ledger, submitter, &ciphertext);
        let proof = self.coprocessor.sign(&digest).to_bytes().to_vec();
        EncryptedInput::new(ciphertext, proof)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; 32] = [7u8; 32];

    #[test]
    fn test_seal_open() {
        let nonce = [3u8; NONCE_SIZE];
        let ct = seal(&KEY, &nonce, 42);
        assert_eq!(ct.len(), CIPHERTEXT_SIZE);
        assert_eq!(&ct[..NONCE_SIZE], &nonce);
        assert_eq!(open(&KEY, &ct).unwrap(), 42);

        // Wrong key yields a different value
        assert_ne!(open(&[8u8; 32], &ct).unwrap(), 42);
    }

    #[test]
    fn test_value_not_in_clear() {
        let ct = seal(&KEY, &[0u8; NONCE_SIZE], 0x0102_0304);
        assert_ne!(&ct[NONCE_SIZE..], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_open_rejects_bad_length() {
        assert!(matches!(
            open(&KEY, &[0u8; 5]),
            Err(OracleError::MalformedCiphertext { expected: 20, actual: 5 })
        ));
    }

    #[test]
    fn test_random_nonces_differ() {
        let encryptor = DevEncryptor::new(
            Address([1u8; 20]),
            KEY,
            SigningKey::from_bytes(&[9u8; 32]),
        );
        let a = encryptor.encrypt(5, &Address([2u8; 20]));
        let b = encryptor.encrypt(5, &Address([2u8; 20]));
        assert_ne!(a.ciphertext, b.ciphertext);
        assert_eq!(open(&KEY, &a.ciphertext).unwrap(), 5);
        assert_eq!(open(&KEY, &b.ciphertext).unwrap(), 5);
    }
}
