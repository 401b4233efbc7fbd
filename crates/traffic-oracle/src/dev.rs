//! Deterministic development network
//!
//! Every key is derived from one seed, so a server, a relayer and a test
//! client started with the same seed agree on the coprocessor key, the KMS
//! signer set and the network key without exchanging anything.

use ed25519_dalek::SigningKey;
use traffic_core::Address;

use crate::{
    derive_secret, derive_signing_key, DecryptionOracle, DevEncryptor, InputVerifier,
    KmsSignerSet, OracleError,
};

/// Seed used when none is configured
pub const DEV_SEED: &str = "traffic-ledger-dev";

/// Ledger address used when none is configured
pub const DEV_LEDGER_ADDRESS: Address = Address([0x7e; 20]);

pub const DEFAULT_KMS_SIGNERS: u32 = 3;
pub const DEFAULT_THRESHOLD: usize = 2;
pub const DEFAULT_EPOCH: u64 = 1;

#[derive(Debug, Clone)]
pub struct DevNetwork {
    seed: Vec<u8>,
    ledger: Address,
    kms_signers: u32,
    threshold: usize,
    epoch: u64,
}

impl DevNetwork {
    pub fn new(seed: impl AsRef<[u8]>, ledger: Address) -> Self {
        Self {
            seed: seed.as_ref().to_vec(),
            ledger,
            kms_signers: DEFAULT_KMS_SIGNERS,
            threshold: DEFAULT_THRESHOLD,
            epoch: DEFAULT_EPOCH,
        }
    }

    pub fn with_kms(mut self, signers: u32, threshold: usize) -> Self {
        self.kms_signers = signers;
        self.threshold = threshold;
        self
    }

    pub fn with_epoch(mut self, epoch: u64) -> Self {
        self.epoch = epoch;
        self
    }

    pub fn ledger(&self) -> Address {
        self.ledger
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn network_key(&self) -> [u8; 32] {
        derive_secret(&self.seed, "network", 0)
    }

    pub fn coprocessor_key(&self) -> SigningKey {
        derive_signing_key(&self.seed, "coprocessor", 0)
    }

    /// KMS signing key `index`; keys are independent of the epoch
    pub fn kms_key(&self, index: u32) -> SigningKey {
        derive_signing_key(&self.seed, "kms", index)
    }

    pub fn input_verifier(&self) -> InputVerifier {
        InputVerifier::new(self.ledger, self.coprocessor_key().verifying_key())
    }

    pub fn encryptor(&self) -> DevEncryptor {
        DevEncryptor::new(self.ledger, self.network_key(), self.coprocessor_key())
    }

    pub fn kms_signer_set(&self) -> Result<KmsSignerSet, OracleError> {
        let signers = (0..self.kms_signers)
            .map(|i| self.kms_key(i).verifying_key())
            .collect();
        KmsSignerSet::new(self.epoch, self.threshold, signers)
    }

    /// Oracle signing with every KMS key of this network
    pub fn oracle(&self) -> DecryptionOracle {
        let signers = (0..self.kms_signers).map(|i| (i, self.kms_key(i))).collect();
        DecryptionOracle::new(self.network_key(), self.epoch, signers)
    }

    /// Oracle signing with only the listed KMS keys
    pub fn partial_oracle(&self, indices: &[u32]) -> DecryptionOracle {
        let signers = indices.iter().map(|&i| (i, self.kms_key(i))).collect();
        DecryptionOracle::new(self.network_key(), self.epoch, signers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use traffic_core::{encode_u32_word, DecryptionVerifier, Handle};

    const LEDGER: Address = Address([0xeeu8; 20]);

    #[test]
    fn test_same_seed_same_keys() {
        let a = DevNetwork::new("seed", LEDGER);
        let b = DevNetwork::new(b"seed".to_vec(), LEDGER);
        assert_eq!(a.network_key(), b.network_key());
        assert_eq!(
            a.coprocessor_key().verifying_key(),
            b.coprocessor_key().verifying_key()
        );
        assert_ne!(
            a.kms_key(0).verifying_key(),
            a.kms_key(1).verifying_key()
        );
    }

    #[test]
    fn test_partial_oracle_below_threshold() {
        let network = DevNetwork::new("seed", LEDGER).with_kms(3, 2);
        let verifier = network.kms_signer_set().unwrap();
        let handle = Handle([0x21u8; 32]);
        let plaintext = encode_u32_word(1);

        let one = network.partial_oracle(&[2]).sign(&handle, &plaintext).unwrap();
        assert!(verifier.verify(&handle, &plaintext, &one).is_err());

        let two = network.partial_oracle(&[0, 2]).sign(&handle, &plaintext).unwrap();
        assert!(verifier.verify(&handle, &plaintext, &two).is_ok());
    }

    #[test]
    fn test_epoch_rotation_invalidates_old_proofs() {
        let old = DevNetwork::new("seed", LEDGER);
        let new = old.clone().with_epoch(2);
        let handle = Handle([0x21u8; 32]);
        let plaintext = encode_u32_word(1);

        let proof = old.oracle().sign(&handle, &plaintext).unwrap();
        let verifier = new.kms_signer_set().unwrap();
        assert!(verifier.verify(&handle, &plaintext, &proof).is_err());
    }

    #[test]
    fn test_bad_threshold() {
        let network = DevNetwork::new("seed", LEDGER).with_kms(2, 3);
        assert!(matches!(
            network.kms_signer_set(),
            Err(OracleError::InvalidThreshold { threshold: 3, signers: 2 })
        ));
    }
}
