//! Deterministic development keys and key parsing

use ed25519_dalek::{SigningKey, VerifyingKey};
use traffic_core::keccak256;

use crate::{domains, OracleError};

/// Derive a 32-byte secret from a dev seed, a role label and an index.
///
/// Only for development networks: anyone who knows the seed knows every key.
pub fn derive_secret(seed: &[u8], label: &str, index: u32) -> [u8; 32] {
    keccak256(&[
        domains::DEV_KEY,
        (seed.len() as u64).to_be_bytes().as_slice(),
        seed,
        label.as_bytes(),
        index.to_be_bytes().as_slice(),
    ])
}

pub fn derive_signing_key(seed: &[u8], label: &str, index: u32) -> SigningKey {
    SigningKey::from_bytes(&derive_secret(seed, label, index))
}

/// Parse a hex-encoded ed25519 public key (`0x` prefix optional)
pub fn parse_verifying_key(s: &str) -> Result<VerifyingKey, OracleError> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(s).map_err(|e| OracleError::InvalidKey(e.to_string()))?;
    let bytes: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
        OracleError::InvalidKey(format!("expected 32 bytes, got {}", bytes.len()))
    })?;
    VerifyingKey::from_bytes(&bytes).map_err(|e| OracleError::InvalidKey(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derivation_is_deterministic_and_separated() {
        let a = derive_secret(b"seed", "kms", 0);
        assert_eq!(a, derive_secret(b"seed", "kms", 0));
        assert_ne!(a, derive_secret(b"seed", "kms", 1));
        assert_ne!(a, derive_secret(b"seed", "coprocessor", 0));
        assert_ne!(a, derive_secret(b"seed2", "kms", 0));
    }

    #[test]
    fn test_parse_verifying_key() {
        let key = derive_signing_key(b"seed", "kms", 0).verifying_key();
        let hex_key = format!("0x{}", hex::encode(key.to_bytes()));
        assert_eq!(parse_verifying_key(&hex_key).unwrap(), key);
        assert_eq!(parse_verifying_key(&hex_key[2..]).unwrap(), key);

        assert!(matches!(
            parse_verifying_key("0xdead"),
            Err(OracleError::InvalidKey(_))
        ));
        assert!(matches!(
            parse_verifying_key("zz"),
            Err(OracleError::InvalidKey(_))
        ));
    }
}
