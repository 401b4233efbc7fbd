//! Primitive identifiers: addresses, ciphertext handles, transaction context

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use tiny_keccak::{Hasher, Keccak};

use crate::Error;

/// Longest record id accepted at submission
pub const MAX_RECORD_ID_LEN: usize = 64;

/// Error parsing a hex-encoded fixed-size value
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HexParseError {
    #[error("Invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("Invalid length: expected {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },
}

fn parse_fixed<const N: usize>(s: &str) -> Result<[u8; N], HexParseError> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(s)?;
    bytes.as_slice().try_into().map_err(|_| HexParseError::Length {
        expected: N,
        actual: bytes.len(),
    })
}

/// 20-byte account identity (submitter, ledger, relayer)
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl FromStr for Address {
    type Err = HexParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_fixed::<20>(s).map(Address)
    }
}

impl From<[u8; 20]> for Address {
    fn from(bytes: [u8; 20]) -> Self {
        Address(bytes)
    }
}

/// Opaque 32-byte reference to an encrypted value held by the ciphertext service.
///
/// The all-zero handle means "not initialized": the ciphertext service returns
/// it when an input fails its well-formedness proof.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Handle(pub [u8; 32]);

impl Handle {
    pub const UNINITIALIZED: Handle = Handle([0u8; 32]);

    pub fn is_initialized(&self) -> bool {
        self.0 != [0u8; 32]
    }

    /// Type tag carried in the last byte
    pub fn type_tag(&self) -> u8 {
        self.0[31]
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({})", self)
    }
}

impl FromStr for Handle {
    type Err = HexParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_fixed::<32>(s).map(Handle)
    }
}

macro_rules! string_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

string_serde!(Address);
string_serde!(Handle);

/// Serde helper for `Vec<u8>` fields carried as `0x`-prefixed hex strings
pub mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        let s = s.strip_prefix("0x").unwrap_or(&s);
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

/// Host ledger context for a single write: who is calling and when
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxContext {
    pub sender: Address,
    pub timestamp: u64,
}

impl TxContext {
    pub fn new(sender: Address, timestamp: u64) -> Self {
        Self { sender, timestamp }
    }
}

/// keccak256 over the concatenation of `parts`
pub fn keccak256(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    for part in parts {
        hasher.update(part);
    }
    let mut out = [0u8; 32];
    hasher.finalize(&mut out);
    out
}

/// Check that a caller-chosen record id is usable as a key.
///
/// Ids must be non-empty, at most [`MAX_RECORD_ID_LEN`] bytes, and free of
/// control characters.
pub fn validate_record_id(id: &str) -> crate::Result<()> {
    if id.is_empty() {
        return Err(Error::InvalidRecordId("id is empty".into()));
    }
    if id.len() > MAX_RECORD_ID_LEN {
        return Err(Error::InvalidRecordId(format!(
            "id is {} bytes, max {}",
            id.len(),
            MAX_RECORD_ID_LEN
        )));
    }
    if id.chars().any(char::is_control) {
        return Err(Error::InvalidRecordId("id contains control characters".into()));
    }
    Ok(())
}
