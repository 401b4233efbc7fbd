//! Cleartext encoding published by the decryption oracle
//!
//! A decrypted `euint32` travels as one ABI word: 32 bytes, big-endian, with
//! the upper 28 bytes zero.

/// Size of one encoded cleartext word
pub const PLAINTEXT_WORD_SIZE: usize = 32;

/// Decode a cleartext word into a `u32`.
///
/// Returns `None` if the input is not exactly 32 bytes or the value does not
/// fit in 32 bits.
pub fn decode_u32_word(bytes: &[u8]) -> Option<u32> {
    if bytes.len() != PLAINTEXT_WORD_SIZE {
        return None;
    }
    let (high, low) = bytes.split_at(PLAINTEXT_WORD_SIZE - 4);
    if high.iter().any(|&b| b != 0) {
        return None;
    }
    Some(u32::from_be_bytes([low[0], low[1], low[2], low[3]]))
}

/// Encode a `u32` as a cleartext word
pub fn encode_u32_word(value: u32) -> [u8; PLAINTEXT_WORD_SIZE] {
    let mut word = [0u8; PLAINTEXT_WORD_SIZE];
    word[PLAINTEXT_WORD_SIZE - 4..].copy_from_slice(&value.to_be_bytes());
    word
}
