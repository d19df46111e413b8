//! Advisory lock key derivation.
//!
//! Maps a token identifier to the two signed 32-bit keys of its advisory
//! lock so that every process derives the same key pair for the same
//! token. The derivation is pure and total: token ids are validated at
//! submission, and anything else folds to zero rather than failing here.

use presale_types::TokenId;

/// The two-integer key of a token's advisory lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LockKey {
    /// First key, from hex characters 0..8 of the token id.
    pub key1: i32,
    /// Second key, from hex characters 8..16.
    pub key2: i32,
}

/// Derives the advisory lock key pair for a token.
///
/// The first 8 hex characters (right-padded with '0' if shorter) map to
/// an unsigned 32-bit integer and then into signed range; characters
/// 8..16 map identically to the second key. Two distinct tokens sharing
/// their first 16 hex characters share a lock key, a rare concurrency
/// reduction rather than a correctness hazard.
#[must_use]
pub fn derive_lock_key(token_id: &TokenId) -> LockKey {
    let hex = token_id.as_hex();
    LockKey {
        key1: segment_to_i32(hex, 0),
        key2: segment_to_i32(hex, 8),
    }
}

/// Reads 8 hex characters starting at `offset`, right-padded with '0',
/// as an unsigned 32-bit value mapped into signed range (a value above
/// 0x7fffffff becomes negative by subtracting 0x100000000).
fn segment_to_i32(hex: &str, offset: usize) -> i32 {
    let mut segment = String::with_capacity(8);
    segment.extend(hex.chars().skip(offset).take(8));
    while segment.len() < 8 {
        segment.push('0');
    }
    // Validated upstream; non-hex input folds to zero to keep this total.
    let unsigned = u32::from_str_radix(&segment, 16).unwrap_or(0);
    // Two's-complement reinterpretation is exactly the subtract-2^32 rule.
    unsigned as i32
}
