//! # Domain Services
//!
//! Pure functions shared by the assembly pipeline: hashing, fingerprint
//! derivation, deterministic module addresses and static call encoding.
//! Deterministic and free of side effects.

use crate::domain::value_objects::{Address, Bytes, FunctionFingerprint, Hash, U256};
use sha3::{Digest, Keccak256};

// =============================================================================
// KECCAK256 UTILITY
// =============================================================================

/// Computes keccak256 hash of data.
#[must_use]
pub fn keccak256(data: &[u8]) -> Hash {
    let hash = Keccak256::digest(data);
    Hash::new(hash.into())
}

/// First four bytes of the Keccak-256 digest of a canonical signature.
///
/// The input is hashed verbatim; callers pass canonical text produced by
/// [`FunctionSignature::canonical`](crate::domain::FunctionSignature::canonical).
#[must_use]
pub fn compute_fingerprint(canonical_signature: &str) -> FunctionFingerprint {
    let digest = Keccak256::digest(canonical_signature.as_bytes());
    let mut bytes = [0u8; FunctionFingerprint::LEN];
    bytes.copy_from_slice(&digest[..FunctionFingerprint::LEN]);
    FunctionFingerprint::new(bytes)
}

// =============================================================================
// MODULE ADDRESS COMPUTATION
// =============================================================================

/// Address a module receives when `deployer` creates it with `nonce`.
///
/// Address = keccak256(rlp(\[deployer, nonce\]))\[12:\]
#[must_use]
pub fn compute_module_address(deployer: Address, nonce: u64) -> Address {
    let mut content = Vec::with_capacity(32);

    // 20-byte string header (0x80 + 20)
    content.push(0x94);
    content.extend_from_slice(deployer.as_bytes());

    if nonce == 0 {
        content.push(0x80);
    } else if nonce < 128 {
        content.push(nonce as u8);
    } else {
        let nonce_bytes = trim_leading_zeros(nonce);
        content.push(0x80 + nonce_bytes.len() as u8);
        content.extend_from_slice(&nonce_bytes);
    }

    // Content never reaches 56 bytes, so the short list header always applies.
    let mut rlp_data = Vec::with_capacity(content.len() + 1);
    rlp_data.push(0xc0 + content.len() as u8);
    rlp_data.extend_from_slice(&content);

    let hash = Keccak256::digest(&rlp_data);
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&hash[12..32]);
    Address::new(addr)
}

fn trim_leading_zeros(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(7);
    bytes[start..].to_vec()
}

// =============================================================================
// STATIC CALL ENCODING
// =============================================================================

/// Left-pads an address into a 32-byte word.
#[must_use]
pub fn address_word(address: Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address.as_bytes());
    word
}

/// Big-endian 32-byte word for an unsigned integer.
#[must_use]
pub fn uint_word(value: U256) -> [u8; 32] {
    let mut word = [0u8; 32];
    value.to_big_endian(&mut word);
    word
}

/// Fingerprint followed by each 32-byte word.
#[must_use]
pub fn encode_call(fingerprint: FunctionFingerprint, words: &[[u8; 32]]) -> Bytes {
    let mut out = Vec::with_capacity(FunctionFingerprint::LEN + words.len() * 32);
    out.extend_from_slice(fingerprint.as_bytes());
    for word in words {
        out.extend_from_slice(word);
    }
    Bytes::from(out)
}

/// Splits an encoded call back into its fingerprint and argument words.
///
/// Returns `None` when the payload is shorter than a fingerprint or the
/// argument section is not a whole number of words.
#[must_use]
pub fn decode_call(payload: &[u8]) -> Option<(FunctionFingerprint, Vec<[u8; 32]>)> {
    if payload.len() < FunctionFingerprint::LEN {
        return None;
    }
    let (head, body) = payload.split_at(FunctionFingerprint::LEN);
    if body.len() % 32 != 0 {
        return None;
    }
    let mut fp = [0u8; FunctionFingerprint::LEN];
    fp.copy_from_slice(head);
    let words = body
        .chunks_exact(32)
        .map(|chunk| {
            let mut word = [0u8; 32];
            word.copy_from_slice(chunk);
            word
        })
        .collect();
    Some((FunctionFingerprint::new(fp), words))
}

// =============================================================================
// TESTS
// =============================================================================
