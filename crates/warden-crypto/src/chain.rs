//! SHA-256 helpers for the audit hash chain.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use warden_types::Hash;

pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Links an entry into a chain: `SHA-256(data || prev)`.
///
/// The first entry of a chain uses [`Hash::GENESIS`] as `prev`.
pub fn chain_hash(prev: &Hash, data: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.update(prev.as_bytes());
    Hash::from_bytes(hasher.finalize().into())
}

/// Constant-time hash comparison.
pub fn hashes_match(a: &Hash, b: &Hash) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_hash_is_deterministic() {
        let a = chain_hash(&Hash::GENESIS, b"entry");
        let b = chain_hash(&Hash::GENESIS, b"entry");
        assert_eq!(a, b);
        assert!(!a.is_genesis());
    }

    #[test]
    fn chain_hash_depends_on_prev() {
        let first = chain_hash(&Hash::GENESIS, b"one");
        let a = chain_hash(&first, b"two");
        let b = chain_hash(&Hash::GENESIS, b"two");
        assert_ne!(a, b);
    }

    #[test]
    fn chain_hash_appends_prev_after_data() {
        let prev = Hash::from_bytes([1u8; 32]);
        let mut input = b"payload".to_vec();
        input.extend_from_slice(prev.as_bytes());
        assert_eq!(chain_hash(&prev, b"payload").as_bytes(), &sha256(&input));
    }

    #[test]
    fn constant_time_comparison() {
        let a = chain_hash(&Hash::GENESIS, b"x");
        assert!(hashes_match(&a, &a));
        assert!(!hashes_match(&a, &a.with_bit_flipped(3)));
    }
}
