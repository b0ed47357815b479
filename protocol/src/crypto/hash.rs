//! # Hashing Utilities
//!
//! The swarm only ever needs one hash function. We support it and refuse
//! to support more without a very good reason:
//!
//! - **BLAKE3** — fast on every platform, parallelizable, and provably
//!   secure under standard assumptions. Used for message content hashes
//!   and the derived short address in [`crate::identity::address`].

/// Compute the BLAKE3 hash of the input data.
///
/// Returns a 32-byte digest as a fixed-size array. Uses the `blake3` crate,
/// which automatically takes advantage of SIMD instructions on supported
/// platforms.
///
/// # Example
///
/// ```
/// use nova_protocol::crypto::blake3_hash;
///
/// let hash = blake3_hash(b"NOVA protocol");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// Compute BLAKE3 and return the digest as a `Vec<u8>`.
///
/// Use [`blake3_hash`] when you want a fixed-size array. This variant
/// exists for call sites that need owned data (e.g. storing hashes in a
/// `HashMap<Vec<u8>, _>` or passing to APIs that want `Vec<u8>`).
pub fn blake3_hash_vec(data: &[u8]) -> Vec<u8> {
    blake3::hash(data).as_bytes().to_vec()
}

/// Hash multiple byte slices together without concatenation overhead.
///
/// Instead of allocating a buffer to concatenate inputs, we feed them
/// sequentially into the hasher. Same result, less allocation. Used to
/// hash a message's frames together without first joining them.
pub fn blake3_hash_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}

/// Compute a domain-separated hash using BLAKE3 with a context string.
///
/// Domain separation prevents hash collisions across different protocol
/// contexts — `domain_separated_hash("nova-address", data)` and
/// `domain_separated_hash("nova-msg-id", data)` never collide even for the
/// same `data`. Uses BLAKE3's `derive_key` mode rather than prepending a
/// tag by hand.
pub fn domain_separated_hash(context: &str, data: &[u8]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(context);
    hasher.update(data);
    *hasher.finalize().as_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blake3_deterministic() {
        let a = blake3_hash(b"nova");
        let b = blake3_hash(b"nova");
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn test_blake3_different_inputs() {
        let a = blake3_hash(b"nova");
        let b = blake3_hash(b"Nova"); // case sensitive!
        assert_ne!(a, b);
    }

    #[test]
    fn test_domain_separation() {
        let data = b"same data";
        let hash_a = domain_separated_hash("context-a", data);
        let hash_b = domain_separated_hash("context-b", data);
        assert_ne!(hash_a, hash_b);
    }

    #[test]
    fn test_domain_separated_is_not_plain_blake3() {
        let data = b"test data";
        let plain = blake3_hash(data);
        let separated = domain_separated_hash("nova-test", data);
        assert_ne!(plain, separated);
    }

    #[test]
    fn test_blake3_hash_multi() {
        // Hashing parts separately via update() should equal hashing them
        // concatenated.
        let part1 = b"hello";
        let part2 = b" world";

        let multi = blake3_hash_multi(&[part1, part2]);
        let single = blake3_hash(b"hello world");
        assert_eq!(multi, single);
    }

    #[test]
    fn test_blake3_hash_vec_matches_array() {
        let data = b"consistency check";
        let arr = blake3_hash(data);
        let vec = blake3_hash_vec(data);
        assert_eq!(arr.as_slice(), vec.as_slice());
    }
}
