//! # Derived Address
//!
//! A short, fixed-length identifier derived from a participant's public key.
//! Peers in the swarm exchange full public keys (they need them to verify
//! signatures), but logging and diagnostics want something shorter than a
//! 64-character hex string — this is that.

use crate::config::ADDRESS_LENGTH;
use crate::crypto::domain_separated_hash;
use crate::identity::keypair::NovaPublicKey;
use std::fmt;

/// A 20-byte address derived from a public key.
///
/// Derivation is `domain_separated_hash("nova-address", pubkey_bytes)`,
/// truncated to [`ADDRESS_LENGTH`] bytes. Domain separation keeps this hash
/// from colliding with any other BLAKE3 use in the protocol (message content
/// hashes, in particular) even for identical input bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address([u8; ADDRESS_LENGTH]);

impl Address {
    /// Derive the address for a given public key.
    pub fn from_public_key(public_key: &NovaPublicKey) -> Self {
        let digest = domain_separated_hash("nova-address", public_key.as_bytes());
        let mut bytes = [0u8; ADDRESS_LENGTH];
        bytes.copy_from_slice(&digest[..ADDRESS_LENGTH]);
        Self(bytes)
    }

    /// Raw address bytes.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }

    /// Hex-encoded representation, the form used in logs and CLI output.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::keypair::NovaKeypair;

    #[test]
    fn derivation_is_deterministic() {
        let kp = NovaKeypair::generate();
        let pk = kp.public_key();
        assert_eq!(Address::from_public_key(&pk), Address::from_public_key(&pk));
    }

    #[test]
    fn different_keys_give_different_addresses() {
        let a = NovaKeypair::generate().public_key();
        let b = NovaKeypair::generate().public_key();
        assert_ne!(Address::from_public_key(&a), Address::from_public_key(&b));
    }

    #[test]
    fn hex_round_trips_length() {
        let kp = NovaKeypair::generate();
        let addr = Address::from_public_key(&kp.public_key());
        assert_eq!(addr.to_hex().len(), ADDRESS_LENGTH * 2);
    }
}
