//! # Protocol Configuration & Constants
//!
//! Every magic number the swarm needs lives here. If you're hardcoding a
//! constant somewhere else, you're doing it wrong and you owe the team
//! coffee.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// Wire protocol version for P2P messages.
pub const WIRE_PROTOCOL_VERSION: u16 = 1;

// ---------------------------------------------------------------------------
// Cryptographic Parameters
// ---------------------------------------------------------------------------

/// Signing key length in bytes.
pub const SIGNING_KEY_LENGTH: usize = 32;

/// Public (verifying) key length in bytes.
pub const VERIFYING_KEY_LENGTH: usize = 32;

/// Ed25519 signature length. Always 64 bytes.
pub const SIGNATURE_LENGTH: usize = 64;

/// Length of a derived short address, in bytes. See [`crate::identity::address`].
pub const ADDRESS_LENGTH: usize = 20;

// ---------------------------------------------------------------------------
// Swarm timing defaults
// ---------------------------------------------------------------------------
//
// These are the defaults `SwarmConfig` falls back to — see `network::config`.

/// Default dial timeout when connecting to a peer's client endpoint.
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(15);

/// Default interval between `PeerSetDelta` broadcasts.
pub const DEFAULT_DISTRIBUTE_INTERVAL: Duration = Duration::from_millis(1500);

/// Default per-peer timeout for a single delta broadcast send.
pub const DEFAULT_BROADCAST_TIMEOUT: Duration = Duration::from_millis(300);

/// Default poll timeout on the server endpoint's receive loop.
pub const DEFAULT_SERVER_POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Every Nth distribution tick is a full-state refresh.
pub const DEFAULT_FULL_STATE_TICK_PERIOD: u64 = 10;

/// Maximum number of hashes returned by a single `GetBlockHashes` reply.
pub const DEFAULT_MAX_BLOCK_HASHES: usize = 500;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crypto_parameter_sizes() {
        assert_eq!(SIGNING_KEY_LENGTH, 32);
        assert_eq!(VERIFYING_KEY_LENGTH, 32);
        assert_eq!(SIGNATURE_LENGTH, 64);
        assert_eq!(ADDRESS_LENGTH, 20);
    }
}
