//! Swarm tunables.
//!
//! One `Default`-implementing struct collects every knob; literal defaults
//! are documented at the point of use rather than here.

use crate::config::{
    DEFAULT_BROADCAST_TIMEOUT, DEFAULT_DIAL_TIMEOUT, DEFAULT_DISTRIBUTE_INTERVAL,
    DEFAULT_FULL_STATE_TICK_PERIOD, DEFAULT_MAX_BLOCK_HASHES, DEFAULT_SERVER_POLL_TIMEOUT,
};
use std::time::Duration;

/// Tunable parameters for one [`crate::network::swarm::Swarm`] instance.
#[derive(Debug, Clone)]
pub struct SwarmConfig {
    /// Time to wait for a `Pong` reply while dialing a peer's URL list.
    pub dial_timeout: Duration,

    /// Interval between `PeerSetDelta` broadcasts.
    pub distribute_interval: Duration,

    /// Per-peer timeout for a single delta broadcast send.
    pub broadcast_timeout: Duration,

    /// Poll timeout on the server endpoint's receive loop.
    pub server_poll_timeout: Duration,

    /// Every Nth distribution tick is a full-state refresh instead of a
    /// delta-only one.
    pub full_state_tick_period: u64,

    /// Maximum hashes returned by a single `GetBlockHashes` reply.
    pub max_blocks_per_request: usize,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
            distribute_interval: DEFAULT_DISTRIBUTE_INTERVAL,
            broadcast_timeout: DEFAULT_BROADCAST_TIMEOUT,
            server_poll_timeout: DEFAULT_SERVER_POLL_TIMEOUT,
            full_state_tick_period: DEFAULT_FULL_STATE_TICK_PERIOD,
            max_blocks_per_request: DEFAULT_MAX_BLOCK_HASHES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_literals() {
        let cfg = SwarmConfig::default();
        assert_eq!(cfg.dial_timeout, Duration::from_secs(15));
        assert_eq!(cfg.distribute_interval, Duration::from_millis(1500));
        assert_eq!(cfg.broadcast_timeout, Duration::from_millis(300));
        assert_eq!(cfg.server_poll_timeout, Duration::from_millis(100));
        assert_eq!(cfg.full_state_tick_period, 10);
        assert_eq!(cfg.max_blocks_per_request, 500);
    }
}
