//! # Network Module
//!
//! The swarm: a membership-gossip and block/transaction synchronization
//! engine running over an asymmetric request/reply transport.
//!
//! ## Architecture
//!
//! ```text
//! error.rs      — SwarmError, SwarmResult
//! config.rs     — SwarmConfig tunables
//! peer.rs       — Peer record (identity + endpoint urls)
//! chain.rs      — external Block/Transaction/Chain interfaces
//! message.rs    — signed message codec
//! transport.rs  — server endpoint + client endpoint pool over TCP
//! peerset.rs    — peer table and gossip engine
//! dispatcher.rs — inbound message receive loop and handler matrix
//! sync.rs       — catch-up (chain reconciliation from an announcement)
//! swarm.rs      — top-level lifecycle and public API
//! ```
//!
//! ## Design Decisions
//!
//! - The live peer table is keyed by public key, not by the `(pubkey, urls)`
//!   pair identity equality would suggest — see `network::peerset` and
//!   `DESIGN.md`. This avoids remapping the table every time dialing prunes
//!   a peer's URL list.
//! - The receive and distribute gossip locks are acquired in one fixed
//!   order (receive, then distribute) everywhere; never the reverse.
//! - The dispatcher spawns one task per inbound message so a handler that
//!   talks back to the sender (catch-up) never blocks the receive loop.

pub mod chain;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod message;
pub mod peer;
pub mod peerset;
pub mod sync;
pub mod swarm;
pub mod transport;

pub use chain::{Block, BlockLocator, Chain, Transaction};
pub use config::SwarmConfig;
pub use dispatcher::Dispatcher;
pub use error::{PeerAddress, SwarmError, SwarmResult};
pub use message::{decode, encode, Envelope, Identity, Message, PeerSetDelta};
pub use peer::Peer;
pub use peerset::PeerSet;
pub use swarm::Swarm;
pub use transport::{ClientEndpoint, ClientEndpoints, ReplyHandle, ServerEndpoint};
