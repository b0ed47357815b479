//! Error kinds for the swarm.
//!
//! Codec and gossip faults are recovered at the dispatcher; catch-up and
//! chain faults bubble to the caller of `start`. A fatal unexpected message
//! variant is treated as a programming error and aborts the handling task,
//! not the whole process — this crate is a library, never the binary.

use std::fmt;
use thiserror::Error;

/// Everything that can go wrong in the swarm.
#[derive(Debug, Error)]
pub enum SwarmError {
    /// Codec failure: bad signature, unknown tag, wrong payload arity, or a
    /// field that fails its local invariant.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Transport send/receive/connect failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// All URLs of a peer failed to dial.
    #[error("peer unreachable: {0}")]
    Unreachable(PeerAddress),

    /// A handler needed the client endpoint of a peer it doesn't have.
    #[error("peer not found: {0}")]
    PeerNotFound(PeerAddress),

    /// `start` was called while the swarm was already running.
    #[error("swarm is already running")]
    AlreadyRunning,

    /// An operation that requires a bound server endpoint was called while
    /// not running.
    #[error("swarm is not started")]
    NotStarted,

    /// `copy_to` was called with an offset before, or past the end of, the
    /// destination slice.
    #[error("offset {0} is out of range")]
    RangeError(isize),

    /// `copy_to`'s destination slice was too short to hold the collection.
    #[error("destination slice too short: need {needed}, have {available}")]
    ArgError { needed: usize, available: usize },

    /// An error bubbled up from the external chain implementation.
    #[error("chain error: {0}")]
    Chain(String),

    /// The operation was cancelled.
    #[error("operation cancelled")]
    Cancelled,
}

/// A peer's public key, printed as hex for error messages and logs.
///
/// This is deliberately not `identity::keypair::NovaPublicKey` — errors want
/// a cheap, `Copy`-free display value, not the full key API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerAddress(pub String);

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub type SwarmResult<T> = Result<T, SwarmError>;
