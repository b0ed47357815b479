//! # Identity Module
//!
//! Every participant in the swarm is identified by an Ed25519 keypair, from
//! which we derive a short [`address::Address`] for logging and diagnostics.
//!
//! The identity stack is intentionally thin:
//!
//! 1. **Keypair** — raw Ed25519 key material. Signs things, proves ownership.
//! 2. **Address** — a BLAKE3-derived short identifier for display purposes.
//!    The wire protocol always exchanges full public keys; the address is
//!    never used for peer lookup or message routing.
//!
//! ## Design Decisions
//!
//! - Ed25519 was chosen for its speed, small key/signature sizes, and
//!   resistance to timing side-channels. We use the `ed25519-dalek` crate
//!   (RFC 8032 compliant).

pub mod address;
pub mod keypair;

pub use address::Address;
pub use keypair::{NovaKeypair, NovaPublicKey, NovaSignature};
