//! # Cryptographic Primitives for NOVA
//!
//! This module is the foundation of everything security-related in the swarm.
//! Every signed message and every derived address flows through here.
//!
//! We deliberately chose boring, well-audited cryptography:
//!
//! - **Ed25519** for signatures — fast, deterministic, and nobody has broken it.
//! - **BLAKE3** for hashing — because we live in the future.
//!
//! ## A note on "rolling your own crypto"
//!
//! We don't. Everything here is a thin, type-safe wrapper around audited
//! implementations. If you're tempted to optimize these functions, please
//! reconsider. Then reconsider again. Then go read about timing attacks
//! and come back when you've lost the urge.

pub mod hash;
pub mod keys;

// Re-export the things people actually need so they don't have to memorize
// our module hierarchy. Life's too short for five levels of `use` statements.
pub use hash::{blake3_hash, blake3_hash_multi, blake3_hash_vec, domain_separated_hash};
pub use keys::{NovaKeypair, NovaPublicKey, NovaSignature};
