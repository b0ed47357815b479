// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # NOVA Protocol — Core Swarm Library
//!
//! This crate is the swarm: the peer-gossip and block/transaction sync
//! engine that keeps a NOVA node's view of the network, and of the chain,
//! converging with everyone else's.
//!
//! It does not implement the blockchain itself. `Block`, `Transaction`, and
//! `Chain` are consumed only through the traits in [`network::chain`] — the
//! concrete ledger, its validation rules, and its wire encoding live outside
//! this crate. This crate's job is membership and delivery, not consensus.
//!
//! ## Architecture
//!
//! - **crypto** — Ed25519 keys and BLAKE3 hashing. Don't roll your own.
//! - **identity** — a keypair plus a derived short address.
//! - **network** — the swarm itself: peer set, gossip, transport, dispatcher,
//!   and chain catch-up.
//! - **config** — protocol constants.

pub mod config;
pub mod crypto;
pub mod identity;
pub mod network;
