//! A remote participant in the swarm: identity plus reachable endpoints.

use crate::identity::keypair::NovaPublicKey;
use serde::{Deserialize, Serialize};

/// A peer record: a public key and an ordered, non-empty list of endpoint
/// URLs.
///
/// Equality is `(public_key, urls)`. `PeerSet` itself keys its maps by
/// public key alone (see `network::peerset`) so that pruning a peer's URL
/// list in place never requires a remap — this struct only needs to carry
/// both fields for delta encoding and for equality comparisons elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Peer {
    public_key: NovaPublicKey,
    urls: Vec<String>,
}

impl Peer {
    /// Build a peer from a public key and a non-empty URL list.
    ///
    /// Panics if `urls` is empty — every peer must have at least one
    /// reachable endpoint.
    pub fn new(public_key: NovaPublicKey, urls: Vec<String>) -> Self {
        assert!(!urls.is_empty(), "a peer must have at least one URL");
        Self { public_key, urls }
    }

    pub fn public_key(&self) -> &NovaPublicKey {
        &self.public_key
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    /// The URL a live client endpoint should currently be using: the first
    /// in the list after dialing has pruned it down to `[live, ...later]`.
    pub fn primary_url(&self) -> &str {
        &self.urls[0]
    }

    /// Replace the URL list, e.g. after dialing prunes unreachable
    /// prefixes. This is the only mutation a `Peer` ever undergoes.
    pub fn with_urls(mut self, urls: Vec<String>) -> Self {
        assert!(!urls.is_empty(), "a peer must have at least one URL");
        self.urls = urls;
        self
    }
}

impl PartialEq for Peer {
    fn eq(&self, other: &Self) -> bool {
        self.public_key == other.public_key && self.urls == other.urls
    }
}

impl Eq for Peer {}
