//! # Peer Set & Gossip Engine
//!
//! Owns the live peer table, the tombstone (removed-peer) table, the
//! per-sender last-seen-timestamp table, and the pool of client endpoints
//! those peers are reachable through. Gossip deltas flow through here in
//! both directions: built and broadcast on a timer, and applied as they
//! arrive at the dispatcher.
//!
//! The peer table sits behind a lock; `add_peer`/`remove_peer` return only
//! the peers that actually changed. The ticker loop is driven by a
//! cancellation token, the same shape as every other cancellable loop in
//! this crate, generalized here to the swarm's full delta semantics.

use crate::identity::keypair::{NovaKeypair, NovaPublicKey};
use crate::network::config::SwarmConfig;
use crate::network::error::{PeerAddress, SwarmError, SwarmResult};
use crate::network::message::{Message, PeerSetDelta};
use crate::network::peer::Peer;
use crate::network::transport::{ClientEndpoint, ClientEndpoints};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex as AsyncMutex, RwLock};
use tokio_util::sync::CancellationToken;

fn now_ts() -> i64 {
    Utc::now().timestamp_millis()
}

type PubkeyBytes = [u8; 32];

struct LiveEntry {
    peer: Peer,
    since: i64,
}

struct Tombstone {
    peer: Peer,
    removed_at: i64,
}

/// The peer table, gossip engine, and client endpoint pool for one swarm.
pub struct PeerSet {
    local_identity: NovaKeypair,
    local_peer: Peer,
    config: SwarmConfig,
    running: Arc<AtomicBool>,

    live: RwLock<HashMap<PubkeyBytes, LiveEntry>>,
    tombstones: RwLock<HashMap<PubkeyBytes, Tombstone>>,
    last_seen: RwLock<HashMap<PubkeyBytes, i64>>,
    endpoints: ClientEndpoints,

    last_distributed: RwLock<i64>,
    last_received: RwLock<i64>,
    tick_counter: AtomicU64,

    receive_lock: AsyncMutex<()>,
    distribute_lock: AsyncMutex<()>,

    delta_distributed_tx: broadcast::Sender<()>,
    delta_received_tx: broadcast::Sender<()>,
}

impl PeerSet {
    pub fn new(local_identity: NovaKeypair, listen_url: String, config: SwarmConfig) -> Self {
        let local_peer = Peer::new(local_identity.public_key(), vec![listen_url]);
        let (delta_distributed_tx, _) = broadcast::channel(16);
        let (delta_received_tx, _) = broadcast::channel(16);
        Self {
            local_identity,
            local_peer,
            config,
            running: Arc::new(AtomicBool::new(false)),
            live: RwLock::new(HashMap::new()),
            tombstones: RwLock::new(HashMap::new()),
            last_seen: RwLock::new(HashMap::new()),
            endpoints: ClientEndpoints::new(),
            last_distributed: RwLock::new(0),
            last_received: RwLock::new(0),
            tick_counter: AtomicU64::new(0),
            receive_lock: AsyncMutex::new(()),
            distribute_lock: AsyncMutex::new(()),
            delta_distributed_tx,
            delta_received_tx,
        }
    }

    pub fn local_peer(&self) -> &Peer {
        &self.local_peer
    }

    pub(crate) fn running_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    pub(crate) fn endpoints(&self) -> &ClientEndpoints {
        &self.endpoints
    }

    pub fn subscribe_delta_distributed(&self) -> broadcast::Receiver<()> {
        self.delta_distributed_tx.subscribe()
    }

    pub fn subscribe_delta_received(&self) -> broadcast::Receiver<()> {
        self.delta_received_tx.subscribe()
    }

    fn is_local(&self, key: &NovaPublicKey) -> bool {
        *key == self.local_identity.public_key()
    }

    // -----------------------------------------------------------------
    // Collection-style operations
    // -----------------------------------------------------------------

    /// Membership test by full peer equality (pubkey + urls).
    pub async fn contains(&self, peer: &Peer) -> bool {
        self.live
            .read()
            .await
            .get(peer.public_key().as_bytes())
            .map(|e| &e.peer == peer)
            .unwrap_or(false)
    }

    pub async fn count(&self) -> usize {
        self.live.read().await.len()
    }

    /// Snapshot the live set as an ordered `Vec`. Order is insertion order
    /// of the underlying map's iterator, which is not guaranteed to be
    /// stable across calls — callers needing a stable ordering should sort.
    pub async fn snapshot(&self) -> Vec<Peer> {
        self.live.read().await.values().map(|e| e.peer.clone()).collect()
    }

    /// Copy up to `out.len()` peers, skipping the first `offset`. `out` is a
    /// caller-owned slice and can't be null, so only `RangeError`/`ArgError`
    /// are live here.
    pub async fn copy_to(&self, out: &mut [Peer], offset: isize) -> SwarmResult<usize> {
        if offset < 0 {
            return Err(SwarmError::RangeError(offset));
        }
        let offset = offset as usize;
        let snapshot = self.snapshot().await;
        if offset > snapshot.len() {
            return Err(SwarmError::RangeError(offset as isize));
        }
        let available = snapshot.len() - offset;
        if out.len() < available {
            return Err(SwarmError::ArgError {
                needed: available,
                available: out.len(),
            });
        }
        for (slot, peer) in out.iter_mut().zip(snapshot.into_iter().skip(offset)) {
            *slot = peer;
        }
        Ok(available)
    }

    /// Drop every live peer and close every client endpoint. Does not touch
    /// tombstones.
    pub async fn clear(&self) {
        self.live.write().await.clear();
        self.endpoints.clear().await;
    }

    /// Unconditionally drop `peer` from the live set, keyed by public key
    /// alone — a stale, un-pruned URL list on `peer` must not prevent
    /// eviction. Closes its client endpoint, if any, to preserve the
    /// invariant that a client endpoint exists for a peer iff it's live,
    /// and records a tombstone so the removal gossips out on the next
    /// delta.
    pub async fn remove(&self, peer: &Peer) -> bool {
        let removed_entry = self.live.write().await.remove(peer.public_key().as_bytes());
        let Some(entry) = removed_entry else {
            return false;
        };
        self.endpoints.remove(peer.public_key()).await;
        self.tombstones.write().await.insert(
            *peer.public_key().as_bytes(),
            Tombstone {
                peer: entry.peer,
                removed_at: now_ts(),
            },
        );
        true
    }

    // -----------------------------------------------------------------
    // Dialing
    // -----------------------------------------------------------------

    /// Walk `peer`'s URL list, dialing each in order until one answers a
    /// `Ping` with a `Pong` within the configured dial timeout. Returns the
    /// peer with its URL list pruned to `[live, ...later]` and the
    /// endpoint that answered.
    async fn dial(&self, peer: &Peer) -> SwarmResult<(Peer, ClientEndpoint)> {
        let urls = peer.urls();
        for (i, url) in urls.iter().enumerate() {
            let attempt = tokio::time::timeout(self.config.dial_timeout, async {
                let endpoint = ClientEndpoint::connect(url).await?;
                let reply = endpoint
                    .request(&Message::Ping, &self.local_identity)
                    .await?;
                match reply {
                    Message::Pong => Ok(endpoint),
                    _ => Err(SwarmError::InvalidMessage(
                        "expected Pong in reply to dial Ping".into(),
                    )),
                }
            })
            .await;

            match attempt {
                Ok(Ok(endpoint)) => {
                    let pruned = peer.clone().with_urls(urls[i..].to_vec());
                    return Ok((pruned, endpoint));
                }
                Ok(Err(e)) => {
                    tracing::debug!(%url, error = %e, "dial attempt failed, trying next URL");
                }
                Err(_) => {
                    tracing::debug!(%url, "dial attempt timed out, trying next URL");
                }
            }
        }
        Err(SwarmError::Unreachable(PeerAddress(peer.public_key().to_hex())))
    }

    // -----------------------------------------------------------------
    // Gossip engine
    // -----------------------------------------------------------------

    /// Add peers to the live set, dialing each one if the swarm is
    /// running. Peers that fail to dial are skipped, not errored — the
    /// caller gets back only the peers actually added.
    pub async fn add_peers(&self, peers: Vec<Peer>, ts: i64) -> Vec<Peer> {
        let mut added = Vec::new();
        for peer in peers {
            {
                let mut tombstones = self.tombstones.write().await;
                tombstones.remove(peer.public_key().as_bytes());
            }

            if self.is_local(peer.public_key()) {
                continue;
            }
            if self.live.read().await.contains_key(peer.public_key().as_bytes()) {
                continue;
            }

            let final_peer = if self.running.load(Ordering::SeqCst) {
                match self.dial(&peer).await {
                    Ok((pruned, endpoint)) => {
                        self.endpoints.insert(pruned.public_key(), endpoint).await;
                        pruned
                    }
                    Err(e) => {
                        tracing::warn!(peer = %peer.public_key(), error = %e, "skipping unreachable peer");
                        continue;
                    }
                }
            } else {
                peer
            };

            self.live.write().await.insert(
                *final_peer.public_key().as_bytes(),
                LiveEntry {
                    peer: final_peer.clone(),
                    since: ts,
                },
            );
            added.push(final_peer);
        }
        added
    }

    /// Build and broadcast a `PeerSetDelta` if there's anything to say, or
    /// if this is a full-state tick. Returns whether a broadcast was sent.
    pub async fn distribute_delta(&self, force_full_state: bool) -> SwarmResult<bool> {
        let _guard = self.distribute_lock.lock().await;
        let now = now_ts();
        let last_distributed = *self.last_distributed.read().await;

        let tick = self.tick_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let full_state =
            force_full_state || tick % self.config.full_state_tick_period == 0;

        let live = self.live.read().await;
        let added: Vec<Peer> = live
            .values()
            .filter(|e| e.since > last_distributed && e.since <= now)
            .map(|e| e.peer.clone())
            .collect();
        let added_keys: std::collections::HashSet<PubkeyBytes> =
            added.iter().map(|p| *p.public_key().as_bytes()).collect();

        let existing = if full_state {
            Some(
                live.values()
                    .filter(|e| !added_keys.contains(e.peer.public_key().as_bytes()))
                    .map(|e| e.peer.clone())
                    .collect(),
            )
        } else {
            None
        };
        drop(live);

        let removed = {
            let mut tombstones = self.tombstones.write().await;
            let due: Vec<PubkeyBytes> = tombstones
                .iter()
                .filter(|(_, t)| t.removed_at <= now)
                .map(|(k, _)| *k)
                .collect();
            due.iter()
                .filter_map(|k| tombstones.remove(k))
                .map(|t| t.peer)
                .collect::<Vec<_>>()
        };

        if added.is_empty() && removed.is_empty() && !full_state {
            return Ok(false);
        }

        *self.last_distributed.write().await = now;

        let delta = PeerSetDelta {
            sender: self.local_peer.clone(),
            timestamp: now,
            added,
            removed,
            existing,
        };
        self.send_to_all(&Message::PeerSetDelta(delta)).await;

        let _ = self.delta_distributed_tx.send(());
        Ok(true)
    }

    /// Send `message` to every live peer's client endpoint, each bounded by
    /// the broadcast timeout. Failures are logged and swallowed, same as
    /// delta distribution — a broadcast is best-effort, not a barrier.
    async fn send_to_all(&self, message: &Message) {
        let keys: Vec<NovaPublicKey> = {
            let live = self.live.read().await;
            live.values().map(|e| e.peer.public_key().clone()).collect()
        };
        for key in keys {
            let Some(endpoint) = self.endpoints.get(&key).await else {
                continue;
            };
            let send = tokio::time::timeout(
                self.config.broadcast_timeout,
                endpoint.send(message, &self.local_identity),
            )
            .await;
            match send {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(peer = %key, error = %e, "broadcast send failed"),
                Err(_) => tracing::warn!(peer = %key, "broadcast send timed out"),
            }
        }
    }

    /// Announce `message` (a `BlockHashes` or `TxIds` frame) to every live
    /// peer. Used by `network::swarm::Swarm::broadcast_blocks`/
    /// `broadcast_txs` — distinct from delta distribution, which has its
    /// own framing and bookkeeping.
    pub async fn broadcast(&self, message: &Message) {
        self.send_to_all(message).await;
    }

    /// Tombstone ourselves, broadcast a farewell delta (removed-only, no
    /// `existing`), then close every client endpoint.
    pub async fn shutdown(&self, now: i64) -> SwarmResult<()> {
        self.tombstones.write().await.insert(
            *self.local_identity.public_key().as_bytes(),
            Tombstone {
                peer: self.local_peer.clone(),
                removed_at: now,
            },
        );
        self.distribute_delta(false).await?;
        self.endpoints.clear().await;
        self.live.write().await.clear();
        Ok(())
    }

    /// Apply an inbound `PeerSetDelta` from `sender`. Serialized by the
    /// receive lock so deltas apply in arrival order.
    pub async fn apply_delta(&self, mut delta: PeerSetDelta, sender: NovaPublicKey) -> SwarmResult<()> {
        let first_encounter = {
            let _guard = self.receive_lock.lock().await;

            let is_known = self.live.read().await.contains_key(sender.as_bytes());
            let first_encounter = !is_known && !self.is_local(&sender);
            if first_encounter && !delta.added.iter().any(|p| p.public_key() == &sender) {
                delta.added.push(delta.sender.clone());
            }

            for removed_peer in &delta.removed {
                if self.is_local(removed_peer.public_key()) {
                    self.tombstones.write().await.insert(
                        *self.local_identity.public_key().as_bytes(),
                        Tombstone {
                            peer: removed_peer.clone(),
                            removed_at: delta.timestamp,
                        },
                    );
                } else {
                    self.remove(removed_peer).await;
                }
            }

            let tombstoned: std::collections::HashSet<PubkeyBytes> =
                self.tombstones.read().await.keys().copied().collect();

            let mut working_set = delta.added.clone();
            if let Some(existing) = &delta.existing {
                working_set.extend(
                    existing
                        .iter()
                        .filter(|p| !tombstoned.contains(p.public_key().as_bytes()))
                        .cloned(),
                );
            }

            self.add_peers(working_set, delta.timestamp).await;

            *self.last_received.write().await = delta.timestamp;
            self.last_seen
                .write()
                .await
                .insert(*sender.as_bytes(), delta.timestamp);

            first_encounter
        };

        if first_encounter {
            self.distribute_delta(true).await?;
        }

        let _ = self.delta_received_tx.send(());
        Ok(())
    }

    pub async fn last_distributed(&self) -> i64 {
        *self.last_distributed.read().await
    }

    pub async fn last_received(&self) -> i64 {
        *self.last_received.read().await
    }

    /// Run the gossip ticker until `cancel` fires: every
    /// `config.distribute_interval`, distribute a delta.
    pub async fn run_ticker(&self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.distribute_interval);
        interval.tick().await; // first tick fires immediately; consume it
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    if let Err(e) = self.distribute_delta(false).await {
                        tracing::warn!(error = %e, "gossip tick failed");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::config::SwarmConfig;

    fn peer_set(listen: &str) -> (PeerSet, NovaKeypair) {
        let kp = NovaKeypair::generate();
        let set = PeerSet::new(kp.clone(), listen.to_string(), SwarmConfig::default());
        (set, kp)
    }

    fn peer_with(url: &str) -> (Peer, NovaKeypair) {
        let kp = NovaKeypair::generate();
        (Peer::new(kp.public_key(), vec![url.to_string()]), kp)
    }

    #[tokio::test]
    async fn add_peers_skips_local_identity() {
        let (set, local_kp) = peer_set("tcp://127.0.0.1:1");
        let self_peer = Peer::new(local_kp.public_key(), vec!["tcp://127.0.0.1:1".into()]);
        let added = set.add_peers(vec![self_peer], now_ts()).await;
        assert!(added.is_empty());
        assert_eq!(set.count().await, 0);
    }

    #[tokio::test]
    async fn add_peers_without_running_skips_dial() {
        let (set, _kp) = peer_set("tcp://127.0.0.1:1");
        let (peer, _) = peer_with("tcp://127.0.0.1:9");
        let added = set.add_peers(vec![peer], now_ts()).await;
        assert_eq!(added.len(), 1);
        assert_eq!(set.count().await, 1);
    }

    #[tokio::test]
    async fn remove_drops_peer_and_is_idempotent() {
        let (set, _kp) = peer_set("tcp://127.0.0.1:1");
        let (peer, _) = peer_with("tcp://127.0.0.1:9");
        set.add_peers(vec![peer.clone()], now_ts()).await;
        assert!(set.remove(&peer).await);
        assert_eq!(set.count().await, 0);
        assert!(!set.remove(&peer).await);
    }

    #[tokio::test]
    async fn copy_to_rejects_negative_offset() {
        let (set, _kp) = peer_set("tcp://127.0.0.1:1");
        let mut out = vec![];
        let err = set.copy_to(&mut out, -1).await.unwrap_err();
        assert!(matches!(err, SwarmError::RangeError(-1)));
    }

    #[tokio::test]
    async fn copy_to_rejects_short_destination() {
        let (set, _kp) = peer_set("tcp://127.0.0.1:1");
        let (peer, _) = peer_with("tcp://127.0.0.1:9");
        set.add_peers(vec![peer], now_ts()).await;
        let mut out: Vec<Peer> = vec![];
        let err = set.copy_to(&mut out, 0).await.unwrap_err();
        assert!(matches!(err, SwarmError::ArgError { .. }));
    }

    #[tokio::test]
    async fn distribute_with_nothing_to_say_is_a_noop() {
        let (set, _kp) = peer_set("tcp://127.0.0.1:1");
        for _ in 0..9 {
            let sent = set.distribute_delta(false).await.unwrap();
            assert!(!sent);
        }
    }

    #[tokio::test]
    async fn tenth_tick_is_a_full_state_refresh_even_when_empty() {
        let (set, _kp) = peer_set("tcp://127.0.0.1:1");
        for _ in 0..9 {
            set.distribute_delta(false).await.unwrap();
        }
        let sent = set.distribute_delta(false).await.unwrap();
        assert!(sent, "the 10th tick must distribute a full-state delta");
    }
}
