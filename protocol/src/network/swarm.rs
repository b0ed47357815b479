//! # Swarm
//!
//! The top-level handle a node builds once at startup: owns the peer set,
//! binds the transport, and drives the gossip ticker and dispatcher for as
//! long as it's running.
//!
//! Shaped after the usual "construct with identity and listen address,
//! `start`/`stop` with an idempotent running flag" node lifecycle.

use crate::identity::keypair::NovaKeypair;
use crate::network::chain::{Block, Chain, Transaction};
use crate::network::config::SwarmConfig;
use crate::network::dispatcher::Dispatcher;
use crate::network::error::{SwarmError, SwarmResult};
use crate::network::message::Message;
use crate::network::peer::Peer;
use crate::network::peerset::PeerSet;
use crate::network::transport::ServerEndpoint;
use chrono::Utc;
use std::marker::PhantomData;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;

fn now_ts() -> i64 {
    Utc::now().timestamp_millis()
}

/// A running (or not-yet-started) swarm instance, generic over the node's
/// concrete block and transaction types.
pub struct Swarm<B, T> {
    peer_set: Arc<PeerSet>,
    local_identity: NovaKeypair,
    listen_url: String,
    config: SwarmConfig,
    server: RwLock<Option<Arc<ServerEndpoint>>>,
    tx_received_tx: broadcast::Sender<()>,
    _marker: PhantomData<(B, T)>,
}

impl<B, T> Swarm<B, T>
where
    B: Block,
    T: Transaction,
{
    /// Construct a swarm with a fresh, empty peer set. Does not bind
    /// anything or start any background task — call [`Swarm::start_async`]
    /// for that.
    pub fn new(local_identity: NovaKeypair, listen_url: String, dial_timeout: Duration) -> Self {
        let mut config = SwarmConfig::default();
        config.dial_timeout = dial_timeout;
        let peer_set = Arc::new(PeerSet::new(local_identity.clone(), listen_url.clone(), config.clone()));
        let (tx_received_tx, _) = broadcast::channel(16);
        Self {
            peer_set,
            local_identity,
            listen_url,
            config,
            server: RwLock::new(None),
            tx_received_tx,
            _marker: PhantomData,
        }
    }

    pub fn local_peer(&self) -> &Peer {
        self.peer_set.local_peer()
    }

    /// The address the server endpoint is actually bound to, once running.
    /// Useful when `listen_url` asked for an ephemeral port (`:0`).
    pub async fn local_addr(&self) -> Option<std::net::SocketAddr> {
        self.server.read().await.as_ref().map(|s| s.local_addr())
    }

    // -----------------------------------------------------------------
    // Peer-set collection passthroughs
    // -----------------------------------------------------------------

    pub async fn contains(&self, peer: &Peer) -> bool {
        self.peer_set.contains(peer).await
    }

    pub async fn count(&self) -> usize {
        self.peer_set.count().await
    }

    pub async fn snapshot(&self) -> Vec<Peer> {
        self.peer_set.snapshot().await
    }

    pub async fn copy_to(&self, out: &mut [Peer], offset: isize) -> SwarmResult<usize> {
        self.peer_set.copy_to(out, offset).await
    }

    pub async fn clear(&self) {
        self.peer_set.clear().await
    }

    pub async fn remove(&self, peer: &Peer) -> bool {
        self.peer_set.remove(peer).await
    }

    /// Add peers, dialing each if the swarm is already running. `ts`
    /// defaults to now when absent.
    pub async fn add_peers_async(&self, peers: Vec<Peer>, ts: Option<i64>) -> Vec<Peer> {
        self.peer_set.add_peers(peers, ts.unwrap_or_else(now_ts)).await
    }

    // -----------------------------------------------------------------
    // Observable signals
    // -----------------------------------------------------------------

    pub fn subscribe_delta_distributed(&self) -> broadcast::Receiver<()> {
        self.peer_set.subscribe_delta_distributed()
    }

    pub fn subscribe_delta_received(&self) -> broadcast::Receiver<()> {
        self.peer_set.subscribe_delta_received()
    }

    pub fn subscribe_tx_received(&self) -> broadcast::Receiver<()> {
        self.tx_received_tx.subscribe()
    }

    // -----------------------------------------------------------------
    // Broadcast helpers
    // -----------------------------------------------------------------

    /// Announce a batch of blocks to every live peer as a `BlockHashes`
    /// frame — the inbound side of catch-up (`network::sync`).
    pub async fn broadcast_blocks(&self, blocks: &[B]) {
        let hashes = blocks.iter().map(|b| b.hash()).collect();
        self.peer_set.broadcast(&Message::BlockHashes { hashes }).await;
    }

    /// Announce a batch of transaction ids to every live peer as a `TxIds`
    /// frame.
    pub async fn broadcast_txs(&self, txs: &[T]) {
        let ids = txs.iter().map(|t| t.id()).collect();
        self.peer_set.broadcast(&Message::TxIds { ids }).await;
    }

    // -----------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------

    /// Bind the server endpoint, (re-)dial every already-known peer, then
    /// run the gossip ticker and dispatcher concurrently until `cancel`
    /// fires. Blocks for the lifetime of the swarm.
    pub async fn start_async<C>(&self, chain: Arc<C>, cancel: CancellationToken) -> SwarmResult<()>
    where
        C: Chain<B, T> + 'static,
    {
        let running = self.peer_set.running_flag();
        if running.swap(true, Ordering::SeqCst) {
            return Err(SwarmError::AlreadyRunning);
        }

        let bound = ServerEndpoint::bind(&self.listen_url, cancel.clone()).await?;
        let server = Arc::new(bound);
        *self.server.write().await = Some(server.clone());

        // Peers added before start weren't dialed (the swarm wasn't
        // running yet); re-add them now so `add_peers` dials and prunes
        // their URL lists.
        let known = self.peer_set.snapshot().await;
        if !known.is_empty() {
            self.peer_set.clear().await;
            self.peer_set.add_peers(known, now_ts()).await;
        }

        let dispatcher = Dispatcher::new(
            self.peer_set.clone(),
            chain,
            self.local_identity.clone(),
            self.config.clone(),
            self.tx_received_tx.clone(),
        );

        tokio::join!(
            dispatcher.run(server, cancel.clone()),
            self.peer_set.run_ticker(cancel),
        );

        Ok(())
    }

    /// Tombstone self, broadcast a farewell delta, and close every client
    /// endpoint and the server endpoint. Calling this more than once, or
    /// before `start_async`, is a harmless no-op.
    pub async fn stop_async(&self) -> SwarmResult<()> {
        let running = self.peer_set.running_flag();
        if !running.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        self.peer_set.shutdown(now_ts()).await?;

        if let Some(server) = self.server.write().await.take() {
            server.close();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::keypair::NovaKeypair;

    #[derive(Clone, Debug)]
    struct TestBlock {
        index: u64,
        hash: [u8; 32],
        previous_hash: [u8; 32],
    }

    impl Block for TestBlock {
        fn index(&self) -> u64 {
            self.index
        }
        fn hash(&self) -> [u8; 32] {
            self.hash
        }
        fn previous_hash(&self) -> [u8; 32] {
            self.previous_hash
        }
        fn encode(&self) -> Vec<u8> {
            bincode::serialize(&(self.index, self.hash, self.previous_hash)).unwrap()
        }
        fn decode(bytes: &[u8]) -> Result<Self, String> {
            let (index, hash, previous_hash) =
                bincode::deserialize(bytes).map_err(|e| e.to_string())?;
            Ok(Self {
                index,
                hash,
                previous_hash,
            })
        }
    }

    #[derive(Clone, Debug)]
    struct TestTx {
        id: [u8; 32],
    }

    impl Transaction for TestTx {
        fn id(&self) -> [u8; 32] {
            self.id
        }
        fn encode(&self) -> Vec<u8> {
            self.id.to_vec()
        }
        fn decode(bytes: &[u8]) -> Result<Self, String> {
            let mut id = [0u8; 32];
            id.copy_from_slice(bytes);
            Ok(Self { id })
        }
    }

    fn swarm(listen: &str) -> Swarm<TestBlock, TestTx> {
        let kp = NovaKeypair::generate();
        Swarm::new(kp, listen.to_string(), Duration::from_millis(200))
    }

    #[tokio::test]
    async fn fresh_swarm_has_no_peers() {
        let s = swarm("tcp://127.0.0.1:0");
        assert_eq!(s.count().await, 0);
        assert!(s.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn stop_before_start_is_a_harmless_noop() {
        let s = swarm("tcp://127.0.0.1:0");
        s.stop_async().await.unwrap();
    }

    #[tokio::test]
    async fn double_start_fails_already_running() {
        use crate::network::chain::BlockLocator;
        use async_trait::async_trait;

        struct EmptyChain;
        #[async_trait]
        impl Chain<TestBlock, TestTx> for EmptyChain {
            async fn index_block_hash(&self, _i: i64) -> Option<[u8; 32]> {
                None
            }
            async fn tip(&self) -> Option<TestBlock> {
                None
            }
            async fn get_block(&self, _hash: &[u8; 32]) -> Option<TestBlock> {
                None
            }
            async fn get_transaction(&self, _id: &[u8; 32]) -> Option<TestTx> {
                None
            }
            async fn find_next_hashes(
                &self,
                _locator: &BlockLocator,
                _stop: Option<[u8; 32]>,
                _max: usize,
            ) -> Vec<[u8; 32]> {
                vec![]
            }
            async fn get_block_locator(&self) -> BlockLocator {
                BlockLocator(vec![])
            }
            async fn append(&self, _block: TestBlock) -> Result<(), String> {
                Ok(())
            }
            async fn delete_after(&self, _hash: &[u8; 32]) -> Result<(), String> {
                Ok(())
            }
            async fn stage_transactions(&self, _txs: Vec<TestTx>) -> Result<(), String> {
                Ok(())
            }
        }

        let s = Arc::new(swarm("tcp://127.0.0.1:0"));
        let chain = Arc::new(EmptyChain);
        let cancel = CancellationToken::new();

        let s2 = s.clone();
        let chain2 = chain.clone();
        let cancel2 = cancel.clone();
        let handle = tokio::spawn(async move { s2.start_async(chain2, cancel2).await });

        // Give the first start_async a moment to flip the running flag.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let err = s.start_async(chain, cancel.clone()).await.unwrap_err();
        assert!(matches!(err, SwarmError::AlreadyRunning));

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }
}
