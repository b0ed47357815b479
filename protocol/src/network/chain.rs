//! External chain interface.
//!
//! The swarm never inspects block or transaction payload semantics, never
//! validates consensus rules, and never encodes blocks to bytes itself —
//! all of that lives outside this crate. These traits are the entire
//! surface the swarm depends on; a real node wires in its own concrete
//! chain, block, and transaction types here.

use async_trait::async_trait;

/// A block as the swarm sees it: just enough to drive catch-up.
pub trait Block: Send + Sync + 'static {
    /// Height in the chain. Genesis is `0`.
    fn index(&self) -> u64;

    /// This block's canonical hash.
    fn hash(&self) -> [u8; 32];

    /// The hash of the block that precedes this one.
    fn previous_hash(&self) -> [u8; 32];

    /// Canonical wire encoding, opaque to the swarm.
    fn encode(&self) -> Vec<u8>;

    /// Decode a block from its canonical wire encoding.
    fn decode(bytes: &[u8]) -> Result<Self, String>
    where
        Self: Sized;
}

/// A transaction as the swarm sees it.
pub trait Transaction: Send + Sync + 'static {
    /// The transaction's canonical id.
    fn id(&self) -> [u8; 32];

    /// Canonical wire encoding, opaque to the swarm.
    fn encode(&self) -> Vec<u8>;

    /// Decode a transaction from its canonical wire encoding.
    fn decode(bytes: &[u8]) -> Result<Self, String>
    where
        Self: Sized;
}

/// A compact description of a chain's shape, sufficient for a peer to find
/// a branch point. Opaque to the swarm beyond round-tripping it.
#[derive(Debug, Clone)]
pub struct BlockLocator(pub Vec<[u8; 32]>);

/// The external collaborator the swarm pulls missing history from and
/// stages incoming transactions into.
///
/// `B` and `T` are the concrete block/transaction types a node provides;
/// the swarm is generic over them and never constructs one itself except
/// via `Block::decode`/`Transaction::decode`.
#[async_trait]
pub trait Chain<B: Block, T: Transaction>: Send + Sync {
    /// The hash at chain index `i`, or `None` if out of range. `i == -1`
    /// means "the tip".
    async fn index_block_hash(&self, i: i64) -> Option<[u8; 32]>;

    /// The current tip block, if the chain is non-empty.
    async fn tip(&self) -> Option<B>;

    /// Look up a block by hash.
    async fn get_block(&self, hash: &[u8; 32]) -> Option<B>;

    /// Look up a transaction by id (staged or confirmed).
    async fn get_transaction(&self, id: &[u8; 32]) -> Option<T>;

    /// Hashes following `locator` up to `stop` (inclusive), capped at `max`.
    /// The first returned hash anchors at the common ancestor between the
    /// caller's locator and this chain.
    async fn find_next_hashes(
        &self,
        locator: &BlockLocator,
        stop: Option<[u8; 32]>,
        max: usize,
    ) -> Vec<[u8; 32]>;

    /// A locator describing this chain's current shape.
    async fn get_block_locator(&self) -> BlockLocator;

    /// Append a block to the tip. May fail with a chain-level validation
    /// error (bad parent linkage, invalid transactions, etc).
    async fn append(&self, block: B) -> Result<(), String>;

    /// Truncate the chain, discarding `hash` and everything after it.
    async fn delete_after(&self, hash: &[u8; 32]) -> Result<(), String>;

    /// Stage transactions that arrived via gossip but are not yet in a
    /// block.
    async fn stage_transactions(&self, txs: Vec<T>) -> Result<(), String>;
}
