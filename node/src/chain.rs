//! # Demo Chain
//!
//! A minimal in-memory `Block`/`Transaction`/`Chain` implementation so this
//! binary has something concrete to hand the swarm. A real deployment
//! swaps this module out for its own ledger, validation rules, and wire
//! encoding — the swarm never looks past the `nova_protocol::network::chain`
//! trait boundary.
//!
//! Grounded in the `MemChain`/`TestBlock`/`TestTx` test doubles in
//! `nova_protocol::network::sync` and `::swarm`, promoted from a test
//! fixture to something that actually produces blocks over time.

use nova_protocol::network::{Block, BlockLocator, Chain, Transaction};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// A block holding nothing but a handful of opaque transaction ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoBlock {
    index: u64,
    hash: [u8; 32],
    previous_hash: [u8; 32],
    tx_ids: Vec<[u8; 32]>,
}

impl DemoBlock {
    fn next(previous: &DemoBlock, tx_ids: Vec<[u8; 32]>) -> Self {
        let index = previous.index + 1;
        let hash = block_hash(index, &previous.hash, &tx_ids);
        Self {
            index,
            hash,
            previous_hash: previous.hash,
            tx_ids,
        }
    }

    fn genesis() -> Self {
        let hash = block_hash(0, &[0u8; 32], &[]);
        Self {
            index: 0,
            hash,
            previous_hash: [0u8; 32],
            tx_ids: Vec::new(),
        }
    }
}

fn block_hash(index: u64, previous_hash: &[u8; 32], tx_ids: &[[u8; 32]]) -> [u8; 32] {
    let mut buf = Vec::with_capacity(8 + 32 + tx_ids.len() * 32);
    buf.extend_from_slice(&index.to_le_bytes());
    buf.extend_from_slice(previous_hash);
    for id in tx_ids {
        buf.extend_from_slice(id);
    }
    *blake3::hash(&buf).as_bytes()
}

impl Block for DemoBlock {
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
        bincode::serialize(self).expect("DemoBlock encoding is infallible")
    }

    fn decode(bytes: &[u8]) -> Result<Self, String> {
        bincode::deserialize(bytes).map_err(|e| e.to_string())
    }
}

/// A transaction carrying an opaque payload — the demo doesn't interpret
/// transaction contents at all, just moves bytes around.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoTx {
    id: [u8; 32],
    payload: Vec<u8>,
}

impl DemoTx {
    pub fn new(payload: Vec<u8>) -> Self {
        let id = *blake3::hash(&payload).as_bytes();
        Self { id, payload }
    }
}

impl Transaction for DemoTx {
    fn id(&self) -> [u8; 32] {
        self.id
    }

    fn encode(&self) -> Vec<u8> {
        bincode::serialize(self).expect("DemoTx encoding is infallible")
    }

    fn decode(bytes: &[u8]) -> Result<Self, String> {
        bincode::deserialize(bytes).map_err(|e| e.to_string())
    }
}

/// An in-memory chain: a `Vec<DemoBlock>` plus a staged-transaction pool,
/// both behind one `tokio::sync::RwLock`.
pub struct DemoChain {
    inner: RwLock<Inner>,
}

struct Inner {
    blocks: Vec<DemoBlock>,
    staged: Vec<DemoTx>,
}

impl DemoChain {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                blocks: vec![DemoBlock::genesis()],
                staged: Vec::new(),
            }),
        }
    }

    /// Cuts a new block out of whatever transactions are currently staged.
    /// Called on a timer by `main`'s block-production task.
    pub async fn produce_block(&self) -> DemoBlock {
        let mut inner = self.inner.write().await;
        let tip = inner.blocks.last().expect("genesis is never removed").clone();
        let tx_ids = inner.staged.drain(..).map(|tx| tx.id()).collect();
        let block = DemoBlock::next(&tip, tx_ids);
        inner.blocks.push(block.clone());
        block
    }

    pub async fn height(&self) -> u64 {
        self.inner.read().await.blocks.last().map(|b| b.index).unwrap_or(0)
    }
}

impl Default for DemoChain {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Chain<DemoBlock, DemoTx> for DemoChain {
    async fn index_block_hash(&self, i: i64) -> Option<[u8; 32]> {
        let inner = self.inner.read().await;
        if i == -1 {
            inner.blocks.last().map(|b| b.hash)
        } else {
            inner.blocks.get(i as usize).map(|b| b.hash)
        }
    }

    async fn tip(&self) -> Option<DemoBlock> {
        self.inner.read().await.blocks.last().cloned()
    }

    async fn get_block(&self, hash: &[u8; 32]) -> Option<DemoBlock> {
        self.inner.read().await.blocks.iter().find(|b| &b.hash == hash).cloned()
    }

    async fn get_transaction(&self, id: &[u8; 32]) -> Option<DemoTx> {
        self.inner.read().await.staged.iter().find(|t| &t.id == id).cloned()
    }

    async fn find_next_hashes(
        &self,
        locator: &BlockLocator,
        stop: Option<[u8; 32]>,
        max: usize,
    ) -> Vec<[u8; 32]> {
        let inner = self.inner.read().await;
        let start = locator
            .0
            .iter()
            .filter_map(|h| inner.blocks.iter().position(|b| &b.hash == h))
            .max()
            .unwrap_or(0);

        let mut out = Vec::new();
        for block in inner.blocks.iter().skip(start) {
            out.push(block.hash);
            if out.len() >= max || Some(block.hash) == stop {
                break;
            }
        }
        out
    }

    async fn get_block_locator(&self) -> BlockLocator {
        BlockLocator(self.inner.read().await.blocks.iter().map(|b| b.hash).collect())
    }

    async fn append(&self, block: DemoBlock) -> Result<(), String> {
        let mut inner = self.inner.write().await;
        let tip_hash = inner.blocks.last().map(|b| b.hash).unwrap_or([0u8; 32]);
        if block.previous_hash != tip_hash {
            return Err(format!(
                "block {} does not connect to current tip",
                block.index
            ));
        }
        inner.blocks.push(block);
        Ok(())
    }

    async fn delete_after(&self, hash: &[u8; 32]) -> Result<(), String> {
        let mut inner = self.inner.write().await;
        match inner.blocks.iter().position(|b| &b.hash == hash) {
            Some(pos) => {
                inner.blocks.truncate(pos + 1);
                Ok(())
            }
            None => Err("hash not found in chain".to_string()),
        }
    }

    async fn stage_transactions(&self, txs: Vec<DemoTx>) -> Result<(), String> {
        let mut inner = self.inner.write().await;
        for tx in txs {
            if !inner.staged.iter().any(|t| t.id == tx.id) {
                inner.staged.push(tx);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn genesis_is_block_zero() {
        let chain = DemoChain::new();
        let tip = chain.tip().await.unwrap();
        assert_eq!(tip.index(), 0);
        assert_eq!(tip.previous_hash(), [0u8; 32]);
    }

    #[tokio::test]
    async fn produce_block_advances_height_and_links_to_tip() {
        let chain = DemoChain::new();
        let genesis_hash = chain.tip().await.unwrap().hash();
        let b1 = chain.produce_block().await;
        assert_eq!(b1.index(), 1);
        assert_eq!(b1.previous_hash(), genesis_hash);
        assert_eq!(chain.height().await, 1);
    }

    #[tokio::test]
    async fn append_rejects_blocks_with_wrong_parent() {
        let chain = DemoChain::new();
        let bogus = DemoBlock {
            index: 1,
            hash: [9u8; 32],
            previous_hash: [7u8; 32],
            tx_ids: vec![],
        };
        assert!(chain.append(bogus).await.is_err());
    }

    #[tokio::test]
    async fn staged_transactions_are_deduplicated_by_id() {
        let chain = DemoChain::new();
        let tx = DemoTx::new(b"hello".to_vec());
        chain.stage_transactions(vec![tx.clone(), tx.clone()]).await.unwrap();
        let produced = chain.produce_block().await;
        assert_eq!(produced.tx_ids.len(), 1);
    }

    #[tokio::test]
    async fn produce_block_drains_staged_transactions() {
        let chain = DemoChain::new();
        chain
            .stage_transactions(vec![DemoTx::new(b"a".to_vec()), DemoTx::new(b"b".to_vec())])
            .await
            .unwrap();
        let block = chain.produce_block().await;
        assert_eq!(block.tx_ids.len(), 2);
        assert!(chain.get_transaction(&block.tx_ids[0]).await.is_none());
    }

    #[tokio::test]
    async fn block_roundtrips_through_encode_decode() {
        let chain = DemoChain::new();
        let block = chain.produce_block().await;
        let bytes = block.encode();
        let decoded = DemoBlock::decode(&bytes).unwrap();
        assert_eq!(decoded.hash(), block.hash());
        assert_eq!(decoded.index(), block.index());
    }
}
