//! # Dispatcher
//!
//! The server-side receive loop: poll the server endpoint, parse, and spawn
//! an independent task per message so a handler that needs to talk back to
//! the announcer (catch-up, in particular) never blocks the receive loop.
//!
//! Same interval/cancellation-driven shape as the gossip ticker in
//! `network::peerset`, generalized from "tick on a timer" to "poll and
//! dispatch inbound messages".

use crate::identity::keypair::NovaKeypair;
use crate::network::chain::{Block, Chain, Transaction};
use crate::network::config::SwarmConfig;
use crate::network::error::SwarmResult;
use crate::network::message::{Envelope, Message};
use crate::network::peerset::PeerSet;
use crate::network::sync;
use crate::network::transport::{ReplyHandle, ServerEndpoint};
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Routes inbound messages to their handlers. Cheap to clone — everything
/// it owns is already `Arc`'d or small.
pub struct Dispatcher<B, T, C> {
    peer_set: Arc<PeerSet>,
    chain: Arc<C>,
    local_identity: NovaKeypair,
    config: SwarmConfig,
    tx_received_tx: broadcast::Sender<()>,
    _marker: PhantomData<(B, T)>,
}

impl<B, T, C> Clone for Dispatcher<B, T, C> {
    fn clone(&self) -> Self {
        Self {
            peer_set: self.peer_set.clone(),
            chain: self.chain.clone(),
            local_identity: self.local_identity.clone(),
            config: self.config.clone(),
            tx_received_tx: self.tx_received_tx.clone(),
            _marker: PhantomData,
        }
    }
}

impl<B, T, C> Dispatcher<B, T, C>
where
    B: Block,
    T: Transaction,
    C: Chain<B, T> + 'static,
{
    pub fn new(
        peer_set: Arc<PeerSet>,
        chain: Arc<C>,
        local_identity: NovaKeypair,
        config: SwarmConfig,
        tx_received_tx: broadcast::Sender<()>,
    ) -> Self {
        Self {
            peer_set,
            chain,
            local_identity,
            config,
            tx_received_tx,
            _marker: PhantomData,
        }
    }

    /// Run the receive loop until cancelled.
    pub async fn run(self, server: Arc<ServerEndpoint>, cancel: CancellationToken) {
        loop {
            if cancel.is_cancelled() {
                break;
            }
            match server.recv(self.config.server_poll_timeout).await {
                None => continue,
                Some((envelope, reply)) => {
                    let this = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = this.handle(envelope, reply).await {
                            tracing::warn!(error = %e, "handler failed");
                        }
                    });
                }
            }
        }
    }

    async fn handle(&self, envelope: Envelope, reply: ReplyHandle) -> SwarmResult<()> {
        match envelope.message {
            Message::Ping => {
                reply.send(&Message::Pong, &self.local_identity).await?;
            }

            Message::PeerSetDelta(delta) => {
                let Some(sender) = envelope.identity else {
                    tracing::warn!("PeerSetDelta with no recovered identity, dropping");
                    return Ok(());
                };
                self.peer_set.apply_delta(delta, sender).await?;
            }

            Message::GetBlockHashes { locator, stop } => {
                let hashes = self
                    .chain
                    .find_next_hashes(&locator.into(), stop, self.config.max_blocks_per_request)
                    .await;
                reply
                    .send(&Message::BlockHashes { hashes }, &self.local_identity)
                    .await?;
            }

            Message::GetBlocks { hashes } => {
                for hash in hashes {
                    if let Some(block) = self.chain.get_block(&hash).await {
                        reply
                            .send(
                                &Message::Block {
                                    bytes: block.encode(),
                                },
                                &self.local_identity,
                            )
                            .await?;
                    }
                    // Missing hashes are silently skipped.
                }
            }

            Message::GetTxs { ids } => {
                for id in ids {
                    if let Some(tx) = self.chain.get_transaction(&id).await {
                        reply
                            .send(
                                &Message::Tx {
                                    bytes: tx.encode(),
                                },
                                &self.local_identity,
                            )
                            .await?;
                    }
                }
            }

            Message::TxIds { ids } => {
                let Some(sender) = envelope.identity else {
                    tracing::warn!("TxIds with no recovered identity, dropping");
                    return Ok(());
                };
                self.fetch_and_stage_txs(&sender, ids).await?;
            }

            Message::BlockHashes { hashes } => {
                let Some(sender) = envelope.identity else {
                    tracing::warn!("BlockHashes with no recovered identity, dropping");
                    return Ok(());
                };
                sync::catch_up(
                    self.peer_set.as_ref(),
                    self.chain.as_ref(),
                    &self.local_identity,
                    &sender,
                    hashes,
                )
                .await?;
            }

            Message::Pong | Message::Block { .. } | Message::Tx { .. } => {
                // These only ever arrive as replies on a client endpoint's
                // `request`/`request_many`, never unsolicited at the server
                // endpoint. Seeing one here means a codec/dispatcher
                // mismatch — a programming error, not a remote fault — so
                // we abort rather than let the swarm run on in a state we
                // no longer understand.
                tracing::error!(
                    "received a reply-only message variant unsolicited at the server endpoint, aborting"
                );
                std::process::abort();
            }
        }
        Ok(())
    }

    async fn fetch_and_stage_txs(
        &self,
        sender: &crate::identity::keypair::NovaPublicKey,
        ids: Vec<[u8; 32]>,
    ) -> SwarmResult<()> {
        let unknown: Vec<[u8; 32]> = {
            let mut unknown = Vec::new();
            for id in ids {
                if self.chain.get_transaction(&id).await.is_none() {
                    unknown.push(id);
                }
            }
            unknown
        };
        if unknown.is_empty() {
            return Ok(());
        }

        let endpoint = self.peer_set.endpoints().require(sender).await?;
        let expected = unknown.len();
        let request = Message::GetTxs { ids: unknown };
        let replies = endpoint
            .request_many(&request, &self.local_identity, expected)
            .await?;

        let mut txs = Vec::with_capacity(replies.len());
        for reply in replies {
            match reply {
                Message::Tx { bytes } => {
                    let tx = T::decode(&bytes)
                        .map_err(crate::network::error::SwarmError::Chain)?;
                    txs.push(tx);
                }
                other => {
                    return Err(crate::network::error::SwarmError::InvalidMessage(format!(
                        "expected Tx reply, got {other:?}"
                    )))
                }
            }
        }

        self.chain
            .stage_transactions(txs)
            .await
            .map_err(crate::network::error::SwarmError::Chain)?;
        let _ = self.tx_received_tx.send(());
        Ok(())
    }
}
