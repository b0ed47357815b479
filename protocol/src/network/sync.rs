//! # Catch-up
//!
//! Reconciles the local chain with an announced remote one, possibly
//! through a reorg, on receiving a `BlockHashes` announcement.
//!
//! Overall shape is fetch, then validate-and-apply against the locator the
//! remote chain reports; `network::dispatcher` is the only caller, on the
//! `BlockHashes` branch of its handler match.

use crate::identity::keypair::{NovaKeypair, NovaPublicKey};
use crate::network::chain::{Block, Chain, Transaction};
use crate::network::error::{SwarmError, SwarmResult};
use crate::network::message::Message;
use crate::network::peerset::PeerSet;
use crate::network::transport::ClientEndpoint;
use std::future::Future;
use std::pin::Pin;

/// Entry point from the dispatcher: look up the announcer's client
/// endpoint and run catch-up against it.
pub async fn catch_up<B, T, C>(
    peer_set: &PeerSet,
    chain: &C,
    local_identity: &NovaKeypair,
    sender: &NovaPublicKey,
    hashes: Vec<[u8; 32]>,
) -> SwarmResult<()>
where
    B: Block,
    T: Transaction,
    C: Chain<B, T>,
{
    let endpoint = peer_set.endpoints().require(sender).await?;
    run::<B, T, C>(&endpoint, chain, local_identity, hashes).await
}

/// The recursive catch-up algorithm. Boxed because async fns can't
/// recurse directly.
fn run<'a, B, T, C>(
    endpoint: &'a ClientEndpoint,
    chain: &'a C,
    local_identity: &'a NovaKeypair,
    hashes: Vec<[u8; 32]>,
) -> Pin<Box<dyn Future<Output = SwarmResult<()>> + Send + 'a>>
where
    B: Block,
    T: Transaction,
    C: Chain<B, T>,
{
    Box::pin(async move {
        let blocks = get_blocks::<B>(endpoint, local_identity, &hashes).await?;
        let oldest = blocks
            .first()
            .ok_or_else(|| SwarmError::InvalidMessage("catch-up got zero blocks".into()))?;
        let latest = blocks
            .last()
            .ok_or_else(|| SwarmError::InvalidMessage("catch-up got zero blocks".into()))?;

        match chain.tip().await {
            None => {
                // Case A — append, an empty chain accepts anything.
                append_all(chain, blocks).await
            }
            Some(tip) => {
                if oldest.previous_hash() == tip.hash() {
                    // Case A — append, the batch connects to our tip.
                    append_all(chain, blocks).await
                } else if latest.index() > tip.index() {
                    // Case B — the announced branch is longer than ours;
                    // find where it diverges and reorg onto it.
                    let locator = chain.get_block_locator().await;
                    let branch_hashes = request_block_hashes(
                        endpoint,
                        local_identity,
                        locator,
                        Some(oldest.hash()),
                    )
                    .await?;
                    let branch_point = branch_hashes.first().copied().ok_or_else(|| {
                        SwarmError::InvalidMessage("peer returned no branch point".into())
                    })?;

                    chain
                        .delete_after(&branch_point)
                        .await
                        .map_err(SwarmError::Chain)?;

                    let after_branch: Vec<[u8; 32]> = branch_hashes.into_iter().skip(1).collect();
                    if !after_branch.is_empty() {
                        let fetched =
                            get_blocks::<B>(endpoint, local_identity, &after_branch).await?;
                        append_all(chain, fetched).await?;
                    }

                    // Re-enter with the original announcement; its prefix
                    // should now connect to our (reorged) tip.
                    run::<B, T, C>(endpoint, chain, local_identity, hashes).await
                } else {
                    // Case C — stale, the announcement is not longer than
                    // our current chain. Ignore it.
                    Ok(())
                }
            }
        }
    })
}

async fn append_all<B, T, C>(chain: &C, blocks: Vec<B>) -> SwarmResult<()>
where
    B: Block,
    T: Transaction,
    C: Chain<B, T>,
{
    for block in blocks {
        chain.append(block).await.map_err(SwarmError::Chain)?;
    }
    Ok(())
}

/// Issue `GetBlocks` and expect exactly `hashes.len()` `Block` replies, in
/// order.
async fn get_blocks<B: Block>(
    endpoint: &ClientEndpoint,
    signer: &NovaKeypair,
    hashes: &[[u8; 32]],
) -> SwarmResult<Vec<B>> {
    let request = Message::GetBlocks {
        hashes: hashes.to_vec(),
    };
    let replies = endpoint
        .request_many(&request, signer, hashes.len())
        .await?;

    replies
        .into_iter()
        .map(|reply| match reply {
            Message::Block { bytes } => B::decode(&bytes).map_err(SwarmError::Chain),
            other => Err(SwarmError::InvalidMessage(format!(
                "expected Block reply, got {other:?}"
            ))),
        })
        .collect()
}

/// Issue `GetBlockHashes` and expect a single `BlockHashes` reply.
async fn request_block_hashes(
    endpoint: &ClientEndpoint,
    signer: &NovaKeypair,
    locator: crate::network::chain::BlockLocator,
    stop: Option<[u8; 32]>,
) -> SwarmResult<Vec<[u8; 32]>> {
    let request = Message::GetBlockHashes {
        locator: locator.into(),
        stop,
    };
    match endpoint.request(&request, signer).await? {
        Message::BlockHashes { hashes } => Ok(hashes),
        other => Err(SwarmError::InvalidMessage(format!(
            "expected BlockHashes reply, got {other:?}"
        ))),
    }
}
