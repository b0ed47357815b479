//! # Transport
//!
//! Two socket roles, built on raw Tokio TCP rather than a message-queue
//! library — there's no ROUTER/DEALER crate in this stack, just the bare
//! `TcpListener`/`TcpStream` primitives.
//!
//! - [`ServerEndpoint`] accepts connections from any peer and funnels
//!   decoded, signature-verified messages into a single receive queue,
//!   while preserving a reply path back to whichever connection a message
//!   arrived on.
//! - [`ClientEndpoint`] is one persistent duplex stream to one peer, used
//!   serially so request/reply correlation never has to guess.

use crate::identity::keypair::{NovaKeypair, NovaPublicKey};
use crate::network::error::{PeerAddress, SwarmError, SwarmResult};
use crate::network::message::{self, Envelope, Message};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

/// Parse a `tcp://host:port` listen/dial URL into a socket address string
/// `tokio::net` can resolve.
fn strip_scheme(url: &str) -> SwarmResult<&str> {
    url.strip_prefix("tcp://")
        .ok_or_else(|| SwarmError::InvalidMessage(format!("unsupported URL scheme: {url}")))
}

const LENGTH_PREFIX_BYTES: usize = 4;
const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

async fn write_frame(writer: &mut OwnedWriteHalf, frame: &[u8]) -> SwarmResult<()> {
    writer.write_all(&(frame.len() as u32).to_be_bytes()).await?;
    writer.write_all(frame).await?;
    writer.flush().await?;
    Ok(())
}

async fn read_frame(reader: &mut BufReader<OwnedReadHalf>) -> SwarmResult<Option<Vec<u8>>> {
    let mut len_buf = [0u8; LENGTH_PREFIX_BYTES];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_BYTES {
        return Err(SwarmError::InvalidMessage(format!(
            "frame of {len} bytes exceeds the {MAX_FRAME_BYTES} byte cap"
        )));
    }
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(Some(buf))
}

/// A handle back to whichever connection a received message arrived on, so
/// a handler can reply without knowing anything about the transport.
#[derive(Clone)]
pub struct ReplyHandle {
    writer: Arc<Mutex<OwnedWriteHalf>>,
}

impl ReplyHandle {
    pub async fn send(&self, message: &Message, signer: &NovaKeypair) -> SwarmResult<()> {
        let frame = message::encode(message, signer)?;
        let mut writer = self.writer.lock().await;
        write_frame(&mut writer, &frame).await
    }
}

/// The single bound inbound socket. Accepts connections from any peer and
/// yields parsed, verified messages with a reply path.
pub struct ServerEndpoint {
    inbound_rx: Mutex<mpsc::Receiver<(Envelope, ReplyHandle)>>,
    local_addr: std::net::SocketAddr,
    cancel: CancellationToken,
}

impl ServerEndpoint {
    /// Bind to `url` (`tcp://host:port`) and start accepting connections in
    /// the background. `cancel` stops both the accept loop and every
    /// per-connection read loop it has spawned.
    pub async fn bind(url: &str, cancel: CancellationToken) -> SwarmResult<Self> {
        let addr = strip_scheme(url)?;
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let (tx, rx) = mpsc::channel(256);

        let accept_cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = accept_cancel.cancelled() => {
                        tracing::debug!("server endpoint accept loop cancelled");
                        break;
                    }
                    accepted = listener.accept() => {
                        match accepted {
                            Ok((stream, peer_addr)) => {
                                tracing::debug!(%peer_addr, "accepted inbound connection");
                                let tx = tx.clone();
                                let conn_cancel = accept_cancel.clone();
                                tokio::spawn(handle_connection(stream, tx, conn_cancel));
                            }
                            Err(e) => tracing::warn!(error = %e, "accept failed"),
                        }
                    }
                }
            }
        });

        Ok(Self {
            inbound_rx: Mutex::new(rx),
            local_addr,
            cancel,
        })
    }

    pub fn local_addr(&self) -> std::net::SocketAddr {
        self.local_addr
    }

    /// Poll for the next inbound message, bounded by `timeout` so the
    /// dispatcher's receive loop can observe cancellation promptly.
    pub async fn recv(&self, timeout: Duration) -> Option<(Envelope, ReplyHandle)> {
        let mut rx = self.inbound_rx.lock().await;
        tokio::time::timeout(timeout, rx.recv()).await.ok().flatten()
    }

    /// Stop accepting connections and close every connection this endpoint
    /// has accepted.
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

async fn handle_connection(
    stream: TcpStream,
    tx: mpsc::Sender<(Envelope, ReplyHandle)>,
    cancel: CancellationToken,
) {
    let (read_half, write_half) = stream.into_split();
    let reply = ReplyHandle {
        writer: Arc::new(Mutex::new(write_half)),
    };
    let mut reader = BufReader::new(read_half);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            frame = read_frame(&mut reader) => {
                match frame {
                    Ok(None) => break,
                    Ok(Some(bytes)) => match message::decode(&bytes) {
                        Ok((msg, sender)) => {
                            let envelope = Envelope { message: msg, identity: Some(sender) };
                            if tx.send((envelope, reply.clone())).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => tracing::warn!(error = %e, "dropping invalid inbound message"),
                    },
                    Err(e) => {
                        tracing::warn!(error = %e, "connection read error");
                        break;
                    }
                }
            }
        }
    }
}

/// A persistent outbound stream to one peer. Requests and their replies are
/// always read back serially on this same stream — the caller must not
/// interleave concurrent requests on one endpoint.
pub struct ClientEndpoint {
    reader: Mutex<BufReader<OwnedReadHalf>>,
    writer: Mutex<OwnedWriteHalf>,
}

impl ClientEndpoint {
    /// Connect to `url`, failing with `IOError` if the TCP connect itself
    /// fails (dialing's URL walk and timeout live in `network::peerset`).
    pub async fn connect(url: &str) -> SwarmResult<Self> {
        let addr = strip_scheme(url)?;
        let stream = TcpStream::connect(addr).await?;
        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            reader: Mutex::new(BufReader::new(read_half)),
            writer: Mutex::new(write_half),
        })
    }

    /// Send a request and read back exactly one reply.
    pub async fn request(&self, message: &Message, signer: &NovaKeypair) -> SwarmResult<Message> {
        let replies = self.request_many(message, signer, 1).await?;
        replies
            .into_iter()
            .next()
            .ok_or_else(|| SwarmError::InvalidMessage("expected one reply, got none".into()))
    }

    /// Send a request and read back exactly `expected` replies, in order
    /// (used by catch-up's `GetBlocks`/`GetTxs`, which expect a reply per
    /// requested hash/id).
    pub async fn request_many(
        &self,
        message: &Message,
        signer: &NovaKeypair,
        expected: usize,
    ) -> SwarmResult<Vec<Message>> {
        self.send(message, signer).await?;
        let mut reader = self.reader.lock().await;
        let mut replies = Vec::with_capacity(expected);
        for _ in 0..expected {
            match read_frame(&mut reader).await? {
                Some(bytes) => {
                    let (msg, _sender) = message::decode(&bytes)?;
                    replies.push(msg);
                }
                None => {
                    return Err(SwarmError::Io(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "peer closed connection mid-reply",
                    )))
                }
            }
        }
        Ok(replies)
    }

    /// Send a message with no expectation of a reply (gossip broadcasts).
    pub async fn send(&self, message: &Message, signer: &NovaKeypair) -> SwarmResult<()> {
        let frame = message::encode(message, signer)?;
        let mut writer = self.writer.lock().await;
        write_frame(&mut writer, &frame).await
    }
}

/// A pool of client endpoints keyed by peer public key.
///
/// Mutated only from the receive path and from `add`/`remove` — callers
/// elsewhere in the swarm go through `network::peerset`, which owns the
/// discipline of when that's safe.
#[derive(Default)]
pub struct ClientEndpoints {
    inner: Mutex<HashMap<[u8; 32], Arc<ClientEndpoint>>>,
}

impl ClientEndpoints {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &NovaPublicKey) -> Option<Arc<ClientEndpoint>> {
        self.inner.lock().await.get(key.as_bytes()).cloned()
    }

    pub async fn insert(&self, key: &NovaPublicKey, endpoint: ClientEndpoint) -> Arc<ClientEndpoint> {
        let endpoint = Arc::new(endpoint);
        self.inner
            .lock()
            .await
            .insert(*key.as_bytes(), endpoint.clone());
        endpoint
    }

    pub async fn remove(&self, key: &NovaPublicKey) {
        self.inner.lock().await.remove(key.as_bytes());
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn clear(&self) {
        self.inner.lock().await.clear();
    }

    pub async fn require(&self, key: &NovaPublicKey) -> SwarmResult<Arc<ClientEndpoint>> {
        self.get(key)
            .await
            .ok_or_else(|| SwarmError::PeerNotFound(PeerAddress(key.to_hex())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::keypair::NovaKeypair;

    #[tokio::test]
    async fn ping_pong_over_loopback() {
        let cancel = CancellationToken::new();
        let server = ServerEndpoint::bind("tcp://127.0.0.1:0", cancel.clone())
            .await
            .unwrap();
        let addr = server.local_addr();

        let client_key = NovaKeypair::generate();
        let client = ClientEndpoint::connect(&format!("tcp://{addr}")).await.unwrap();

        let server_key = NovaKeypair::generate();
        tokio::spawn(async move {
            let (envelope, reply) = server.recv(Duration::from_secs(5)).await.unwrap();
            assert!(matches!(envelope.message, Message::Ping));
            reply.send(&Message::Pong, &server_key).await.unwrap();
        });

        let reply = client.request(&Message::Ping, &client_key).await.unwrap();
        assert!(matches!(reply, Message::Pong));
        cancel.cancel();
    }

    #[tokio::test]
    async fn request_many_reads_in_order() {
        let cancel = CancellationToken::new();
        let server = ServerEndpoint::bind("tcp://127.0.0.1:0", cancel.clone())
            .await
            .unwrap();
        let addr = server.local_addr();
        let client_key = NovaKeypair::generate();
        let client = ClientEndpoint::connect(&format!("tcp://{addr}")).await.unwrap();

        let server_key = NovaKeypair::generate();
        tokio::spawn(async move {
            let (envelope, reply) = server.recv(Duration::from_secs(5)).await.unwrap();
            let hashes = match envelope.message {
                Message::GetBlocks { hashes } => hashes,
                other => panic!("unexpected: {other:?}"),
            };
            for h in hashes {
                reply
                    .send(&Message::Block { bytes: h.to_vec() }, &server_key)
                    .await
                    .unwrap();
            }
        });

        let req = Message::GetBlocks {
            hashes: vec![[1u8; 32], [2u8; 32], [3u8; 32]],
        };
        let replies = client.request_many(&req, &client_key, 3).await.unwrap();
        assert_eq!(replies.len(), 3);
        match &replies[1] {
            Message::Block { bytes } => assert_eq!(bytes, &[2u8; 32].to_vec()),
            other => panic!("unexpected: {other:?}"),
        }
        cancel.cancel();
    }

    #[tokio::test]
    async fn client_endpoints_pool_tracks_membership() {
        let cancel = CancellationToken::new();
        let server = ServerEndpoint::bind("tcp://127.0.0.1:0", cancel.clone())
            .await
            .unwrap();
        let addr = server.local_addr();
        let pool = ClientEndpoints::new();
        let key = NovaKeypair::generate().public_key();

        let endpoint = ClientEndpoint::connect(&format!("tcp://{addr}")).await.unwrap();
        pool.insert(&key, endpoint).await;
        assert_eq!(pool.len().await, 1);
        assert!(pool.get(&key).await.is_some());

        pool.remove(&key).await;
        assert_eq!(pool.len().await, 0);
        cancel.cancel();
    }
}
