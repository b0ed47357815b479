//! # Message Codec
//!
//! Frames a typed message into a signed multi-part envelope and parses
//! envelopes back, recovering the sender's identity from the signature.
//!
//! Wire form is an ordered sequence of byte frames:
//!
//! 1. Optional routing prefix — present on server-received frames, carrying
//!    the recovered sender address; absent when we parse our own requests'
//!    replies on a client endpoint.
//! 2. Single-byte type tag.
//! 3. One payload frame (bincode-encoded body; empty for `Ping`/`Pong`).
//! 4. Signature frame, covering frames 2 and 3, produced with the sender's
//!    private key.
//!
//! We don't use a routing-prefix frame on the wire the way a ROUTER socket
//! would inject one automatically — our transport (`network::transport`)
//! recovers the sender identity from the signature itself and attaches it
//! out of band. So "frame 1" only ever exists as the `Identity` field on
//! [`Envelope`], never as bytes on the wire.

use crate::crypto::blake3_hash_multi;
use crate::identity::keypair::{NovaKeypair, NovaPublicKey, NovaSignature};
use crate::network::chain::BlockLocator;
use crate::network::error::SwarmError;
use crate::network::peer::Peer;
use serde::{Deserialize, Serialize};

/// The sender's address, recovered from a valid signature on a frame
/// received at the server endpoint. Absent on replies read back on a
/// client endpoint (the peer we dialed is already known to us).
pub type Identity = Option<NovaPublicKey>;

/// A `PeerSetDelta` payload: one gossip round's worth of membership change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerSetDelta {
    pub sender: Peer,
    pub timestamp: i64,
    pub added: Vec<Peer>,
    pub removed: Vec<Peer>,
    pub existing: Option<Vec<Peer>>,
}

/// The closed set of message variants the swarm speaks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Message {
    Ping,
    Pong,
    PeerSetDelta(PeerSetDelta),
    GetBlockHashes {
        locator: SerializedLocator,
        stop: Option<[u8; 32]>,
    },
    BlockHashes {
        hashes: Vec<[u8; 32]>,
    },
    GetBlocks {
        hashes: Vec<[u8; 32]>,
    },
    Block {
        bytes: Vec<u8>,
    },
    GetTxs {
        ids: Vec<[u8; 32]>,
    },
    Tx {
        bytes: Vec<u8>,
    },
    /// Announces transaction ids the sender has that the receiver may not —
    /// the transaction-side counterpart to `BlockHashes`.
    TxIds {
        ids: Vec<[u8; 32]>,
    },
}

/// [`BlockLocator`] isn't `Serialize` itself (it's an external-interface
/// type); this is its wire form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializedLocator(pub Vec<[u8; 32]>);

impl From<BlockLocator> for SerializedLocator {
    fn from(l: BlockLocator) -> Self {
        SerializedLocator(l.0)
    }
}

impl From<SerializedLocator> for BlockLocator {
    fn from(l: SerializedLocator) -> Self {
        BlockLocator(l.0)
    }
}

impl Message {
    fn type_tag(&self) -> u8 {
        match self {
            Message::Ping => 0,
            Message::Pong => 1,
            Message::PeerSetDelta(_) => 2,
            Message::GetBlockHashes { .. } => 3,
            Message::BlockHashes { .. } => 4,
            Message::GetBlocks { .. } => 5,
            Message::Block { .. } => 6,
            Message::GetTxs { .. } => 7,
            Message::Tx { .. } => 8,
            Message::TxIds { .. } => 9,
        }
    }

    /// Local invariant check for the variants that have one, e.g. rejecting
    /// an empty hash/id list on the request and announcement variants.
    fn check_invariants(&self) -> Result<(), SwarmError> {
        match self {
            Message::GetBlockHashes { locator, .. } if locator.0.is_empty() => Err(
                SwarmError::InvalidMessage("GetBlockHashes with empty locator".into()),
            ),
            Message::BlockHashes { hashes } if hashes.is_empty() => Err(
                SwarmError::InvalidMessage("BlockHashes with empty hash list".into()),
            ),
            Message::GetBlocks { hashes } if hashes.is_empty() => Err(SwarmError::InvalidMessage(
                "GetBlocks with empty hash list".into(),
            )),
            Message::TxIds { ids } if ids.is_empty() => Err(SwarmError::InvalidMessage(
                "TxIds with empty id list".into(),
            )),
            Message::GetTxs { ids } if ids.is_empty() => Err(SwarmError::InvalidMessage(
                "GetTxs with empty id list".into(),
            )),
            _ => Ok(()),
        }
    }
}

/// A fully signed, parsed message. The `identity` field is populated by the
/// server endpoint and left `None` for replies read on a client endpoint.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub message: Message,
    pub identity: Identity,
}

/// Encode and sign `message`, producing the bytes to write to a socket.
///
/// Layout on the wire: `[tag: 1 byte][payload_len: 4 bytes BE][payload]
/// [sender public key: 32 bytes][sig: 64 bytes]`. The public key frame is
/// what lets the receiver recover the sender's identity without an
/// out-of-band hint — the signature proves the sender holds the matching
/// private key. `network::transport` wraps this again in its own outer
/// frame length for stream framing.
pub fn encode(message: &Message, signer: &NovaKeypair) -> Result<Vec<u8>, SwarmError> {
    let tag = message.type_tag();
    let payload = bincode::serialize(message)
        .map_err(|e| SwarmError::InvalidMessage(format!("encode failure: {e}")))?;

    let signing_input = signing_bytes(tag, &payload);
    let signature = signer.sign(&signing_input);

    let mut out = Vec::with_capacity(1 + 4 + payload.len() + 32 + 64);
    out.push(tag);
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(&payload);
    out.extend_from_slice(signer.public_key().as_bytes());
    out.extend_from_slice(signature.as_bytes());
    Ok(out)
}

/// Decode and verify a frame produced by [`encode`], recovering the
/// sender's public key from the embedded identity frame.
///
/// Fails with `InvalidMessage` if the signature doesn't verify, the type
/// tag is unknown, the payload arity is wrong, or a field fails its local
/// invariant.
pub fn decode(bytes: &[u8]) -> Result<(Message, NovaPublicKey), SwarmError> {
    if bytes.len() < 1 + 4 + 32 + 64 {
        return Err(SwarmError::InvalidMessage("frame too short".into()));
    }

    let tag = bytes[0];
    let payload_len = u32::from_be_bytes(bytes[1..5].try_into().unwrap()) as usize;
    let payload_end = 5 + payload_len;
    let key_end = payload_end + 32;
    if bytes.len() != key_end + 64 {
        return Err(SwarmError::InvalidMessage(
            "frame length does not match payload_len + key + signature".into(),
        ));
    }

    let payload = &bytes[5..payload_end];
    let key_bytes: [u8; 32] = bytes[payload_end..key_end]
        .try_into()
        .map_err(|_| SwarmError::InvalidMessage("malformed identity frame".into()))?;
    let sender = NovaPublicKey::try_from_slice(&key_bytes)
        .map_err(|_| SwarmError::InvalidMessage("invalid sender public key".into()))?;

    let sig_arr: [u8; 64] = bytes[key_end..]
        .try_into()
        .map_err(|_| SwarmError::InvalidMessage("malformed signature frame".into()))?;
    let signature = NovaSignature::from_bytes(sig_arr);

    let signing_input = signing_bytes(tag, payload);
    if !sender.verify(&signing_input, &signature) {
        return Err(SwarmError::InvalidMessage(
            "signature verification failed".into(),
        ));
    }

    if tag > 9 {
        return Err(SwarmError::InvalidMessage(format!("unknown type tag {tag}")));
    }

    let message: Message = bincode::deserialize(payload)
        .map_err(|e| SwarmError::InvalidMessage(format!("decode failure: {e}")))?;

    if message.type_tag() != tag {
        return Err(SwarmError::InvalidMessage(
            "type tag does not match payload variant".into(),
        ));
    }

    message.check_invariants()?;
    Ok((message, sender))
}

/// The bytes that get signed: everything after the routing prefix, i.e. the
/// tag and payload frames. Hashed first so the signature input has a fixed
/// shape regardless of payload size.
fn signing_bytes(tag: u8, payload: &[u8]) -> [u8; 32] {
    blake3_hash_multi(&[&[tag], payload])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::keypair::NovaKeypair;

    #[test]
    fn ping_round_trips() {
        let kp = NovaKeypair::generate();
        let bytes = encode(&Message::Ping, &kp).unwrap();
        let (decoded, sender) = decode(&bytes).unwrap();
        assert!(matches!(decoded, Message::Ping));
        assert_eq!(sender, kp.public_key());
    }

    #[test]
    fn block_hashes_round_trips() {
        let kp = NovaKeypair::generate();
        let msg = Message::BlockHashes {
            hashes: vec![[1u8; 32], [2u8; 32]],
        };
        let bytes = encode(&msg, &kp).unwrap();
        let (decoded, _) = decode(&bytes).unwrap();
        match decoded {
            Message::BlockHashes { hashes } => assert_eq!(hashes.len(), 2),
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn tampered_payload_fails_verification() {
        let kp = NovaKeypair::generate();
        let msg = Message::BlockHashes {
            hashes: vec![[1u8; 32]],
        };
        let mut bytes = encode(&msg, &kp).unwrap();
        // Index 5 is the first payload byte — inside the BlockHashes body.
        bytes[5] ^= 0xFF;
        let err = decode(&bytes).unwrap_err();
        assert!(matches!(err, SwarmError::InvalidMessage(_)));
    }

    #[test]
    fn tampered_identity_fails_verification() {
        let kp = NovaKeypair::generate();
        let other = NovaKeypair::generate();
        let mut bytes = encode(&Message::Ping, &kp).unwrap();
        let sig_start = bytes.len() - 64;
        let key_start = sig_start - 32;
        bytes[key_start..sig_start].copy_from_slice(other.public_key().as_bytes());
        let err = decode(&bytes).unwrap_err();
        assert!(matches!(err, SwarmError::InvalidMessage(_)));
    }

    #[test]
    fn empty_block_hashes_rejected() {
        let kp = NovaKeypair::generate();
        let msg = Message::BlockHashes { hashes: vec![] };
        let bytes = encode(&msg, &kp).unwrap();
        let err = decode(&bytes).unwrap_err();
        assert!(matches!(err, SwarmError::InvalidMessage(_)));
    }

    #[test]
    fn truncated_frame_rejected() {
        let kp = NovaKeypair::generate();
        let bytes = encode(&Message::Ping, &kp).unwrap();
        let err = decode(&bytes[..bytes.len() - 10]).unwrap_err();
        assert!(matches!(err, SwarmError::InvalidMessage(_)));
    }
}
