// Path: crates/networking/src/traits.rs

//! Gossip and peer-set trait definitions.

use async_trait::async_trait;
use libp2p::PeerId;

/// An error type for gossip operations.
#[derive(thiserror::Error, Debug)]
pub enum NetworkError {
    #[error("network error: {0}")]
    Network(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("internal error: {0}")]
    Internal(String),
}

/// Access to the set of currently connected peers.
pub trait PeerSet: Send + Sync {
    /// The peers currently known to the swarm.
    fn known_peers(&self) -> Vec<PeerId>;

    /// The local node's peer id.
    fn local_peer_id(&self) -> PeerId;
}

/// Publishes push notes on their gossip channel.
///
/// Implementations must deliver the bytes unmodified: the canonical note
/// encoding is consensus-critical.
#[async_trait]
pub trait PushGossip: Send + Sync {
    /// Sends canonical note bytes to a single peer.
    async fn send_note(&self, peer: PeerId, bytes: Vec<u8>) -> Result<(), NetworkError>;
}

/// Publishes endorsements on their gossip channel.
#[async_trait]
pub trait EndorsementGossip: Send + Sync {
    /// Sends canonical endorsement bytes to a single peer.
    async fn send_endorsement(&self, peer: PeerId, bytes: Vec<u8>) -> Result<(), NetworkError>;
}
