// Overlay host - the peer-to-peer capabilities the relay depends on
//
// The relay needs exactly three things from the network: the peer store, a
// way to dial, and pub/sub (join a topic, broadcast bytes on it).

use async_trait::async_trait;
use libp2p::multiaddr::Protocol;
use libp2p::{Multiaddr, PeerId};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::topic::{ChannelHandle, TopicName};

// ============================================================================
// HOST ERRORS
// ============================================================================

/// Errors reported by the overlay-network host
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("Join rejected: {0}")]
    JoinRejected(String),

    #[error("Dial failed: {0}")]
    DialFailed(String),

    #[error("Broadcast failed: {0}")]
    BroadcastFailed(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Host setup failed: {0}")]
    Setup(String),

    #[error("Host is shut down")]
    Shutdown,
}

impl HostError {
    /// Check if a later retry of the same call could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::JoinRejected(_) | Self::DialFailed(_) | Self::BroadcastFailed(_)
        )
    }
}

// ============================================================================
// PEER ADDRESS INFO
// ============================================================================

/// A peer identity together with the addresses it can be dialed on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerAddrInfo {
    pub peer_id: PeerId,
    pub addrs: Vec<Multiaddr>,
}

impl PeerAddrInfo {
    pub fn new(peer_id: PeerId, addrs: Vec<Multiaddr>) -> Self {
        Self { peer_id, addrs }
    }

    /// Build from a multiaddr ending in `/p2p/<peer id>`
    pub fn from_multiaddr(addr: Multiaddr) -> Result<Self, HostError> {
        let peer_id = addr
            .iter()
            .filter_map(|component| match component {
                Protocol::P2p(peer_id) => Some(peer_id),
                _ => None,
            })
            .last()
            .ok_or_else(|| HostError::InvalidAddress(format!("{} has no /p2p component", addr)))?;

        let transport: Multiaddr = addr
            .iter()
            .filter(|component| !matches!(component, Protocol::P2p(_)))
            .collect();

        let addrs = if transport.is_empty() {
            Vec::new()
        } else {
            vec![transport]
        };
        Ok(Self { peer_id, addrs })
    }

    /// Parse the text form of a `/p2p/`-terminated multiaddr
    pub fn parse(s: &str) -> Result<Self, HostError> {
        let addr: Multiaddr = s
            .parse()
            .map_err(|e| HostError::InvalidAddress(format!("{}: {}", s, e)))?;
        Self::from_multiaddr(addr)
    }
}

impl fmt::Display for PeerAddrInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.addrs.first() {
            Some(addr) => write!(f, "{}/p2p/{}", addr, self.peer_id),
            None => write!(f, "/p2p/{}", self.peer_id),
        }
    }
}

// ============================================================================
// INBOUND MESSAGES
// ============================================================================

/// A payload received on a joined topic
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub topic: TopicName,
    pub source: Option<PeerId>,
    pub data: Vec<u8>,
}

// ============================================================================
// OVERLAY HOST TRAIT
// ============================================================================

/// Peer store, dialing and pub/sub primitives of the overlay network
#[async_trait]
pub trait OverlayHost: Send + Sync {
    /// Identity of the local node
    fn local_peer_id(&self) -> PeerId;

    /// Every peer currently known to the host
    async fn peers(&self) -> Result<Vec<PeerId>, HostError>;

    /// Dial a peer; succeeds immediately if already connected
    async fn connect(&self, info: &PeerAddrInfo) -> Result<(), HostError>;

    /// Subscribe to a topic and return its channel
    async fn join(&self, topic: &TopicName) -> Result<ChannelHandle, HostError>;

    /// Broadcast `data` on a previously joined channel
    async fn broadcast(&self, channel: &ChannelHandle, data: Vec<u8>) -> Result<(), HostError>;
}
