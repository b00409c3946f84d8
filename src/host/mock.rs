// In-process OverlayHost for tests and local tooling
//
// Records every join, dial and broadcast so callers can assert on how the
// relay drove the network.

use async_trait::async_trait;
use libp2p::PeerId;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::host::{HostError, OverlayHost, PeerAddrInfo};
use crate::topic::{ChannelHandle, TopicName};

/// Mock implementation of OverlayHost
pub struct MockOverlayHost {
    local_peer_id: PeerId,
    peers: Mutex<HashSet<PeerId>>,
    join_delay: Duration,
    join_failure: Mutex<Option<String>>,
    dial_failure: Option<String>,
    broadcast_failure: Option<String>,
    join_calls: AtomicUsize,
    dial_calls: AtomicUsize,
    broadcasts: Mutex<Vec<(TopicName, Vec<u8>)>>,
}

impl MockOverlayHost {
    /// Create a mock host that accepts every call
    pub fn new() -> Self {
        Self {
            local_peer_id: PeerId::random(),
            peers: Mutex::new(HashSet::new()),
            join_delay: Duration::ZERO,
            join_failure: Mutex::new(None),
            dial_failure: None,
            broadcast_failure: None,
            join_calls: AtomicUsize::new(0),
            dial_calls: AtomicUsize::new(0),
            broadcasts: Mutex::new(Vec::new()),
        }
    }

    /// Seed the peer store
    pub fn with_peers(self, peers: impl IntoIterator<Item = PeerId>) -> Self {
        self.peers.lock().extend(peers);
        self
    }

    /// Hold every join for `delay` before answering
    pub fn with_join_delay(mut self, delay: Duration) -> Self {
        self.join_delay = delay;
        self
    }

    /// Reject joins with `message` until `clear_join_failure` is called
    pub fn with_join_failure(self, message: &str) -> Self {
        *self.join_failure.lock() = Some(message.to_string());
        self
    }

    /// Reject dials with `message`
    pub fn with_dial_failure(mut self, message: &str) -> Self {
        self.dial_failure = Some(message.to_string());
        self
    }

    /// Reject broadcasts with `message`
    pub fn with_broadcast_failure(mut self, message: &str) -> Self {
        self.broadcast_failure = Some(message.to_string());
        self
    }

    /// Let subsequent joins succeed
    pub fn clear_join_failure(&self) {
        *self.join_failure.lock() = None;
    }

    /// Number of join calls that reached the host
    pub fn join_calls(&self) -> usize {
        self.join_calls.load(Ordering::SeqCst)
    }

    /// Number of dial attempts
    pub fn dial_calls(&self) -> usize {
        self.dial_calls.load(Ordering::SeqCst)
    }

    /// Everything broadcast so far, in order
    pub fn broadcasts(&self) -> Vec<(TopicName, Vec<u8>)> {
        self.broadcasts.lock().clone()
    }
}

impl Default for MockOverlayHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OverlayHost for MockOverlayHost {
    fn local_peer_id(&self) -> PeerId {
        self.local_peer_id
    }

    async fn peers(&self) -> Result<Vec<PeerId>, HostError> {
        Ok(self.peers.lock().iter().copied().collect())
    }

    async fn connect(&self, info: &PeerAddrInfo) -> Result<(), HostError> {
        self.dial_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.dial_failure {
            return Err(HostError::DialFailed(message.clone()));
        }
        self.peers.lock().insert(info.peer_id);
        Ok(())
    }

    async fn join(&self, topic: &TopicName) -> Result<ChannelHandle, HostError> {
        self.join_calls.fetch_add(1, Ordering::SeqCst);
        if !self.join_delay.is_zero() {
            tokio::time::sleep(self.join_delay).await;
        }
        let failure = self.join_failure.lock().clone();
        match failure {
            Some(message) => Err(HostError::JoinRejected(message)),
            None => Ok(ChannelHandle::new(topic.clone(), topic.topic_hash())),
        }
    }

    async fn broadcast(&self, channel: &ChannelHandle, data: Vec<u8>) -> Result<(), HostError> {
        if let Some(message) = &self.broadcast_failure {
            return Err(HostError::BroadcastFailed(message.clone()));
        }
        self.broadcasts.lock().push((channel.name().clone(), data));
        Ok(())
    }
}
