// Relay Service - the request/response surface of the relay
//
// Composes the topic cache, the message pool and the chain-state view.
// The service is built once and shared as Arc<RelayService> by every
// request handler; it keeps no state of its own.

use libp2p::PeerId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::RelayError;
use crate::chain::{ChainStateView, GasInfo, TipSummary};
use crate::host::{InboundMessage, OverlayHost, PeerAddrInfo};
use crate::message::{Address, ContentKey, MessageCodec, SignedMessage, TokenAmount};
use crate::mpool::{InsertOutcome, MessagePool};
use crate::topic::{TopicCache, TopicName};

/// Current tip plus the pool size
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TipsetSnapshot {
    pub tip: TipSummary,
    pub mpool_len: usize,
}

/// Fee parameters at the current tip
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasSnapshot {
    pub parent_base_fee: TokenAmount,
    pub gas: GasInfo,
}

#[derive(Debug)]
pub struct RelayService {
    topics: TopicCache,
    mpool: MessagePool,
    chain: ChainStateView,
}

impl RelayService {
    /// Build an uninitialized service; attach a host before network calls
    pub fn new(chain: ChainStateView) -> Self {
        Self {
            topics: TopicCache::new(),
            mpool: MessagePool::new(),
            chain,
        }
    }

    /// Build a service that is ready from the start
    pub fn with_host(host: Arc<dyn OverlayHost>, chain: ChainStateView) -> Self {
        Self {
            topics: TopicCache::with_host(host),
            mpool: MessagePool::new(),
            chain,
        }
    }

    /// Move from uninitialized to ready. Fails if a host is already attached.
    pub fn attach_host(&self, host: Arc<dyn OverlayHost>) -> Result<(), RelayError> {
        let peer_id = host.local_peer_id();
        self.topics.attach_host(host)?;
        info!(%peer_id, "overlay host attached");
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.topics.is_attached()
    }

    pub fn topics(&self) -> &TopicCache {
        &self.topics
    }

    pub fn mpool(&self) -> &MessagePool {
        &self.mpool
    }

    pub fn chain(&self) -> &ChainStateView {
        &self.chain
    }

    // ========================================================================
    // NETWORK OPERATIONS
    // ========================================================================

    /// Every peer known to the host
    pub async fn peers(&self) -> Result<Vec<PeerId>, RelayError> {
        let host = self.topics.host()?;
        host.peers().await.map_err(RelayError::PeersUnavailable)
    }

    /// Dial a peer through the host
    pub async fn connect(&self, info: &PeerAddrInfo) -> Result<(), RelayError> {
        let host = self.topics.host()?;
        host.connect(info).await.map_err(|err| {
            warn!(peer = %info, %err, "connect failed");
            RelayError::DialFailed(err)
        })?;
        info!(peer = %info, "connected");
        Ok(())
    }

    /// Broadcast a signed message on `topic`, joining it on first use.
    ///
    /// Publishing does not add the message to the pool.
    pub async fn publish(&self, topic: &str, message: &SignedMessage) -> Result<(), RelayError> {
        let host = self.topics.host()?;
        let topic = TopicName::new(topic)?;
        let payload = MessageCodec::encode(message)?;

        let channel = self.topics.resolve(&topic).await?;
        host.broadcast(&channel, payload)
            .await
            .map_err(|source| RelayError::PublishFailed {
                topic: topic.clone(),
                source,
            })?;

        debug!(%topic, key = %message.content_key(), "published message");
        Ok(())
    }

    // ========================================================================
    // CHAIN STATE
    // ========================================================================

    pub fn current_tipset(&self) -> Result<TipsetSnapshot, RelayError> {
        let tip = self.chain.tip()?;
        Ok(TipsetSnapshot {
            tip: tip.as_ref().clone(),
            mpool_len: self.mpool.len(),
        })
    }

    pub fn current_height(&self) -> Result<u64, RelayError> {
        Ok(self.chain.height()?)
    }

    pub fn current_gas_info(&self) -> Result<GasSnapshot, RelayError> {
        let tip = self.chain.tip()?;
        Ok(GasSnapshot {
            parent_base_fee: tip.parent_base_fee,
            gas: tip.gas.clone(),
        })
    }

    // ========================================================================
    // MESSAGE POOL
    // ========================================================================

    /// Verify a message and add it to the pool
    pub fn push_message(
        &self,
        message: SignedMessage,
    ) -> Result<(ContentKey, InsertOutcome), RelayError> {
        message.verify()?;
        Ok(self.mpool.insert(message))
    }

    pub fn pending_message(&self, key: &ContentKey) -> Result<SignedMessage, RelayError> {
        Ok(self.mpool.get(key)?.as_ref().clone())
    }

    pub fn pending_for_sender(&self, sender: &Address) -> Result<SignedMessage, RelayError> {
        Ok(self.mpool.get_by_sender(sender)?.as_ref().clone())
    }

    /// Decode a gossip payload and pool it
    pub fn ingest(
        &self,
        inbound: &InboundMessage,
    ) -> Result<(ContentKey, InsertOutcome), RelayError> {
        let message = MessageCodec::decode(&inbound.data)?;
        self.push_message(message)
    }
}
