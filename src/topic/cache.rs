// Topic Cache - joins each broadcast topic exactly once
//
// Cached lookups only take the map's read lock. Joins are serialized by a
// single cache-wide async lock that covers check, join and store, so racing
// callers on an unseen topic see exactly one join against the host.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{ChannelHandle, TopicError, TopicName};
use crate::host::OverlayHost;

pub struct TopicCache {
    host: OnceLock<Arc<dyn OverlayHost>>,
    topics: RwLock<HashMap<TopicName, ChannelHandle>>,
    join_lock: Mutex<()>,
}

impl TopicCache {
    /// Create a cache with no host attached
    pub fn new() -> Self {
        Self {
            host: OnceLock::new(),
            topics: RwLock::new(HashMap::new()),
            join_lock: Mutex::new(()),
        }
    }

    /// Create a cache that is ready from the start
    pub fn with_host(host: Arc<dyn OverlayHost>) -> Self {
        let cache = Self::new();
        let _ = cache.host.set(host);
        cache
    }

    /// Attach the overlay host. Only the first call succeeds.
    pub fn attach_host(&self, host: Arc<dyn OverlayHost>) -> Result<(), TopicError> {
        self.host.set(host).map_err(|_| TopicError::AlreadyAttached)
    }

    pub fn is_attached(&self) -> bool {
        self.host.get().is_some()
    }

    /// The attached host, or `NotInitialized`
    pub fn host(&self) -> Result<&Arc<dyn OverlayHost>, TopicError> {
        self.host.get().ok_or(TopicError::NotInitialized)
    }

    /// Cached channel for `name`, without joining
    pub fn get(&self, name: &TopicName) -> Option<ChannelHandle> {
        self.topics.read().get(name).cloned()
    }

    /// Number of joined topics
    pub fn len(&self) -> usize {
        self.topics.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.read().is_empty()
    }

    /// Names of all joined topics
    pub fn topics(&self) -> Vec<TopicName> {
        let mut names: Vec<TopicName> = self.topics.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Return the channel for `name`, joining the topic on first use.
    ///
    /// A failed join leaves the cache untouched so a later call can retry.
    pub async fn resolve(&self, name: &TopicName) -> Result<ChannelHandle, TopicError> {
        if let Some(channel) = self.get(name) {
            return Ok(channel);
        }

        let _guard = self.join_lock.lock().await;

        // Another caller may have joined while we waited for the lock
        if let Some(channel) = self.get(name) {
            debug!(topic = %name, "topic joined by concurrent caller");
            return Ok(channel);
        }

        let host = self.host()?;
        let channel = host.join(name).await.map_err(|source| {
            warn!(topic = %name, %source, "topic join failed");
            TopicError::JoinFailed {
                topic: name.clone(),
                source,
            }
        })?;

        self.topics.write().insert(name.clone(), channel.clone());
        info!(topic = %name, "topic cached");
        Ok(channel)
    }
}

impl Default for TopicCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TopicCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TopicCache")
            .field("attached", &self.is_attached())
            .field("topics", &self.len())
            .finish()
    }
}
