// Message Pool - pending signed messages, indexed by content and by sender
//
// Both indexes live behind one lock so an insert updates them together.
// A newer message from the same sender replaces the sender entry but the
// older message stays reachable by its content key until it is removed.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::trace;

use crate::message::{Address, ContentKey, SignedMessage};

/// Pool lookup errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("No pooled message with content key {0}")]
    NotFoundByContent(ContentKey),

    #[error("No pooled message from sender {0}")]
    NotFoundBySender(Address),
}

/// Result of an insert
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The content key was not pooled before
    Added,
    /// The same message was already pooled; entries were rewritten
    Duplicate,
}

/// Counters describing the pool
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Entries in the content index
    pub messages: usize,
    /// Entries in the sender index
    pub senders: usize,
    /// Insert calls since creation
    pub inserts: u64,
    /// Inserts whose content key was already pooled
    pub duplicates: u64,
    /// Inserts that displaced another message in the sender index
    pub sender_replacements: u64,
}

struct SenderEntry {
    key: ContentKey,
    message: Arc<SignedMessage>,
}

#[derive(Default)]
struct PoolInner {
    by_content: HashMap<ContentKey, Arc<SignedMessage>>,
    by_sender: HashMap<Address, SenderEntry>,
    inserts: u64,
    duplicates: u64,
    sender_replacements: u64,
}

/// Concurrency-safe dual-indexed message pool
#[derive(Default)]
pub struct MessagePool {
    inner: RwLock<PoolInner>,
}

impl MessagePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a message under its content key and its sender key
    pub fn insert(&self, message: SignedMessage) -> (ContentKey, InsertOutcome) {
        let key = message.content_key();
        let sender = message.sender();
        let message = Arc::new(message);

        let mut inner = self.inner.write();
        inner.inserts += 1;

        let outcome = match inner.by_content.insert(key, Arc::clone(&message)) {
            Some(_) => {
                inner.duplicates += 1;
                InsertOutcome::Duplicate
            }
            None => InsertOutcome::Added,
        };

        let previous = inner.by_sender.insert(sender, SenderEntry { key, message });
        if matches!(previous, Some(ref entry) if entry.key != key) {
            inner.sender_replacements += 1;
        }

        trace!(%key, %sender, ?outcome, "pooled message");
        (key, outcome)
    }

    /// Number of messages in the content index
    pub fn len(&self) -> usize {
        self.inner.read().by_content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().by_content.is_empty()
    }

    /// Number of senders with a pooled message
    pub fn sender_count(&self) -> usize {
        self.inner.read().by_sender.len()
    }

    pub fn contains(&self, key: &ContentKey) -> bool {
        self.inner.read().by_content.contains_key(key)
    }

    /// Look up a message by content key
    pub fn get(&self, key: &ContentKey) -> Result<Arc<SignedMessage>, PoolError> {
        self.inner
            .read()
            .by_content
            .get(key)
            .cloned()
            .ok_or(PoolError::NotFoundByContent(*key))
    }

    /// Look up the latest message from a sender
    pub fn get_by_sender(&self, sender: &Address) -> Result<Arc<SignedMessage>, PoolError> {
        self.inner
            .read()
            .by_sender
            .get(sender)
            .map(|entry| Arc::clone(&entry.message))
            .ok_or(PoolError::NotFoundBySender(*sender))
    }

    /// Snapshot of every message in the content index
    pub fn pending(&self) -> Vec<Arc<SignedMessage>> {
        self.inner.read().by_content.values().cloned().collect()
    }

    /// Purge a message. The sender entry goes too if it still points here.
    pub fn remove(&self, key: &ContentKey) -> Option<Arc<SignedMessage>> {
        let mut inner = self.inner.write();
        let removed = inner.by_content.remove(key)?;

        let sender = removed.sender();
        if matches!(inner.by_sender.get(&sender), Some(entry) if entry.key == *key) {
            inner.by_sender.remove(&sender);
        }
        Some(removed)
    }

    pub fn stats(&self) -> PoolStats {
        let inner = self.inner.read();
        PoolStats {
            messages: inner.by_content.len(),
            senders: inner.by_sender.len(),
            inserts: inner.inserts,
            duplicates: inner.duplicates,
            sender_replacements: inner.sender_replacements,
        }
    }
}

impl std::fmt::Debug for MessagePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("MessagePool")
            .field("messages", &stats.messages)
            .field("senders", &stats.senders)
            .finish()
    }
}
