// Topic names and joined channel handles

use libp2p::gossipsub::{IdentTopic, TopicHash};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::TopicError;

/// Maximum topic name length in bytes
pub const MAX_TOPIC_LENGTH: usize = 256;

/// Validated name of a broadcast topic
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TopicName(String);

impl TopicName {
    /// Validate a topic name: non-empty, bounded, printable ASCII or space
    pub fn new(name: impl Into<String>) -> Result<Self, TopicError> {
        let name = name.into();
        if name.is_empty() {
            return Err(TopicError::InvalidName("topic name cannot be empty".into()));
        }
        if name.len() > MAX_TOPIC_LENGTH {
            return Err(TopicError::InvalidName(format!(
                "topic name is {} bytes, limit is {}",
                name.len(),
                MAX_TOPIC_LENGTH
            )));
        }
        if !name.chars().all(|c| c.is_ascii_graphic() || c == ' ') {
            return Err(TopicError::InvalidName(format!(
                "topic name {:?} contains non-printable characters",
                name
            )));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Gossipsub hash of this topic (identity hashing)
    pub fn topic_hash(&self) -> TopicHash {
        IdentTopic::new(self.0.clone()).hash()
    }
}

impl fmt::Display for TopicName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TopicName {
    type Error = TopicError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for TopicName {
    type Error = TopicError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TopicName> for String {
    fn from(name: TopicName) -> Self {
        name.0
    }
}

/// A joined topic as returned by the overlay host.
///
/// Handles are shared: clones of one join compare equal, while two separate
/// joins of the same name never do.
#[derive(Clone)]
pub struct ChannelHandle(Arc<Channel>);

struct Channel {
    name: TopicName,
    hash: TopicHash,
}

impl ChannelHandle {
    pub fn new(name: TopicName, hash: TopicHash) -> Self {
        Self(Arc::new(Channel { name, hash }))
    }

    pub fn name(&self) -> &TopicName {
        &self.0.name
    }

    pub fn hash(&self) -> &TopicHash {
        &self.0.hash
    }
}

impl PartialEq for ChannelHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ChannelHandle {}

impl fmt::Debug for ChannelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelHandle")
            .field("name", &self.0.name)
            .field("hash", &self.0.hash)
            .finish()
    }
}
