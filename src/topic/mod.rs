// Topic module - WHERE MESSAGES GO
// Validated topic names, joined channels, and the exactly-once join cache

mod cache;
mod channel;

use crate::host::HostError;
use thiserror::Error;

pub use cache::TopicCache;
pub use channel::{ChannelHandle, TopicName, MAX_TOPIC_LENGTH};

/// Topic-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopicError {
    #[error("Invalid topic name: {0}")]
    InvalidName(String),

    #[error("Overlay host not initialized")]
    NotInitialized,

    #[error("Overlay host already attached")]
    AlreadyAttached,

    #[error("Failed to join topic {topic}")]
    JoinFailed {
        topic: TopicName,
        #[source]
        source: HostError,
    },
}
