// Relay errors - one descriptive error per failed operation

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::chain::ChainStateError;
use crate::host::HostError;
use crate::message::{CodecError, MessageError};
use crate::mpool::PoolError;
use crate::topic::{TopicError, TopicName};

/// Errors returned by RelayService operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("Overlay host not initialized")]
    NotInitialized,

    #[error("Overlay host already attached")]
    AlreadyInitialized,

    #[error("Invalid topic: {0}")]
    InvalidTopic(String),

    #[error("Failed to join topic {topic}: {source}")]
    JoinFailed {
        topic: TopicName,
        #[source]
        source: HostError,
    },

    #[error("Dial failed: {0}")]
    DialFailed(#[source] HostError),

    #[error("Publish on {topic} failed: {source}")]
    PublishFailed {
        topic: TopicName,
        #[source]
        source: HostError,
    },

    #[error("Peer store unavailable: {0}")]
    PeersUnavailable(#[source] HostError),

    #[error("No tip observed yet")]
    TipUnavailable,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(#[from] MessageError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
}

impl RelayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotInitialized => ErrorKind::NotInitialized,
            Self::AlreadyInitialized => ErrorKind::AlreadyInitialized,
            Self::InvalidTopic(_) => ErrorKind::InvalidTopic,
            Self::JoinFailed { .. } => ErrorKind::JoinFailed,
            Self::DialFailed(_) => ErrorKind::DialFailed,
            Self::PublishFailed { .. } => ErrorKind::PublishFailed,
            Self::PeersUnavailable(_) => ErrorKind::PeersUnavailable,
            Self::TipUnavailable => ErrorKind::TipUnavailable,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InvalidMessage(_) => ErrorKind::InvalidMessage,
            Self::Codec(_) => ErrorKind::Codec,
        }
    }

    /// Check if the caller may retry the same request later
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::JoinFailed { source, .. }
            | Self::PublishFailed { source, .. }
            | Self::DialFailed(source)
            | Self::PeersUnavailable(source) => source.is_retryable(),
            Self::NotInitialized | Self::TipUnavailable => true,
            _ => false,
        }
    }
}

impl From<TopicError> for RelayError {
    fn from(err: TopicError) -> Self {
        match err {
            TopicError::InvalidName(reason) => Self::InvalidTopic(reason),
            TopicError::NotInitialized => Self::NotInitialized,
            TopicError::AlreadyAttached => Self::AlreadyInitialized,
            TopicError::JoinFailed { topic, source } => Self::JoinFailed { topic, source },
        }
    }
}

impl From<ChainStateError> for RelayError {
    fn from(err: ChainStateError) -> Self {
        match err {
            ChainStateError::TipUnavailable | ChainStateError::FeedClosed => Self::TipUnavailable,
            // Only the write side can regress; readers never see it
            ChainStateError::HeightRegressed { .. } => Self::TipUnavailable,
        }
    }
}

impl From<PoolError> for RelayError {
    fn from(err: PoolError) -> Self {
        Self::NotFound(err.to_string())
    }
}

/// Wire-level classification of a failure
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    NotInitialized,
    AlreadyInitialized,
    InvalidTopic,
    JoinFailed,
    DialFailed,
    PublishFailed,
    PeersUnavailable,
    TipUnavailable,
    NotFound,
    InvalidMessage,
    Codec,
    BadRequest,
    Timeout,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
