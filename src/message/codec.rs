use crate::message::SignedMessage;
use thiserror::Error;

/// Errors that can occur during encoding/decoding
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Failed to encode message: {0}")]
    EncodeError(String),

    #[error("Failed to decode message: {0}")]
    DecodeError(String),

    #[error("Invalid hex string: {0}")]
    InvalidHex(String),
}

/// Gossip payload codec for signed messages (postcard)
pub struct MessageCodec;

impl MessageCodec {
    /// Encode a SignedMessage to the bytes broadcast on a topic
    pub fn encode(message: &SignedMessage) -> Result<Vec<u8>, CodecError> {
        postcard::to_allocvec(message).map_err(|e| CodecError::EncodeError(e.to_string()))
    }

    /// Decode a SignedMessage received from a topic
    pub fn decode(bytes: &[u8]) -> Result<SignedMessage, CodecError> {
        postcard::from_bytes(bytes).map_err(|e| CodecError::DecodeError(e.to_string()))
    }

    /// Encode to hex string (CLI form)
    pub fn encode_hex(message: &SignedMessage) -> Result<String, CodecError> {
        Self::encode(message).map(hex::encode)
    }

    /// Decode from hex string
    pub fn decode_hex(hex_str: &str) -> Result<SignedMessage, CodecError> {
        let bytes = hex::decode(hex_str.trim()).map_err(|e| CodecError::InvalidHex(e.to_string()))?;
        Self::decode(&bytes)
    }
}
