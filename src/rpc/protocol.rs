// RPC Protocol - request/response frames between clients and the relay
//
// Wire format: 4-byte big-endian body length, then a postcard body.
// Every call carries one argument struct and is answered by one reply
// holding either the matching return struct or a fault.

use libp2p::PeerId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::chain::{GasInfo, TipSummary};
use crate::host::PeerAddrInfo;
use crate::message::{Address, ContentKey, SignedMessage, TokenAmount};
use crate::relay::{ErrorKind, RelayError};

// ============================================================================
// ERRORS
// ============================================================================

/// Error carried back to the caller inside a reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcFault {
    pub kind: ErrorKind,
    pub message: String,
}

impl RpcFault {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for RpcFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl From<RelayError> for RpcFault {
    fn from(err: RelayError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

/// Client- and server-side RPC errors
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Frame codec error: {0}")]
    Codec(String),

    #[error("Frame of {size} bytes exceeds limit of {max}")]
    FrameTooLarge { size: usize, max: usize },

    #[error("Connection closed by peer")]
    ConnectionClosed,

    #[error("Unexpected reply: {0}")]
    UnexpectedReply(String),

    #[error("Remote error: {0}")]
    Remote(RpcFault),
}

impl RpcError {
    /// Fault kind when the error came from the relay
    pub fn remote_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Remote(fault) => Some(fault.kind),
            _ => None,
        }
    }
}

// ============================================================================
// ARGUMENTS AND RETURNS
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeersArg;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeersRet {
    pub peers: Vec<PeerId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectArg {
    pub addr: PeerAddrInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectRet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishArg {
    pub topic: String,
    pub message: SignedMessage,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishRet;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentTipsetArg;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentTipsetRet {
    pub tipset: TipSummary,
    pub mpool_len: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentHeightArg;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentHeightRet {
    pub height: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentGasInfoArg;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentGasInfoRet {
    pub parent_base_fee: TokenAmount,
    pub gas: GasInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushMessageArg {
    pub message: SignedMessage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushMessageRet {
    pub key: ContentKey,
    pub duplicate: bool,
}

/// Which pool index a lookup goes through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PendingLookup {
    Content(ContentKey),
    Sender(Address),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingMessageArg {
    pub lookup: PendingLookup,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingMessageRet {
    pub message: SignedMessage,
}

// ============================================================================
// ENVELOPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RpcCall {
    Peers(PeersArg),
    Connect(ConnectArg),
    Publish(PublishArg),
    CurrentTipset(CurrentTipsetArg),
    CurrentHeight(CurrentHeightArg),
    CurrentGasInfo(CurrentGasInfoArg),
    PushMessage(PushMessageArg),
    PendingMessage(PendingMessageArg),
}

impl RpcCall {
    pub fn method(&self) -> &'static str {
        match self {
            Self::Peers(_) => "Peers",
            Self::Connect(_) => "Connect",
            Self::Publish(_) => "Publish",
            Self::CurrentTipset(_) => "CurrentTipset",
            Self::CurrentHeight(_) => "CurrentHeight",
            Self::CurrentGasInfo(_) => "CurrentGasInfo",
            Self::PushMessage(_) => "PushMessage",
            Self::PendingMessage(_) => "PendingMessage",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RpcReturn {
    Peers(PeersRet),
    Connect(ConnectRet),
    Publish(PublishRet),
    CurrentTipset(CurrentTipsetRet),
    CurrentHeight(CurrentHeightRet),
    CurrentGasInfo(CurrentGasInfoRet),
    PushMessage(PushMessageRet),
    PendingMessage(PendingMessageRet),
}

impl RpcReturn {
    pub fn method(&self) -> &'static str {
        match self {
            Self::Peers(_) => "Peers",
            Self::Connect(_) => "Connect",
            Self::Publish(_) => "Publish",
            Self::CurrentTipset(_) => "CurrentTipset",
            Self::CurrentHeight(_) => "CurrentHeight",
            Self::CurrentGasInfo(_) => "CurrentGasInfo",
            Self::PushMessage(_) => "PushMessage",
            Self::PendingMessage(_) => "PendingMessage",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub id: u64,
    pub call: RpcCall,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcReply {
    pub id: u64,
    pub result: Result<RpcReturn, RpcFault>,
}

// ============================================================================
// FRAMING
// ============================================================================

/// Write one length-prefixed frame
pub async fn write_frame<W, T>(writer: &mut W, value: &T) -> Result<(), RpcError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let body = postcard::to_allocvec(value).map_err(|e| RpcError::Codec(e.to_string()))?;
    let len = u32::try_from(body.len()).map_err(|_| RpcError::FrameTooLarge {
        size: body.len(),
        max: u32::MAX as usize,
    })?;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame. `Ok(None)` means the peer closed cleanly between frames;
/// EOF inside the length prefix is `ConnectionClosed`.
pub async fn read_frame<R, T>(
    reader: &mut R,
    max_frame_bytes: usize,
) -> Result<Option<T>, RpcError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut len_buf = [0u8; 4];
    let mut filled = 0;
    while filled < len_buf.len() {
        let n = reader.read(&mut len_buf[filled..]).await?;
        if n == 0 {
            return if filled == 0 {
                Ok(None)
            } else {
                Err(RpcError::ConnectionClosed)
            };
        }
        filled += n;
    }

    let size = u32::from_be_bytes(len_buf) as usize;
    if size > max_frame_bytes {
        return Err(RpcError::FrameTooLarge {
            size,
            max: max_frame_bytes,
        });
    }

    let mut body = vec![0u8; size];
    reader.read_exact(&mut body).await?;
    postcard::from_bytes(&body)
        .map(Some)
        .map_err(|e| RpcError::Codec(e.to_string()))
}
