// RPC Client - typed calls against a running relay

use libp2p::PeerId;
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tracing::debug;

use super::protocol::*;
use crate::config::RpcConfig;
use crate::host::PeerAddrInfo;
use crate::message::{Address, ContentKey, SignedMessage};

pub struct RpcClient {
    stream: TcpStream,
    next_id: u64,
    max_frame_bytes: usize,
}

/// Pull the expected variant out of a reply
macro_rules! expect_return {
    ($ret:expr, $variant:ident) => {
        match $ret {
            RpcReturn::$variant(inner) => Ok(inner),
            other => Err(RpcError::UnexpectedReply(format!(
                "expected {}, got {}",
                stringify!($variant),
                other.method()
            ))),
        }
    };
}

impl RpcClient {
    pub async fn connect(addr: SocketAddr) -> Result<Self, RpcError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self {
            stream,
            next_id: 1,
            max_frame_bytes: RpcConfig::default().max_frame_bytes,
        })
    }

    pub fn with_max_frame_bytes(mut self, bytes: usize) -> Self {
        self.max_frame_bytes = bytes;
        self
    }

    /// Send one call and wait for its reply
    pub async fn call(&mut self, call: RpcCall) -> Result<RpcReturn, RpcError> {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        let method = call.method();

        write_frame(&mut self.stream, &RpcRequest { id, call }).await?;
        let reply: RpcReply = read_frame(&mut self.stream, self.max_frame_bytes)
            .await?
            .ok_or(RpcError::ConnectionClosed)?;

        // Id 0 is a connection-level fault the server sends before closing
        if reply.id != id && reply.id != 0 {
            return Err(RpcError::UnexpectedReply(format!(
                "reply id {} for request {}",
                reply.id, id
            )));
        }
        debug!(id, method, ok = reply.result.is_ok(), "rpc reply");
        reply.result.map_err(RpcError::Remote)
    }

    pub async fn peers(&mut self) -> Result<Vec<PeerId>, RpcError> {
        let ret = self.call(RpcCall::Peers(PeersArg)).await?;
        Ok(expect_return!(ret, Peers)?.peers)
    }

    pub async fn connect_peer(&mut self, addr: PeerAddrInfo) -> Result<(), RpcError> {
        let ret = self.call(RpcCall::Connect(ConnectArg { addr })).await?;
        expect_return!(ret, Connect).map(|_| ())
    }

    pub async fn publish(&mut self, topic: &str, message: SignedMessage) -> Result<(), RpcError> {
        let ret = self
            .call(RpcCall::Publish(PublishArg {
                topic: topic.to_string(),
                message,
            }))
            .await?;
        expect_return!(ret, Publish).map(|_| ())
    }

    pub async fn current_tipset(&mut self) -> Result<CurrentTipsetRet, RpcError> {
        let ret = self.call(RpcCall::CurrentTipset(CurrentTipsetArg)).await?;
        expect_return!(ret, CurrentTipset)
    }

    pub async fn current_height(&mut self) -> Result<u64, RpcError> {
        let ret = self.call(RpcCall::CurrentHeight(CurrentHeightArg)).await?;
        Ok(expect_return!(ret, CurrentHeight)?.height)
    }

    pub async fn current_gas_info(&mut self) -> Result<CurrentGasInfoRet, RpcError> {
        let ret = self.call(RpcCall::CurrentGasInfo(CurrentGasInfoArg)).await?;
        expect_return!(ret, CurrentGasInfo)
    }

    pub async fn push_message(
        &mut self,
        message: SignedMessage,
    ) -> Result<PushMessageRet, RpcError> {
        let ret = self.call(RpcCall::PushMessage(PushMessageArg { message })).await?;
        expect_return!(ret, PushMessage)
    }

    pub async fn pending_message(&mut self, key: ContentKey) -> Result<SignedMessage, RpcError> {
        self.pending(PendingLookup::Content(key)).await
    }

    pub async fn pending_for_sender(&mut self, sender: Address) -> Result<SignedMessage, RpcError> {
        self.pending(PendingLookup::Sender(sender)).await
    }

    async fn pending(&mut self, lookup: PendingLookup) -> Result<SignedMessage, RpcError> {
        let ret = self
            .call(RpcCall::PendingMessage(PendingMessageArg { lookup }))
            .await?;
        Ok(expect_return!(ret, PendingMessage)?.message)
    }
}
