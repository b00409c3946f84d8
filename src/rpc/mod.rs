// RPC module - length-prefixed postcard calls over TCP
// Exposes RelayService operations to external clients

mod client;
mod protocol;
mod server;

pub use client::RpcClient;
pub use protocol::{
    read_frame, write_frame, ConnectArg, ConnectRet, CurrentGasInfoArg, CurrentGasInfoRet,
    CurrentHeightArg, CurrentHeightRet, CurrentTipsetArg, CurrentTipsetRet, PeersArg, PeersRet,
    PendingLookup, PendingMessageArg, PendingMessageRet, PublishArg, PublishRet, PushMessageArg,
    PushMessageRet, RpcCall, RpcError, RpcFault, RpcReply, RpcRequest, RpcReturn,
};
pub use server::{dispatch, RpcServer};
