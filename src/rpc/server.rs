// RPC Server - TCP listener that dispatches frames onto the relay service
//
// One task per connection. Requests on a connection are answered in
// order; each runs under the configured deadline.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::protocol::*;
use crate::config::RpcConfig;
use crate::mpool::InsertOutcome;
use crate::relay::{ErrorKind, RelayService};

pub struct RpcServer {
    listener: TcpListener,
    service: Arc<RelayService>,
    config: RpcConfig,
    connections: Arc<Semaphore>,
}

impl RpcServer {
    /// Bind the listener. Port 0 picks a free port; see `local_addr`.
    pub async fn bind(config: RpcConfig, service: Arc<RelayService>) -> Result<Self, RpcError> {
        let listener = TcpListener::bind(config.listen_addr).await?;
        let connections = Arc::new(Semaphore::new(config.max_connections));
        Ok(Self {
            listener,
            service,
            config,
            connections,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, RpcError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `shutdown` resolves
    pub async fn serve_until<F>(self, shutdown: F) -> Result<(), RpcError>
    where
        F: Future<Output = ()>,
    {
        let addr = self.local_addr()?;
        info!(%addr, "rpc server listening");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(%addr, "rpc server stopping");
                    return Ok(());
                }
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(pair) => pair,
                        Err(err) => {
                            warn!(%err, "accept failed");
                            continue;
                        }
                    };

                    let Ok(permit) = self.connections.clone().try_acquire_owned() else {
                        warn!(
                            %peer,
                            max = self.config.max_connections,
                            "connection limit reached, refusing"
                        );
                        continue;
                    };

                    let service = self.service.clone();
                    let timeout = self.config.request_timeout();
                    let max_frame = self.config.max_frame_bytes;
                    tokio::spawn(async move {
                        handle_connection(stream, peer, service, timeout, max_frame).await;
                        drop(permit);
                    });
                }
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    service: Arc<RelayService>,
    timeout: Duration,
    max_frame_bytes: usize,
) {
    debug!(%peer, "rpc connection opened");
    let (mut reader, mut writer) = stream.into_split();

    loop {
        let request: RpcRequest = match read_frame(&mut reader, max_frame_bytes).await {
            Ok(Some(request)) => request,
            Ok(None) => break,
            Err(err @ RpcError::Codec(_)) => {
                // Whole frame was consumed, so the stream is still aligned
                let reply = RpcReply {
                    id: 0,
                    result: Err(RpcFault::new(ErrorKind::BadRequest, err.to_string())),
                };
                if write_frame(&mut writer, &reply).await.is_err() {
                    break;
                }
                continue;
            }
            Err(err @ RpcError::FrameTooLarge { .. }) => {
                warn!(%peer, %err, "closing connection");
                let reply = RpcReply {
                    id: 0,
                    result: Err(RpcFault::new(ErrorKind::BadRequest, err.to_string())),
                };
                let _ = write_frame(&mut writer, &reply).await;
                break;
            }
            Err(err) => {
                debug!(%peer, %err, "rpc read failed");
                break;
            }
        };

        let method = request.call.method();
        let result = match tokio::time::timeout(timeout, dispatch(&service, request.call)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(%peer, method, ?timeout, "rpc request timed out");
                Err(RpcFault::new(
                    ErrorKind::Timeout,
                    format!("{} exceeded {:?}", method, timeout),
                ))
            }
        };

        if let Err(fault) = &result {
            debug!(%peer, method, %fault, "rpc request failed");
        }

        if let Err(err) = write_frame(&mut writer, &RpcReply { id: request.id, result }).await {
            debug!(%peer, %err, "rpc write failed");
            break;
        }
    }

    debug!(%peer, "rpc connection closed");
}

/// Run one call against the service
pub async fn dispatch(service: &RelayService, call: RpcCall) -> Result<RpcReturn, RpcFault> {
    let ret = match call {
        RpcCall::Peers(PeersArg) => RpcReturn::Peers(PeersRet {
            peers: service.peers().await?,
        }),
        RpcCall::Connect(arg) => {
            service.connect(&arg.addr).await?;
            RpcReturn::Connect(ConnectRet)
        }
        RpcCall::Publish(arg) => {
            service.publish(&arg.topic, &arg.message).await?;
            RpcReturn::Publish(PublishRet)
        }
        RpcCall::CurrentTipset(CurrentTipsetArg) => {
            let snapshot = service.current_tipset()?;
            RpcReturn::CurrentTipset(CurrentTipsetRet {
                tipset: snapshot.tip,
                mpool_len: snapshot.mpool_len as u64,
            })
        }
        RpcCall::CurrentHeight(CurrentHeightArg) => RpcReturn::CurrentHeight(CurrentHeightRet {
            height: service.current_height()?,
        }),
        RpcCall::CurrentGasInfo(CurrentGasInfoArg) => {
            let snapshot = service.current_gas_info()?;
            RpcReturn::CurrentGasInfo(CurrentGasInfoRet {
                parent_base_fee: snapshot.parent_base_fee,
                gas: snapshot.gas,
            })
        }
        RpcCall::PushMessage(arg) => {
            let (key, outcome) = service.push_message(arg.message)?;
            RpcReturn::PushMessage(PushMessageRet {
                key,
                duplicate: outcome == InsertOutcome::Duplicate,
            })
        }
        RpcCall::PendingMessage(arg) => {
            let message = match arg.lookup {
                PendingLookup::Content(key) => service.pending_message(&key)?,
                PendingLookup::Sender(sender) => service.pending_for_sender(&sender)?,
            };
            RpcReturn::PendingMessage(PendingMessageRet { message })
        }
    };
    Ok(ret)
}
