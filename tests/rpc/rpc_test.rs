// RPC Tests
// Loopback round trips for every call, faults, timeouts and framing limits

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use libp2p::PeerId;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::oneshot;

use chainrelay::chain::{ChainStateView, TipFeed, TipSummary};
use chainrelay::config::RpcConfig;
use chainrelay::host::{MockOverlayHost, PeerAddrInfo};
use chainrelay::message::{Address, Keypair, Message, SignedMessage, TokenAmount};
use chainrelay::relay::{ErrorKind, RelayService};
use chainrelay::rpc::{read_frame, RpcClient, RpcReply, RpcServer};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

struct TestNode {
    addr: SocketAddr,
    host: Arc<MockOverlayHost>,
    feed: TipFeed,
    stop: Option<oneshot::Sender<()>>,
}

impl Drop for TestNode {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

async fn start_node(host: MockOverlayHost, config: RpcConfig) -> TestNode {
    let host = Arc::new(host);
    let (feed, view) = ChainStateView::channel();
    let service = Arc::new(RelayService::with_host(host.clone(), view));

    let config = config.with_listen_addr("127.0.0.1:0".parse().unwrap());
    let server = RpcServer::bind(config, service).await.unwrap();
    let addr = server.local_addr().unwrap();

    let (stop, stopped) = oneshot::channel::<()>();
    tokio::spawn(server.serve_until(async move {
        let _ = stopped.await;
    }));

    TestNode {
        addr,
        host,
        feed,
        stop: Some(stop),
    }
}

fn signed(kp: &Keypair, nonce: u64) -> SignedMessage {
    let from = Address::from_public_key(&kp.public_key());
    let to = Address::from_public_key(&Keypair::generate().public_key());
    SignedMessage::sign(Message::new(from, to, nonce), kp).unwrap()
}

// ============================================================================
// ROUND TRIPS
// ============================================================================

#[tokio::test]
async fn test_network_calls_round_trip() {
    let node = start_node(MockOverlayHost::new(), RpcConfig::new()).await;
    let mut client = RpcClient::connect(node.addr).await.unwrap();
    let peer = PeerId::random();

    assert!(client.peers().await.unwrap().is_empty());
    client.connect_peer(PeerAddrInfo::new(peer, Vec::new())).await.unwrap();
    assert_eq!(client.peers().await.unwrap(), vec![peer]);

    client.publish("msgs/v1", signed(&Keypair::generate(), 0)).await.unwrap();
    assert_eq!(node.host.join_calls(), 1);
    assert_eq!(node.host.broadcasts().len(), 1);
}

#[tokio::test]
async fn test_chain_calls_round_trip() {
    let node = start_node(MockOverlayHost::new(), RpcConfig::new()).await;
    let mut client = RpcClient::connect(node.addr).await.unwrap();

    let err = client.current_height().await.unwrap_err();
    assert_eq!(err.remote_kind(), Some(ErrorKind::TipUnavailable));

    node.feed.publish(TipSummary::new(100, TokenAmount::from_atto(55))).unwrap();

    assert_eq!(client.current_height().await.unwrap(), 100);
    let tipset = client.current_tipset().await.unwrap();
    assert_eq!(tipset.tipset.height, 100);
    assert_eq!(tipset.mpool_len, 0);
    let gas = client.current_gas_info().await.unwrap();
    assert_eq!(gas.parent_base_fee, TokenAmount::from_atto(55));
}

#[tokio::test]
async fn test_pool_calls_round_trip() {
    let node = start_node(MockOverlayHost::new(), RpcConfig::new()).await;
    let mut client = RpcClient::connect(node.addr).await.unwrap();
    let message = signed(&Keypair::generate(), 4);

    let pushed = client.push_message(message.clone()).await.unwrap();
    assert_eq!(pushed.key, message.content_key());
    assert!(!pushed.duplicate);
    assert!(client.push_message(message.clone()).await.unwrap().duplicate);

    assert_eq!(client.pending_message(pushed.key).await.unwrap(), message);
    assert_eq!(client.pending_for_sender(message.sender()).await.unwrap(), message);

    let miss = signed(&Keypair::generate(), 0);
    let err = client.pending_message(miss.content_key()).await.unwrap_err();
    assert_eq!(err.remote_kind(), Some(ErrorKind::NotFound));
}

#[tokio::test]
async fn test_fault_keeps_connection_usable() {
    let node = start_node(MockOverlayHost::new(), RpcConfig::new()).await;
    let mut client = RpcClient::connect(node.addr).await.unwrap();

    let err = client.publish("", signed(&Keypair::generate(), 0)).await.unwrap_err();
    assert_eq!(err.remote_kind(), Some(ErrorKind::InvalidTopic));

    assert!(client.peers().await.is_ok());
}

#[tokio::test]
async fn test_slow_call_times_out() {
    let host = MockOverlayHost::new().with_join_delay(Duration::from_secs(3));
    let node = start_node(host, RpcConfig::new().with_request_timeout(1)).await;
    let mut client = RpcClient::connect(node.addr).await.unwrap();

    let err = client.publish("msgs/v1", signed(&Keypair::generate(), 0)).await.unwrap_err();
    assert_eq!(err.remote_kind(), Some(ErrorKind::Timeout));
}

// ============================================================================
// FRAMING
// ============================================================================

#[tokio::test]
async fn test_oversize_frame_rejected() {
    let config = RpcConfig::new().with_max_frame_bytes(1024);
    let node = start_node(MockOverlayHost::new(), config).await;
    let mut stream = TcpStream::connect(node.addr).await.unwrap();

    stream.write_all(&(64 * 1024u32).to_be_bytes()).await.unwrap();

    let reply: RpcReply = read_frame(&mut stream, 1024 * 1024).await.unwrap().unwrap();
    assert_eq!(reply.id, 0);
    assert_eq!(reply.result.unwrap_err().kind, ErrorKind::BadRequest);

    // Server closes the connection afterwards
    let next: Option<RpcReply> = read_frame(&mut stream, 1024 * 1024).await.unwrap_or(None);
    assert!(next.is_none());
}

#[tokio::test]
async fn test_garbage_body_answered_with_bad_request() {
    let node = start_node(MockOverlayHost::new(), RpcConfig::new()).await;
    let mut stream = TcpStream::connect(node.addr).await.unwrap();

    stream.write_all(&4u32.to_be_bytes()).await.unwrap();
    stream.write_all(&[0xff, 0xff, 0xff, 0xff]).await.unwrap();

    let reply: RpcReply = read_frame(&mut stream, 1024 * 1024).await.unwrap().unwrap();
    assert_eq!(reply.result.unwrap_err().kind, ErrorKind::BadRequest);
}
