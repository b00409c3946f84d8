// Relay Service Tests
// Uninitialized guard, publish, peers, chain queries, pool writes and ingest

use std::sync::Arc;

use libp2p::PeerId;
use tokio::sync::mpsc;

use chainrelay::chain::{ChainStateView, TipFeed, TipSummary};
use chainrelay::host::{InboundMessage, MockOverlayHost, PeerAddrInfo};
use chainrelay::message::{Address, Keypair, Message, MessageCodec, SignedMessage, TokenAmount};
use chainrelay::mpool::InsertOutcome;
use chainrelay::relay::{spawn_ingest, ErrorKind, RelayError, RelayService};
use chainrelay::topic::TopicName;

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn signed(kp: &Keypair, nonce: u64) -> SignedMessage {
    let from = Address::from_public_key(&kp.public_key());
    let to = Address::from_public_key(&Keypair::generate().public_key());
    SignedMessage::sign(Message::new(from, to, nonce), kp).unwrap()
}

fn ready_service(host: Arc<MockOverlayHost>) -> (RelayService, TipFeed) {
    let (feed, view) = ChainStateView::channel();
    (RelayService::with_host(host, view), feed)
}

fn inbound(topic: &str, data: Vec<u8>) -> InboundMessage {
    InboundMessage {
        topic: TopicName::new(topic).unwrap(),
        source: Some(PeerId::random()),
        data,
    }
}

// ============================================================================
// UNINITIALIZED GUARD
// ============================================================================

#[tokio::test]
async fn test_uninitialized_publish_rejected_without_side_effects() {
    let (_feed, view) = ChainStateView::channel();
    let service = RelayService::new(view);
    let message = signed(&Keypair::generate(), 0);

    let result = service.publish("msgs/v1", &message).await;

    assert_eq!(result, Err(RelayError::NotInitialized));
    assert!(service.topics().is_empty());
    assert!(service.mpool().is_empty());
}

#[tokio::test]
async fn test_uninitialized_network_calls_rejected() {
    let (_feed, view) = ChainStateView::channel();
    let service = RelayService::new(view);
    let info = PeerAddrInfo::new(PeerId::random(), Vec::new());

    assert!(!service.is_ready());
    assert_eq!(service.peers().await.unwrap_err().kind(), ErrorKind::NotInitialized);
    assert_eq!(service.connect(&info).await.unwrap_err().kind(), ErrorKind::NotInitialized);
    // Invalid topic still reports the missing host first
    let message = signed(&Keypair::generate(), 0);
    assert_eq!(service.publish("", &message).await, Err(RelayError::NotInitialized));
}

#[tokio::test]
async fn test_attach_host_makes_service_ready() {
    let (_feed, view) = ChainStateView::channel();
    let service = RelayService::new(view);
    let host = Arc::new(MockOverlayHost::new());

    service.attach_host(host.clone()).unwrap();
    assert!(service.is_ready());
    assert_eq!(service.attach_host(host).unwrap_err(), RelayError::AlreadyInitialized);
}

// ============================================================================
// NETWORK OPERATIONS
// ============================================================================

#[tokio::test]
async fn test_publish_joins_once_and_broadcasts() {
    let host = Arc::new(MockOverlayHost::new());
    let (service, _feed) = ready_service(host.clone());
    let kp = Keypair::generate();

    service.publish("msgs/v1", &signed(&kp, 0)).await.unwrap();
    service.publish("msgs/v1", &signed(&kp, 1)).await.unwrap();

    assert_eq!(host.join_calls(), 1);
    let sent = host.broadcasts();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].0.as_str(), "msgs/v1");
    let second = MessageCodec::decode(&sent[1].1).unwrap();
    assert_eq!(second.message().nonce, 1);
    assert!(second.verify().is_ok());
    // Publishing never pools
    assert!(service.mpool().is_empty());
}

#[tokio::test]
async fn test_publish_invalid_topic() {
    let host = Arc::new(MockOverlayHost::new());
    let (service, _feed) = ready_service(host.clone());

    let err = service.publish("", &signed(&Keypair::generate(), 0)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidTopic);
    assert_eq!(host.join_calls(), 0);
}

#[tokio::test]
async fn test_failed_join_surfaces_join_failed() {
    let host = Arc::new(MockOverlayHost::new().with_join_failure("refused"));
    let (service, _feed) = ready_service(host.clone());

    let err = service.publish("msgs/v1", &signed(&Keypair::generate(), 0)).await.unwrap_err();
    assert!(matches!(err, RelayError::JoinFailed { .. }));
    assert!(service.topics().is_empty());
    assert!(host.broadcasts().is_empty());
}

#[tokio::test]
async fn test_failed_broadcast_leaves_pool_untouched() {
    let host = Arc::new(MockOverlayHost::new().with_broadcast_failure("no peers"));
    let (service, _feed) = ready_service(host.clone());

    let err = service.publish("msgs/v1", &signed(&Keypair::generate(), 0)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PublishFailed);
    assert!(service.mpool().is_empty());
    // The join itself succeeded and stays cached
    assert_eq!(service.topics().len(), 1);
}

#[tokio::test]
async fn test_connect_then_peers() {
    let host = Arc::new(MockOverlayHost::new());
    let (service, _feed) = ready_service(host.clone());
    let peer = PeerId::random();

    service.connect(&PeerAddrInfo::new(peer, Vec::new())).await.unwrap();

    assert_eq!(service.peers().await.unwrap(), vec![peer]);
    assert_eq!(host.dial_calls(), 1);
}

#[tokio::test]
async fn test_connect_failure() {
    let host = Arc::new(MockOverlayHost::new().with_dial_failure("unreachable"));
    let (service, _feed) = ready_service(host);

    let err = service.connect(&PeerAddrInfo::new(PeerId::random(), Vec::new())).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DialFailed);
    assert!(service.peers().await.unwrap().is_empty());
}

// ============================================================================
// CHAIN STATE
// ============================================================================

#[tokio::test]
async fn test_chain_queries_follow_feed() {
    let (service, feed) = ready_service(Arc::new(MockOverlayHost::new()));

    assert_eq!(service.current_height(), Err(RelayError::TipUnavailable));
    assert_eq!(service.current_gas_info().unwrap_err().kind(), ErrorKind::TipUnavailable);

    feed.publish(TipSummary::new(42, TokenAmount::from_atto(123))).unwrap();
    service.push_message(signed(&Keypair::generate(), 0)).unwrap();

    assert_eq!(service.current_height(), Ok(42));
    let snapshot = service.current_tipset().unwrap();
    assert_eq!(snapshot.tip.height, 42);
    assert_eq!(snapshot.mpool_len, 1);
    assert_eq!(service.current_gas_info().unwrap().parent_base_fee, TokenAmount::from_atto(123));
}

// ============================================================================
// MESSAGE POOL
// ============================================================================

#[tokio::test]
async fn test_push_and_lookup() {
    let (service, _feed) = ready_service(Arc::new(MockOverlayHost::new()));
    let message = signed(&Keypair::generate(), 0);

    let (key, outcome) = service.push_message(message.clone()).unwrap();
    assert_eq!(outcome, InsertOutcome::Added);
    assert_eq!(service.pending_message(&key).unwrap(), message);
    assert_eq!(service.pending_for_sender(&message.sender()).unwrap(), message);
}

#[tokio::test]
async fn test_push_rejects_tampered_message() {
    let (service, _feed) = ready_service(Arc::new(MockOverlayHost::new()));
    let message = signed(&Keypair::generate(), 0);
    let mut altered = message.message().clone();
    altered.nonce = 99;
    let tampered =
        SignedMessage::from_parts(altered, message.signer().clone(), message.signature().clone());

    let err = service.push_message(tampered).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidMessage);
    assert!(service.mpool().is_empty());
}

#[tokio::test]
async fn test_pending_miss_is_not_found() {
    let (service, _feed) = ready_service(Arc::new(MockOverlayHost::new()));
    let message = signed(&Keypair::generate(), 0);

    let by_key = service.pending_message(&message.content_key()).unwrap_err();
    let by_sender = service.pending_for_sender(&message.sender()).unwrap_err();
    assert_eq!(by_key.kind(), ErrorKind::NotFound);
    assert_eq!(by_sender.kind(), ErrorKind::NotFound);
}

// ============================================================================
// INGEST
// ============================================================================

#[tokio::test]
async fn test_ingest_task_pools_valid_messages() {
    let (service, _feed) = ready_service(Arc::new(MockOverlayHost::new()));
    let service = Arc::new(service);
    let (tx, rx) = mpsc::channel(16);
    let task = spawn_ingest(service.clone(), rx);

    let good = signed(&Keypair::generate(), 0);
    let bytes = MessageCodec::encode(&good).unwrap();
    tx.send(inbound("msgs/v1", bytes.clone())).await.unwrap();
    tx.send(inbound("msgs/v1", bytes)).await.unwrap();
    tx.send(inbound("msgs/v1", vec![1, 2, 3])).await.unwrap();
    drop(tx);

    let stats = task.await.unwrap();
    assert_eq!(stats.accepted, 1);
    assert_eq!(stats.duplicates, 1);
    assert_eq!(stats.rejected, 1);
    assert_eq!(service.pending_message(&good.content_key()).unwrap(), good);
}
