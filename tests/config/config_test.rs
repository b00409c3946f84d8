// Config Tests
// Defaults, builders and validation

use std::net::SocketAddr;
use std::time::Duration;

use chainrelay::config::{P2pConfig, RelayConfig, RpcConfig, DEFAULT_MESSAGE_TOPIC};

// ============================================================================
// RPC CONFIG
// ============================================================================

#[test]
fn test_rpc_config_default() {
    let config = RpcConfig::default();

    assert!(config.listen_addr.ip().is_loopback());
    assert_eq!(config.request_timeout(), Duration::from_secs(30));
    assert!(config.max_frame_bytes >= 64 * 1024);
    assert!(config.validate().is_ok());
}

#[test]
fn test_rpc_config_custom() {
    let addr: SocketAddr = "0.0.0.0:9000".parse().unwrap();
    let config = RpcConfig::new()
        .with_listen_addr(addr)
        .with_request_timeout(5)
        .with_max_frame_bytes(4096)
        .with_max_connections(8);

    assert_eq!(config.listen_addr, addr);
    assert_eq!(config.request_timeout_secs, 5);
    assert_eq!(config.max_frame_bytes, 4096);
    assert_eq!(config.max_connections, 8);
}

#[test]
fn test_rpc_config_validation() {
    assert!(RpcConfig::new().with_request_timeout(0).validate().is_err());
    assert!(RpcConfig::new().with_max_frame_bytes(16).validate().is_err());
    assert!(RpcConfig::new().with_max_connections(0).validate().is_err());
}

// ============================================================================
// P2P CONFIG
// ============================================================================

#[test]
fn test_p2p_config_default() {
    let config = P2pConfig::default();

    assert_eq!(config.listen_addrs.len(), 1);
    assert!(config.bootstrap_peers.is_empty());
    assert!(config.enable_mdns);
    assert!(config.validate().is_ok());
}

#[test]
fn test_p2p_config_validation() {
    assert!(P2pConfig::new().with_listen_addrs(Vec::new()).validate().is_err());
    assert!(P2pConfig::new().with_heartbeat_interval(0).validate().is_err());
    assert!(P2pConfig::new().with_max_transmit_size(0).validate().is_err());
    assert!(P2pConfig::new().with_mdns(false).validate().is_ok());
}

// ============================================================================
// RELAY CONFIG
// ============================================================================

#[test]
fn test_relay_config_default_topic() {
    let config = RelayConfig::default();

    let topics = config.topic_names().unwrap();
    assert_eq!(topics.len(), 1);
    assert_eq!(topics[0].as_str(), DEFAULT_MESSAGE_TOPIC);
    assert!(config.validate().is_ok());
}

#[test]
fn test_relay_config_rejects_bad_topic() {
    let config = RelayConfig::new().with_topics(vec!["ok".into(), String::new()]);
    assert!(config.validate().is_err());
}

#[test]
fn test_relay_config_propagates_section_errors() {
    let config = RelayConfig::new().with_rpc(RpcConfig::new().with_request_timeout(0));
    assert!(config.validate().is_err());

    let config = RelayConfig::new().with_p2p(P2pConfig::new().with_heartbeat_interval(0));
    assert!(config.validate().is_err());
}
