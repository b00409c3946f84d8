// Relay configuration
// RPC listener, p2p host and startup topics, with builder-style setters

use libp2p::Multiaddr;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

use crate::topic::TopicName;

/// Default topic signed messages are gossiped on
pub const DEFAULT_MESSAGE_TOPIC: &str = "/chainrelay/msgs/v1";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// RPC CONFIG
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Address the RPC listener binds to
    pub listen_addr: SocketAddr,
    /// Per-request deadline in seconds
    pub request_timeout_secs: u64,
    /// Largest accepted frame body
    pub max_frame_bytes: usize,
    /// Concurrent client connections
    pub max_connections: usize,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 2345)),
            request_timeout_secs: 30,
            max_frame_bytes: 1024 * 1024,
            max_connections: 256,
        }
    }
}

impl RpcConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_listen_addr(mut self, addr: SocketAddr) -> Self {
        self.listen_addr = addr;
        self
    }

    pub fn with_request_timeout(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    pub fn with_max_frame_bytes(mut self, bytes: usize) -> Self {
        self.max_frame_bytes = bytes;
        self
    }

    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid("request_timeout_secs cannot be 0".into()));
        }
        if self.max_frame_bytes < 64 {
            return Err(ConfigError::Invalid("max_frame_bytes must be at least 64".into()));
        }
        if self.max_connections == 0 {
            return Err(ConfigError::Invalid("max_connections cannot be 0".into()));
        }
        Ok(())
    }
}

// ============================================================================
// P2P CONFIG
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct P2pConfig {
    pub listen_addrs: Vec<Multiaddr>,
    pub bootstrap_peers: Vec<Multiaddr>,
    pub enable_mdns: bool,
    pub heartbeat_interval_secs: u64,
    pub idle_connection_timeout_secs: u64,
    /// Largest gossip payload in bytes
    pub max_transmit_size: usize,
    /// Identify protocol version string
    pub protocol_version: String,
    pub command_buffer: usize,
    pub inbound_buffer: usize,
}

impl Default for P2pConfig {
    fn default() -> Self {
        let listen: Multiaddr = "/ip4/0.0.0.0/tcp/0"
            .parse()
            .unwrap_or_else(|_| Multiaddr::empty());
        Self {
            listen_addrs: vec![listen],
            bootstrap_peers: Vec::new(),
            enable_mdns: true,
            heartbeat_interval_secs: 1,
            idle_connection_timeout_secs: 60,
            max_transmit_size: 256 * 1024,
            protocol_version: "/chainrelay/1.0.0".to_string(),
            command_buffer: 256,
            inbound_buffer: 1024,
        }
    }
}

impl P2pConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_listen_addrs(mut self, addrs: Vec<Multiaddr>) -> Self {
        self.listen_addrs = addrs;
        self
    }

    pub fn with_bootstrap_peers(mut self, peers: Vec<Multiaddr>) -> Self {
        self.bootstrap_peers = peers;
        self
    }

    pub fn with_mdns(mut self, enable: bool) -> Self {
        self.enable_mdns = enable;
        self
    }

    pub fn with_heartbeat_interval(mut self, secs: u64) -> Self {
        self.heartbeat_interval_secs = secs;
        self
    }

    pub fn with_max_transmit_size(mut self, bytes: usize) -> Self {
        self.max_transmit_size = bytes;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen_addrs.is_empty() {
            return Err(ConfigError::Invalid("at least one listen address is required".into()));
        }
        if self.heartbeat_interval_secs == 0 {
            return Err(ConfigError::Invalid("heartbeat_interval_secs cannot be 0".into()));
        }
        if self.max_transmit_size == 0 {
            return Err(ConfigError::Invalid("max_transmit_size cannot be 0".into()));
        }
        if self.command_buffer == 0 || self.inbound_buffer == 0 {
            return Err(ConfigError::Invalid("channel buffers cannot be 0".into()));
        }
        Ok(())
    }
}

// ============================================================================
// RELAY CONFIG
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    pub rpc: RpcConfig,
    pub p2p: P2pConfig,
    /// Topics joined at startup so inbound messages reach the pool
    pub topics: Vec<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            rpc: RpcConfig::default(),
            p2p: P2pConfig::default(),
            topics: vec![DEFAULT_MESSAGE_TOPIC.to_string()],
        }
    }
}

impl RelayConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rpc(mut self, rpc: RpcConfig) -> Self {
        self.rpc = rpc;
        self
    }

    pub fn with_p2p(mut self, p2p: P2pConfig) -> Self {
        self.p2p = p2p;
        self
    }

    pub fn with_topics(mut self, topics: Vec<String>) -> Self {
        self.topics = topics;
        self
    }

    /// Startup topics as validated names
    pub fn topic_names(&self) -> Result<Vec<TopicName>, ConfigError> {
        self.topics
            .iter()
            .map(|t| TopicName::new(t.as_str()).map_err(|e| ConfigError::Invalid(e.to_string())))
            .collect()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.rpc.validate()?;
        self.p2p.validate()?;
        self.topic_names()?;
        Ok(())
    }
}
