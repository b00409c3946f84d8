//! Chain relay node.
//!
//! Gossips signed messages over a libp2p overlay, keeps a pool of pending
//! messages, and answers chain-state queries over a small TCP RPC.

pub mod chain;
pub mod config;
pub mod host;
pub mod message;
pub mod mpool;
pub mod relay;
pub mod rpc;
pub mod topic;
