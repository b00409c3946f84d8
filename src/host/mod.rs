// Host module - THE OVERLAY NETWORK
// Abstract peer-to-peer host plus the libp2p and in-process implementations

mod mock;
mod swarm;
mod traits;

pub use mock::MockOverlayHost;
pub use swarm::Libp2pHost;
pub use traits::{HostError, InboundMessage, OverlayHost, PeerAddrInfo};
