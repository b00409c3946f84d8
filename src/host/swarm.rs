// libp2p host - OverlayHost backed by a gossipsub swarm
//
// The swarm is owned by a single driver task. Callers talk to it through
// `Libp2pHost`, which sends commands and awaits a oneshot reply per call.

use async_trait::async_trait;
use futures::StreamExt;
use libp2p::gossipsub::{self, IdentTopic, MessageAuthenticity, TopicHash};
use libp2p::swarm::behaviour::toggle::Toggle;
use libp2p::swarm::dial_opts::DialOpts;
use libp2p::swarm::{NetworkBehaviour, SwarmEvent};
use libp2p::{identify, identity, mdns, noise, tcp, yamux, PeerId, Swarm};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::P2pConfig;
use crate::host::{HostError, InboundMessage, OverlayHost, PeerAddrInfo};
use crate::topic::{ChannelHandle, TopicName};

/// Network behaviour of a relay node
#[derive(NetworkBehaviour)]
pub struct RelayBehaviour {
    pub gossipsub: gossipsub::Behaviour,
    pub identify: identify::Behaviour,
    pub mdns: Toggle<mdns::tokio::Behaviour>,
}

enum HostCommand {
    Peers {
        reply: oneshot::Sender<Vec<PeerId>>,
    },
    Connect {
        info: PeerAddrInfo,
        reply: oneshot::Sender<Result<(), HostError>>,
    },
    Join {
        topic: TopicName,
        reply: oneshot::Sender<Result<ChannelHandle, HostError>>,
    },
    Broadcast {
        hash: TopicHash,
        data: Vec<u8>,
        reply: oneshot::Sender<Result<(), HostError>>,
    },
    Shutdown,
}

// ============================================================================
// HOST HANDLE
// ============================================================================

/// Cloneable handle to a running swarm driver
#[derive(Clone, Debug)]
pub struct Libp2pHost {
    commands: mpsc::Sender<HostCommand>,
    local_peer_id: PeerId,
}

impl std::fmt::Debug for HostCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Peers { .. } => "Peers",
            Self::Connect { .. } => "Connect",
            Self::Join { .. } => "Join",
            Self::Broadcast { .. } => "Broadcast",
            Self::Shutdown => "Shutdown",
        };
        f.write_str(name)
    }
}

impl Libp2pHost {
    /// Build the swarm, start listening and spawn its driver task.
    ///
    /// Returns the host handle, the receiver of payloads arriving on joined
    /// topics, and the driver's join handle.
    pub fn spawn(
        config: &P2pConfig,
    ) -> Result<(Self, mpsc::Receiver<InboundMessage>, JoinHandle<()>), HostError> {
        let keypair = identity::Keypair::generate_ed25519();
        let local_peer_id = keypair.public().to_peer_id();
        let mut swarm = build_swarm(keypair, config)?;

        for addr in &config.listen_addrs {
            swarm
                .listen_on(addr.clone())
                .map_err(|e| HostError::Setup(format!("listen on {}: {}", addr, e)))?;
        }
        for addr in &config.bootstrap_peers {
            match swarm.dial(addr.clone()) {
                Ok(()) => info!(%addr, "dialing bootstrap peer"),
                Err(err) => warn!(%addr, %err, "failed to dial bootstrap peer"),
            }
        }

        let (command_tx, command_rx) = mpsc::channel(config.command_buffer);
        let (inbound_tx, inbound_rx) = mpsc::channel(config.inbound_buffer);

        let driver = SwarmDriver {
            swarm,
            commands: command_rx,
            inbound: inbound_tx,
            topics: HashMap::new(),
            known_peers: HashSet::new(),
            pending_dials: HashMap::new(),
        };
        let handle = tokio::spawn(driver.run());

        info!(%local_peer_id, "p2p host started");
        Ok((
            Self {
                commands: command_tx,
                local_peer_id,
            },
            inbound_rx,
            handle,
        ))
    }

    /// Ask the driver task to stop
    pub async fn shutdown(&self) {
        let _ = self.commands.send(HostCommand::Shutdown).await;
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> HostCommand,
    ) -> Result<T, HostError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(make(reply))
            .await
            .map_err(|_| HostError::Shutdown)?;
        response.await.map_err(|_| HostError::Shutdown)
    }
}

#[async_trait]
impl OverlayHost for Libp2pHost {
    fn local_peer_id(&self) -> PeerId {
        self.local_peer_id
    }

    async fn peers(&self) -> Result<Vec<PeerId>, HostError> {
        self.request(|reply| HostCommand::Peers { reply }).await
    }

    async fn connect(&self, info: &PeerAddrInfo) -> Result<(), HostError> {
        let info = info.clone();
        self.request(|reply| HostCommand::Connect { info, reply })
            .await?
    }

    async fn join(&self, topic: &TopicName) -> Result<ChannelHandle, HostError> {
        let topic = topic.clone();
        self.request(|reply| HostCommand::Join { topic, reply })
            .await?
    }

    async fn broadcast(&self, channel: &ChannelHandle, data: Vec<u8>) -> Result<(), HostError> {
        let hash = channel.hash().clone();
        self.request(|reply| HostCommand::Broadcast { hash, data, reply })
            .await?
    }
}

fn build_swarm(
    keypair: identity::Keypair,
    config: &P2pConfig,
) -> Result<Swarm<RelayBehaviour>, HostError> {
    let gossipsub_config = gossipsub::ConfigBuilder::default()
        .heartbeat_interval(Duration::from_secs(config.heartbeat_interval_secs))
        .validation_mode(gossipsub::ValidationMode::Strict)
        .max_transmit_size(config.max_transmit_size)
        .build()
        .map_err(|e| HostError::Setup(format!("gossipsub config: {}", e)))?;
    let protocol_version = config.protocol_version.clone();
    let enable_mdns = config.enable_mdns;
    let idle_timeout = Duration::from_secs(config.idle_connection_timeout_secs);

    let swarm = libp2p::SwarmBuilder::with_existing_identity(keypair)
        .with_tokio()
        .with_tcp(tcp::Config::default(), noise::Config::new, yamux::Config::default)
        .map_err(|e| HostError::Setup(format!("tcp transport: {}", e)))?
        .with_behaviour(
            move |key| -> Result<RelayBehaviour, Box<dyn std::error::Error + Send + Sync>> {
                let gossipsub = gossipsub::Behaviour::new(
                    MessageAuthenticity::Signed(key.clone()),
                    gossipsub_config,
                )?;
                let identify =
                    identify::Behaviour::new(identify::Config::new(protocol_version, key.public()));
                let mdns = if enable_mdns {
                    Some(mdns::tokio::Behaviour::new(
                        mdns::Config::default(),
                        key.public().to_peer_id(),
                    )?)
                } else {
                    None
                };
                Ok(RelayBehaviour {
                    gossipsub,
                    identify,
                    mdns: Toggle::from(mdns),
                })
            },
        )
        .map_err(|e| HostError::Setup(format!("behaviour: {}", e)))?
        .with_swarm_config(|cfg| cfg.with_idle_connection_timeout(idle_timeout))
        .build();

    Ok(swarm)
}

// ============================================================================
// SWARM DRIVER
// ============================================================================

struct SwarmDriver {
    swarm: Swarm<RelayBehaviour>,
    commands: mpsc::Receiver<HostCommand>,
    inbound: mpsc::Sender<InboundMessage>,
    /// Topics subscribed through Join, by gossipsub hash
    topics: HashMap<TopicHash, TopicName>,
    /// Peers seen through connections, identify or mDNS
    known_peers: HashSet<PeerId>,
    /// Connect calls waiting for the dial outcome
    pending_dials: HashMap<PeerId, Vec<oneshot::Sender<Result<(), HostError>>>>,
}

impl SwarmDriver {
    async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(HostCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                event = self.swarm.select_next_some() => self.handle_swarm_event(event),
            }
        }
        for (peer_id, waiters) in self.pending_dials.drain() {
            debug!(%peer_id, "dropping pending dial on shutdown");
            for waiter in waiters {
                let _ = waiter.send(Err(HostError::Shutdown));
            }
        }
        info!("p2p host stopped");
    }

    fn handle_command(&mut self, command: HostCommand) {
        match command {
            HostCommand::Peers { reply } => {
                let mut peers: HashSet<PeerId> = self.known_peers.clone();
                peers.extend(self.swarm.connected_peers().copied());
                let _ = reply.send(peers.into_iter().collect());
            }
            HostCommand::Connect { info, reply } => self.connect(info, reply),
            HostCommand::Join { topic, reply } => {
                let ident = IdentTopic::new(topic.as_str());
                let result = match self.swarm.behaviour_mut().gossipsub.subscribe(&ident) {
                    Ok(_) => {
                        let hash = ident.hash();
                        self.topics.insert(hash.clone(), topic.clone());
                        info!(%topic, "joined topic");
                        Ok(ChannelHandle::new(topic, hash))
                    }
                    Err(err) => Err(HostError::JoinRejected(err.to_string())),
                };
                let _ = reply.send(result);
            }
            HostCommand::Broadcast { hash, data, reply } => {
                let len = data.len();
                let result = self
                    .swarm
                    .behaviour_mut()
                    .gossipsub
                    .publish(hash.clone(), data)
                    .map(|message_id| debug!(%hash, %message_id, len, "broadcast message"))
                    .map_err(|err| HostError::BroadcastFailed(err.to_string()));
                let _ = reply.send(result);
            }
            HostCommand::Shutdown => {}
        }
    }

    fn connect(&mut self, info: PeerAddrInfo, reply: oneshot::Sender<Result<(), HostError>>) {
        let peer_id = info.peer_id;
        if self.swarm.is_connected(&peer_id) {
            let _ = reply.send(Ok(()));
            return;
        }
        for addr in &info.addrs {
            self.swarm.add_peer_address(peer_id, addr.clone());
        }
        // A dial to this peer is in flight; wait on its outcome
        if let Some(waiters) = self.pending_dials.get_mut(&peer_id) {
            debug!(%peer_id, "joining in-flight dial");
            waiters.push(reply);
            return;
        }

        let opts = DialOpts::peer_id(peer_id).addresses(info.addrs.clone()).build();
        match self.swarm.dial(opts) {
            Ok(()) => {
                info!(%peer_id, "dialing peer");
                self.pending_dials.entry(peer_id).or_default().push(reply);
            }
            Err(err) => {
                warn!(%peer_id, %err, "dial rejected");
                let _ = reply.send(Err(HostError::DialFailed(err.to_string())));
            }
        }
    }

    fn resolve_dial(&mut self, peer_id: &PeerId, result: Result<(), HostError>) {
        if let Some(waiters) = self.pending_dials.remove(peer_id) {
            for waiter in waiters {
                let _ = waiter.send(result.clone());
            }
        }
    }

    fn handle_swarm_event(&mut self, event: SwarmEvent<RelayBehaviourEvent>) {
        match event {
            SwarmEvent::NewListenAddr { address, .. } => {
                info!(%address, "listening");
            }
            SwarmEvent::ConnectionEstablished { peer_id, .. } => {
                debug!(%peer_id, "connection established");
                self.known_peers.insert(peer_id);
                self.resolve_dial(&peer_id, Ok(()));
            }
            SwarmEvent::ConnectionClosed {
                peer_id,
                num_established,
                ..
            } => {
                debug!(%peer_id, num_established, "connection closed");
            }
            SwarmEvent::OutgoingConnectionError {
                peer_id: Some(peer_id),
                error,
                ..
            } => {
                warn!(%peer_id, %error, "outgoing connection failed");
                self.resolve_dial(&peer_id, Err(HostError::DialFailed(error.to_string())));
            }
            SwarmEvent::Behaviour(event) => self.handle_behaviour_event(event),
            _ => {}
        }
    }

    fn handle_behaviour_event(&mut self, event: RelayBehaviourEvent) {
        match event {
            RelayBehaviourEvent::Gossipsub(gossipsub::Event::Message {
                propagation_source,
                message,
                ..
            }) => {
                let Some(topic) = self.topics.get(&message.topic).cloned() else {
                    debug!(hash = %message.topic, "message on unknown topic");
                    return;
                };
                let inbound = InboundMessage {
                    topic,
                    source: message.source.or(Some(propagation_source)),
                    data: message.data,
                };
                if let Err(err) = self.inbound.try_send(inbound) {
                    warn!(%propagation_source, %err, "inbound queue full, dropping message");
                }
            }
            RelayBehaviourEvent::Gossipsub(other) => {
                debug!(?other, "gossipsub event");
            }
            RelayBehaviourEvent::Identify(identify::Event::Received { peer_id, info, .. }) => {
                self.known_peers.insert(peer_id);
                for addr in info.listen_addrs {
                    self.swarm.add_peer_address(peer_id, addr);
                }
            }
            RelayBehaviourEvent::Identify(_) => {}
            RelayBehaviourEvent::Mdns(mdns::Event::Discovered(list)) => {
                for (peer_id, addr) in list {
                    debug!(%peer_id, %addr, "mdns discovered peer");
                    self.known_peers.insert(peer_id);
                    self.swarm.add_peer_address(peer_id, addr);
                    self.swarm.behaviour_mut().gossipsub.add_explicit_peer(&peer_id);
                }
            }
            RelayBehaviourEvent::Mdns(mdns::Event::Expired(list)) => {
                for (peer_id, _) in list {
                    self.swarm.behaviour_mut().gossipsub.remove_explicit_peer(&peer_id);
                }
            }
        }
    }
}
