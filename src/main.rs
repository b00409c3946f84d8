// relayd - run a relay node or call a running one

use clap::{Args, Parser, Subcommand};
use libp2p::Multiaddr;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use chainrelay::chain::{ChainStateError, ChainStateView, TipSummary};
use chainrelay::config::{ConfigError, P2pConfig, RelayConfig, RpcConfig, DEFAULT_MESSAGE_TOPIC};
use chainrelay::host::{HostError, Libp2pHost, OverlayHost, PeerAddrInfo};
use chainrelay::message::{
    Address, CodecError, ContentKey, Keypair, Message, MessageCodec, MessageError, SignedMessage,
    TokenAmount,
};
use chainrelay::relay::{spawn_ingest, RelayService};
use chainrelay::rpc::{RpcClient, RpcError, RpcServer};

#[derive(Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Chain(#[from] ChainStateError),
    #[error(transparent)]
    Host(#[from] HostError),
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Message(#[from] MessageError),
    #[error("Invalid argument: {0}")]
    Argument(String),
}

#[derive(Parser, Debug)]
#[command(name = "relayd")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Default log filter, overridden by RUST_LOG
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// RPC address of a running node (client commands)
    #[arg(long, global = true, default_value = "127.0.0.1:2345")]
    rpc: SocketAddr,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a relay node
    Run(RunArgs),
    /// List peers known to the node
    Peers,
    /// Dial a peer, e.g. /ip4/1.2.3.4/tcp/4001/p2p/12D3...
    Connect { addr: String },
    /// Current chain height
    Height,
    /// Current tip and pool size
    Tipset,
    /// Fee parameters at the current tip
    GasInfo,
    /// Broadcast a hex-encoded signed message
    Publish {
        #[arg(long, default_value = DEFAULT_MESSAGE_TOPIC)]
        topic: String,
        message_hex: String,
    },
    /// Add a hex-encoded signed message to the node's pool
    Push { message_hex: String },
    /// Fetch a pooled message by content key or sender address
    Pending {
        #[arg(long, conflicts_with = "sender", required_unless_present = "sender")]
        key: Option<ContentKey>,
        #[arg(long)]
        sender: Option<Address>,
    },
    /// Sign a message locally and print it hex-encoded
    Sign(SignArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    #[arg(long, default_value = "127.0.0.1:2345")]
    rpc_listen: SocketAddr,

    #[arg(long = "p2p-listen", value_name = "MULTIADDR")]
    p2p_listen: Vec<Multiaddr>,

    #[arg(short = 'B', long = "bootstrap", value_name = "MULTIADDR")]
    bootstrap: Vec<Multiaddr>,

    /// Topics joined at startup
    #[arg(long = "topic")]
    topics: Vec<String>,

    #[arg(long)]
    no_mdns: bool,

    #[arg(long, default_value = "30")]
    request_timeout: u64,

    /// Seed the chain view with a tip at this height
    #[arg(long)]
    tip_height: Option<u64>,

    #[arg(long, default_value = "100")]
    base_fee: u128,
}

#[derive(Args, Debug)]
struct SignArgs {
    /// 32-byte ed25519 secret, hex; a fresh key is generated if omitted
    #[arg(long)]
    secret_hex: Option<String>,

    #[arg(long)]
    to: Address,

    #[arg(long)]
    nonce: u64,

    #[arg(long, default_value = "0")]
    value: u128,

    #[arg(long, default_value = "1000000")]
    gas_limit: u64,

    #[arg(long, default_value = "0")]
    gas_fee_cap: u128,

    #[arg(long, default_value = "0")]
    gas_premium: u128,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = execute(cli).await {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}

async fn execute(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Run(args) => run_node(args).await,
        Command::Sign(args) => sign_message(args),
        command => call_node(cli.rpc, command).await,
    }
}

// ============================================================================
// NODE
// ============================================================================

fn build_config(args: &RunArgs) -> Result<RelayConfig, ConfigError> {
    let rpc = RpcConfig::new()
        .with_listen_addr(args.rpc_listen)
        .with_request_timeout(args.request_timeout);

    let mut p2p = P2pConfig::new()
        .with_bootstrap_peers(args.bootstrap.clone())
        .with_mdns(!args.no_mdns);
    if !args.p2p_listen.is_empty() {
        p2p = p2p.with_listen_addrs(args.p2p_listen.clone());
    }

    let mut config = RelayConfig::new().with_rpc(rpc).with_p2p(p2p);
    if !args.topics.is_empty() {
        config = config.with_topics(args.topics.clone());
    }
    config.validate()?;
    Ok(config)
}

async fn run_node(args: RunArgs) -> Result<(), CliError> {
    let config = build_config(&args)?;

    let (feed, view) = ChainStateView::channel();
    if let Some(height) = args.tip_height {
        feed.publish(TipSummary::new(height, TokenAmount::from_atto(args.base_fee)))?;
    }

    let (host, inbound, swarm_task) = Libp2pHost::spawn(&config.p2p)?;
    let host = Arc::new(host);
    info!(peer_id = %host.local_peer_id(), "relay node starting");

    let service = Arc::new(RelayService::with_host(host.clone(), view));
    for topic in config.topic_names()? {
        if let Err(err) = service.topics().resolve(&topic).await {
            warn!(%topic, %err, "startup join failed");
        }
    }
    let ingest = spawn_ingest(service.clone(), inbound);

    let server = RpcServer::bind(config.rpc.clone(), service.clone()).await?;
    server
        .serve_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(%err, "failed to listen for ctrl-c");
            }
        })
        .await?;

    host.shutdown().await;
    let _ = swarm_task.await;
    if let Ok(stats) = ingest.await {
        info!(?stats, pooled = service.mpool().len(), "relay node stopped");
    }
    drop(feed);
    Ok(())
}

// ============================================================================
// CLIENT COMMANDS
// ============================================================================

async fn call_node(addr: SocketAddr, command: Command) -> Result<(), CliError> {
    let mut client = RpcClient::connect(addr).await?;

    match command {
        Command::Peers => {
            for peer in client.peers().await? {
                println!("{}", peer);
            }
        }
        Command::Connect { addr } => {
            let info = PeerAddrInfo::parse(&addr)?;
            client.connect_peer(info).await?;
            println!("connected");
        }
        Command::Height => println!("{}", client.current_height().await?),
        Command::Tipset => {
            let ret = client.current_tipset().await?;
            println!(
                "height={} parent_base_fee={} observed_at={} mpool_len={}",
                ret.tipset.height, ret.tipset.parent_base_fee, ret.tipset.observed_at, ret.mpool_len
            );
        }
        Command::GasInfo => {
            let ret = client.current_gas_info().await?;
            println!(
                "parent_base_fee={} block_gas_limit={} block_gas_target={} min_gas_premium={}",
                ret.parent_base_fee,
                ret.gas.block_gas_limit,
                ret.gas.block_gas_target,
                ret.gas.min_gas_premium
            );
        }
        Command::Publish { topic, message_hex } => {
            let message = MessageCodec::decode_hex(&message_hex)?;
            client.publish(&topic, message).await?;
            println!("published");
        }
        Command::Push { message_hex } => {
            let message = MessageCodec::decode_hex(&message_hex)?;
            let ret = client.push_message(message).await?;
            println!("{}{}", ret.key, if ret.duplicate { " (duplicate)" } else { "" });
        }
        Command::Pending { key, sender } => {
            let message = match (key, sender) {
                (Some(key), _) => client.pending_message(key).await?,
                (None, Some(sender)) => client.pending_for_sender(sender).await?,
                (None, None) => {
                    return Err(CliError::Argument("--key or --sender is required".into()))
                }
            };
            println!("{}", MessageCodec::encode_hex(&message)?);
        }
        Command::Run(_) | Command::Sign(_) => {}
    }
    Ok(())
}

fn sign_message(args: SignArgs) -> Result<(), CliError> {
    let keypair = match &args.secret_hex {
        Some(secret) => {
            let bytes = hex::decode(secret).map_err(|e| CliError::Argument(e.to_string()))?;
            Keypair::from_secret_bytes(&bytes).map_err(|e| CliError::Argument(e.to_string()))?
        }
        None => {
            let keypair = Keypair::generate();
            eprintln!("secret: {}", hex::encode(keypair.secret_bytes()));
            keypair
        }
    };

    let from = Address::from_public_key(&keypair.public_key());
    let message = Message::new(from, args.to, args.nonce)
        .with_value(TokenAmount::from_atto(args.value))
        .with_gas(
            args.gas_limit,
            TokenAmount::from_atto(args.gas_fee_cap),
            TokenAmount::from_atto(args.gas_premium),
        );
    let signed = SignedMessage::sign(message, &keypair)?;

    eprintln!("from: {}", from);
    eprintln!("key:  {}", signed.content_key());
    println!("{}", MessageCodec::encode_hex(&signed)?);
    Ok(())
}
