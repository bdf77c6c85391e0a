//! Shoplist storage node.
//!
//! Serves the client and peer HTTP API, stores lists in SQLite and runs the
//! gossip, anti-entropy and hinted-handoff loops.
//!
//! Usage:
//!   shoplist-node --port 7000
//!   shoplist-node --port 7001 --seed 127.0.0.1:7000 --data node1.db

use anyhow::{Context, Result};
use clap::Parser;
use shoplist_cluster::{ClusterConfig, ClusterNode, HttpTransport, spawn_background};
use shoplist_node::build_router;
use shoplist_ring::HashRing;
use shoplist_storage::{KvStore, ListStore, MemoryStore, SqliteStore};
use shoplist_types::NodeAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "shoplist-node")]
#[command(about = "Shoplist replicated storage node")]
struct Args {
    /// Address other nodes reach this node at
    #[arg(short, long, default_value = "127.0.0.1")]
    address: String,

    /// HTTP port
    #[arg(short, long, default_value = "7000")]
    port: u16,

    /// Interface to bind
    #[arg(long, default_value = "0.0.0.0")]
    bind: String,

    /// Existing member to join through (host:port)
    #[arg(short, long)]
    seed: Option<NodeAddr>,

    /// SQLite database file, or `:memory:` for an ephemeral node
    #[arg(short, long, default_value = "shoplist.db")]
    data: String,

    /// Gossip period in seconds
    #[arg(long)]
    gossip_interval: Option<u64>,

    /// Anti-entropy period in seconds
    #[arg(long)]
    anti_entropy_interval: Option<u64>,

    /// Hinted-handoff period in seconds
    #[arg(long)]
    handoff_interval: Option<u64>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn cluster_config(&self) -> ClusterConfig {
        let mut config = ClusterConfig::default();
        if let Some(secs) = self.gossip_interval {
            config.gossip_interval = Duration::from_secs(secs.max(1));
        }
        if let Some(secs) = self.anti_entropy_interval {
            config.anti_entropy_interval = Duration::from_secs(secs.max(1));
        }
        if let Some(secs) = self.handoff_interval {
            config.hinted_handoff_interval = Duration::from_secs(secs.max(1));
        }
        config
    }

    fn open_store(&self) -> Result<Arc<dyn KvStore>> {
        if self.data == ":memory:" {
            return Ok(Arc::new(MemoryStore::new()));
        }
        let store = SqliteStore::open(&self.data)
            .with_context(|| format!("failed to open database {}", self.data))?;
        Ok(Arc::new(store))
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let lists = Arc::new(ListStore::new(args.open_store()?));
    let indexed = lists
        .rebuild_index()
        .context("failed to rebuild digest index")?;
    info!(lists = indexed, data = %args.data, "store opened");

    let config = args.cluster_config();
    let transport = HttpTransport::new(config.request_timeout)
        .context("failed to build HTTP client")?;
    let addr = NodeAddr::new(args.address.clone(), args.port.to_string());
    let node = ClusterNode::new(
        addr.clone(),
        Arc::new(HashRing::new()),
        lists,
        Arc::new(transport),
        config,
    );

    let listener = tokio::net::TcpListener::bind((args.bind.as_str(), args.port))
        .await
        .with_context(|| format!("failed to bind {}:{}", args.bind, args.port))?;
    info!(node = %addr, "listening");

    if let Some(seed) = &args.seed {
        let learned = node
            .join(seed)
            .await
            .with_context(|| format!("failed to join cluster through {seed}"))?;
        info!(seed = %seed, learned, "joined cluster");
    }

    let tasks = spawn_background(Arc::clone(&node));
    axum::serve(listener, build_router(node))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    tasks.shutdown().await;
    Ok(())
}
