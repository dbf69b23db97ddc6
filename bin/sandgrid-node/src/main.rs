//! Sandgrid Worker Node
//!
//! This binary serves the gRPC endpoint the control plane commits
//! sandbox state changes to. The state held here is authoritative.

use anyhow::Result;
use clap::Parser;
use sandgrid_common::{Config, NodeId, SandboxId};
use sandgrid_node::service::SandboxNode;
use sandgrid_proto::node::node_service_server::NodeServiceServer;
use tonic::transport::Server;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "sandgrid-node")]
#[command(about = "Sandgrid Worker Node")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "/etc/sandgrid/node.toml")]
    config: String,

    /// Listen address for gRPC (overrides the config file)
    #[arg(short, long)]
    listen: Option<String>,

    /// Node ID (UUID; generated when omitted)
    #[arg(long)]
    node_id: Option<uuid::Uuid>,

    /// Pre-register a running sandbox by id (development/testing;
    /// provisioning is not part of this service)
    #[arg(long = "seed")]
    seeds: Vec<String>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Sandgrid Worker Node");

    // Load configuration (defaults when no file is present)
    let cfg = if std::path::Path::new(&args.config).exists() {
        config::Config::builder()
            .add_source(config::File::with_name(&args.config))
            .build()?
            .try_deserialize::<Config>()?
    } else {
        Config::default()
    };

    let node_id = args.node_id.map_or_else(NodeId::new, NodeId::from_uuid);
    info!("Node ID: {}", node_id);

    let service = SandboxNode::new(node_id);

    // Development seeds: pre-register running sandboxes
    for seed in &args.seeds {
        let sandbox_id = SandboxId::parse(seed)
            .map_err(|e| anyhow::anyhow!("invalid --seed sandbox id '{}': {}", seed, e))?;
        service.register_sandbox(&sandbox_id);
    }
    if !args.seeds.is_empty() {
        info!("Seeded {} sandbox(es)", args.seeds.len());
    }

    // Parse listen address
    let listen = args
        .listen
        .unwrap_or_else(|| cfg.node.grpc_listen.to_string());
    let addr = listen
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid listen address {}: {}", listen, e))?;

    info!("Starting gRPC server on {}", addr);

    Server::builder()
        .add_service(NodeServiceServer::new(service))
        .serve_with_shutdown(addr, async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutting down...");
        })
        .await?;

    info!("Worker node shut down gracefully");

    Ok(())
}
