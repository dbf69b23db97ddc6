//! Sandgrid Control-Plane API
//!
//! This binary serves the HTTP API clients use to inspect running
//! sandboxes and update their metadata. Sandbox state lives on the
//! worker nodes; this service keeps a registry mirror and commits every
//! change remotely before reflecting it locally.

use anyhow::Result;
use axum::{
    Router,
    http::{StatusCode, header},
    middleware,
    response::IntoResponse,
    routing::get,
};
use clap::Parser;
use sandgrid_api::auth_middleware::{AuthState, auth_layer};
use sandgrid_api::metrics::api_metrics;
use sandgrid_api::metrics_middleware;
use sandgrid_api::node_pool::NodePool;
use sandgrid_api::orchestrator::Orchestrator;
use sandgrid_api::sandboxes::{self, AppState};
use sandgrid_common::{Config, NodeId, NodeRef, SandboxId};
use sandgrid_registry::{InstanceRecord, InstanceRegistry};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Prometheus metrics endpoint handler
async fn metrics_handler() -> impl IntoResponse {
    let metrics = api_metrics().export_prometheus();
    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        metrics,
    )
}

#[derive(Parser, Debug)]
#[command(name = "sandgrid-api")]
#[command(about = "Sandgrid Control-Plane API")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "/etc/sandgrid/api.toml")]
    config: String,

    /// Listen address for the HTTP API (overrides the config file)
    #[arg(short, long)]
    listen: Option<String>,

    /// API key accepted by the auth middleware (repeatable, overrides the config file)
    #[arg(long = "api-key")]
    api_keys: Vec<String>,

    /// Disable authentication (for development)
    #[arg(long, default_value_t = false)]
    no_auth: bool,

    /// Pre-register a running sandbox as `<sandbox_id>=<node_address>`
    /// (development/testing; provisioning is not part of this service)
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

    info!("Starting Sandgrid Control-Plane API");

    // Load configuration (defaults when no file is present)
    let cfg = if std::path::Path::new(&args.config).exists() {
        config::Config::builder()
            .add_source(config::File::with_name(&args.config))
            .build()?
            .try_deserialize::<Config>()?
    } else {
        Config::default()
    };

    // Instance registry and node connection pool
    let registry = Arc::new(InstanceRegistry::new());
    let pool = Arc::new(NodePool::new(Duration::from_millis(
        cfg.api.node_rpc_timeout_ms,
    )));

    // Development seeds: pre-register running sandboxes
    let mut node_ids: HashMap<String, NodeId> = HashMap::new();
    for seed in &args.seeds {
        let (raw_id, address) = seed.split_once('=').ok_or_else(|| {
            anyhow::anyhow!("invalid --seed '{}', expected <sandbox_id>=<node_address>", seed)
        })?;
        let sandbox_id = SandboxId::parse(raw_id)
            .map_err(|e| anyhow::anyhow!("invalid --seed sandbox id '{}': {}", raw_id, e))?;
        let node_id = *node_ids
            .entry(address.to_string())
            .or_insert_with(NodeId::new);
        registry.insert(Arc::new(InstanceRecord::new(
            sandbox_id,
            NodeRef::new(node_id, address),
            HashMap::new(),
        )));
    }
    if !args.seeds.is_empty() {
        info!("Seeded {} sandbox record(s)", args.seeds.len());
    }

    // Application state
    let state = Arc::new(AppState {
        registry: Arc::clone(&registry),
        orchestrator: Orchestrator::new(registry, pool),
    });

    // Build router
    // Metrics and health routes first (no auth)
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(sandboxes::health_check))
        .merge(sandboxes::router(state));

    let app = if args.no_auth {
        info!("Authentication is DISABLED (development mode)");
        app
    } else {
        let keys = if args.api_keys.is_empty() {
            cfg.api.api_keys.clone()
        } else {
            args.api_keys.clone()
        };
        anyhow::ensure!(
            !keys.is_empty(),
            "no API keys configured; pass --api-key or use --no-auth"
        );
        info!("Authentication is ENABLED ({} key(s))", keys.len());
        let auth_state = Arc::new(AuthState::new(keys));
        app.layer(middleware::from_fn_with_state(auth_state, auth_layer))
    };

    let app = app
        .layer(middleware::from_fn(metrics_middleware::metrics_layer))
        .layer(TraceLayer::new_for_http());

    // Parse listen address
    let listen = args.listen.unwrap_or_else(|| cfg.api.listen.to_string());
    let addr: SocketAddr = listen
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid listen address {}: {}", listen, e))?;

    info!("Starting API server on {}", addr);

    // Start server
    let listener = TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutting down...");
        })
        .await?;

    info!("API server shut down gracefully");

    Ok(())
}
