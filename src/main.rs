use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use visage_engine::{Compositor, ComputePool, ExtractorConfig, FeatureExtractor};
use visage_pipeline::{PortraitPipeline, SyntheticPipeline};
use visage_server::{HandlerState, ServerConfig};
use visage_store::{SessionStore, DEFAULT_CAPACITY};
use visage_telemetry::{init_telemetry, TelemetryConfig};

/// Interactive portrait re-rendering server: upload a photo once, then steer
/// expression and pose edits over a WebSocket and receive a freshly rendered
/// frame per parameter vector.
#[derive(Parser, Debug)]
#[command(name = "visage", version, about)]
struct Args {
    /// Port to listen on.
    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// Maximum cached sessions before least-recently-used eviction.
    #[arg(long, default_value_t = DEFAULT_CAPACITY)]
    capacity: usize,

    /// Concurrent heavy-compute slots; size to the available devices.
    #[arg(long, default_value_t = 2)]
    workers: usize,

    /// Model backend. `synthetic` is the built-in CPU reference backend;
    /// weight-backed pipelines register under their own names.
    #[arg(long, default_value = "synthetic")]
    backend: String,

    /// Emit JSON log lines.
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_telemetry(&TelemetryConfig {
        json: args.json_logs,
        ..Default::default()
    });

    let pipeline: Arc<dyn PortraitPipeline> = match args.backend.as_str() {
        "synthetic" => Arc::new(SyntheticPipeline::new()),
        other => anyhow::bail!("unknown backend: {other}"),
    };

    tracing::info!(
        backend = %args.backend,
        capacity = args.capacity,
        workers = args.workers,
        "starting visage"
    );

    let pool = Arc::new(ComputePool::new(args.workers));
    let extractor = Arc::new(FeatureExtractor::new(
        Arc::clone(&pipeline),
        Arc::clone(&pool),
        ExtractorConfig::default(),
    ));
    let store = Arc::new(SessionStore::new(args.capacity, extractor));
    let compositor = Compositor::new(pipeline, pool);
    let state = Arc::new(HandlerState::new(store, compositor));

    let config = ServerConfig {
        port: args.port,
        ..Default::default()
    };
    let handle = visage_server::start(config, state)
        .await
        .context("failed to start server")?;
    tracing::info!(port = handle.port, "visage ready");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl+c")?;
    tracing::info!("shutting down");
    Ok(())
}
