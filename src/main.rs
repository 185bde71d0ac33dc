use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use chainwatch_indexer::api;
use chainwatch_indexer::config::Config;
use chainwatch_indexer::pipeline::{run_heartbeat, spawn_stages};
use chainwatch_indexer::rpc::HttpProvider;
use chainwatch_indexer::store::{AddressIndex, BlockCursorStore, SubscriptionSet};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    // Initialize structured logging (set RUST_LOG=info for output)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    tracing::info!("chainwatch-indexer starting");

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path)?;
    tracing::info!(
        rpc_url = %config.rpc.url,
        port = config.server.port,
        "configuration loaded from {}",
        config_path
    );

    let cursor = Arc::new(BlockCursorStore::new());
    let subscriptions = Arc::new(SubscriptionSet::new());
    let index = Arc::new(AddressIndex::new());

    let provider = Arc::new(HttpProvider::new(config.rpc.url.clone(), config.rpc.http_timeout()));

    // Create shutdown signal
    let shutdown = CancellationToken::new();

    let mut handles = spawn_stages(
        provider,
        cursor.clone(),
        subscriptions.clone(),
        index.clone(),
        &config.pipeline,
        shutdown.clone(),
    );

    handles.push(tokio::spawn(run_heartbeat(config.heartbeat, shutdown.clone())));

    let server_shutdown = shutdown.clone();
    let server_port = config.server.port;
    handles.push(tokio::spawn(async move {
        let server = api::serve(cursor, subscriptions, index, server_port);
        tokio::select! {
            result = server => {
                if let Err(e) = result {
                    tracing::error!(error = %e, "API server failed");
                }
            }
            _ = server_shutdown.cancelled() => {
                tracing::info!("API server stopping");
            }
        }
    }));

    tracing::info!("pipeline started. Press Ctrl+C to stop.");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received, stopping all stages...");
    shutdown.cancel();

    // Wait for all tasks to finish
    for handle in handles {
        let _ = handle.await;
    }

    tracing::info!("chainwatch-indexer stopped gracefully");
    Ok(())
}
