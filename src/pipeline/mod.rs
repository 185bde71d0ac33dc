pub mod fetcher_pool;
pub mod filter_pool;
pub mod retry_processor;
pub mod tip_watcher;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::HeartbeatConfig;
use crate::config::PipelineConfig;
use crate::rpc::Provider;
use crate::store::{AddressIndex, BlockCursorStore, SubscriptionSet};

pub use fetcher_pool::FetcherPool;
pub use filter_pool::FilterPool;
pub use retry_processor::RetryProcessor;
pub use tip_watcher::TipWatcher;

/// Constructs and spawns the four pipeline stages, wired together with
/// the bounded channels spec.md §2 describes, and returns their join
/// handles so the caller can await them on shutdown.
pub fn spawn_stages<P: Provider + 'static>(
    provider: Arc<P>,
    cursor: Arc<BlockCursorStore>,
    subscriptions: Arc<SubscriptionSet>,
    index: Arc<AddressIndex>,
    config: &PipelineConfig,
    shutdown: CancellationToken,
) -> Vec<tokio::task::JoinHandle<()>> {
    let (fetch_tx, fetch_rx) = tokio::sync::mpsc::channel(config.queue_buffer);
    let (processed_tx, processed_rx) = tokio::sync::mpsc::channel(config.queue_buffer);
    let (retry_tx, retry_rx) = tokio::sync::mpsc::channel(config.queue_buffer);

    let tip_watcher = Arc::new(TipWatcher::new(
        provider.clone(),
        cursor,
        fetch_tx,
        processed_tx.clone(),
        config.clone(),
    ));
    let fetcher_pool = Arc::new(FetcherPool::new(
        provider.clone(),
        processed_tx.clone(),
        retry_tx,
        config,
    ));
    let retry_processor = Arc::new(RetryProcessor::new(provider, processed_tx, config));
    let filter_pool = Arc::new(FilterPool::new(subscriptions, index, config));

    vec![
        tokio::spawn(tip_watcher.run(shutdown.clone())),
        tokio::spawn(fetcher_pool.run(fetch_rx, shutdown.clone())),
        tokio::spawn(retry_processor.run(retry_rx, shutdown.clone())),
        tokio::spawn(filter_pool.run(processed_rx, shutdown)),
    ]
}

/// Logs a heartbeat line on a fixed interval for the life of the
/// process, independent of the four pipeline stages (spec.md §4,
/// supplement).
pub async fn run_heartbeat(config: HeartbeatConfig, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval(config.interval());
    ticker.tick().await; // first tick fires immediately, skip it

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                tracing::info!("heartbeat");
            }
            _ = shutdown.cancelled() => {
                tracing::info!("heartbeat stopping");
                return;
            }
        }
    }
}
