use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::blockchain::{Block, BlockNumber};
use crate::config::PipelineConfig;
use crate::pipeline::fetcher_pool::fetch_with_retries;
use crate::rpc::Provider;
use crate::store::BlockCursorStore;

/// Periodically detects the new chain tip and schedules fetches for
/// every block between `cursor+1` and `tip`, inclusive (spec.md §4.1).
pub struct TipWatcher<P: Provider> {
    provider: Arc<P>,
    cursor: Arc<BlockCursorStore>,
    fetch_tx: mpsc::Sender<BlockNumber>,
    processed_tx: mpsc::Sender<Block>,
    config: PipelineConfig,
    /// Guards against two ticks overlapping; a tick that fires while the
    /// previous one is still running is skipped rather than queued.
    tick_guard: Mutex<()>,
}

impl<P: Provider + 'static> TipWatcher<P> {
    pub fn new(
        provider: Arc<P>,
        cursor: Arc<BlockCursorStore>,
        fetch_tx: mpsc::Sender<BlockNumber>,
        processed_tx: mpsc::Sender<Block>,
        config: PipelineConfig,
    ) -> Self {
        TipWatcher {
            provider,
            cursor,
            fetch_tx,
            processed_tx,
            config,
            tick_guard: Mutex::new(()),
        }
    }

    /// Runs until `shutdown` is cancelled.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.tick_interval());
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.clone().on_tick().await;
                }
                _ = shutdown.cancelled() => {
                    tracing::info!("tip watcher stopping");
                    return;
                }
            }
        }
    }

    /// Runs a single tick. Coalesces: if the previous tick is still in
    /// flight, this one is skipped rather than queued.
    async fn on_tick(self: Arc<Self>) {
        let guard = match self.tick_guard.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                tracing::debug!("tip watcher tick skipped: previous tick still running");
                return;
            }
        };

        if let Err(e) = self.process_new_blocks().await {
            tracing::warn!(error = %e, "tip watcher: failed to process new blocks");
        }

        drop(guard);
    }

    async fn process_new_blocks(&self) -> eyre::Result<()> {
        let tip = self
            .provider
            .get_latest_block_number()
            .await
            .map_err(|e| eyre::eyre!("fetching latest block number: {}", e))?;

        let cursor = self.cursor.get();

        if cursor == BlockNumber::EARLIEST {
            tracing::info!(tip = %tip, "cold start: fetching tip in-line");
            match fetch_with_retries(&*self.provider, tip, self.config.max_retries).await {
                Ok(block) => {
                    self.processed_tx
                        .send(block)
                        .await
                        .map_err(|_| eyre::eyre!("processed block queue closed"))?;
                    // Only set on success, unlike the optimistic branch below:
                    // a cold-start fetch failure must not advance the cursor
                    // past a block that was never observed.
                    self.cursor.set(tip);
                }
                Err(()) => {
                    tracing::error!(tip = %tip, "cold start: failed to fetch tip block");
                }
            }
            return Ok(());
        }

        if tip.as_i64() > cursor.as_i64() {
            let start = cursor.inc();
            tracing::info!(from = %start, to = %tip, "scheduling block range");
            self.schedule_range(start, tip);
            // Optimistic: the cursor tracks "claimed", not "completed".
            self.cursor.set(tip);
        }

        Ok(())
    }

    /// Schedules `[start, end]` onto the fetcher pool without blocking
    /// the tip loop's critical section.
    fn schedule_range(&self, start: BlockNumber, end: BlockNumber) {
        let fetch_tx = self.fetch_tx.clone();
        let start = start.as_i64();
        let end = end.as_i64();
        tokio::spawn(async move {
            for n in start..=end {
                if fetch_tx.send(BlockNumber(n)).await.is_err() {
                    tracing::warn!("processed block queue closed while scheduling range");
                    return;
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::Block;
    use crate::rpc::provider::mock::StubProvider;

    fn config() -> PipelineConfig {
        PipelineConfig {
            queue_buffer: 16,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn cold_start_fetches_tip_alone_and_sets_cursor() {
        let provider = Arc::new(StubProvider::new(BlockNumber(100)));
        provider.insert_block(100, Block::default()).await;
        let cursor = Arc::new(BlockCursorStore::new());
        let (tx, _rx) = mpsc::channel(16);
        let (processed_tx, mut processed_rx) = mpsc::channel(16);

        let watcher = Arc::new(TipWatcher::new(provider, cursor.clone(), tx, processed_tx, config()));
        watcher.process_new_blocks().await.unwrap();

        assert_eq!(cursor.get(), BlockNumber(100));
        assert!(processed_rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn cold_start_fetch_failure_leaves_cursor_untouched() {
        let provider = Arc::new(StubProvider::new(BlockNumber(100)));
        provider.fail_next(100, 1000).await; // never succeeds
        let cursor = Arc::new(BlockCursorStore::new());
        let (tx, _rx) = mpsc::channel(16);
        let (processed_tx, mut processed_rx) = mpsc::channel(16);

        let watcher = Arc::new(TipWatcher::new(provider, cursor.clone(), tx, processed_tx, config()));
        watcher.process_new_blocks().await.unwrap();

        assert_eq!(cursor.get(), BlockNumber::EARLIEST);
        assert!(processed_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn tip_equal_cursor_schedules_nothing() {
        let provider = Arc::new(StubProvider::new(BlockNumber(50)));
        let cursor = Arc::new(BlockCursorStore::new());
        cursor.set(BlockNumber(50));
        let (tx, mut rx) = mpsc::channel(16);
        let (processed_tx, _processed_rx) = mpsc::channel(16);

        let watcher = Arc::new(TipWatcher::new(provider, cursor.clone(), tx, processed_tx, config()));
        watcher.process_new_blocks().await.unwrap();

        assert_eq!(cursor.get(), BlockNumber(50));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn tip_ahead_schedules_range_and_advances_cursor_optimistically() {
        let provider = Arc::new(StubProvider::new(BlockNumber(13)));
        let cursor = Arc::new(BlockCursorStore::new());
        cursor.set(BlockNumber(10));
        let (tx, mut rx) = mpsc::channel(16);
        let (processed_tx, _processed_rx) = mpsc::channel(16);

        let watcher = Arc::new(TipWatcher::new(provider, cursor.clone(), tx, processed_tx, config()));
        watcher.process_new_blocks().await.unwrap();

        assert_eq!(cursor.get(), BlockNumber(13));

        let mut seen = vec![];
        for _ in 0..3 {
            seen.push(rx.recv().await.unwrap());
        }
        seen.sort();
        assert_eq!(seen, vec![BlockNumber(11), BlockNumber(12), BlockNumber(13)]);
    }

    #[tokio::test]
    async fn rpc_error_on_tip_leaves_cursor_untouched() {
        struct FailingProvider;
        #[async_trait::async_trait]
        impl Provider for FailingProvider {
            async fn get_latest_block_number(
                &self,
            ) -> Result<BlockNumber, crate::error::RpcError> {
                Err(crate::error::RpcError::Upstream {
                    code: -1,
                    message: "down".into(),
                })
            }
            async fn get_block_by_number(
                &self,
                _number: BlockNumber,
            ) -> Result<Block, crate::error::RpcError> {
                unreachable!()
            }
        }

        let provider = Arc::new(FailingProvider);
        let cursor = Arc::new(BlockCursorStore::new());
        cursor.set(BlockNumber(5));
        let (tx, mut rx) = mpsc::channel(16);
        let (processed_tx, _processed_rx) = mpsc::channel(16);

        let watcher = Arc::new(TipWatcher::new(provider, cursor.clone(), tx, processed_tx, config()));
        assert!(watcher.process_new_blocks().await.is_err());

        assert_eq!(cursor.get(), BlockNumber(5));
        assert!(rx.try_recv().is_err());
    }
}
