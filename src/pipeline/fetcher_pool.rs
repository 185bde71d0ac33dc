use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::blockchain::{Block, BlockNumber};
use crate::config::PipelineConfig;
use crate::rpc::Provider;

/// Attempts to fetch a single block up to `max_retries` times, with no
/// backoff between attempts (spec.md §4.2, §9 open question). Returns
/// `Err` only after every attempt has failed.
pub async fn fetch_with_retries<P: Provider>(
    provider: &P,
    number: BlockNumber,
    max_retries: u32,
) -> Result<Block, ()> {
    let mut last_err = None;
    for attempt in 1..=max_retries {
        match provider.get_block_by_number(number).await {
            Ok(block) => return Ok(block),
            Err(e) => {
                tracing::warn!(
                    block = %number,
                    attempt,
                    max_retries,
                    error = %e,
                    "error fetching block, retrying"
                );
                last_err = Some(e);
            }
        }
    }
    tracing::error!(block = %number, max_retries, error = ?last_err, "exhausted fetch attempts");
    Err(())
}

/// Bounded worker pool (spec.md §4.2): for each requested block number,
/// acquires a concurrency slot, fetches with retries, and routes the
/// result to the processed-block queue on success or the retry queue
/// on exhaustion.
pub struct FetcherPool<P: Provider> {
    provider: Arc<P>,
    semaphore: Arc<Semaphore>,
    processed_tx: mpsc::Sender<Block>,
    retry_tx: mpsc::Sender<BlockNumber>,
    max_retries: u32,
}

impl<P: Provider + 'static> FetcherPool<P> {
    pub fn new(
        provider: Arc<P>,
        processed_tx: mpsc::Sender<Block>,
        retry_tx: mpsc::Sender<BlockNumber>,
        config: &PipelineConfig,
    ) -> Self {
        FetcherPool {
            provider,
            semaphore: Arc::new(Semaphore::new(config.fetch_concurrency)),
            processed_tx,
            retry_tx,
            max_retries: config.max_retries,
        }
    }

    /// Consumes block numbers from `request_rx` until `shutdown` fires.
    pub async fn run(
        self: Arc<Self>,
        mut request_rx: mpsc::Receiver<BlockNumber>,
        shutdown: CancellationToken,
    ) {
        loop {
            tokio::select! {
                maybe_number = request_rx.recv() => {
                    match maybe_number {
                        Some(number) => self.clone().spawn_fetch(number).await,
                        None => {
                            tracing::info!("fetcher pool: request queue closed");
                            return;
                        }
                    }
                }
                _ = shutdown.cancelled() => {
                    tracing::info!("fetcher pool stopping");
                    return;
                }
            }
        }
    }

    async fn spawn_fetch(self: Arc<Self>, number: BlockNumber) {
        let permit = match self.semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return,
        };

        tokio::spawn(async move {
            let _permit = permit;
            match fetch_with_retries(&*self.provider, number, self.max_retries).await {
                Ok(block) => {
                    if self.processed_tx.send(block).await.is_err() {
                        tracing::warn!(block = %number, "processed block queue closed, dropping block");
                    }
                }
                Err(()) => {
                    if self.retry_tx.send(number).await.is_err() {
                        tracing::warn!(block = %number, "retry queue closed, dropping block");
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::provider::mock::StubProvider;

    #[tokio::test]
    async fn successful_fetch_reaches_processed_queue() {
        let provider = Arc::new(StubProvider::new(BlockNumber(5)));
        provider.insert_block(5, Block::default()).await;

        let (processed_tx, mut processed_rx) = mpsc::channel(4);
        let (retry_tx, mut retry_rx) = mpsc::channel(4);
        let (request_tx, request_rx) = mpsc::channel(4);

        let pool = Arc::new(FetcherPool::new(
            provider,
            processed_tx,
            retry_tx,
            &PipelineConfig::default(),
        ));
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(pool.run(request_rx, shutdown.clone()));

        request_tx.send(BlockNumber(5)).await.unwrap();
        assert!(processed_rx.recv().await.is_some());
        assert!(retry_rx.try_recv().is_err());

        shutdown.cancel();
        let _ = handle.await;
    }

    #[tokio::test]
    async fn exhausted_fetch_routes_to_retry_queue() {
        let provider = Arc::new(StubProvider::new(BlockNumber(5)));
        provider.fail_next(5, 100).await; // always fails

        let (processed_tx, mut processed_rx) = mpsc::channel(4);
        let (retry_tx, mut retry_rx) = mpsc::channel(4);
        let (request_tx, request_rx) = mpsc::channel(4);

        let pool = Arc::new(FetcherPool::new(
            provider,
            processed_tx,
            retry_tx,
            &PipelineConfig::default(),
        ));
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(pool.run(request_rx, shutdown.clone()));

        request_tx.send(BlockNumber(5)).await.unwrap();
        assert_eq!(retry_rx.recv().await, Some(BlockNumber(5)));
        assert!(processed_rx.try_recv().is_err());

        shutdown.cancel();
        let _ = handle.await;
    }

    #[tokio::test]
    async fn fetch_concurrency_cap_is_respected() {
        let provider = Arc::new(StubProvider::new(BlockNumber(0)));
        for n in 0..50 {
            provider.insert_block(n, Block::default()).await;
        }
        provider.set_delay(std::time::Duration::from_millis(20)).await;
        let provider_handle = provider.clone();

        let (processed_tx, mut processed_rx) = mpsc::channel(64);
        let (retry_tx, _retry_rx) = mpsc::channel(64);
        let (request_tx, request_rx) = mpsc::channel(64);

        let mut config = PipelineConfig::default();
        config.fetch_concurrency = 5;
        let pool = Arc::new(FetcherPool::new(provider, processed_tx, retry_tx, &config));
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(pool.run(request_rx, shutdown.clone()));

        for n in 0..50 {
            request_tx.send(BlockNumber(n)).await.unwrap();
        }

        for _ in 0..50 {
            assert!(processed_rx.recv().await.is_some());
        }

        assert!(provider_handle.max_in_flight.load(std::sync::atomic::Ordering::SeqCst) <= 5);

        shutdown.cancel();
        let _ = handle.await;
    }
}
