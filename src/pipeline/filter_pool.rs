use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::blockchain::{canonical_address, AddressTransaction, Block};
use crate::config::PipelineConfig;
use crate::store::{AddressIndex, SubscriptionSet};

/// Consumes processed blocks, tests each transaction's `from`/`to`
/// against the subscription set, and appends matches to the address
/// index (spec.md §4.4). Each block is handled under its own
/// concurrency slot since filtering and indexing are independent of
/// block order.
pub struct FilterPool {
    subscriptions: Arc<SubscriptionSet>,
    index: Arc<AddressIndex>,
    semaphore: Arc<Semaphore>,
}

impl FilterPool {
    pub fn new(subscriptions: Arc<SubscriptionSet>, index: Arc<AddressIndex>, config: &PipelineConfig) -> Self {
        FilterPool {
            subscriptions,
            index,
            semaphore: Arc::new(Semaphore::new(config.filter_concurrency)),
        }
    }

    pub async fn run(self: Arc<Self>, mut processed_rx: mpsc::Receiver<Block>, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                maybe_block = processed_rx.recv() => {
                    match maybe_block {
                        Some(block) => self.clone().spawn_filter(block).await,
                        None => {
                            tracing::info!("filter pool: processed block queue closed");
                            return;
                        }
                    }
                }
                _ = shutdown.cancelled() => {
                    tracing::info!("filter pool stopping");
                    return;
                }
            }
        }
    }

    async fn spawn_filter(self: Arc<Self>, block: Block) {
        let permit = match self.semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return,
        };

        tokio::spawn(async move {
            let _permit = permit;
            self.filter_block(block);
        });
    }

    /// Tests every transaction's `from` and `to` independently; a
    /// self-transfer between two subscribed addresses produces two
    /// entries under the same address key.
    fn filter_block(&self, block: Block) {
        let mut matches = Vec::new();
        for tx in &block.transactions {
            let from = canonical_address(&tx.from);
            if self.subscriptions.contains(&from) {
                matches.push(AddressTransaction {
                    address: from,
                    transaction: tx.clone(),
                });
            }
            if !tx.to.is_empty() {
                let to = canonical_address(&tx.to);
                if self.subscriptions.contains(&to) {
                    matches.push(AddressTransaction {
                        address: to,
                        transaction: tx.clone(),
                    });
                }
            }
        }

        if matches.is_empty() {
            return;
        }

        self.index.insert_batch(matches);
    }
}
