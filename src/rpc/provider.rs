use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::blockchain::{Block, BlockNumber};
use crate::error::RpcError;
use crate::rpc::jsonrpc::{Request, Response};

/// Translates the two typed operations the pipeline needs into JSON-RPC
/// 2.0 calls against an upstream EVM-style node.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn get_latest_block_number(&self) -> Result<BlockNumber, RpcError>;
    async fn get_block_by_number(&self, number: BlockNumber) -> Result<Block, RpcError>;
}

/// HTTP JSON-RPC implementation of [`Provider`], constructed once at
/// startup against a single upstream URL.
pub struct HttpProvider {
    client: reqwest::Client,
    url: String,
}

impl HttpProvider {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build HTTP client");
        HttpProvider {
            client,
            url: url.into(),
        }
    }

    async fn call(&self, request: Request) -> Result<Response, RpcError> {
        let resp = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await?
            .json::<Response>()
            .await?;

        if let Some(err) = &resp.error {
            tracing::warn!(code = err.code, message = %err.message, "upstream RPC error");
            return Err(RpcError::Upstream {
                code: err.code,
                message: err.message.clone(),
            });
        }

        Ok(resp)
    }
}

#[async_trait]
impl Provider for HttpProvider {
    async fn get_latest_block_number(&self) -> Result<BlockNumber, RpcError> {
        let request = Request::new("eth_blockNumber", json!([]));
        let response = self.call(request).await?;

        let raw = response
            .result
            .and_then(|v| v.as_str().map(str::to_owned))
            .ok_or(RpcError::UnexpectedResult {
                method: "eth_blockNumber",
            })?;

        Ok(BlockNumber::from_hex(&raw))
    }

    async fn get_block_by_number(&self, number: BlockNumber) -> Result<Block, RpcError> {
        let request = Request::new("eth_getBlockByNumber", json!([number.to_hex(), true]));
        let response = self.call(request).await?;

        let result = response.result.ok_or(RpcError::UnexpectedResult {
            method: "eth_getBlockByNumber",
        })?;

        let block: Block = serde_json::from_value(result)?;
        Ok(block)
    }
}

/// Always compiled (not `cfg(test)`-gated) so integration tests under
/// `tests/` can build pipeline stages against it without depending on
/// the library crate's own unit-test configuration.
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Mutex;

    /// An in-memory stub provider for exercising the pipeline stages
    /// without a network. Not a mocking-library mock: a hand-rolled
    /// fixture implementing the same trait, per the pack's convention
    /// (`evm-provider::mock`).
    pub struct StubProvider {
        pub tip: Mutex<BlockNumber>,
        pub blocks: Mutex<HashMap<i64, Block>>,
        /// How many times `get_block_by_number` has failed for a given
        /// block number so far, and how many failures to inject before
        /// succeeding.
        pub fail_until: Mutex<HashMap<i64, usize>>,
        pub tip_calls: AtomicUsize,
        /// Artificial per-call delay, used by concurrency-cap tests to
        /// keep fetches in flight long enough to observe the cap.
        pub delay: Mutex<Option<Duration>>,
        pub in_flight: AtomicUsize,
        pub max_in_flight: AtomicUsize,
    }

    impl StubProvider {
        pub fn new(tip: BlockNumber) -> Self {
            StubProvider {
                tip: Mutex::new(tip),
                blocks: Mutex::new(HashMap::new()),
                fail_until: Mutex::new(HashMap::new()),
                tip_calls: AtomicUsize::new(0),
                delay: Mutex::new(None),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }

        pub async fn insert_block(&self, number: i64, block: Block) {
            self.blocks.lock().await.insert(number, block);
        }

        /// Causes the next `count` fetch attempts for `number` to fail
        /// before the fixture starts returning the stored block.
        pub async fn fail_next(&self, number: i64, count: usize) {
            self.fail_until.lock().await.insert(number, count);
        }

        pub async fn set_tip(&self, tip: BlockNumber) {
            *self.tip.lock().await = tip;
        }

        pub async fn set_delay(&self, delay: Duration) {
            *self.delay.lock().await = Some(delay);
        }
    }

    #[async_trait]
    impl Provider for StubProvider {
        async fn get_latest_block_number(&self) -> Result<BlockNumber, RpcError> {
            self.tip_calls.fetch_add(1, Ordering::Relaxed);
            Ok(*self.tip.lock().await)
        }

        async fn get_block_by_number(&self, number: BlockNumber) -> Result<Block, RpcError> {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);

            let delay = *self.delay.lock().await;
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            let result = self.get_block_by_number_inner(number).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        }
    }

    impl StubProvider {
        async fn get_block_by_number_inner(&self, number: BlockNumber) -> Result<Block, RpcError> {
            let mut fail_until = self.fail_until.lock().await;
            if let Some(remaining) = fail_until.get_mut(&number.as_i64()) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(RpcError::Upstream {
                        code: -32000,
                        message: "stub induced failure".into(),
                    });
                }
            }
            drop(fail_until);

            self.blocks
                .lock()
                .await
                .get(&number.as_i64())
                .cloned()
                .ok_or(RpcError::UnexpectedResult {
                    method: "eth_getBlockByNumber",
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::StubProvider;
    use super::*;

    #[tokio::test]
    async fn stub_provider_reports_tip() {
        let provider = StubProvider::new(BlockNumber(42));
        assert_eq!(provider.get_latest_block_number().await.unwrap(), BlockNumber(42));
    }

    #[tokio::test]
    async fn stub_provider_fails_then_succeeds() {
        let provider = StubProvider::new(BlockNumber(10));
        provider
            .insert_block(
                10,
                Block {
                    number: Some(BlockNumber(10).to_hex()),
                    ..Default::default()
                },
            )
            .await;
        provider.fail_next(10, 2).await;

        assert!(provider.get_block_by_number(BlockNumber(10)).await.is_err());
        assert!(provider.get_block_by_number(BlockNumber(10)).await.is_err());
        assert!(provider.get_block_by_number(BlockNumber(10)).await.is_ok());
    }
}
