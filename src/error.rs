use thiserror::Error;

/// Errors raised by the RPC provider.
///
/// Every variant is handled at the call site: a transient failure is
/// logged and retried by the caller (fetcher pool / tip watcher), it
/// never propagates past the provider boundary as anything but one of
/// these variants (spec.md §7).
#[derive(Debug, Error)]
pub enum RpcError {
    /// The HTTP request itself failed (connection refused, timeout, DNS).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body wasn't valid JSON-RPC.
    #[error("malformed response: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The upstream node returned a non-null `error` object.
    #[error("upstream error {code}: {message}")]
    Upstream { code: i64, message: String },

    /// `result` was present but didn't decode into the expected shape.
    #[error("unexpected result shape for {method}")]
    UnexpectedResult { method: &'static str },
}
