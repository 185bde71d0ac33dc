use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicI64, Ordering};

/// Process-wide monotonically increasing request id counter.
static NEXT_ID: AtomicI64 = AtomicI64::new(1);

fn next_id() -> i64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// A JSON-RPC 2.0 request envelope.
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    pub id: i64,
    pub jsonrpc: &'static str,
    pub method: &'static str,
    pub params: Value,
}

impl Request {
    /// Builds a request with a fresh, monotonically increasing id.
    pub fn new(method: &'static str, params: Value) -> Self {
        Request {
            id: next_id(),
            jsonrpc: "2.0",
            method,
            params,
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

/// A JSON-RPC 2.0 response envelope. `result` and `error` are mutually
/// exclusive per the spec.
#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub id: i64,
    pub jsonrpc: String,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcErrorObject>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_round_trips_through_response_of_same_id() {
        let req = Request::new("eth_blockNumber", Value::Array(vec![]));
        let raw = format!(
            r#"{{"id":{},"jsonrpc":"2.0","result":"0x1"}}"#,
            req.id
        );
        let resp: Response = serde_json::from_str(&raw).unwrap();
        assert_eq!(resp.id, req.id);
    }

    #[test]
    fn ids_are_monotonically_increasing() {
        let a = Request::new("eth_blockNumber", Value::Array(vec![]));
        let b = Request::new("eth_blockNumber", Value::Array(vec![]));
        assert!(b.id > a.id);
    }

    #[test]
    fn result_and_error_decode_independently() {
        let ok: Response =
            serde_json::from_str(r#"{"id":1,"jsonrpc":"2.0","result":"0x5"}"#).unwrap();
        assert!(ok.result.is_some());
        assert!(ok.error.is_none());

        let err: Response = serde_json::from_str(
            r#"{"id":1,"jsonrpc":"2.0","error":{"code":-32000,"message":"boom"}}"#,
        )
        .unwrap();
        assert!(err.result.is_none());
        assert_eq!(err.error.unwrap().code, -32000);
    }
}
