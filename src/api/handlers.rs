use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{Method, StatusCode};
use axum::Json;
use serde_json::Value;

use super::types::*;
use super::AppState;

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

fn api_error(status: StatusCode, msg: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (status, Json(ErrorResponse { error: msg.into() }))
}

/// Every route is registered against `any()` and enforces its own
/// expected method here, so the wrong method on a matched route yields
/// 400 (spec.md §6) rather than axum's default 405.
fn require_method(method: &Method, expected: Method) -> Result<(), (StatusCode, Json<ErrorResponse>)> {
    if *method == expected {
        Ok(())
    } else {
        Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("{} not allowed on this route", method),
        ))
    }
}

pub async fn block_number(
    method: Method,
    State(state): State<Arc<AppState>>,
) -> ApiResult<BlockNumberResponse> {
    require_method(&method, Method::GET)?;
    Ok(Json(BlockNumberResponse {
        block_number: state.cursor.get().as_i64(),
    }))
}

/// Accepts the raw JSON body rather than an auto-rejecting `Json<T>`
/// extractor so a malformed body yields our own `ErrorResponse` shape
/// with a JSON content type, per spec.md §6, rather than axum's
/// default plain-text rejection.
pub async fn subscribe(
    method: Method,
    State(state): State<Arc<AppState>>,
    body: axum::body::Bytes,
) -> ApiResult<SubscribeResponse> {
    require_method(&method, Method::POST)?;

    let value: Value = serde_json::from_slice(&body)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("malformed JSON body: {}", e)))?;

    let request: SubscribeRequest = serde_json::from_value(value)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("invalid subscribe request: {}", e)))?;

    if request.address.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "address must not be empty"));
    }

    let subscribed = state.subscriptions.subscribe(&request.address);
    Ok(Json(SubscribeResponse { subscribed }))
}

pub async fn transactions(
    method: Method,
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> ApiResult<TransactionsResponse> {
    require_method(&method, Method::GET)?;

    if address.trim().is_empty() {
        return Err(api_error(StatusCode::NOT_FOUND, "missing address"));
    }

    Ok(Json(TransactionsResponse {
        transactions: state.index.get(&address),
    }))
}
