pub mod handlers;
pub mod types;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::routing::any;
use axum::Json;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::store::{AddressIndex, BlockCursorStore, SubscriptionSet};
use types::ErrorResponse;

#[derive(Clone)]
pub struct AppState {
    pub cursor: Arc<BlockCursorStore>,
    pub subscriptions: Arc<SubscriptionSet>,
    pub index: Arc<AddressIndex>,
}

async fn not_found() -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: "not found".to_string(),
        }),
    )
}

pub fn router(
    cursor: Arc<BlockCursorStore>,
    subscriptions: Arc<SubscriptionSet>,
    index: Arc<AddressIndex>,
) -> Router {
    let state = Arc::new(AppState {
        cursor,
        subscriptions,
        index,
    });

    Router::new()
        .route("/block-number", any(handlers::block_number))
        .route("/subscribe", any(handlers::subscribe))
        .route("/transactions/{address}", any(handlers::transactions))
        .fallback(not_found)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub async fn serve(
    cursor: Arc<BlockCursorStore>,
    subscriptions: Arc<SubscriptionSet>,
    index: Arc<AddressIndex>,
    port: u16,
) -> eyre::Result<()> {
    let app = router(cursor, subscriptions, index);
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "API server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
