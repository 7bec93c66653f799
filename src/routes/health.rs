use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;

use crate::state::SharedState;

/// GET /health: liveness + feed freshness. ไม่ trigger refetch
pub async fn health_check(State(state): State<SharedState>) -> impl IntoResponse {
    let (stocks, indices) = tokio::join!(state.stocks.state(), state.indices.state());
    Json(json!({
        "success": true,
        "status":  "ok",
        "service": "papertrade",
        "feeds":   { "stocks": stocks, "indices": indices },
    }))
}
