//! # routes::watchlist

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use super::portfolio::require_user;
use crate::{engine::ledger::normalize_symbol, error::AppError, state::SharedState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchlistRequest {
    pub user_id: String,
    pub symbol:  String,
}

fn parse(body: Result<Json<WatchlistRequest>, JsonRejection>) -> Result<(String, String), AppError> {
    let Json(req) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let user_id = require_user(&req.user_id)?.to_string();
    Ok((user_id, normalize_symbol(&req.symbol)?))
}

/// GET /watchlist/:userId
pub async fn get_watchlist(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let symbols = state.watchlist.list(require_user(&user_id)?).await?;
    Ok(Json(json!({ "success": true, "data": symbols })))
}

/// POST /watchlist/add, ซ้ำได้ ไม่ error
pub async fn add_to_watchlist(
    State(state): State<SharedState>,
    body: Result<Json<WatchlistRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let (user_id, symbol) = parse(body)?;
    let added = state.watchlist.add(&user_id, &symbol).await?;

    let message = if added {
        format!("{symbol} added to watchlist")
    } else {
        format!("{symbol} is already in watchlist")
    };
    Ok(Json(json!({ "success": true, "message": message })))
}

/// POST /watchlist/remove
pub async fn remove_from_watchlist(
    State(state): State<SharedState>,
    body: Result<Json<WatchlistRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let (user_id, symbol) = parse(body)?;
    if !state.watchlist.remove(&user_id, &symbol).await? {
        return Err(AppError::NotFound(format!("{symbol} is not in watchlist")));
    }
    Ok(Json(json!({ "success": true, "message": format!("{symbol} removed from watchlist") })))
}
