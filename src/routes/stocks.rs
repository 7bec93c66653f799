//! # routes::stocks
//!
//! Market data endpoints: อ่านจาก feed cache เท่านั้น ไม่เคย error เพราะ
//! upstream ล่ม (stale data + `stale: true` แทน)
//!
//! | Method | Path                    | Description                         |
//! |--------|-------------------------|-------------------------------------|
//! | GET    | `/stocks/all`           | ทุกหุ้นใน snapshot                   |
//! | GET    | `/stocks/:symbol`       | หุ้นตัวเดียว                          |
//! | GET    | `/stocks/search/query`  | `?q=` ค้นจาก symbol / name           |
//! | GET    | `/stocks/indices/all`   | ดัชนีทั้งหมด                          |
//! | GET    | `/stocks/feed/status`   | สถานะ feed (age, last error)        |
//! | POST   | `/stocks/refresh`       | บังคับ refetch ทั้งสอง feed           |

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    error::AppError,
    feed::{FeedError, FeedRead},
    models::StockRecord,
    state::SharedState,
};

fn listing<T: serde::Serialize>(read: &FeedRead<T>) -> Json<Value> {
    Json(json!({
        "success":   true,
        "data":      read.records(),
        "count":     read.records().len(),
        "updatedAt": read.fetched_at(),
        "stale":     read.is_stale(),
    }))
}

// ─── GET /stocks/all ──────────────────────────────────────────────────────────

pub async fn list_stocks(State(state): State<SharedState>) -> impl IntoResponse {
    listing(&state.stocks.read().await)
}

// ─── GET /stocks/:symbol ──────────────────────────────────────────────────────

pub async fn get_stock(
    State(state): State<SharedState>,
    Path(symbol): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let stock = state
        .stocks
        .find(&symbol)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Stock {} not found", symbol.to_uppercase())))?;

    Ok(Json(json!({ "success": true, "data": stock })))
}

// ─── GET /stocks/search/query ─────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

pub async fn search_stocks(
    State(state): State<SharedState>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, AppError> {
    let needle = query
        .q
        .map(|q| q.trim().to_lowercase())
        .filter(|q| !q.is_empty())
        .ok_or_else(|| AppError::BadRequest("Query parameter 'q' is required".to_string()))?;

    let read = state.stocks.read().await;
    let hits: Vec<&StockRecord> = read.records().iter().filter(|s| s.matches(&needle)).collect();

    Ok(Json(json!({
        "success": true,
        "data":    hits,
        "count":   hits.len(),
    })))
}

// ─── GET /stocks/indices/all ──────────────────────────────────────────────────

pub async fn list_indices(State(state): State<SharedState>) -> impl IntoResponse {
    listing(&state.indices.read().await)
}

// ─── GET /stocks/feed/status ──────────────────────────────────────────────────

pub async fn feed_status(State(state): State<SharedState>) -> impl IntoResponse {
    let (stocks, indices) = tokio::join!(state.stocks.status(), state.indices.status());
    Json(json!({
        "success": true,
        "data": { "stocks": stocks, "indices": indices },
    }))
}

// ─── POST /stocks/refresh ─────────────────────────────────────────────────────

fn outcome(result: Result<usize, FeedError>) -> Value {
    match result {
        Ok(records) => json!({ "ok": true, "records": records }),
        Err(e) => json!({ "ok": false, "error": e.to_string() }),
    }
}

/// บังคับ refetch, ผลลัพธ์รายงานแยกต่อ feed, snapshot เดิมยังอยู่ถ้าล้มเหลว
pub async fn refresh_feeds(State(state): State<SharedState>) -> impl IntoResponse {
    let (stocks, indices) = tokio::join!(state.stocks.refresh(), state.indices.refresh());
    Json(json!({
        "success": true,
        "data": { "stocks": outcome(stocks), "indices": outcome(indices) },
    }))
}
