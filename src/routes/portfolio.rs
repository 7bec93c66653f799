//! # routes::portfolio
//!
//! | Method | Path                                | Description                    |
//! |--------|-------------------------------------|--------------------------------|
//! | GET    | `/portfolio/:userId`                | holdings + balance             |
//! | GET    | `/portfolio/:userId/summary`        | holdings marked to live quotes |
//! | POST   | `/portfolio/buy`                    | ซื้อ                            |
//! | POST   | `/portfolio/sell`                   | ขาย                             |
//! | GET    | `/portfolio/transactions/:userId`   | ประวัติ (ล่าสุดก่อน)             |

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    engine::{ledger::normalize_symbol, portfolio::summarize, LedgerError},
    error::AppError,
    models::TradeType,
    state::SharedState,
};

// ─── Request Bodies ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRequest {
    pub user_id:  String,
    pub symbol:   String,
    /// Signed so a negative value gets a ledger error, not a decode error.
    pub quantity: i64,
    /// Omitted → current quoted price from the stock feed.
    #[serde(default)]
    pub price:    Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

pub(crate) fn require_user(user_id: &str) -> Result<&str, AppError> {
    let user_id = user_id.trim();
    if user_id.is_empty() {
        return Err(AppError::BadRequest("userId is required".to_string()));
    }
    Ok(user_id)
}

// ─── GET /portfolio/:userId ───────────────────────────────────────────────────

pub async fn get_portfolio(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let ledger = state.portfolio.ledger(require_user(&user_id)?).await?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "portfolio": ledger.holdings,
            "balance":   ledger.balance,
        },
    })))
}

// ─── GET /portfolio/:userId/summary ───────────────────────────────────────────

pub async fn get_summary(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let ledger = state.portfolio.ledger(require_user(&user_id)?).await?;
    let quotes = state.stocks.read().await;

    let summary = summarize(&ledger, |symbol| {
        quotes.records().iter().find(|s| s.symbol == symbol).map(|s| s.price)
    });

    Ok(Json(json!({
        "success":         true,
        "data":            summary,
        "quotesUpdatedAt": quotes.fetched_at(),
        "quotesStale":     quotes.is_stale(),
    })))
}

// ─── POST /portfolio/buy · /portfolio/sell ────────────────────────────────────

pub async fn buy(
    State(state): State<SharedState>,
    body: Result<Json<TradeRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    execute_trade(state, body, TradeType::Buy).await
}

pub async fn sell(
    State(state): State<SharedState>,
    body: Result<Json<TradeRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    execute_trade(state, body, TradeType::Sell).await
}

async fn execute_trade(
    state: SharedState,
    body:  Result<Json<TradeRequest>, JsonRejection>,
    side:  TradeType,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let user_id = require_user(&req.user_id)?;
    let symbol = normalize_symbol(&req.symbol)?;
    let quantity = u64::try_from(req.quantity)
        .ok()
        .filter(|q| *q > 0)
        .ok_or(LedgerError::InvalidQuantity)?;

    // ไม่ส่งราคามา → ใช้ราคาล่าสุดจาก feed
    let price = match req.price {
        Some(price) => price,
        None => state
            .stocks
            .find(&symbol)
            .await
            .map(|s| s.price)
            .ok_or_else(|| AppError::NotFound(format!("Stock {symbol} not found")))?,
    };

    let (tx, verb) = match side {
        TradeType::Buy => (state.portfolio.buy(user_id, &symbol, quantity, price).await?, "Bought"),
        TradeType::Sell => (state.portfolio.sell(user_id, &symbol, quantity, price).await?, "Sold"),
    };

    Ok(Json(json!({
        "success": true,
        "message": format!("{verb} {} {} @ ₹{:.2} (total ₹{:.2})", tx.quantity, tx.symbol, tx.price, tx.total),
        "data":    tx,
    })))
}

// ─── GET /portfolio/transactions/:userId ──────────────────────────────────────

pub async fn get_transactions(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<impl IntoResponse, AppError> {
    let txs = state.portfolio.transactions(require_user(&user_id)?, query.limit).await?;
    Ok(Json(json!({
        "success": true,
        "data":    txs,
        "count":   txs.len(),
    })))
}
