//! # error
//!
//! Centralised application error type.
//!
//! Every handler returns `Result<_, AppError>`. Axum's `IntoResponse` impl
//! turns these into `{ "success": false, "error": "..." }` so the frontend can
//! show the message inline and block the action.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::engine::{LedgerError, PortfolioError};
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed or semantically invalid request.
    #[error("{0}")]
    BadRequest(String),

    /// Unknown symbol or missing watchlist entry.
    #[error("{0}")]
    NotFound(String),

    /// Trade validation failure; ledger left unchanged.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Catch-all for unexpected failures.
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<PortfolioError> for AppError {
    fn from(err: PortfolioError) -> Self {
        match err {
            PortfolioError::Ledger(e) => AppError::Ledger(e),
            PortfolioError::Store(e) => AppError::Store(e),
            PortfolioError::UnknownUser(user) => AppError::NotFound(format!("User {user} not found")),
        }
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::Ledger(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Store(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }

        let body = Json(json!({
            "success": false,
            "error":   self.to_string(),
        }));

        (status, body).into_response()
    }
}
