//! # store::postgres — PostgreSQL Store
//!
//! ใช้ `sqlx` (runtime queries), เปิดด้วย `--features postgres`
//!
//! ## Setup
//! 1. สร้าง database แล้วตั้ง `DATABASE_URL` ใน `.env`
//! 2. Migration `migrations/001_init.sql` ถูกรันอัตโนมัติตอน [`PgStore::connect`]

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, Executor, PgPool};
use tracing::info;
use uuid::Uuid;

use super::{LedgerRepository, StoreError, WatchlistRepository};
use crate::engine::ledger::{HoldingChange, TradeCommit};
use crate::models::{Holding, Transaction, UserLedger};

const MIGRATION: &str = include_str!("../../migrations/001_init.sql");

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect and apply the embedded migration.
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        info!("Connecting to PostgreSQL...");

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(std::time::Duration::from_secs(5))
            .connect(database_url)
            .await
            .context("Failed to connect to PostgreSQL")?;

        // raw &str → simple query protocol, so the multi-statement file runs as-is
        pool.execute(MIGRATION)
            .await
            .context("Failed to run migration 001_init.sql")?;

        info!("✅ PostgreSQL connected and migrations applied");
        Ok(Self { pool })
    }
}

fn to_quantity(raw: i64) -> Result<u64, StoreError> {
    u64::try_from(raw).map_err(|_| StoreError::Corrupt(format!("negative quantity {raw}")))
}

fn to_db_quantity(quantity: u64) -> Result<i64, StoreError> {
    i64::try_from(quantity).map_err(|_| StoreError::Corrupt(format!("quantity {quantity} overflows BIGINT")))
}

type TransactionRow = (Uuid, String, String, i64, f64, f64, DateTime<Utc>);

// ─── Ledger ───────────────────────────────────────────────────────────────────

#[async_trait]
impl LedgerRepository for PgStore {
    async fn load(&self, user_id: &str) -> Result<Option<UserLedger>, StoreError> {
        let balance: Option<(f64,)> =
            sqlx::query_as("SELECT balance FROM user_balance WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        let Some((balance,)) = balance else {
            return Ok(None);
        };

        let holdings = sqlx::query_as::<_, (String, i64, f64)>(
            "SELECT symbol, quantity, avg_price FROM portfolio WHERE user_id = $1 ORDER BY symbol",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|(symbol, quantity, avg_price)| {
            Ok(Holding { symbol, quantity: to_quantity(quantity)?, avg_price })
        })
        .collect::<Result<Vec<_>, StoreError>>()?;

        let transactions = sqlx::query_as::<_, TransactionRow>(
            r#"
            SELECT id, symbol, type, quantity, price, total, created_at
            FROM transactions
            WHERE user_id = $1
            ORDER BY seq
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|(id, symbol, trade_type, quantity, price, total, created_at)| {
            Ok(Transaction {
                id,
                symbol,
                trade_type: trade_type.parse().map_err(StoreError::Corrupt)?,
                quantity: to_quantity(quantity)?,
                price,
                total,
                created_at,
            })
        })
        .collect::<Result<Vec<_>, StoreError>>()?;

        Ok(Some(UserLedger { user_id: user_id.to_string(), balance, holdings, transactions }))
    }

    async fn open(&self, user_id: &str, initial_balance: f64) -> Result<UserLedger, StoreError> {
        sqlx::query(
            "INSERT INTO user_balance (user_id, balance) VALUES ($1, $2) ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(initial_balance)
        .execute(&self.pool)
        .await?;

        self.load(user_id)
            .await?
            .ok_or_else(|| StoreError::MissingLedger(user_id.to_string()))
    }

    async fn commit_trade(&self, user_id: &str, commit: &TradeCommit) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query("UPDATE user_balance SET balance = $2 WHERE user_id = $1")
            .bind(user_id)
            .bind(commit.balance)
            .execute(&mut *tx)
            .await?;
        if updated.rows_affected() != 1 {
            // tx dropped → rollback
            return Err(StoreError::MissingLedger(user_id.to_string()));
        }

        match &commit.holding {
            HoldingChange::Upsert(holding) => {
                sqlx::query(
                    r#"
                    INSERT INTO portfolio (user_id, symbol, quantity, avg_price)
                    VALUES ($1, $2, $3, $4)
                    ON CONFLICT (user_id, symbol) DO UPDATE SET
                      quantity  = EXCLUDED.quantity,
                      avg_price = EXCLUDED.avg_price
                    "#,
                )
                .bind(user_id)
                .bind(&holding.symbol)
                .bind(to_db_quantity(holding.quantity)?)
                .bind(holding.avg_price)
                .execute(&mut *tx)
                .await?;
            }
            HoldingChange::Remove(symbol) => {
                sqlx::query("DELETE FROM portfolio WHERE user_id = $1 AND symbol = $2")
                    .bind(user_id)
                    .bind(symbol)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        let t = &commit.transaction;
        sqlx::query(
            r#"
            INSERT INTO transactions (id, user_id, symbol, type, quantity, price, total, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(t.id)
        .bind(user_id)
        .bind(&t.symbol)
        .bind(t.trade_type.as_str())
        .bind(to_db_quantity(t.quantity)?)
        .bind(t.price)
        .bind(t.total)
        .bind(t.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn top_balances(&self, limit: usize) -> Result<Vec<(String, f64)>, StoreError> {
        let rows = sqlx::query_as::<_, (String, f64)>(
            "SELECT user_id, balance FROM user_balance ORDER BY balance DESC, user_id LIMIT $1",
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

// ─── Watchlist ────────────────────────────────────────────────────────────────

#[async_trait]
impl WatchlistRepository for PgStore {
    async fn list(&self, user_id: &str) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query_as::<_, (String,)>(
            "SELECT symbol FROM watchlist WHERE user_id = $1 ORDER BY seq",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(s,)| s).collect())
    }

    async fn add(&self, user_id: &str, symbol: &str) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "INSERT INTO watchlist (user_id, symbol) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(symbol)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn remove(&self, user_id: &str, symbol: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM watchlist WHERE user_id = $1 AND symbol = $2")
            .bind(user_id)
            .bind(symbol)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}
