use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use intake_types::errors::LedgerError;
use intake_types::ids::OrderId;
use intake_types::order::{OrderStatus, PendingOrder};
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use uuid::Uuid;

use super::OrderLedger;

/// Postgres `query_canceled`, raised when `statement_timeout` fires
const SQLSTATE_QUERY_CANCELED: &str = "57014";

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS orders (
    order_id        UUID PRIMARY KEY,
    symbol          TEXT NOT NULL,
    side            TEXT NOT NULL,
    price           NUMERIC NOT NULL,
    qty             NUMERIC NOT NULL,
    status          TEXT NOT NULL,
    fail_reason     TEXT,
    idempotency_key TEXT UNIQUE,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at      TIMESTAMPTZ NOT NULL DEFAULT now()
)
";

/// Order ledger backed by a Postgres `orders` table.
///
/// The unique index on `idempotency_key` is the cross-process serialization
/// point for idempotent submissions.
pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a pool. Every statement is capped by `dependency_timeout`
    /// server-side, and pool acquisition by the same bound client-side.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        dependency_timeout: Duration,
    ) -> Result<Self, LedgerError> {
        let options = PgConnectOptions::from_str(database_url)
            .map_err(|e| LedgerError::Unavailable {
                reason: format!("invalid DATABASE_URL: {e}"),
            })?
            .options([(
                "statement_timeout",
                dependency_timeout.as_millis().to_string(),
            )]);

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(dependency_timeout)
            .connect_with(options)
            .await
            .map_err(map_sqlx_error)?;

        tracing::info!(max_connections, "Connected to order ledger");
        Ok(Self::new(pool))
    }

    /// Create the `orders` table when missing
    pub async fn ensure_schema(&self) -> Result<(), LedgerError> {
        sqlx::query(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl OrderLedger for PgLedger {
    async fn insert_pending(&self, order: &PendingOrder) -> Result<(), LedgerError> {
        let key = order.idempotency_key.as_ref().map(|k| k.as_str());

        let inserted = sqlx::query(
            r"
            INSERT INTO orders (order_id, symbol, side, price, qty, status, idempotency_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (idempotency_key) DO NOTHING
            ",
        )
        .bind(*order.order_id.as_uuid())
        .bind(&order.symbol)
        .bind(order.side.as_str())
        .bind(order.price)
        .bind(order.quantity)
        .bind(OrderStatus::Pending.as_str())
        .bind(key)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?
        .rows_affected();

        if inserted == 1 {
            return Ok(());
        }

        // Conflict: report which order owns the key and how far it got
        let existing: Option<(Uuid, String)> =
            sqlx::query_as("SELECT order_id, status FROM orders WHERE idempotency_key = $1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        match existing {
            Some((existing, status)) => {
                let status = OrderStatus::parse(&status).ok_or_else(|| LedgerError::Unavailable {
                    reason: format!("unknown order status {status:?}"),
                })?;
                Err(LedgerError::DuplicateIdempotencyKey {
                    existing: OrderId::from_uuid(existing),
                    status,
                })
            }
            // Key was released between the two statements
            None => Err(LedgerError::Unavailable {
                reason: "idempotency key changed owner during insert".to_string(),
            }),
        }
    }

    async fn mark_failed(&self, order_id: OrderId, reason: &str) -> Result<(), LedgerError> {
        let updated = sqlx::query(
            r"
            UPDATE orders
            SET status = $2, fail_reason = $3, idempotency_key = NULL, updated_at = now()
            WHERE order_id = $1
            ",
        )
        .bind(*order_id.as_uuid())
        .bind(OrderStatus::Failed.as_str())
        .bind(reason)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?
        .rows_affected();

        if updated == 0 {
            return Err(LedgerError::NotFound { order_id });
        }
        Ok(())
    }

    async fn ping(&self, timeout: Duration) -> bool {
        let select = sqlx::query("SELECT 1").execute(&self.pool);
        match tokio::time::timeout(timeout, select).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "Ledger ping failed");
                false
            }
            Err(_) => false,
        }
    }
}

fn map_sqlx_error(e: sqlx::Error) -> LedgerError {
    if matches!(e, sqlx::Error::PoolTimedOut) {
        return LedgerError::Timeout;
    }
    let canceled = e
        .as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == SQLSTATE_QUERY_CANCELED);
    if canceled {
        return LedgerError::Timeout;
    }
    LedgerError::Unavailable {
        reason: e.to_string(),
    }
}
