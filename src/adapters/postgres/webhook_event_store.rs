//! PostgreSQL implementation of the webhook event dedupe store.
//!
//! The `event_id` primary key is the persistence-level primitive behind
//! at-most-once-success: the first claim is an `INSERT ... ON CONFLICT DO
//! NOTHING`, and takeover of failed or lease-expired entries is a guarded
//! `UPDATE`, so every state change is a single atomic statement.
//!
//! Expected schema:
//!
//! ```sql
//! CREATE TABLE webhook_events (
//!     event_id        TEXT PRIMARY KEY,
//!     started_at_utc  TIMESTAMPTZ NOT NULL,
//!     succeeded       BOOLEAN,
//!     error_message   TEXT,
//!     recorded_at_utc TIMESTAMPTZ
//! );
//! ```
//!
//! `succeeded IS NULL` encodes Processing, `TRUE` Succeeded, `FALSE`
//! Failed.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;

use crate::domain::foundation::DomainError;
use crate::ports::{default_lease, WebhookEventOutcome, WebhookEventStore};

/// PostgreSQL-backed dedupe store.
pub struct PostgresWebhookEventStore {
    pool: PgPool,
    lease: Duration,
}

impl PostgresWebhookEventStore {
    /// Creates a store with the default 5-minute lease.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            lease: default_lease(),
        }
    }

    /// Overrides the processing lease.
    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }
}

/// Database row holding a recorded outcome.
#[derive(Debug, sqlx::FromRow)]
struct OutcomeRow {
    succeeded: Option<bool>,
    error_message: Option<String>,
    recorded_at_utc: Option<DateTime<Utc>>,
}

#[async_trait]
impl WebhookEventStore for PostgresWebhookEventStore {
    async fn try_begin(&self, event_id: &str) -> Result<bool, DomainError> {
        let now = Utc::now();

        // First delivery: primary key settles concurrent inserts.
        let inserted = sqlx::query(
            r#"
            INSERT INTO webhook_events (event_id, started_at_utc)
            VALUES ($1, $2)
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(event_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to claim event: {}", e)))?;

        if inserted.rows_affected() == 1 {
            return Ok(true);
        }

        // Takeover: failed entries and expired leases are reclaimable;
        // the WHERE clause makes concurrent takeovers settle to one winner.
        let lease_cutoff = now - self.lease;
        let reclaimed = sqlx::query(
            r#"
            UPDATE webhook_events
            SET started_at_utc = $2,
                succeeded = NULL,
                error_message = NULL,
                recorded_at_utc = NULL
            WHERE event_id = $1
              AND (succeeded = FALSE
                   OR (succeeded IS NULL AND started_at_utc <= $3))
            "#,
        )
        .bind(event_id)
        .bind(now)
        .bind(lease_cutoff)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to reclaim event: {}", e)))?;

        Ok(reclaimed.rows_affected() == 1)
    }

    async fn record_outcome(
        &self,
        event_id: &str,
        outcome: WebhookEventOutcome,
    ) -> Result<(), DomainError> {
        // Upsert keeps the claim's started_at_utc when the row exists.
        sqlx::query(
            r#"
            INSERT INTO webhook_events
                (event_id, started_at_utc, succeeded, error_message, recorded_at_utc)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (event_id) DO UPDATE
            SET succeeded = EXCLUDED.succeeded,
                error_message = EXCLUDED.error_message,
                recorded_at_utc = EXCLUDED.recorded_at_utc
            "#,
        )
        .bind(event_id)
        .bind(Utc::now())
        .bind(outcome.succeeded)
        .bind(&outcome.error_message)
        .bind(outcome.recorded_at)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to record outcome: {}", e)))?;

        Ok(())
    }

    async fn get_outcome(
        &self,
        event_id: &str,
    ) -> Result<Option<WebhookEventOutcome>, DomainError> {
        let row: Option<OutcomeRow> = sqlx::query_as(
            r#"
            SELECT succeeded, error_message, recorded_at_utc
            FROM webhook_events
            WHERE event_id = $1
            "#,
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to load outcome: {}", e)))?;

        Ok(row.and_then(|row| {
            let succeeded = row.succeeded?;
            Some(WebhookEventOutcome {
                succeeded,
                error_message: row.error_message,
                recorded_at: row.recorded_at_utc.unwrap_or_else(Utc::now),
            })
        }))
    }

    async fn delete_recorded_before(&self, cutoff: DateTime<Utc>) -> Result<u64, DomainError> {
        let result = sqlx::query(
            r#"
            DELETE FROM webhook_events
            WHERE succeeded IS NOT NULL
              AND recorded_at_utc < $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to prune events: {}", e)))?;

        Ok(result.rows_affected())
    }
}
