//! Durable report-task queue backed by the `report_queue` table.
//!
//! Messages move `queued -> processing` when claimed. Acknowledging deletes
//! the row, releasing returns it to `queued`, and burying parks it as `dead`.
//! Claims use `FOR UPDATE SKIP LOCKED` so any number of consumers can share
//! the table.

use std::time::Duration;

use adreport_core::ReportTask;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

const MESSAGE_COLUMNS: &str =
    "id, public_id, action, body, status, attempts, last_error, enqueued_at, claimed_at";

/// A row from the `report_queue` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct QueueMessageRow {
    pub id: i64,
    pub public_id: Uuid,
    pub action: Option<String>,
    pub body: String,
    pub status: String,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub enqueued_at: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
}

/// Message count for one queue status.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct QueueStatusCount {
    pub status: String,
    pub count: i64,
}

/// Inserts every task in one transaction and returns their public ids.
///
/// # Errors
///
/// Returns [`DbError::Encode`] if a task cannot be serialized, or
/// [`DbError::Sqlx`] if an insert fails. Nothing is enqueued on error.
pub async fn enqueue_tasks(pool: &PgPool, tasks: &[ReportTask]) -> Result<Vec<Uuid>, DbError> {
    if tasks.is_empty() {
        return Ok(Vec::new());
    }

    let mut tx = pool.begin().await?;
    let mut ids = Vec::with_capacity(tasks.len());
    for task in tasks {
        let public_id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO report_queue (public_id, action, body, status) \
             VALUES ($1, $2, $3, 'queued')",
        )
        .bind(public_id)
        .bind(task.action())
        .bind(task.to_json()?)
        .execute(&mut *tx)
        .await?;
        ids.push(public_id);
    }
    tx.commit().await?;

    Ok(ids)
}

/// Claims the oldest available message, if any.
///
/// A message is available when it is `queued`, or when it has been
/// `processing` for longer than `visibility_timeout` (its consumer is
/// presumed dead).
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the claim fails.
pub async fn claim_next_message(
    pool: &PgPool,
    visibility_timeout: Duration,
) -> Result<Option<QueueMessageRow>, DbError> {
    let row = sqlx::query_as::<_, QueueMessageRow>(&format!(
        "UPDATE report_queue \
         SET status = 'processing', claimed_at = NOW() \
         WHERE id = ( \
             SELECT id FROM report_queue \
             WHERE status = 'queued' \
                OR (status = 'processing' \
                    AND claimed_at < NOW() - make_interval(secs => $1)) \
             ORDER BY id \
             LIMIT 1 \
             FOR UPDATE SKIP LOCKED \
         ) \
         RETURNING {MESSAGE_COLUMNS}"
    ))
    .bind(visibility_timeout.as_secs_f64())
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Acknowledges a processed message by deleting it.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the message no longer exists, or
/// [`DbError::Sqlx`] if the delete fails.
pub async fn ack_message(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query("DELETE FROM report_queue WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}

/// Returns a claimed message to the queue for redelivery, recording `error`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the message no longer exists, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn release_message(pool: &PgPool, id: i64, error: &str) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE report_queue \
         SET status = 'queued', claimed_at = NULL, \
             attempts = attempts + 1, last_error = $2 \
         WHERE id = $1",
    )
    .bind(id)
    .bind(error)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}

/// Parks a message that can never succeed as `dead`, recording `error`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the message no longer exists, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn bury_message(pool: &PgPool, id: i64, error: &str) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE report_queue \
         SET status = 'dead', claimed_at = NULL, \
             attempts = attempts + 1, last_error = $2 \
         WHERE id = $1",
    )
    .bind(id)
    .bind(error)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}

/// Number of messages still to be processed (`queued` or `processing`).
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn queue_depth(pool: &PgPool) -> Result<i64, DbError> {
    let depth = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM report_queue WHERE status IN ('queued', 'processing')",
    )
    .fetch_one(pool)
    .await?;

    Ok(depth)
}

/// Message counts per status, ordered by status name.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn queue_status_counts(pool: &PgPool) -> Result<Vec<QueueStatusCount>, DbError> {
    let rows = sqlx::query_as::<_, QueueStatusCount>(
        "SELECT status, COUNT(*) AS count FROM report_queue GROUP BY status ORDER BY status",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
