//! Wiring for the in-process report consumer.

use std::sync::Arc;

use adreport_core::AppConfig;
use adreport_worker::{postgres_report_context, Consumer, PgTaskQueue};
use sqlx::PgPool;

/// Build a consumer over the `report_queue` table, or `None` when no Adzerk
/// API key is configured.
///
/// # Errors
///
/// Returns an error if the Adzerk client cannot be constructed.
pub fn build_consumer(pool: PgPool, config: &AppConfig) -> anyhow::Result<Option<Consumer>> {
    let settings = config.queue();
    let queue = Arc::new(PgTaskQueue::new(pool.clone(), settings.visibility_timeout));

    let Some(ctx) = postgres_report_context(pool, config, Arc::clone(&queue))? else {
        return Ok(None);
    };

    Ok(Some(Consumer::new(ctx, queue, settings)))
}
