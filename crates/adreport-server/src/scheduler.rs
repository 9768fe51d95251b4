//! Background job scheduler.
//!
//! Initialises a [`JobScheduler`] at server startup and registers the
//! recurring report dispatch job.

use std::sync::Arc;

use adreport_core::AppConfig;
use adreport_worker::{dispatch, PgPromoStore, PgTaskQueue};
use chrono::Utc;
use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive
/// for the lifetime of the process. Dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// the dispatch cron expression is invalid, or the scheduler fails to start.
pub async fn build_scheduler(
    pool: PgPool,
    config: Arc<AppConfig>,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    register_dispatch_job(&scheduler, pool, config).await?;

    scheduler.start().await?;
    Ok(scheduler)
}

/// Register the report dispatch job on `ADREPORT_DISPATCH_CRON` (hourly by
/// default). Each run queues daily link and lifetime campaign tasks for
/// everything serving yesterday or today.
async fn register_dispatch_job(
    scheduler: &JobScheduler,
    pool: PgPool,
    config: Arc<AppConfig>,
) -> Result<(), JobSchedulerError> {
    let pool = Arc::new(pool);
    let cron = config.dispatch_cron.clone();

    let job = Job::new_async(cron.as_str(), move |_uuid, _lock| {
        let pool = Arc::clone(&pool);
        let config = Arc::clone(&config);

        Box::pin(async move {
            tracing::info!("scheduler: starting report dispatch");
            run_dispatch_job(&pool, &config).await;
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(cron = %cron, "scheduler: report dispatch registered");
    Ok(())
}

async fn run_dispatch_job(pool: &PgPool, config: &AppConfig) {
    let store = PgPromoStore::new(pool.clone());
    let queue = PgTaskQueue::new(pool.clone(), config.queue().visibility_timeout);

    match dispatch(&store, &queue, &config.reporting(), Utc::now()).await {
        Ok(summary) => tracing::info!(
            daily_tasks = summary.daily_tasks,
            lifetime_tasks = summary.lifetime_tasks,
            "scheduler: report dispatch complete"
        ),
        Err(e) => tracing::error!(error = %e, "scheduler: report dispatch failed"),
    }
}
