//! Report command handlers for the CLI.
//!
//! Called from `main` after the database pool and config are established.

use std::sync::Arc;

use adreport_core::AppConfig;
use adreport_worker::{
    dispatch, group_campaigns, group_links, postgres_report_context, Consumer, PgPromoStore,
    PgTaskQueue, PromoStore,
};
use chrono::{TimeDelta, Utc};
use tokio::sync::watch;

/// Queue daily link and lifetime campaign tasks for everything serving
/// yesterday or today.
///
/// When `dry_run` is `true` the task groups are printed and nothing is
/// queued.
///
/// # Errors
///
/// Returns an error if promos cannot be read or the tasks cannot be queued.
pub(crate) async fn run_dispatch(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    dry_run: bool,
) -> anyhow::Result<()> {
    let store = PgPromoStore::new(pool.clone());
    let settings = config.reporting();
    let now = Utc::now();

    if dry_run {
        let mut promos = store
            .served_promos((now - TimeDelta::days(1)).date_naive())
            .await?;
        promos.extend(store.served_promos(now.date_naive()).await?);

        for task in group_campaigns(promos.iter().map(|(c, _)| c), settings.campaign_group_size) {
            println!("dry-run: lifetime campaigns {:?}", task.campaign_ids);
        }
        for task in group_links(&promos, settings.link_group_size) {
            println!(
                "dry-run: daily links {:?} (campaigns {:?})",
                task.link_ids, task.campaign_ids
            );
        }
        return Ok(());
    }

    let queue = PgTaskQueue::new(pool.clone(), config.queue().visibility_timeout);
    let summary = dispatch(&store, &queue, &settings, now).await?;
    println!(
        "queued {} daily link task(s) and {} lifetime campaign task(s)",
        summary.daily_tasks, summary.lifetime_tasks
    );
    Ok(())
}

/// Consume report tasks from the queue.
///
/// With `once` the queue is drained and the command exits; otherwise it
/// polls until ctrl-c.
///
/// # Errors
///
/// Returns an error if no Adzerk API key is configured, the client cannot
/// be built, or the queue cannot be read while draining.
pub(crate) async fn run_consume(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    once: bool,
) -> anyhow::Result<()> {
    let settings = config.queue();
    let queue = Arc::new(PgTaskQueue::new(pool.clone(), settings.visibility_timeout));
    let ctx = postgres_report_context(pool.clone(), config, Arc::clone(&queue))?
        .ok_or_else(|| anyhow::anyhow!("ADZERK_API_KEY is required to consume report tasks"))?;
    let consumer = Consumer::new(ctx, queue, settings);

    if once {
        let mut handled = 0_usize;
        while consumer.run_once().await? {
            handled += 1;
        }
        println!("handled {handled} message(s)");
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("received ctrl-c, finishing current message");
            shutdown_tx.send_replace(true);
        }
    });
    consumer.run(shutdown_rx).await;
    Ok(())
}

/// Print queue message counts by status.
///
/// # Errors
///
/// Returns an error if the queue table cannot be read.
pub(crate) async fn run_status(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let counts = adreport_db::queue_status_counts(pool).await?;
    if counts.is_empty() {
        println!("report queue is empty");
        return Ok(());
    }
    for row in counts {
        println!("{:<12} {}", row.status, row.count);
    }
    Ok(())
}
