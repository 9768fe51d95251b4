//! Postgres implementations of the worker seams, backed by `adreport-db`.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use adreport_adzerk::{AdzerkError, AdzerkReportClient};
use adreport_core::{AppConfig, Campaign, CampaignId, Link, LinkId, ReportTask, SystemClock};
use adreport_db::{CampaignTraffic, LinkTraffic};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use tokio::sync::Mutex;

use crate::context::ReportContext;
use crate::error::StoreError;
use crate::queue::{QueuedMessage, TaskPublisher, TaskSource};
use crate::store::{PromoStore, TrafficSink};

#[derive(Debug, Clone)]
pub struct PgPromoStore {
    pool: PgPool,
}

impl PgPromoStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn raw_ids<T: Copy>(ids: &BTreeSet<T>, raw: impl Fn(T) -> i64) -> Vec<i64> {
    ids.iter().map(|id| raw(*id)).collect()
}

#[async_trait]
impl PromoStore for PgPromoStore {
    async fn campaigns_by_id(
        &self,
        ids: &BTreeSet<CampaignId>,
    ) -> Result<Vec<Campaign>, StoreError> {
        let ids = raw_ids(ids, |id| id.0);
        Ok(adreport_db::get_campaigns_by_ids(&self.pool, &ids).await?)
    }

    async fn links_by_id(&self, ids: &BTreeSet<LinkId>) -> Result<Vec<Link>, StoreError> {
        let ids = raw_ids(ids, |id| id.0);
        Ok(adreport_db::get_links_by_ids(&self.pool, &ids).await?)
    }

    async fn campaigns_for_links(
        &self,
        ids: &BTreeSet<LinkId>,
    ) -> Result<Vec<Campaign>, StoreError> {
        let ids = raw_ids(ids, |id| id.0);
        Ok(adreport_db::list_campaigns_for_links(&self.pool, &ids).await?)
    }

    async fn served_promos(&self, day: NaiveDate) -> Result<Vec<(Campaign, Link)>, StoreError> {
        Ok(adreport_db::list_served_promos(&self.pool, day).await?)
    }

    async fn commit_campaign(&self, campaign: &Campaign) -> Result<(), StoreError> {
        Ok(adreport_db::update_campaign_lifetime_report(&self.pool, campaign).await?)
    }

    async fn commit_link(&self, link: &Link) -> Result<(), StoreError> {
        Ok(adreport_db::update_link_daily_report(&self.pool, link).await?)
    }
}

#[derive(Debug, Clone)]
pub struct PgTrafficSink {
    pool: PgPool,
}

impl PgTrafficSink {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TrafficSink for PgTrafficSink {
    async fn write_campaign_traffic(&self, rows: &[CampaignTraffic]) -> Result<(), StoreError> {
        Ok(adreport_db::upsert_campaign_traffic(&self.pool, rows).await?)
    }

    async fn write_link_traffic(&self, rows: &[LinkTraffic]) -> Result<(), StoreError> {
        Ok(adreport_db::upsert_link_traffic(&self.pool, rows).await?)
    }
}

/// The `report_queue` table as both publisher and source.
///
/// Published tasks are buffered in memory and written in one transaction on
/// [`TaskPublisher::flush`].
#[derive(Debug)]
pub struct PgTaskQueue {
    pool: PgPool,
    visibility_timeout: Duration,
    pending: Mutex<Vec<ReportTask>>,
}

impl PgTaskQueue {
    #[must_use]
    pub fn new(pool: PgPool, visibility_timeout: Duration) -> Self {
        Self {
            pool,
            visibility_timeout,
            pending: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl TaskPublisher for PgTaskQueue {
    async fn publish(&self, task: ReportTask) -> Result<(), StoreError> {
        self.pending.lock().await.push(task);
        Ok(())
    }

    async fn flush(&self) -> Result<usize, StoreError> {
        let mut pending = self.pending.lock().await;
        if pending.is_empty() {
            return Ok(0);
        }

        // The buffer is only cleared once the insert commits, so a failed
        // flush can be retried.
        let ids = adreport_db::enqueue_tasks(&self.pool, &pending).await?;
        pending.clear();

        tracing::debug!(count = ids.len(), "queue: flushed tasks");
        Ok(ids.len())
    }
}

#[async_trait]
impl TaskSource for PgTaskQueue {
    async fn claim(&self) -> Result<Option<QueuedMessage>, StoreError> {
        let row = adreport_db::claim_next_message(&self.pool, self.visibility_timeout).await?;
        Ok(row.map(|row| QueuedMessage {
            id: row.id,
            body: row.body,
            attempts: row.attempts,
        }))
    }

    async fn ack(&self, id: i64) -> Result<(), StoreError> {
        Ok(adreport_db::ack_message(&self.pool, id).await?)
    }

    async fn release(&self, id: i64, error: &str) -> Result<(), StoreError> {
        Ok(adreport_db::release_message(&self.pool, id, error).await?)
    }

    async fn bury(&self, id: i64, error: &str) -> Result<(), StoreError> {
        Ok(adreport_db::bury_message(&self.pool, id, error).await?)
    }
}

/// Build a [`ReportContext`] backed by Postgres and the live Adzerk API,
/// publishing retries through `queue`.
///
/// Returns `None` when no Adzerk API key is configured.
///
/// # Errors
///
/// Returns [`AdzerkError`] if the Adzerk client cannot be constructed.
pub fn postgres_report_context(
    pool: PgPool,
    config: &AppConfig,
    queue: Arc<PgTaskQueue>,
) -> Result<Option<ReportContext>, AdzerkError> {
    let Some(api_key) = config.adzerk_api_key.as_deref() else {
        return Ok(None);
    };

    let client = AdzerkReportClient::with_base_url(
        api_key,
        config.adzerk_request_timeout_secs,
        &config.adzerk_api_base_url,
    )?;

    Ok(Some(ReportContext {
        reports: Arc::new(client),
        store: Arc::new(PgPromoStore::new(pool.clone())),
        sink: Arc::new(PgTrafficSink::new(pool)),
        publisher: queue,
        clock: Arc::new(SystemClock),
        settings: config.reporting(),
    }))
}
