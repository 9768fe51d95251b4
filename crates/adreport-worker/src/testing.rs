//! In-memory collaborators for handler, dispatcher and consumer tests.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::{Arc, Mutex};

use adreport_adzerk::{
    AdzerkError, Grouping, ReportDetail, ReportHandle, ReportRecord, ReportRequest, ReportResult,
    ReportSource, ReportStatus,
};
use adreport_core::{
    Campaign, CampaignId, Link, LinkId, ManualClock, ReportTask, ReportingSettings, Target,
};
use adreport_db::{CampaignTraffic, LinkTraffic};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;

use crate::context::ReportContext;
use crate::error::StoreError;
use crate::queue::{QueuedMessage, TaskPublisher, TaskSource};
use crate::store::{PromoStore, TrafficSink};

pub fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn link(id: i64) -> Link {
    Link {
        id: LinkId(id),
        external_campaign_id: Some(1000 + id),
        last_daily_report: None,
        last_daily_report_run: None,
    }
}

pub fn campaign(id: i64, link_id: i64, start: DateTime<Utc>, end: DateTime<Utc>) -> Campaign {
    Campaign {
        id: CampaignId(id),
        link_id: LinkId(link_id),
        start_date: start,
        end_date: end,
        external_flight_id: Some(2000 + id),
        target: Target::Subreddit("pics".to_string()),
        cancelled: false,
        last_lifetime_report: None,
        last_lifetime_report_run: None,
        adserver_spent_pennies: 0,
        adserver_impressions: 0,
        adserver_clicks: 0,
    }
}

pub fn detail(title: &str, impressions: i64, clicks: i64, revenue: &str) -> ReportDetail {
    ReportDetail {
        grouping: Grouping {
            option_id: Some(77),
            campaign_id: None,
        },
        title: title.to_string(),
        impressions,
        unique_bucket_clicks: clicks,
        true_revenue: revenue.parse::<Decimal>().unwrap(),
    }
}

pub fn record(date: Option<&str>, details: Vec<ReportDetail>) -> ReportRecord {
    ReportRecord {
        date: date.map(str::to_string),
        details,
        ..ReportRecord::default()
    }
}

pub fn ready(records: Vec<ReportRecord>) -> ReportStatus {
    ReportStatus::Ready(ReportResult { records })
}

// ---------------------------------------------------------------------------
// Promo store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryStore {
    pub campaigns: Mutex<BTreeMap<CampaignId, Campaign>>,
    pub links: Mutex<BTreeMap<LinkId, Link>>,
    pub link_commits: Mutex<Vec<Link>>,
    pub campaign_commits: Mutex<Vec<Campaign>>,
}

impl MemoryStore {
    pub fn with(links: Vec<Link>, campaigns: Vec<Campaign>) -> Self {
        let store = Self::default();
        store
            .links
            .lock()
            .unwrap()
            .extend(links.into_iter().map(|l| (l.id, l)));
        store
            .campaigns
            .lock()
            .unwrap()
            .extend(campaigns.into_iter().map(|c| (c.id, c)));
        store
    }
}

#[async_trait]
impl PromoStore for MemoryStore {
    async fn campaigns_by_id(
        &self,
        ids: &BTreeSet<CampaignId>,
    ) -> Result<Vec<Campaign>, StoreError> {
        let campaigns = self.campaigns.lock().unwrap();
        Ok(ids.iter().filter_map(|id| campaigns.get(id).cloned()).collect())
    }

    async fn links_by_id(&self, ids: &BTreeSet<LinkId>) -> Result<Vec<Link>, StoreError> {
        let links = self.links.lock().unwrap();
        Ok(ids.iter().filter_map(|id| links.get(id).cloned()).collect())
    }

    async fn campaigns_for_links(
        &self,
        ids: &BTreeSet<LinkId>,
    ) -> Result<Vec<Campaign>, StoreError> {
        let campaigns = self.campaigns.lock().unwrap();
        Ok(campaigns
            .values()
            .filter(|c| ids.contains(&c.link_id))
            .cloned()
            .collect())
    }

    async fn served_promos(&self, day: NaiveDate) -> Result<Vec<(Campaign, Link)>, StoreError> {
        let campaigns = self.campaigns.lock().unwrap();
        let links = self.links.lock().unwrap();
        Ok(campaigns
            .values()
            .filter(|c| c.is_serving_on(day))
            .filter_map(|c| links.get(&c.link_id).map(|l| (c.clone(), l.clone())))
            .collect())
    }

    async fn commit_campaign(&self, campaign: &Campaign) -> Result<(), StoreError> {
        self.campaigns
            .lock()
            .unwrap()
            .insert(campaign.id, campaign.clone());
        self.campaign_commits.lock().unwrap().push(campaign.clone());
        Ok(())
    }

    async fn commit_link(&self, link: &Link) -> Result<(), StoreError> {
        self.links.lock().unwrap().insert(link.id, link.clone());
        self.link_commits.lock().unwrap().push(link.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Traffic sink
// ---------------------------------------------------------------------------

/// Keeps the latest row per key, like the real upsert.
#[derive(Default)]
pub struct MemorySink {
    pub campaign_rows: Mutex<BTreeMap<(String, NaiveDate), CampaignTraffic>>,
    pub link_rows: Mutex<BTreeMap<(String, NaiveDate), LinkTraffic>>,
}

#[async_trait]
impl TrafficSink for MemorySink {
    async fn write_campaign_traffic(&self, rows: &[CampaignTraffic]) -> Result<(), StoreError> {
        let mut stored = self.campaign_rows.lock().unwrap();
        for row in rows {
            stored.insert((row.codename.clone(), row.date), row.clone());
        }
        Ok(())
    }

    async fn write_link_traffic(&self, rows: &[LinkTraffic]) -> Result<(), StoreError> {
        let mut stored = self.link_rows.lock().unwrap();
        for row in rows {
            stored.insert((row.codename.clone(), row.date), row.clone());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryQueue {
    pub pending: Mutex<Vec<ReportTask>>,
    pub flushed: Mutex<Vec<ReportTask>>,
    pub messages: Mutex<VecDeque<QueuedMessage>>,
    pub acked: Mutex<Vec<i64>>,
    pub released: Mutex<Vec<(i64, String)>>,
    pub buried: Mutex<Vec<(i64, String)>>,
}

impl MemoryQueue {
    pub fn push_body(&self, id: i64, body: &str) {
        self.messages.lock().unwrap().push_back(QueuedMessage {
            id,
            body: body.to_string(),
            attempts: 0,
        });
    }

    pub fn flushed(&self) -> Vec<ReportTask> {
        self.flushed.lock().unwrap().clone()
    }
}

#[async_trait]
impl TaskPublisher for MemoryQueue {
    async fn publish(&self, task: ReportTask) -> Result<(), StoreError> {
        self.pending.lock().unwrap().push(task);
        Ok(())
    }

    async fn flush(&self) -> Result<usize, StoreError> {
        let drained: Vec<ReportTask> = std::mem::take(&mut *self.pending.lock().unwrap());
        let count = drained.len();
        self.flushed.lock().unwrap().extend(drained);
        Ok(count)
    }
}

#[async_trait]
impl TaskSource for MemoryQueue {
    async fn claim(&self) -> Result<Option<QueuedMessage>, StoreError> {
        Ok(self.messages.lock().unwrap().pop_front())
    }

    async fn ack(&self, id: i64) -> Result<(), StoreError> {
        self.acked.lock().unwrap().push(id);
        Ok(())
    }

    async fn release(&self, id: i64, error: &str) -> Result<(), StoreError> {
        self.released.lock().unwrap().push((id, error.to_string()));
        Ok(())
    }

    async fn bury(&self, id: i64, error: &str) -> Result<(), StoreError> {
        self.buried.lock().unwrap().push((id, error.to_string()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Report source
// ---------------------------------------------------------------------------

/// Hands out `rep-1`, `rep-2`, ... and replays scripted poll results,
/// answering pending once the script runs out.
#[derive(Default)]
pub struct ScriptedReports {
    pub requests: Mutex<Vec<ReportRequest>>,
    pub script: Mutex<VecDeque<ReportStatus>>,
    pub polls: Mutex<u32>,
}

impl ScriptedReports {
    pub fn new(script: Vec<ReportStatus>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Self::default()
        }
    }

    pub fn requests(&self) -> Vec<ReportRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReportSource for ScriptedReports {
    async fn queue_report(&self, request: &ReportRequest) -> Result<ReportHandle, AdzerkError> {
        let mut requests = self.requests.lock().unwrap();
        requests.push(request.clone());
        Ok(ReportHandle(format!("rep-{}", requests.len())))
    }

    async fn fetch_report(&self, _: &ReportHandle) -> Result<ReportStatus, AdzerkError> {
        *self.polls.lock().unwrap() += 1;
        Ok(self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ReportStatus::Pending))
    }
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

pub struct Harness {
    pub reports: Arc<ScriptedReports>,
    pub store: Arc<MemoryStore>,
    pub sink: Arc<MemorySink>,
    pub queue: Arc<MemoryQueue>,
    pub clock: Arc<ManualClock>,
    pub ctx: ReportContext,
}

impl Harness {
    pub fn new(store: MemoryStore, reports: ScriptedReports, now: DateTime<Utc>) -> Self {
        Self::with_settings(store, reports, now, ReportingSettings::default())
    }

    pub fn with_settings(
        store: MemoryStore,
        reports: ScriptedReports,
        now: DateTime<Utc>,
        settings: ReportingSettings,
    ) -> Self {
        let reports = Arc::new(reports);
        let store = Arc::new(store);
        let sink = Arc::new(MemorySink::default());
        let queue = Arc::new(MemoryQueue::default());
        let clock = Arc::new(ManualClock::new(now));

        let ctx = ReportContext {
            reports: reports.clone(),
            store: store.clone(),
            sink: sink.clone(),
            publisher: queue.clone(),
            clock: clock.clone(),
            settings,
        };

        Self {
            reports,
            store,
            sink,
            queue,
            clock,
            ctx,
        }
    }
}
