//! Entity store and traffic sink seams used by the report handlers.

use std::collections::BTreeSet;

use adreport_core::{Campaign, CampaignId, Link, LinkId};
use adreport_db::{CampaignTraffic, LinkTraffic};
use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::StoreError;

/// Read and commit access to links and campaigns.
#[async_trait]
pub trait PromoStore: Send + Sync {
    /// Campaigns with the given ids. Unknown ids are absent from the result.
    async fn campaigns_by_id(
        &self,
        ids: &BTreeSet<CampaignId>,
    ) -> Result<Vec<Campaign>, StoreError>;

    /// Links with the given ids. Unknown ids are absent from the result.
    async fn links_by_id(&self, ids: &BTreeSet<LinkId>) -> Result<Vec<Link>, StoreError>;

    /// Every campaign owned by any of the given links.
    async fn campaigns_for_links(
        &self,
        ids: &BTreeSet<LinkId>,
    ) -> Result<Vec<Campaign>, StoreError>;

    /// `(campaign, link)` pairs serving on `day`.
    async fn served_promos(&self, day: NaiveDate) -> Result<Vec<(Campaign, Link)>, StoreError>;

    /// Persist a campaign's lifetime usage and report bookkeeping.
    async fn commit_campaign(&self, campaign: &Campaign) -> Result<(), StoreError>;

    /// Persist a link's daily report bookkeeping.
    async fn commit_link(&self, link: &Link) -> Result<(), StoreError>;
}

/// Destination for normalized daily usage rows.
///
/// Each call is one logical row-set and is written atomically.
#[async_trait]
pub trait TrafficSink: Send + Sync {
    async fn write_campaign_traffic(&self, rows: &[CampaignTraffic]) -> Result<(), StoreError>;

    async fn write_link_traffic(&self, rows: &[LinkTraffic]) -> Result<(), StoreError>;
}
