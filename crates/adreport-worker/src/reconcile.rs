//! Match report detail rows back to campaigns and aggregate their usage.
//!
//! Each detail's `Title` carries the campaign fullname (`t8_<id>`). Details
//! whose title lacks the campaign prefix are malformed; well-formed titles
//! that do not belong to the campaigns being reported on are unknown. Both
//! are logged and skipped.

use std::collections::{BTreeMap, HashMap};

use adreport_adzerk::{ReportDetail, ReportRecord};
use adreport_core::{
    normalize_usage, Campaign, CampaignId, LinkId, Usage, CAMPAIGN_FULLNAME_PREFIX,
};
use chrono::NaiveDate;

/// The campaign fullname carried by `detail`, if its title is well formed.
#[must_use]
pub fn campaign_fullname(detail: &ReportDetail) -> Option<&str> {
    detail
        .title
        .starts_with(CAMPAIGN_FULLNAME_PREFIX)
        .then_some(detail.title.as_str())
}

/// Normalized usage of a single detail row.
#[must_use]
pub fn detail_usage(detail: &ReportDetail) -> Usage {
    normalize_usage(
        detail.impressions,
        detail.unique_bucket_clicks,
        detail.true_revenue,
    )
}

/// Campaigns addressable by fullname for one report.
#[derive(Debug, Default)]
pub struct CampaignIndex {
    by_fullname: HashMap<String, Campaign>,
}

impl CampaignIndex {
    pub fn new(campaigns: impl IntoIterator<Item = Campaign>) -> Self {
        Self {
            by_fullname: campaigns.into_iter().map(|c| (c.fullname(), c)).collect(),
        }
    }

    #[must_use]
    pub fn get(&self, id: CampaignId) -> Option<&Campaign> {
        self.by_fullname.get(&id.fullname())
    }

    /// Resolve a detail row to one of the indexed campaigns, logging the
    /// reason when it cannot be.
    pub fn resolve(&self, detail: &ReportDetail, scope: &str) -> Option<&Campaign> {
        let flight_id = detail.grouping.option_id;

        let Some(fullname) = campaign_fullname(detail) else {
            tracing::error!(
                title = %detail.title,
                flight_id,
                "{scope} report: invalid fullname for campaign"
            );
            return None;
        };

        let campaign = self.by_fullname.get(fullname);
        if campaign.is_none() {
            tracing::warn!(
                fullname,
                flight_id,
                "{scope} report: no campaign for flight"
            );
        }
        campaign
    }
}

/// Usage accumulated per entity per day from a daily report.
#[derive(Debug, Default, PartialEq)]
pub struct DailyUsage {
    pub campaigns: BTreeMap<(CampaignId, NaiveDate), Usage>,
    pub links: BTreeMap<(LinkId, NaiveDate), Usage>,
}

/// Sum normalized detail usage per `(campaign, day)` and `(link, day)`.
///
/// A campaign can appear more than once per day (one detail per price
/// change), so usage is accumulated rather than replaced. Records without a
/// parseable date are skipped.
#[must_use]
pub fn aggregate_daily(records: &[ReportRecord], index: &CampaignIndex) -> DailyUsage {
    let mut usage = DailyUsage::default();

    for record in records {
        let Some(day) = record.day() else {
            tracing::error!(date = ?record.date, "link report: record without a usable date");
            continue;
        };

        for detail in &record.details {
            let Some(campaign) = index.resolve(detail, "link") else {
                continue;
            };
            let row_usage = detail_usage(detail);

            usage
                .campaigns
                .entry((campaign.id, day))
                .or_default()
                .accumulate(row_usage);
            usage
                .links
                .entry((campaign.link_id, day))
                .or_default()
                .accumulate(row_usage);
        }
    }

    usage
}

/// Lifetime usage per campaign from an un-dated lifetime report.
///
/// An un-grouped-by-day report has a single record holding cumulative
/// totals. Only that first record is read; within it a later detail for the
/// same campaign replaces an earlier one.
#[must_use]
pub fn lifetime_usage(
    records: &[ReportRecord],
    index: &CampaignIndex,
) -> BTreeMap<CampaignId, Usage> {
    let mut usage = BTreeMap::new();
    let details = records.first().map_or(&[][..], |r| r.details.as_slice());

    for detail in details {
        if let Some(campaign) = index.resolve(detail, "campaign") {
            usage.insert(campaign.id, detail_usage(detail));
        }
    }

    usage
}
