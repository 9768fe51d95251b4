//! Adzerk reporting API request and response types.
//!
//! Responses use PascalCase keys. Counters default to zero when absent since
//! the API omits them for rows with no activity.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Opaque identifier for a queued report.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportHandle(pub String);

impl std::fmt::Display for ReportHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl ReportHandle {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Dimension a report is grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ReportGroup {
    OptionId,
    Day,
}

/// Filter restricting a report to one ad-server entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ReportParameter {
    /// Adzerk campaign, which maps to a promoted link.
    CampaignId(i64),
    /// Adzerk flight, which maps to a promo campaign.
    FlightId(i64),
}

/// Everything needed to queue one aggregate report.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRequest {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub groups: Vec<ReportGroup>,
    pub parameters: Vec<ReportParameter>,
}

/// The `criteria` document posted to `report/queue`.
#[derive(Debug, Serialize)]
pub(crate) struct ReportCriteria<'a> {
    #[serde(rename = "StartDateISO")]
    pub start_date_iso: String,
    #[serde(rename = "EndDateISO")]
    pub end_date_iso: String,
    #[serde(rename = "GroupBy")]
    pub group_by: &'a [ReportGroup],
    #[serde(rename = "Parameters")]
    pub parameters: &'a [ReportParameter],
}

impl<'a> From<&'a ReportRequest> for ReportCriteria<'a> {
    fn from(request: &'a ReportRequest) -> Self {
        const ISO: &str = "%Y-%m-%dT%H:%M:%S";
        Self {
            start_date_iso: request.start.format(ISO).to_string(),
            end_date_iso: request.end.format(ISO).to_string(),
            group_by: &request.groups,
            parameters: &request.parameters,
        }
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Response to `POST report/queue`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct QueuedReport {
    pub id: String,
}

/// Response to `GET report/queue/{id}`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ReportPoll {
    pub status: i64,
    #[serde(default)]
    pub result: Option<ReportResult>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Outcome of a single report poll.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportStatus {
    Pending,
    Ready(ReportResult),
    Failed(String),
}

/// A finished report.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReportResult {
    #[serde(default)]
    pub records: Vec<ReportRecord>,
}

/// One output row. Grouped-by-day reports return one record per day.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReportRecord {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub details: Vec<ReportDetail>,
    #[serde(default)]
    pub total_impressions: i64,
    #[serde(default)]
    pub total_unique_bucket_clicks: i64,
    #[serde(default)]
    pub total_true_revenue: Decimal,
}

impl ReportRecord {
    /// The calendar day this record covers, if it carries a parseable date.
    ///
    /// Adzerk emits either a bare date or a timezone-less timestamp; RFC 3339
    /// timestamps are accepted as well.
    #[must_use]
    pub fn day(&self) -> Option<NaiveDate> {
        let raw = self.date.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }

        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Some(ts.with_timezone(&Utc).date_naive());
        }
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
            return Some(ts.date());
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
    }
}

/// One flight's usage within a record.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReportDetail {
    #[serde(default)]
    pub grouping: Grouping,
    /// The flight name, which is the internal campaign fullname.
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub impressions: i64,
    #[serde(default)]
    pub unique_bucket_clicks: i64,
    #[serde(default)]
    pub true_revenue: Decimal,
}

/// Which ad-server entities a detail row belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Grouping {
    #[serde(default)]
    pub option_id: Option<i64>,
    #[serde(default)]
    pub campaign_id: Option<i64>,
}
