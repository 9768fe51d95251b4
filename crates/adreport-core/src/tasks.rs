//! Report-generation tasks carried on the reporting queue.
//!
//! Messages are JSON objects discriminated by `action`:
//!
//! ```json
//! {"action": "generate_daily_link_reports", "link_ids": [1], "campaign_ids": [2]}
//! {"action": "generate_lifetime_campaign_reports", "campaign_ids": [2]}
//! ```

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::promos::{CampaignId, LinkId};

const DAILY_LINK_ACTION: &str = "generate_daily_link_reports";
const LIFETIME_CAMPAIGN_ACTION: &str = "generate_lifetime_campaign_reports";

/// Daily per-link usage for a group of links and all of their campaigns.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DailyLinkReportTask {
    pub link_ids: BTreeSet<LinkId>,
    pub campaign_ids: BTreeSet<CampaignId>,
}

/// Lifetime totals for a group of campaigns.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LifetimeCampaignReportTask {
    pub campaign_ids: BTreeSet<CampaignId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ReportTask {
    GenerateDailyLinkReports(DailyLinkReportTask),
    GenerateLifetimeCampaignReports(LifetimeCampaignReportTask),
}

impl ReportTask {
    /// The wire `action` name.
    #[must_use]
    pub fn action(&self) -> &'static str {
        match self {
            ReportTask::GenerateDailyLinkReports(_) => DAILY_LINK_ACTION,
            ReportTask::GenerateLifetimeCampaignReports(_) => LIFETIME_CAMPAIGN_ACTION,
        }
    }

    /// Serialize to the queue's JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`serde_json::Error`] if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl From<DailyLinkReportTask> for ReportTask {
    fn from(task: DailyLinkReportTask) -> Self {
        ReportTask::GenerateDailyLinkReports(task)
    }
}

impl From<LifetimeCampaignReportTask> for ReportTask {
    fn from(task: LifetimeCampaignReportTask) -> Self {
        ReportTask::GenerateLifetimeCampaignReports(task)
    }
}

/// A decoded queue message.
///
/// Unknown actions decode successfully so the consumer can log and drop them
/// instead of treating them as poison messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskMessage {
    Task(ReportTask),
    UnknownAction(Option<String>),
}

impl TaskMessage {
    /// Decode a raw queue body.
    ///
    /// # Errors
    ///
    /// Returns [`serde_json::Error`] if the body is not JSON, or if a known
    /// action carries a payload of the wrong shape.
    pub fn decode(body: &str) -> Result<Self, serde_json::Error> {
        let value: serde_json::Value = serde_json::from_str(body)?;
        let action = value
            .get("action")
            .and_then(serde_json::Value::as_str)
            .map(str::to_owned);

        match action.as_deref() {
            Some(DAILY_LINK_ACTION | LIFETIME_CAMPAIGN_ACTION) => {
                serde_json::from_value::<ReportTask>(value).map(TaskMessage::Task)
            }
            _ => Ok(TaskMessage::UnknownAction(action)),
        }
    }
}
