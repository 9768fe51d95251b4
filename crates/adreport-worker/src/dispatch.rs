//! Partition serving promos into report tasks and queue them.

use std::collections::{BTreeMap, BTreeSet};

use adreport_core::{
    Campaign, CampaignId, DailyLinkReportTask, LifetimeCampaignReportTask, Link, LinkId,
    ReportTask, ReportingSettings,
};
use chrono::{DateTime, TimeDelta, Utc};

use crate::error::WorkerError;
use crate::queue::TaskPublisher;
use crate::store::PromoStore;

/// How many tasks one dispatch run queued.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub daily_tasks: usize,
    pub lifetime_tasks: usize,
}

/// Group links into daily report tasks of at most `group_size` links.
///
/// Links are ordered by the earliest start among their campaigns, ties by
/// link id. Each task carries the union of its links' campaigns. A group
/// size of 0 is treated as 1.
#[must_use]
pub fn group_links(promos: &[(Campaign, Link)], group_size: usize) -> Vec<DailyLinkReportTask> {
    let mut by_link: BTreeMap<LinkId, (DateTime<Utc>, BTreeSet<CampaignId>)> = BTreeMap::new();
    for (campaign, link) in promos {
        let entry = by_link
            .entry(link.id)
            .or_insert_with(|| (campaign.start_date, BTreeSet::new()));
        entry.0 = entry.0.min(campaign.start_date);
        entry.1.insert(campaign.id);
    }

    let mut links: Vec<(LinkId, DateTime<Utc>, BTreeSet<CampaignId>)> = by_link
        .into_iter()
        .map(|(id, (start, campaigns))| (id, start, campaigns))
        .collect();
    links.sort_by_key(|(id, start, _)| (*start, *id));

    links
        .chunks(group_size.max(1))
        .map(|group| DailyLinkReportTask {
            link_ids: group.iter().map(|(id, _, _)| *id).collect(),
            campaign_ids: group
                .iter()
                .flat_map(|(_, _, campaigns)| campaigns.iter().copied())
                .collect(),
        })
        .collect()
}

/// Group campaigns into lifetime report tasks of at most `group_size`
/// campaigns, ordered by start date then id. A group size of 0 is treated
/// as 1.
#[must_use]
pub fn group_campaigns<'a, I>(campaigns: I, group_size: usize) -> Vec<LifetimeCampaignReportTask>
where
    I: IntoIterator<Item = &'a Campaign>,
{
    let unique: BTreeMap<CampaignId, DateTime<Utc>> = campaigns
        .into_iter()
        .map(|c| (c.id, c.start_date))
        .collect();

    let mut ordered: Vec<(DateTime<Utc>, CampaignId)> =
        unique.into_iter().map(|(id, start)| (start, id)).collect();
    ordered.sort_unstable();

    ordered
        .chunks(group_size.max(1))
        .map(|group| LifetimeCampaignReportTask {
            campaign_ids: group.iter().map(|(_, id)| *id).collect(),
        })
        .collect()
}

/// Queue report tasks for everything serving today or yesterday and wait
/// for the queue to accept them.
///
/// # Errors
///
/// Returns [`WorkerError::Store`] if reading promos, publishing or flushing
/// fails.
pub async fn dispatch(
    store: &dyn PromoStore,
    publisher: &dyn TaskPublisher,
    settings: &ReportingSettings,
    now: DateTime<Utc>,
) -> Result<DispatchSummary, WorkerError> {
    let today = now.date_naive();
    let yesterday = (now - TimeDelta::days(1)).date_naive();

    // Union of what served yesterday and today; duplicates collapse below.
    let mut promos = store.served_promos(yesterday).await?;
    promos.extend(store.served_promos(today).await?);

    let lifetime = group_campaigns(promos.iter().map(|(c, _)| c), settings.campaign_group_size);
    let daily = group_links(&promos, settings.link_group_size);

    for task in &lifetime {
        tracing::info!(count = task.campaign_ids.len(), "scheduler: queueing campaign report");
    }
    for task in &daily {
        tracing::info!(
            links = task.link_ids.len(),
            campaigns = task.campaign_ids.len(),
            "scheduler: queueing link report"
        );
    }

    let summary = DispatchSummary {
        daily_tasks: daily.len(),
        lifetime_tasks: lifetime.len(),
    };

    for task in lifetime {
        publisher.publish(ReportTask::from(task)).await?;
    }
    for task in daily {
        publisher.publish(ReportTask::from(task)).await?;
    }
    publisher.flush().await?;

    tracing::info!(
        daily_tasks = summary.daily_tasks,
        lifetime_tasks = summary.lifetime_tasks,
        "scheduler: report tasks queued"
    );
    Ok(summary)
}

#[cfg(test)]
#[path = "dispatch_test.rs"]
mod tests;
