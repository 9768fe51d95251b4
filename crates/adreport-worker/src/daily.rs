//! Daily per-link usage reports.
//!
//! One report covers a group of links: it is grouped by flight and day, so
//! each record is one day and each detail one campaign's usage on that day.
//! Campaign and link rows are written to the traffic tables, then the
//! bookkeeping of every link the report covered is updated.

use std::collections::BTreeSet;

use adreport_adzerk::{
    wait_for_report, PollSubject, ReportError, ReportGroup, ReportParameter, ReportRequest,
};
use adreport_core::{campaigns_date_range, Campaign, DailyLinkReportTask, Link, LinkId};
use adreport_db::{CampaignTraffic, LinkTraffic};
use chrono::{DateTime, TimeDelta, Utc};

use crate::context::{ReportContext, ReportOutcome};
use crate::error::WorkerError;
use crate::reconcile::{aggregate_daily, CampaignIndex, DailyUsage};

/// Time range a report is requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Window for a daily report over `links` and their `campaigns`.
///
/// Starts a day before the least recent previous run (so late-arriving
/// usage for that day is picked up), never before the earliest campaign
/// start. A link that was never reported contributes the earliest campaign
/// start. If that lands after the campaigns have all ended the whole flight
/// range is reported. The window never extends past `now`.
///
/// Returns `None` when `campaigns` is empty.
#[must_use]
pub fn daily_report_window(
    links: &[Link],
    campaigns: &[Campaign],
    now: DateTime<Utc>,
) -> Option<ReportWindow> {
    let (links_start, links_end) = campaigns_date_range(campaigns)?;

    let last_run = links
        .iter()
        .map(|l| l.last_daily_report_run.unwrap_or(links_start))
        .min()
        .unwrap_or(links_start);

    let mut start = (last_run - TimeDelta::hours(24)).max(links_start);
    if start > links_end {
        start = links_start;
    }

    Some(ReportWindow {
        start,
        end: now.min(links_end),
    })
}

fn joined_fullnames(links: &[Link]) -> String {
    links
        .iter()
        .map(Link::fullname)
        .collect::<Vec<_>>()
        .join(",")
}

/// Generate, reconcile and persist the daily report for `task`.
///
/// # Errors
///
/// - [`WorkerError::Report`] if the report cannot be queued, times out or is
///   failed by the API.
/// - [`WorkerError::Store`] if reading entities or writing results fails.
pub async fn generate_daily_link_reports(
    ctx: &ReportContext,
    task: &DailyLinkReportTask,
) -> Result<ReportOutcome, WorkerError> {
    let links = ctx.store.links_by_id(&task.link_ids).await?;
    let campaigns = ctx.store.campaigns_by_id(&task.campaign_ids).await?;

    if links.len() < task.link_ids.len() || campaigns.len() < task.campaign_ids.len() {
        tracing::warn!(
            requested_links = task.link_ids.len(),
            found_links = links.len(),
            requested_campaigns = task.campaign_ids.len(),
            found_campaigns = campaigns.len(),
            "link report: skipping unresolvable ids"
        );
    }

    if links.is_empty() || campaigns.is_empty() {
        tracing::info!("link report: nothing to report on");
        return Ok(ReportOutcome::Skipped);
    }

    let now = ctx.clock.now();
    let Some(window) = daily_report_window(&links, &campaigns, now) else {
        return Ok(ReportOutcome::Skipped);
    };

    // Only links with an ad-server campaign are reported on, and only those
    // get their bookkeeping moved forward.
    let mut parameters = Vec::with_capacity(links.len());
    let mut reported = Vec::with_capacity(links.len());
    for link in &links {
        match link.external_campaign_id {
            Some(id) => {
                parameters.push(ReportParameter::CampaignId(id));
                reported.push(link);
            }
            None => tracing::warn!(
                link = %link.fullname(),
                "link report: link has no ad-server campaign"
            ),
        }
    }
    if parameters.is_empty() {
        return Ok(ReportOutcome::Skipped);
    }

    let names = joined_fullnames(&links);
    tracing::info!(
        links = %names,
        start = %window.start.format("%Y-%m-%d"),
        end = %window.end.format("%Y-%m-%d"),
        "link report: generating"
    );

    let request = ReportRequest {
        start: window.start,
        end: window.end,
        groups: vec![ReportGroup::OptionId, ReportGroup::Day],
        parameters,
    };
    let queued_at = ctx.clock.now();
    let handle = ctx
        .reports
        .queue_report(&request)
        .await
        .map_err(ReportError::from)?;

    tracing::info!(links = %names, report_id = %handle, "link report: processing");
    let result = wait_for_report(
        ctx.reports.as_ref(),
        ctx.clock.as_ref(),
        ctx.settings.timeout,
        &handle,
        queued_at,
        &PollSubject {
            scope: "link",
            names: &names,
        },
    )
    .await?;

    // Details are matched against every campaign of the reported links, not
    // only the ones named in the task.
    let link_ids: BTreeSet<LinkId> = links.iter().map(|l| l.id).collect();
    let owned = ctx.store.campaigns_for_links(&link_ids).await?;
    let index = CampaignIndex::new(owned);
    let usage = aggregate_daily(&result.records, &index);

    let (campaign_rows, link_rows) = traffic_rows(&usage, &index);
    ctx.sink.write_campaign_traffic(&campaign_rows).await?;
    ctx.sink.write_link_traffic(&link_rows).await?;

    for link in reported {
        let mut link = link.clone();
        link.last_daily_report = Some(handle.to_string());
        link.last_daily_report_run = Some(queued_at);
        ctx.store.commit_link(&link).await?;
    }

    tracing::info!(
        links = %names,
        report_id = %handle,
        campaign_rows = campaign_rows.len(),
        link_rows = link_rows.len(),
        "link report: processed"
    );

    Ok(ReportOutcome::Processed {
        report_id: handle,
        updated: campaign_rows.len() + link_rows.len(),
    })
}

/// Turn aggregated usage into traffic rows.
fn traffic_rows(
    usage: &DailyUsage,
    index: &CampaignIndex,
) -> (Vec<CampaignTraffic>, Vec<LinkTraffic>) {
    let campaign_rows = usage
        .campaigns
        .iter()
        .filter_map(|(&(id, date), u)| {
            let campaign = index.get(id)?;
            Some(CampaignTraffic {
                codename: campaign.fullname(),
                date,
                subreddit: campaign.target.reporting_label(),
                impressions: u.impressions,
                clicks: u.clicks,
                spent_pennies: u.spent_pennies(),
            })
        })
        .collect();

    let link_rows = usage
        .links
        .iter()
        .map(|(&(id, date), u)| LinkTraffic {
            codename: id.fullname(),
            date,
            impressions: u.impressions,
            clicks: u.clicks,
            spent_pennies: u.spent_pennies(),
        })
        .collect();

    (campaign_rows, link_rows)
}

#[cfg(test)]
#[path = "daily_test.rs"]
mod tests;
