//! Lifetime usage reports for groups of campaigns.

use adreport_adzerk::{
    wait_for_report, PollSubject, ReportError, ReportGroup, ReportParameter, ReportRequest,
};
use adreport_core::{campaigns_date_range, Campaign, LifetimeCampaignReportTask};

use crate::context::{ReportContext, ReportOutcome};
use crate::error::WorkerError;
use crate::reconcile::{lifetime_usage, CampaignIndex};

/// Generate the lifetime report for `task` and overwrite each matched
/// campaign's ad-server totals with it.
///
/// # Errors
///
/// - [`WorkerError::Report`] if the report cannot be queued, times out or is
///   failed by the API.
/// - [`WorkerError::Store`] if reading or committing campaigns fails.
pub async fn generate_lifetime_campaign_reports(
    ctx: &ReportContext,
    task: &LifetimeCampaignReportTask,
) -> Result<ReportOutcome, WorkerError> {
    let campaigns = ctx.store.campaigns_by_id(&task.campaign_ids).await?;

    if campaigns.len() < task.campaign_ids.len() {
        tracing::warn!(
            requested = task.campaign_ids.len(),
            found = campaigns.len(),
            "campaign report: skipping unresolvable ids"
        );
    }

    let Some((start, latest_end)) = campaigns_date_range(&campaigns) else {
        tracing::info!("campaign report: nothing to report on");
        return Ok(ReportOutcome::Skipped);
    };
    let end = ctx.clock.now().min(latest_end);

    let mut parameters = Vec::with_capacity(campaigns.len());
    for campaign in &campaigns {
        match campaign.external_flight_id {
            Some(id) => parameters.push(ReportParameter::FlightId(id)),
            None => tracing::warn!(
                campaign = %campaign.fullname(),
                "campaign report: campaign has no ad-server flight"
            ),
        }
    }
    if parameters.is_empty() {
        return Ok(ReportOutcome::Skipped);
    }

    let names = campaigns
        .iter()
        .map(Campaign::fullname)
        .collect::<Vec<_>>()
        .join(",");
    tracing::info!(
        campaigns = %names,
        start = %start.format("%Y-%m-%d"),
        end = %end.format("%Y-%m-%d"),
        "campaign report: generating"
    );

    let request = ReportRequest {
        start,
        end,
        groups: vec![ReportGroup::OptionId],
        parameters,
    };
    let queued_at = ctx.clock.now();
    let handle = ctx
        .reports
        .queue_report(&request)
        .await
        .map_err(ReportError::from)?;

    let result = wait_for_report(
        ctx.reports.as_ref(),
        ctx.clock.as_ref(),
        ctx.settings.timeout,
        &handle,
        queued_at,
        &PollSubject {
            scope: "campaign",
            names: &names,
        },
    )
    .await?;

    let index = CampaignIndex::new(campaigns);
    let usage = lifetime_usage(&result.records, &index);

    for (id, totals) in &usage {
        let Some(campaign) = index.get(*id) else {
            continue;
        };
        let mut campaign = campaign.clone();
        campaign.adserver_spent_pennies = totals.spent_pennies();
        campaign.adserver_impressions = totals.impressions;
        campaign.adserver_clicks = totals.clicks;
        campaign.last_lifetime_report = Some(handle.to_string());
        campaign.last_lifetime_report_run = Some(queued_at);
        ctx.store.commit_campaign(&campaign).await?;
    }

    tracing::info!(
        campaigns = %names,
        report_id = %handle,
        updated = usage.len(),
        "campaign report: processed"
    );

    Ok(ReportOutcome::Processed {
        report_id: handle,
        updated: usage.len(),
    })
}
