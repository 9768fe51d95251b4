use std::sync::Arc;
use std::time::Duration;

use adreport_adzerk::{AdzerkError, ReportHandle, ReportRequest, ReportSource, ReportStatus};
use adreport_core::{
    CampaignId, DailyLinkReportTask, LinkId, QueueSettings, ReportTask, ReportingSettings,
};
use async_trait::async_trait;
use tracing_test::traced_test;

use super::*;
use crate::dispatch::dispatch;
use crate::testing::{
    at, campaign, day, detail, link, ready, record, Harness, MemoryStore, ScriptedReports,
};

fn daily_task(link_id: i64, campaign_id: i64) -> ReportTask {
    ReportTask::from(DailyLinkReportTask {
        link_ids: [LinkId(link_id)].into(),
        campaign_ids: [CampaignId(campaign_id)].into(),
    })
}

fn two_link_store() -> MemoryStore {
    MemoryStore::with(
        vec![link(1), link(2)],
        vec![
            campaign(1, 1, at(2020, 1, 1), at(2020, 1, 10)),
            campaign(2, 2, at(2020, 1, 5), at(2020, 1, 15)),
        ],
    )
}

fn consumer(h: &Harness) -> Consumer {
    Consumer::new(h.ctx.clone(), h.queue.clone(), QueueSettings::default())
}

/// Refuses every request as if the API were down.
struct UnreachableReports;

#[async_trait]
impl ReportSource for UnreachableReports {
    async fn queue_report(&self, _: &ReportRequest) -> Result<ReportHandle, AdzerkError> {
        Err(AdzerkError::Api {
            status: 503,
            body: "unavailable".to_string(),
        })
    }

    async fn fetch_report(&self, _: &ReportHandle) -> Result<ReportStatus, AdzerkError> {
        Err(AdzerkError::Api {
            status: 503,
            body: "unavailable".to_string(),
        })
    }
}

#[tokio::test]
#[traced_test]
async fn dispatched_tasks_flow_through_to_traffic_rows() {
    let reports = ScriptedReports::new(vec![
        // Lifetime task for both campaigns is queued first.
        ready(Vec::new()),
        // Daily task for link 1.
        ready(vec![record(
            Some("2020-01-06T00:00:00"),
            vec![
                detail("t8_1", 120, 3, "2.40"),
                detail("t8_zzz", 999, 9, "9.99"),
            ],
        )]),
        // Daily task for link 2.
        ready(Vec::new()),
    ]);
    let settings = ReportingSettings {
        link_group_size: 1,
        ..ReportingSettings::default()
    };
    let h = Harness::with_settings(two_link_store(), reports, at(2020, 1, 7), settings);

    let summary = dispatch(
        h.store.as_ref(),
        h.queue.as_ref(),
        &h.ctx.settings,
        at(2020, 1, 7),
    )
    .await
    .unwrap();
    assert_eq!(summary.daily_tasks, 2);
    assert_eq!(summary.lifetime_tasks, 1);

    let tasks = std::mem::take(&mut *h.queue.flushed.lock().unwrap());
    for (id, task) in (1..).zip(&tasks) {
        h.queue.push_body(id, &task.to_json().unwrap());
    }

    let consumer = consumer(&h);
    while consumer.run_once().await.unwrap() {}

    assert_eq!(*h.queue.acked.lock().unwrap(), vec![1, 2, 3]);
    assert!(h.queue.flushed().is_empty(), "nothing should be re-enqueued");

    let rows = h.sink.campaign_rows.lock().unwrap().clone();
    assert_eq!(rows.len(), 1);
    let row = &rows[&("t8_1".to_string(), day(2020, 1, 6))];
    assert_eq!((row.impressions, row.clicks, row.spent_pennies), (120, 3, 240));
    assert!(logs_contain("link report: no campaign for flight"));
    assert!(logs_contain("t8_zzz"));

    assert_eq!(h.store.link_commits.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn malformed_message_is_buried() {
    let h = Harness::new(two_link_store(), ScriptedReports::default(), at(2020, 1, 7));
    h.queue.push_body(7, "{not json");

    assert!(consumer(&h).run_once().await.unwrap());

    let buried = h.queue.buried.lock().unwrap().clone();
    assert_eq!(buried.len(), 1);
    assert_eq!(buried[0].0, 7);
    assert!(h.queue.acked.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_action_is_dropped_and_acked() {
    let h = Harness::new(two_link_store(), ScriptedReports::default(), at(2020, 1, 7));

    let outcome = process_message(&h.ctx, r#"{"action": "rebuild_everything"}"#)
        .await
        .unwrap();
    assert_eq!(outcome, MessageOutcome::Dropped);

    h.queue.push_body(3, r#"{"action": "rebuild_everything"}"#);
    consumer(&h).run_once().await.unwrap();
    assert_eq!(*h.queue.acked.lock().unwrap(), vec![3]);
    assert!(h.reports.requests().is_empty());
}

#[tokio::test]
async fn timed_out_report_is_requeued_and_original_acked() {
    // Pending forever.
    let h = Harness::new(two_link_store(), ScriptedReports::default(), at(2020, 1, 7));
    let task = daily_task(1, 1);
    h.queue.push_body(11, &task.to_json().unwrap());

    consumer(&h).run_once().await.unwrap();

    assert_eq!(h.queue.flushed(), vec![task]);
    assert_eq!(*h.queue.acked.lock().unwrap(), vec![11]);
    assert!(h.queue.released.lock().unwrap().is_empty());
    assert!(h.sink.campaign_rows.lock().unwrap().is_empty());
}

#[tokio::test]
async fn failed_report_is_requeued() {
    let reports = ScriptedReports::new(vec![ReportStatus::Failed("exploded".into())]);
    let h = Harness::new(two_link_store(), reports, at(2020, 1, 7));
    let task = daily_task(2, 2);

    let outcome = process_message(&h.ctx, &task.to_json().unwrap())
        .await
        .unwrap();

    assert_eq!(outcome, MessageOutcome::Requeued);
    assert_eq!(h.queue.flushed(), vec![task]);
}

#[tokio::test]
async fn transport_error_releases_message() {
    let h = Harness::new(two_link_store(), ScriptedReports::default(), at(2020, 1, 7));
    let mut ctx = h.ctx.clone();
    ctx.reports = Arc::new(UnreachableReports);
    h.queue.push_body(5, &daily_task(1, 1).to_json().unwrap());

    let consumer = Consumer::new(ctx, h.queue.clone(), QueueSettings::default());
    assert!(consumer.run_once().await.unwrap());

    let released = h.queue.released.lock().unwrap().clone();
    assert_eq!(released.len(), 1);
    assert_eq!(released[0].0, 5);
    assert!(released[0].1.contains("503"), "{}", released[0].1);
    assert!(h.queue.flushed().is_empty());
    assert!(h.queue.acked.lock().unwrap().is_empty());
}

#[tokio::test]
async fn empty_queue_reports_idle() {
    let h = Harness::new(two_link_store(), ScriptedReports::default(), at(2020, 1, 7));
    assert!(!consumer(&h).run_once().await.unwrap());
}

#[tokio::test]
async fn run_drains_queue_and_stops_on_shutdown() {
    let h = Harness::new(two_link_store(), ScriptedReports::default(), at(2020, 1, 7));
    h.queue.push_body(1, r#"{"action": "noop"}"#);
    h.queue.push_body(2, r#"{"action": "noop"}"#);

    let consumer = Consumer::new(
        h.ctx.clone(),
        h.queue.clone(),
        QueueSettings {
            idle_poll: Duration::from_millis(10),
            visibility_timeout: Duration::from_secs(60),
        },
    );
    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(async move { consumer.run(rx).await });

    for _ in 0..200 {
        if h.queue.acked.lock().unwrap().len() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(*h.queue.acked.lock().unwrap(), vec![1, 2]);

    tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("consumer should stop after shutdown")
        .unwrap();
}
