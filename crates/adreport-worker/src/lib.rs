//! Asynchronous usage reporting: dispatch report tasks on a schedule, consume
//! them from the queue, fetch Adzerk reports, and reconcile the results into
//! promo bookkeeping and traffic tables.

pub mod consumer;
pub mod context;
pub mod daily;
pub mod dispatch;
pub mod error;
pub mod lifetime;
pub mod postgres;
pub mod queue;
pub mod reconcile;
pub mod store;

#[cfg(test)]
mod testing;

pub use consumer::{process_message, Consumer, MessageOutcome};
pub use context::{ReportContext, ReportOutcome};
pub use daily::{daily_report_window, generate_daily_link_reports, ReportWindow};
pub use dispatch::{dispatch, group_campaigns, group_links, DispatchSummary};
pub use error::{StoreError, WorkerError};
pub use lifetime::generate_lifetime_campaign_reports;
pub use postgres::{postgres_report_context, PgPromoStore, PgTaskQueue, PgTrafficSink};
pub use queue::{QueuedMessage, TaskPublisher, TaskSource};
pub use reconcile::{aggregate_daily, lifetime_usage, CampaignIndex, DailyUsage};
pub use store::{PromoStore, TrafficSink};
