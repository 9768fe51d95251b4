use std::sync::Arc;

use adreport_adzerk::{ReportHandle, ReportSource};
use adreport_core::{Clock, ReportingSettings};

use crate::queue::TaskPublisher;
use crate::store::{PromoStore, TrafficSink};

/// Everything a report handler needs, injected by the binary that runs it.
#[derive(Clone)]
pub struct ReportContext {
    pub reports: Arc<dyn ReportSource>,
    pub store: Arc<dyn PromoStore>,
    pub sink: Arc<dyn TrafficSink>,
    pub publisher: Arc<dyn TaskPublisher>,
    pub clock: Arc<dyn Clock>,
    pub settings: ReportingSettings,
}

/// What a report handler did with its task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    /// Nothing to report on: no entity resolved or none has an ad-server id.
    Skipped,
    /// A report was fetched and `updated` entities were written.
    Processed {
        report_id: ReportHandle,
        updated: usize,
    },
}
