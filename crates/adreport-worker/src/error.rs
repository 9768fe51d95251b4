use adreport_adzerk::ReportError;
use adreport_db::DbError;
use thiserror::Error;

/// Failure reported by a [`PromoStore`](crate::PromoStore),
/// [`TrafficSink`](crate::TrafficSink) or queue implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Db(#[from] DbError),

    /// Backend-specific failure that is not a database error.
    #[error("{0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Report(#[from] ReportError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl WorkerError {
    /// Whether the failure is a timed-out or failed report, which is retried
    /// by queueing a fresh task rather than by redelivering the message.
    #[must_use]
    pub fn is_report_failure(&self) -> bool {
        matches!(self, WorkerError::Report(e) if e.is_report_failure())
    }
}
