//! Poll a queued report until it is ready, failed, or timed out.
//!
//! Pending responses back off exponentially: the n-th pending response
//! sleeps `3^n` seconds before the next poll. The timeout is checked each
//! time a pending response arrives, so a report can overrun the timeout by
//! at most one back-off interval.

use std::time::Duration;

use adreport_core::Clock;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::client::ReportSource;
use crate::error::AdzerkError;
use crate::types::{ReportHandle, ReportResult, ReportStatus};

/// Base of the exponential back-off between polls, in seconds.
pub const RETRY_SLEEP_BASE_SECS: u64 = 3;

/// Ways waiting on a report can end without a result.
#[derive(Debug, Error)]
pub enum ReportError {
    /// The report was still pending after the configured timeout.
    #[error("{scope} reports timed out ({names}/{report_id})")]
    TimedOut {
        scope: &'static str,
        names: String,
        report_id: ReportHandle,
    },

    /// The API gave up on the report.
    #[error("{scope} reports failed ({names}/{report_id}): {message}")]
    Failed {
        scope: &'static str,
        names: String,
        report_id: ReportHandle,
        message: String,
    },

    /// Transport or API error while queueing or polling.
    #[error(transparent)]
    Client(#[from] AdzerkError),
}

impl ReportError {
    /// Whether the report itself failed, as opposed to the transport.
    ///
    /// Report failures are retried by queueing a fresh task; transport
    /// errors are left to the queue's redelivery.
    #[must_use]
    pub fn is_report_failure(&self) -> bool {
        matches!(self, ReportError::TimedOut { .. } | ReportError::Failed { .. })
    }
}

/// What is being waited on, for log lines and error messages.
#[derive(Debug, Clone)]
pub struct PollSubject<'a> {
    /// `"link"` or `"campaign"`.
    pub scope: &'static str,
    /// Comma-separated fullnames of the entities covered by the report.
    pub names: &'a str,
}

/// Poll `handle` until it resolves.
///
/// `queued_at` is when the report was requested; once a pending response
/// arrives more than `timeout` after it, [`ReportError::TimedOut`] is
/// returned without sleeping again.
///
/// # Errors
///
/// - [`ReportError::TimedOut`] if the report stays pending past `timeout`.
/// - [`ReportError::Failed`] if the API reports the job as failed.
/// - [`ReportError::Client`] on any transport or decoding error.
pub async fn wait_for_report(
    source: &dyn ReportSource,
    clock: &dyn Clock,
    timeout: Duration,
    handle: &ReportHandle,
    queued_at: DateTime<Utc>,
    subject: &PollSubject<'_>,
) -> Result<ReportResult, ReportError> {
    let mut attempt: u32 = 1;

    loop {
        match source.fetch_report(handle).await? {
            ReportStatus::Ready(result) => return Ok(result),
            ReportStatus::Failed(message) => {
                return Err(ReportError::Failed {
                    scope: subject.scope,
                    names: subject.names.to_string(),
                    report_id: handle.clone(),
                    message,
                });
            }
            ReportStatus::Pending => {
                let elapsed = (clock.now() - queued_at).to_std().unwrap_or_default();
                if elapsed > timeout {
                    return Err(ReportError::TimedOut {
                        scope: subject.scope,
                        names: subject.names.to_string(),
                        report_id: handle.clone(),
                    });
                }

                let sleep_secs = RETRY_SLEEP_BASE_SECS.saturating_pow(attempt);
                attempt = attempt.saturating_add(1);

                tracing::warn!(
                    report_id = %handle,
                    sleep_secs,
                    names = subject.names,
                    "{} reports still pending, retrying",
                    subject.scope
                );
                clock.sleep(Duration::from_secs(sleep_secs)).await;
            }
        }
    }
}
