//! Adzerk reporting API client and report polling.

pub mod client;
pub mod error;
pub mod poll;
pub mod types;

pub use client::{AdzerkReportClient, ReportSource};
pub use error::AdzerkError;
pub use poll::{wait_for_report, PollSubject, ReportError, RETRY_SLEEP_BASE_SECS};
pub use types::{
    Grouping, ReportDetail, ReportGroup, ReportHandle, ReportParameter, ReportRecord,
    ReportRequest, ReportResult, ReportStatus,
};
