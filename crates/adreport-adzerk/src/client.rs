//! HTTP client for the Adzerk reporting API.
//!
//! Reports are computed asynchronously: [`AdzerkReportClient::queue_report`]
//! returns a handle immediately and [`AdzerkReportClient::fetch_report`] is
//! polled until the report is ready.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};

use crate::error::AdzerkError;
use crate::types::{
    QueuedReport, ReportCriteria, ReportHandle, ReportPoll, ReportRequest, ReportStatus,
};

const DEFAULT_BASE_URL: &str = "https://api.adzerk.net/";
const API_KEY_HEADER: &str = "X-Adzerk-ApiKey";

const STATUS_PENDING: i64 = 1;
const STATUS_READY: i64 = 2;
const STATUS_FAILED: i64 = 3;

/// Anything that can queue and fetch aggregate reports.
///
/// Implemented by [`AdzerkReportClient`]; tests substitute scripted sources.
#[async_trait]
pub trait ReportSource: Send + Sync {
    /// Ask the API to start computing a report.
    async fn queue_report(&self, request: &ReportRequest) -> Result<ReportHandle, AdzerkError>;

    /// Poll a previously queued report once.
    async fn fetch_report(&self, handle: &ReportHandle) -> Result<ReportStatus, AdzerkError>;
}

/// Client for the Adzerk v1 reporting endpoints.
///
/// Use [`AdzerkReportClient::new`] for production or
/// [`AdzerkReportClient::with_base_url`] to point at a mock server in tests.
pub struct AdzerkReportClient {
    client: Client,
    api_key: String,
    base_url: Url,
}

impl AdzerkReportClient {
    /// Creates a new client pointed at the production Adzerk API.
    ///
    /// # Errors
    ///
    /// Returns [`AdzerkError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(api_key: &str, timeout_secs: u64) -> Result<Self, AdzerkError> {
        Self::with_base_url(api_key, timeout_secs, DEFAULT_BASE_URL)
    }

    /// Creates a new client with a custom base URL.
    ///
    /// # Errors
    ///
    /// Returns [`AdzerkError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`AdzerkError::InvalidBaseUrl`] if
    /// `base_url` does not parse.
    pub fn with_base_url(
        api_key: &str,
        timeout_secs: u64,
        base_url: &str,
    ) -> Result<Self, AdzerkError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("adreport/0.1 (usage-reporting)")
            .build()?;

        // Exactly one trailing slash so `join` appends to the base path
        // instead of replacing its last segment.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| AdzerkError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client,
            api_key: api_key.to_owned(),
            base_url,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, AdzerkError> {
        self.base_url
            .join(path)
            .map_err(|e| AdzerkError::InvalidBaseUrl {
                url: self.base_url.to_string(),
                reason: e.to_string(),
            })
    }

    /// Sends the request, maps a non-2xx status to [`AdzerkError::Api`] with
    /// the response body, and parses the body as JSON.
    async fn send_json<T>(
        &self,
        request: reqwest::RequestBuilder,
        context: &str,
    ) -> Result<T, AdzerkError>
    where
        T: serde::de::DeserializeOwned,
    {
        let response = request.header(API_KEY_HEADER, &self.api_key).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(AdzerkError::Api {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| AdzerkError::Deserialize {
            context: context.to_string(),
            source: e,
        })
    }
}

#[async_trait]
impl ReportSource for AdzerkReportClient {
    /// Queues a report via `POST v1/report/queue`.
    ///
    /// # Errors
    ///
    /// - [`AdzerkError::Http`] on network failure.
    /// - [`AdzerkError::Api`] on a non-2xx status.
    /// - [`AdzerkError::Deserialize`] if the response has no `Id`.
    async fn queue_report(&self, request: &ReportRequest) -> Result<ReportHandle, AdzerkError> {
        let criteria = serde_json::to_string(&ReportCriteria::from(request)).map_err(|e| {
            AdzerkError::Deserialize {
                context: "report criteria".to_string(),
                source: e,
            }
        })?;

        let url = self.endpoint("v1/report/queue")?;
        let queued: QueuedReport = self
            .send_json(
                self.client.post(url).form(&[("criteria", criteria)]),
                "report/queue",
            )
            .await?;

        tracing::debug!(report_id = %queued.id, "adzerk: report queued");
        Ok(ReportHandle(queued.id))
    }

    /// Polls a report via `GET v1/report/queue/{id}`.
    ///
    /// # Errors
    ///
    /// - [`AdzerkError::Http`] on network failure.
    /// - [`AdzerkError::Api`] on a non-2xx status.
    /// - [`AdzerkError::Deserialize`] if the body does not match the poll shape.
    /// - [`AdzerkError::UnexpectedReportStatus`] for an unknown `Status` code.
    async fn fetch_report(&self, handle: &ReportHandle) -> Result<ReportStatus, AdzerkError> {
        let url = self.endpoint(&format!("v1/report/queue/{}", handle.as_str()))?;
        let poll: ReportPoll = self
            .send_json(self.client.get(url), &format!("report/queue/{handle}"))
            .await?;

        match poll.status {
            STATUS_PENDING => Ok(ReportStatus::Pending),
            STATUS_READY => Ok(ReportStatus::Ready(poll.result.unwrap_or_default())),
            STATUS_FAILED => Ok(ReportStatus::Failed(
                poll.message
                    .unwrap_or_else(|| "report generation failed".to_string()),
            )),
            other => Err(AdzerkError::UnexpectedReportStatus {
                report_id: handle.to_string(),
                status: other,
            }),
        }
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
