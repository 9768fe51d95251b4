use thiserror::Error;

/// Errors returned by the Adzerk reporting client.
#[derive(Debug, Error)]
pub enum AdzerkError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-2xx status.
    #[error("Adzerk API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// A report poll returned a `Status` code this client does not know.
    #[error("unexpected report status {status} for report {report_id}")]
    UnexpectedReportStatus { report_id: String, status: i64 },

    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}
