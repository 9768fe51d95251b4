use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub adzerk_api_key: Option<String>,
    pub adzerk_api_base_url: String,
    pub adzerk_request_timeout_secs: u64,
    pub reporting_link_group_size: usize,
    pub reporting_campaign_group_size: usize,
    pub reporting_timeout_secs: u64,
    pub queue_idle_poll_secs: u64,
    pub queue_visibility_timeout_secs: u64,
    pub dispatch_cron: String,
}

impl AppConfig {
    /// The knobs read by the dispatcher and the report handlers.
    #[must_use]
    pub fn reporting(&self) -> ReportingSettings {
        ReportingSettings {
            link_group_size: self.reporting_link_group_size,
            campaign_group_size: self.reporting_campaign_group_size,
            timeout: Duration::from_secs(self.reporting_timeout_secs),
        }
    }

    #[must_use]
    pub fn queue(&self) -> QueueSettings {
        QueueSettings {
            idle_poll: Duration::from_secs(self.queue_idle_poll_secs),
            visibility_timeout: Duration::from_secs(self.queue_visibility_timeout_secs),
        }
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field(
                "adzerk_api_key",
                &self.adzerk_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("adzerk_api_base_url", &self.adzerk_api_base_url)
            .field(
                "adzerk_request_timeout_secs",
                &self.adzerk_request_timeout_secs,
            )
            .field("reporting_link_group_size", &self.reporting_link_group_size)
            .field(
                "reporting_campaign_group_size",
                &self.reporting_campaign_group_size,
            )
            .field("reporting_timeout_secs", &self.reporting_timeout_secs)
            .field("queue_idle_poll_secs", &self.queue_idle_poll_secs)
            .field(
                "queue_visibility_timeout_secs",
                &self.queue_visibility_timeout_secs,
            )
            .field("dispatch_cron", &self.dispatch_cron)
            .finish()
    }
}

/// Group sizes and poll timeout for the reporting pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportingSettings {
    pub link_group_size: usize,
    pub campaign_group_size: usize,
    /// How long a queued report may stay pending before the task is
    /// considered failed and re-enqueued.
    pub timeout: Duration,
}

impl Default for ReportingSettings {
    fn default() -> Self {
        Self {
            link_group_size: 50,
            campaign_group_size: 100,
            timeout: Duration::from_secs(500),
        }
    }
}

/// Consumer-side queue behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueSettings {
    pub idle_poll: Duration,
    pub visibility_timeout: Duration,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            idle_poll: Duration::from_secs(5),
            visibility_timeout: Duration::from_secs(3600),
        }
    }
}
