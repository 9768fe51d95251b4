pub mod app_config;
pub mod clock;
pub mod config;
pub mod promos;
pub mod tasks;
pub mod usage;

pub use app_config::{AppConfig, Environment, QueueSettings, ReportingSettings};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{load_app_config, load_app_config_from_env, ConfigError};
pub use promos::{
    campaigns_date_range, to_base36, Campaign, CampaignId, Link, LinkId, Target,
    CAMPAIGN_FULLNAME_PREFIX, LINK_FULLNAME_PREFIX, MULTI_SUBREDDIT_LABEL,
};
pub use tasks::{DailyLinkReportTask, LifetimeCampaignReportTask, ReportTask, TaskMessage};
pub use usage::{normalize_usage, Usage};
