//! Promoted links and their campaigns, as seen by the reporting pipeline.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Fullname prefix for promoted links (`t3_<base36 id>`).
pub const LINK_FULLNAME_PREFIX: &str = "t3_";

/// Fullname prefix for promo campaigns (`t8_<base36 id>`).
pub const CAMPAIGN_FULLNAME_PREFIX: &str = "t8_";

/// Subreddit label stored for campaigns targeting several subreddits at once.
/// Their joined target names are too long to be useful as a label.
pub const MULTI_SUBREDDIT_LABEL: &str = "multi_subreddit";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CampaignId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkId(pub i64);

impl std::fmt::Display for CampaignId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for LinkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl CampaignId {
    #[must_use]
    pub fn fullname(self) -> String {
        format!("{CAMPAIGN_FULLNAME_PREFIX}{}", to_base36(self.0))
    }
}

impl LinkId {
    #[must_use]
    pub fn fullname(self) -> String {
        format!("{LINK_FULLNAME_PREFIX}{}", to_base36(self.0))
    }
}

/// Render a non-negative id in lowercase base 36. Negative ids render their
/// magnitude with a leading `-`.
#[must_use]
pub fn to_base36(value: i64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

    let mut n = value.unsigned_abs();
    if n == 0 {
        return "0".to_string();
    }

    let mut out = Vec::new();
    while n > 0 {
        // n % 36 < 36 so the index is always in range.
        out.push(DIGITS[usize::try_from(n % 36).unwrap_or(0)]);
        n /= 36;
    }
    if value < 0 {
        out.push(b'-');
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// Where a campaign is shown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum Target {
    Frontpage,
    Subreddit(String),
    /// A named, curated collection of subreddits.
    Collection(String),
    /// An ad-hoc set of subreddits picked for this campaign.
    MultiSubreddit(Vec<String>),
}

impl Target {
    /// Name of the target as stored alongside the campaign.
    #[must_use]
    pub fn target_name(&self) -> String {
        match self {
            Target::Frontpage => String::new(),
            Target::Subreddit(name) | Target::Collection(name) => name.clone(),
            Target::MultiSubreddit(names) => names.join("+"),
        }
    }

    /// Label written to the `subreddit` column of campaign traffic rows.
    #[must_use]
    pub fn reporting_label(&self) -> String {
        match self {
            Target::MultiSubreddit(_) => MULTI_SUBREDDIT_LABEL.to_string(),
            other => other.target_name(),
        }
    }
}

/// A promo campaign: one flight on the ad server for one promoted link.
#[derive(Debug, Clone, PartialEq)]
pub struct Campaign {
    pub id: CampaignId,
    pub link_id: LinkId,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub external_flight_id: Option<i64>,
    pub target: Target,
    pub cancelled: bool,
    pub last_lifetime_report: Option<String>,
    pub last_lifetime_report_run: Option<DateTime<Utc>>,
    pub adserver_spent_pennies: i64,
    pub adserver_impressions: i64,
    pub adserver_clicks: i64,
}

impl Campaign {
    #[must_use]
    pub fn fullname(&self) -> String {
        self.id.fullname()
    }

    /// Whether the campaign is scheduled to serve at any point on `day`.
    #[must_use]
    pub fn is_serving_on(&self, day: NaiveDate) -> bool {
        !self.cancelled
            && self.start_date.date_naive() <= day
            && day < self.end_date.date_naive()
    }
}

/// A promoted link. Its campaigns reference it through [`Campaign::link_id`].
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub id: LinkId,
    pub external_campaign_id: Option<i64>,
    pub last_daily_report: Option<String>,
    pub last_daily_report_run: Option<DateTime<Utc>>,
}

impl Link {
    #[must_use]
    pub fn fullname(&self) -> String {
        self.id.fullname()
    }
}

/// Earliest start and latest end across `campaigns`, or `None` when empty.
pub fn campaigns_date_range<'a, I>(campaigns: I) -> Option<(DateTime<Utc>, DateTime<Utc>)>
where
    I: IntoIterator<Item = &'a Campaign>,
{
    campaigns.into_iter().fold(None, |range, c| match range {
        None => Some((c.start_date, c.end_date)),
        Some((start, end)) => Some((start.min(c.start_date), end.max(c.end_date))),
    })
}
