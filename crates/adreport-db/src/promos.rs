//! Database operations for `promo_links` and `promo_campaigns`.

use adreport_core::{Campaign, CampaignId, Link, LinkId, Target};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;

use crate::DbError;

const CAMPAIGN_COLUMNS: &str = "id, link_id, start_date, end_date, external_flight_id, \
     target_kind, target_name, target_subreddits, cancelled, \
     last_lifetime_report, last_lifetime_report_run, \
     adserver_spent_pennies, adserver_impressions, adserver_clicks";

const LINK_COLUMNS: &str =
    "id, external_campaign_id, last_daily_report, last_daily_report_run";

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `promo_campaigns` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CampaignRow {
    pub id: i64,
    pub link_id: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub external_flight_id: Option<i64>,
    /// One of `frontpage`, `subreddit`, `collection`, `multi_subreddit`.
    pub target_kind: String,
    pub target_name: String,
    /// Only populated for `multi_subreddit` targets.
    pub target_subreddits: Vec<String>,
    pub cancelled: bool,
    pub last_lifetime_report: Option<String>,
    pub last_lifetime_report_run: Option<DateTime<Utc>>,
    pub adserver_spent_pennies: i64,
    pub adserver_impressions: i64,
    pub adserver_clicks: i64,
}

/// A row from the `promo_links` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LinkRow {
    pub id: i64,
    pub external_campaign_id: Option<i64>,
    pub last_daily_report: Option<String>,
    pub last_daily_report_run: Option<DateTime<Utc>>,
}

impl TryFrom<CampaignRow> for Campaign {
    type Error = DbError;

    fn try_from(row: CampaignRow) -> Result<Self, Self::Error> {
        let target = match row.target_kind.as_str() {
            "frontpage" => Target::Frontpage,
            "subreddit" => Target::Subreddit(row.target_name),
            "collection" => Target::Collection(row.target_name),
            "multi_subreddit" => Target::MultiSubreddit(row.target_subreddits),
            other => {
                return Err(DbError::InvalidRow {
                    table: "promo_campaigns",
                    id: row.id,
                    reason: format!("unknown target_kind '{other}'"),
                })
            }
        };

        Ok(Campaign {
            id: CampaignId(row.id),
            link_id: LinkId(row.link_id),
            start_date: row.start_date,
            end_date: row.end_date,
            external_flight_id: row.external_flight_id,
            target,
            cancelled: row.cancelled,
            last_lifetime_report: row.last_lifetime_report,
            last_lifetime_report_run: row.last_lifetime_report_run,
            adserver_spent_pennies: row.adserver_spent_pennies,
            adserver_impressions: row.adserver_impressions,
            adserver_clicks: row.adserver_clicks,
        })
    }
}

impl From<LinkRow> for Link {
    fn from(row: LinkRow) -> Self {
        Link {
            id: LinkId(row.id),
            external_campaign_id: row.external_campaign_id,
            last_daily_report: row.last_daily_report,
            last_daily_report_run: row.last_daily_report_run,
        }
    }
}

/// Split a target into its `(kind, name, subreddits)` column values.
fn target_columns(target: &Target) -> (&'static str, String, Vec<String>) {
    match target {
        Target::Frontpage => ("frontpage", String::new(), Vec::new()),
        Target::Subreddit(name) => ("subreddit", name.clone(), Vec::new()),
        Target::Collection(name) => ("collection", name.clone(), Vec::new()),
        Target::MultiSubreddit(names) => ("multi_subreddit", target.target_name(), names.clone()),
    }
}

fn into_campaigns(rows: Vec<CampaignRow>) -> Result<Vec<Campaign>, DbError> {
    rows.into_iter().map(Campaign::try_from).collect()
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// Fetches the campaigns with the given ids, ordered by id. Missing ids are
/// silently absent from the result.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails, or [`DbError::InvalidRow`]
/// if a row carries an unknown target kind.
pub async fn get_campaigns_by_ids(pool: &PgPool, ids: &[i64]) -> Result<Vec<Campaign>, DbError> {
    let rows = sqlx::query_as::<_, CampaignRow>(&format!(
        "SELECT {CAMPAIGN_COLUMNS} FROM promo_campaigns WHERE id = ANY($1) ORDER BY id"
    ))
    .bind(ids)
    .fetch_all(pool)
    .await?;

    into_campaigns(rows)
}

/// Fetches the links with the given ids, ordered by id. Missing ids are
/// silently absent from the result.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_links_by_ids(pool: &PgPool, ids: &[i64]) -> Result<Vec<Link>, DbError> {
    let rows = sqlx::query_as::<_, LinkRow>(&format!(
        "SELECT {LINK_COLUMNS} FROM promo_links WHERE id = ANY($1) ORDER BY id"
    ))
    .bind(ids)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Link::from).collect())
}

/// Fetches every campaign belonging to any of the given links.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails, or [`DbError::InvalidRow`]
/// if a row carries an unknown target kind.
pub async fn list_campaigns_for_links(
    pool: &PgPool,
    link_ids: &[i64],
) -> Result<Vec<Campaign>, DbError> {
    let rows = sqlx::query_as::<_, CampaignRow>(&format!(
        "SELECT {CAMPAIGN_COLUMNS} FROM promo_campaigns WHERE link_id = ANY($1) ORDER BY id"
    ))
    .bind(link_ids)
    .fetch_all(pool)
    .await?;

    into_campaigns(rows)
}

/// Returns every `(campaign, link)` pair scheduled to serve on `day` (UTC).
///
/// A campaign serves on `day` when it is not cancelled and
/// `start_date <= day < end_date` compared as UTC calendar dates.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if a query fails, [`DbError::InvalidRow`] if a
/// campaign row is malformed, or [`DbError::NotFound`] if a campaign points
/// at a link that does not exist.
pub async fn list_served_promos(
    pool: &PgPool,
    day: NaiveDate,
) -> Result<Vec<(Campaign, Link)>, DbError> {
    let rows = sqlx::query_as::<_, CampaignRow>(&format!(
        "SELECT {CAMPAIGN_COLUMNS} FROM promo_campaigns \
         WHERE NOT cancelled \
           AND (start_date AT TIME ZONE 'UTC')::date <= $1 \
           AND $1 < (end_date AT TIME ZONE 'UTC')::date \
         ORDER BY id"
    ))
    .bind(day)
    .fetch_all(pool)
    .await?;
    let campaigns = into_campaigns(rows)?;

    let mut link_ids: Vec<i64> = campaigns.iter().map(|c| c.link_id.0).collect();
    link_ids.sort_unstable();
    link_ids.dedup();
    let links = get_links_by_ids(pool, &link_ids).await?;

    campaigns
        .into_iter()
        .map(|campaign| {
            let link = links
                .iter()
                .find(|l| l.id == campaign.link_id)
                .cloned()
                .ok_or(DbError::NotFound)?;
            Ok((campaign, link))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Inserts or replaces a link row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_link(pool: &PgPool, link: &Link) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO promo_links \
             (id, external_campaign_id, last_daily_report, last_daily_report_run) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (id) DO UPDATE SET \
             external_campaign_id = EXCLUDED.external_campaign_id, \
             last_daily_report = EXCLUDED.last_daily_report, \
             last_daily_report_run = EXCLUDED.last_daily_report_run, \
             updated_at = NOW()",
    )
    .bind(link.id.0)
    .bind(link.external_campaign_id)
    .bind(link.last_daily_report.as_deref())
    .bind(link.last_daily_report_run)
    .execute(pool)
    .await?;

    Ok(())
}

/// Inserts or replaces a campaign row. The owning link must already exist.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_campaign(pool: &PgPool, campaign: &Campaign) -> Result<(), DbError> {
    let (target_kind, target_name, target_subreddits) = target_columns(&campaign.target);

    sqlx::query(
        "INSERT INTO promo_campaigns \
             (id, link_id, start_date, end_date, external_flight_id, \
              target_kind, target_name, target_subreddits, cancelled, \
              last_lifetime_report, last_lifetime_report_run, \
              adserver_spent_pennies, adserver_impressions, adserver_clicks) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
         ON CONFLICT (id) DO UPDATE SET \
             link_id = EXCLUDED.link_id, \
             start_date = EXCLUDED.start_date, \
             end_date = EXCLUDED.end_date, \
             external_flight_id = EXCLUDED.external_flight_id, \
             target_kind = EXCLUDED.target_kind, \
             target_name = EXCLUDED.target_name, \
             target_subreddits = EXCLUDED.target_subreddits, \
             cancelled = EXCLUDED.cancelled, \
             last_lifetime_report = EXCLUDED.last_lifetime_report, \
             last_lifetime_report_run = EXCLUDED.last_lifetime_report_run, \
             adserver_spent_pennies = EXCLUDED.adserver_spent_pennies, \
             adserver_impressions = EXCLUDED.adserver_impressions, \
             adserver_clicks = EXCLUDED.adserver_clicks, \
             updated_at = NOW()",
    )
    .bind(campaign.id.0)
    .bind(campaign.link_id.0)
    .bind(campaign.start_date)
    .bind(campaign.end_date)
    .bind(campaign.external_flight_id)
    .bind(target_kind)
    .bind(target_name)
    .bind(target_subreddits)
    .bind(campaign.cancelled)
    .bind(campaign.last_lifetime_report.as_deref())
    .bind(campaign.last_lifetime_report_run)
    .bind(campaign.adserver_spent_pennies)
    .bind(campaign.adserver_impressions)
    .bind(campaign.adserver_clicks)
    .execute(pool)
    .await?;

    Ok(())
}

/// Writes a campaign's lifetime usage snapshot and report bookkeeping.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the campaign does not exist, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn update_campaign_lifetime_report(
    pool: &PgPool,
    campaign: &Campaign,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE promo_campaigns SET \
             adserver_spent_pennies = $2, \
             adserver_impressions = $3, \
             adserver_clicks = $4, \
             last_lifetime_report = $5, \
             last_lifetime_report_run = $6, \
             updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(campaign.id.0)
    .bind(campaign.adserver_spent_pennies)
    .bind(campaign.adserver_impressions)
    .bind(campaign.adserver_clicks)
    .bind(campaign.last_lifetime_report.as_deref())
    .bind(campaign.last_lifetime_report_run)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}

/// Writes a link's daily report bookkeeping.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the link does not exist, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn update_link_daily_report(pool: &PgPool, link: &Link) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE promo_links SET \
             last_daily_report = $2, \
             last_daily_report_run = $3, \
             updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(link.id.0)
    .bind(link.last_daily_report.as_deref())
    .bind(link.last_daily_report_run)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}
