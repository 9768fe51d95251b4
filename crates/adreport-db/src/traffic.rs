//! Upserts into the `adserver_*_by_codename` traffic tables.
//!
//! Each entity-day produces three rows (clickthroughs, impressions, spent
//! pennies). Rows are merged by `(codename, date, interval)` so replaying a
//! report overwrites the previous values instead of duplicating them.

use chrono::NaiveDate;
use sqlx::{PgPool, Postgres, Transaction};

use crate::DbError;

/// Interval label for daily rows.
pub const TRAFFIC_INTERVAL_DAY: &str = "day";

const LINK_TABLES: [&str; 3] = [
    "adserver_clickthroughs_by_codename",
    "adserver_impressions_by_codename",
    "adserver_spent_pennies_by_codename",
];

const CAMPAIGN_TABLES: [&str; 3] = [
    "adserver_targeted_clickthroughs_by_codename",
    "adserver_targeted_impressions_by_codename",
    "adserver_targeted_spent_pennies_by_codename",
];

/// One day of usage for a promoted link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkTraffic {
    pub codename: String,
    pub date: NaiveDate,
    pub impressions: i64,
    pub clicks: i64,
    pub spent_pennies: i64,
}

/// One day of usage for a campaign, labelled with its target subreddit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignTraffic {
    pub codename: String,
    pub date: NaiveDate,
    pub subreddit: String,
    pub impressions: i64,
    pub clicks: i64,
    pub spent_pennies: i64,
}

/// Upserts daily link rows in a single transaction.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement fails; nothing is written in
/// that case.
pub async fn upsert_link_traffic(pool: &PgPool, rows: &[LinkTraffic]) -> Result<(), DbError> {
    if rows.is_empty() {
        return Ok(());
    }

    let mut tx = pool.begin().await?;
    for row in rows {
        let [clicks_table, impressions_table, spent_table] = LINK_TABLES;
        upsert_count(&mut tx, clicks_table, &row.codename, row.date, None, row.clicks).await?;
        upsert_count(&mut tx, impressions_table, &row.codename, row.date, None, row.impressions)
            .await?;
        upsert_count(&mut tx, spent_table, &row.codename, row.date, None, row.spent_pennies)
            .await?;
    }
    tx.commit().await?;

    Ok(())
}

/// Upserts daily campaign rows in a single transaction.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement fails; nothing is written in
/// that case.
pub async fn upsert_campaign_traffic(
    pool: &PgPool,
    rows: &[CampaignTraffic],
) -> Result<(), DbError> {
    if rows.is_empty() {
        return Ok(());
    }

    let mut tx = pool.begin().await?;
    for row in rows {
        let [clicks_table, impressions_table, spent_table] = CAMPAIGN_TABLES;
        let subreddit = Some(row.subreddit.as_str());
        upsert_count(&mut tx, clicks_table, &row.codename, row.date, subreddit, row.clicks).await?;
        upsert_count(
            &mut tx,
            impressions_table,
            &row.codename,
            row.date,
            subreddit,
            row.impressions,
        )
        .await?;
        upsert_count(
            &mut tx,
            spent_table,
            &row.codename,
            row.date,
            subreddit,
            row.spent_pennies,
        )
        .await?;
    }
    tx.commit().await?;

    Ok(())
}

/// Merge one counter row. `subreddit` is `Some` only for the targeted tables.
async fn upsert_count(
    tx: &mut Transaction<'_, Postgres>,
    table: &str,
    codename: &str,
    date: NaiveDate,
    subreddit: Option<&str>,
    count: i64,
) -> Result<(), DbError> {
    // Table names come from the fixed lists above, never from input.
    let sql = match subreddit {
        Some(_) => format!(
            "INSERT INTO {table} \
                 (codename, date, interval, subreddit, unique_count, pageview_count) \
             VALUES ($1, $2, $3, $4, $5, $5) \
             ON CONFLICT (codename, date, interval) DO UPDATE SET \
                 subreddit = EXCLUDED.subreddit, \
                 unique_count = EXCLUDED.unique_count, \
                 pageview_count = EXCLUDED.pageview_count"
        ),
        None => format!(
            "INSERT INTO {table} \
                 (codename, date, interval, unique_count, pageview_count) \
             VALUES ($1, $2, $3, $4, $4) \
             ON CONFLICT (codename, date, interval) DO UPDATE SET \
                 unique_count = EXCLUDED.unique_count, \
                 pageview_count = EXCLUDED.pageview_count"
        ),
    };

    let mut query = sqlx::query(&sql)
        .bind(codename)
        .bind(date)
        .bind(TRAFFIC_INTERVAL_DAY);
    if let Some(subreddit) = subreddit {
        query = query.bind(subreddit);
    }
    query.bind(count).execute(&mut **tx).await?;

    Ok(())
}
