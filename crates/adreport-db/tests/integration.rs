//! Offline unit tests for adreport-db pool configuration and row types.
//! These tests do not require a live database connection.

use adreport_core::{AppConfig, Environment};
use adreport_db::{LinkTraffic, PoolConfig, QueueMessageRow, TRAFFIC_INTERVAL_DAY};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let app_config = AppConfig {
        database_url: "postgres://example".to_string(),
        env: Environment::Test,
        bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 3000),
        log_level: "info".to_string(),
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
        adzerk_api_key: None,
        adzerk_api_base_url: "https://api.adzerk.net/".to_string(),
        adzerk_request_timeout_secs: 30,
        reporting_link_group_size: 50,
        reporting_campaign_group_size: 100,
        reporting_timeout_secs: 500,
        queue_idle_poll_secs: 5,
        queue_visibility_timeout_secs: 3600,
        dispatch_cron: "0 0 * * * *".to_string(),
    };

    let pool_config = PoolConfig::from_app_config(&app_config);
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

/// Compile-time smoke test: confirm that [`QueueMessageRow`] has all expected
/// fields with the correct types. No database required.
#[test]
fn queue_message_row_has_expected_fields() {
    use chrono::Utc;
    use uuid::Uuid;

    let row = QueueMessageRow {
        id: 1_i64,
        public_id: Uuid::new_v4(),
        action: Some("generate_lifetime_campaign_reports".to_string()),
        body: "{}".to_string(),
        status: "queued".to_string(),
        attempts: 0_i32,
        last_error: None,
        enqueued_at: Utc::now(),
        claimed_at: None,
    };

    assert_eq!(row.id, 1);
    assert_eq!(row.status, "queued");
    assert_eq!(row.attempts, 0);
    assert!(row.claimed_at.is_none());
}

#[test]
fn traffic_rows_are_daily() {
    let row = LinkTraffic {
        codename: "t3_1".to_string(),
        date: chrono::NaiveDate::from_ymd_opt(2020, 1, 6).unwrap(),
        impressions: 10,
        clicks: 1,
        spent_pennies: 25,
    };

    assert_eq!(TRAFFIC_INTERVAL_DAY, "day");
    assert_eq!(row.codename, "t3_1");
}
