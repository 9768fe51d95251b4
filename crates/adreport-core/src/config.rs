use thiserror::Error;

use crate::app_config::{AppConfig, Environment};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// The parsing/validation logic is decoupled from the process environment so
/// it can be tested with a plain `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        or_default(var, default)
            .parse::<SocketAddr>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    // Group sizes partition entities into tasks; zero would never terminate.
    let parse_group_size = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let size = or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))?;
        if size == 0 {
            return Err(invalid(var, "group size must be at least 1".to_string()));
        }
        Ok(size)
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("ADREPORT_ENV", "development"))?;

    let bind_addr = parse_addr("ADREPORT_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("ADREPORT_LOG_LEVEL", "info");

    let db_max_connections = parse_u32("ADREPORT_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("ADREPORT_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("ADREPORT_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    // Outside production the key is optional and the consumer stays off.
    let adzerk_api_key = lookup("ADZERK_API_KEY").ok().filter(|k| !k.is_empty());
    if env == Environment::Production && adzerk_api_key.is_none() {
        return Err(ConfigError::MissingEnvVar("ADZERK_API_KEY".to_string()));
    }
    let adzerk_api_base_url = or_default("ADZERK_API_BASE_URL", "https://api.adzerk.net/");
    let adzerk_request_timeout_secs = parse_u64("ADZERK_REQUEST_TIMEOUT_SECS", "30")?;

    let reporting_link_group_size = parse_group_size("ADZERK_REPORTING_LINK_GROUP_SIZE", "50")?;
    let reporting_campaign_group_size =
        parse_group_size("ADZERK_REPORTING_CAMPAIGN_GROUP_SIZE", "100")?;
    let reporting_timeout_secs = parse_u64("ADZERK_REPORTING_TIMEOUT", "500")?;

    let queue_idle_poll_secs = parse_u64("ADREPORT_QUEUE_IDLE_POLL_SECS", "5")?;
    let queue_visibility_timeout_secs =
        parse_u64("ADREPORT_QUEUE_VISIBILITY_TIMEOUT_SECS", "3600")?;
    let dispatch_cron = or_default("ADREPORT_DISPATCH_CRON", "0 0 * * * *");

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        adzerk_api_key,
        adzerk_api_base_url,
        adzerk_request_timeout_secs,
        reporting_link_group_size,
        reporting_campaign_group_size,
        reporting_timeout_secs,
        queue_idle_poll_secs,
        queue_visibility_timeout_secs,
        dispatch_cron,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "ADREPORT_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
