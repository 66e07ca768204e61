use std::time::Duration;

use chrono_tz::Tz;

use crate::error::QueryError;
use crate::time_range::parse_timezone;

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: String,
    pub duckdb_memory_limit: String,
    /// IANA zone used when a caller does not name one.
    pub default_timezone: String,
    pub query_timeout_ms: u64,
    /// Upper bound on rows a single funnel/journey query may materialize.
    pub max_event_rows: usize,
    pub max_funnels_per_website: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
            duckdb_memory_limit: "1GB".to_string(),
            default_timezone: "UTC".to_string(),
            query_timeout_ms: 5000,
            max_event_rows: 1_000_000,
            max_funnels_per_website: 20,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let defaults = Self::default();
        let default_timezone = std::env::var("TIDEMARK_TIMEZONE")
            .unwrap_or_else(|_| defaults.default_timezone.clone());
        default_timezone
            .trim()
            .parse::<Tz>()
            .map_err(|_| format!("invalid TIDEMARK_TIMEZONE: {default_timezone}"))?;

        Ok(Self {
            data_dir: std::env::var("TIDEMARK_DATA_DIR").unwrap_or(defaults.data_dir),
            duckdb_memory_limit: std::env::var("TIDEMARK_DUCKDB_MEMORY")
                .unwrap_or(defaults.duckdb_memory_limit),
            default_timezone: default_timezone.trim().to_string(),
            query_timeout_ms: std::env::var("TIDEMARK_QUERY_TIMEOUT_MS")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .map_err(|e| format!("invalid query timeout: {e}"))?,
            max_event_rows: std::env::var("TIDEMARK_MAX_EVENT_ROWS")
                .unwrap_or_else(|_| "1000000".to_string())
                .parse()
                .unwrap_or(defaults.max_event_rows),
            max_funnels_per_website: std::env::var("TIDEMARK_MAX_FUNNELS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .unwrap_or(defaults.max_funnels_per_website),
        })
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    /// The zone windows resolve in when the caller passes none.
    pub fn timezone(&self) -> Result<Tz, QueryError> {
        parse_timezone(&self.default_timezone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_resolve_to_utc() {
        let config = Config::default();
        assert_eq!(config.timezone().expect("zone"), Tz::UTC);
        assert_eq!(config.query_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn unknown_default_zone_is_a_validation_error() {
        let config = Config {
            default_timezone: "Mars/Olympus".to_string(),
            ..Config::default()
        };
        assert!(config.timezone().expect_err("unknown zone").is_validation());
    }
}
