//! Runtime configuration, resolved from CLI flags and environment
//! variables with sensible defaults.

use std::time::Duration;

pub const DEFAULT_TZKT_API_URL: &str = "https://api.tzkt.io";
pub const DEFAULT_DATABASE_PATH: &str = "delegations.db";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the TzKT API.
    pub tzkt_api_url: String,

    /// Path to the SQLite database file.
    pub database_path: String,

    /// Address the read-side API listens on.
    pub bind_addr: String,

    /// Delay between steady-state poll ticks.
    pub poll_interval: Duration,
}

impl Config {
    /// Resolve configuration from the environment. Flag values passed
    /// in by the binary take precedence; unset values fall back to
    /// `TZKT_API_URL`, `DATABASE_PATH`, `BIND_ADDR` and
    /// `POLL_INTERVAL_SECS`, then to the defaults.
    pub fn resolve(
        tzkt_api_url: Option<String>,
        database_path: Option<String>,
        bind_addr: Option<String>,
        poll_interval_secs: Option<u64>,
    ) -> Self {
        let tzkt_api_url = tzkt_api_url
            .or_else(|| std::env::var("TZKT_API_URL").ok())
            .unwrap_or_else(|| DEFAULT_TZKT_API_URL.to_string());
        let database_path = database_path
            .or_else(|| std::env::var("DATABASE_PATH").ok())
            .unwrap_or_else(|| DEFAULT_DATABASE_PATH.to_string());
        let bind_addr = bind_addr
            .or_else(|| std::env::var("BIND_ADDR").ok())
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let poll_interval_secs = poll_interval_secs
            .or_else(|| {
                std::env::var("POLL_INTERVAL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
            })
            .unwrap_or(DEFAULT_POLL_INTERVAL_SECS);

        Self {
            tzkt_api_url,
            database_path,
            bind_addr,
            poll_interval: Duration::from_secs(poll_interval_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_take_precedence() {
        let config = Config::resolve(
            Some("http://localhost:9000".to_string()),
            Some("/tmp/test.db".to_string()),
            Some("127.0.0.1:8080".to_string()),
            Some(5),
        );
        assert_eq!(config.tzkt_api_url, "http://localhost:9000");
        assert_eq!(config.database_path, "/tmp/test.db");
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.poll_interval, Duration::from_secs(5));
    }
}
