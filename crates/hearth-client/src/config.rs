//! Client configuration loaded from environment variables.
//!
//! All settings have defaults pointing at a local development backend, so
//! the client starts with zero configuration.

use std::path::PathBuf;
use std::time::Duration;

use hearth_net::{ConnectionConfig, DeliveryPolicy};
use hearth_shared::constants::{
    DEFAULT_API_URL, DEFAULT_CONFIRM_TIMEOUT_SECS, DEFAULT_FEED_PAGE_SIZE, DEFAULT_HISTORY_LIMIT,
    DEFAULT_RECONNECT_ATTEMPTS, DEFAULT_SOCKET_URL,
};

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// REST base URL.
    /// Env: `HEARTH_API_URL`
    /// Default: `http://localhost:5000/api`
    pub api_url: String,

    /// Realtime channel URL.
    /// Env: `HEARTH_SOCKET_URL`
    /// Default: `ws://localhost:5000/ws`
    pub socket_url: String,

    /// What happens to sends issued while the realtime channel is down.
    /// Env: `HEARTH_DELIVERY` (`at-least-once` / `at-most-once`)
    /// Default: `at-least-once`
    pub delivery: DeliveryPolicy,

    /// Messages requested per history backfill.
    /// Env: `HEARTH_HISTORY_LIMIT`
    pub history_limit: u32,

    /// Posts requested per feed page.
    /// Env: `HEARTH_FEED_PAGE_SIZE`
    pub feed_page_size: u32,

    /// How long a sent message may stay pending before it is marked failed.
    /// Env: `HEARTH_CONFIRM_TIMEOUT_SECS`
    pub confirm_timeout: Duration,

    /// Reconnect attempts before the realtime channel reports `Failed`.
    /// Env: `HEARTH_RECONNECT_ATTEMPTS`
    pub reconnect_attempts: u32,

    /// Session database location. `None` uses the platform data directory.
    /// Env: `HEARTH_DB_PATH`
    pub db_path: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            socket_url: DEFAULT_SOCKET_URL.to_string(),
            delivery: DeliveryPolicy::AtLeastOnce,
            history_limit: DEFAULT_HISTORY_LIMIT,
            feed_page_size: DEFAULT_FEED_PAGE_SIZE,
            confirm_timeout: Duration::from_secs(DEFAULT_CONFIRM_TIMEOUT_SECS),
            reconnect_attempts: DEFAULT_RECONNECT_ATTEMPTS,
            db_path: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ClientConfig::from_env`] with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("HEARTH_API_URL") {
            config.api_url = url.trim_end_matches('/').to_string();
        }

        if let Some(url) = lookup("HEARTH_SOCKET_URL") {
            config.socket_url = url;
        }

        if let Some(val) = lookup("HEARTH_DELIVERY") {
            match val.parse::<DeliveryPolicy>() {
                Ok(policy) => config.delivery = policy,
                Err(e) => {
                    tracing::warn!(value = %val, error = %e, "Invalid HEARTH_DELIVERY, using default");
                }
            }
        }

        if let Some(n) = parse_positive(&lookup, "HEARTH_HISTORY_LIMIT") {
            config.history_limit = n;
        }

        if let Some(n) = parse_positive(&lookup, "HEARTH_FEED_PAGE_SIZE") {
            config.feed_page_size = n;
        }

        if let Some(secs) = parse_positive(&lookup, "HEARTH_CONFIRM_TIMEOUT_SECS") {
            config.confirm_timeout = Duration::from_secs(u64::from(secs));
        }

        if let Some(n) = parse_positive(&lookup, "HEARTH_RECONNECT_ATTEMPTS") {
            config.reconnect_attempts = n;
        }

        if let Some(path) = lookup("HEARTH_DB_PATH").filter(|p| !p.is_empty()) {
            config.db_path = Some(PathBuf::from(path));
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter.

        config
    }

    /// Realtime channel settings derived from this configuration.
    pub fn connection_config(&self) -> ConnectionConfig {
        let mut conn = ConnectionConfig::new(self.socket_url.clone());
        conn.delivery = self.delivery;
        conn.max_attempts = self.reconnect_attempts;
        conn
    }
}

fn parse_positive<F>(lookup: &F, key: &str) -> Option<u32>
where
    F: Fn(&str) -> Option<String>,
{
    let val = lookup(key)?;
    match val.trim().parse::<u32>() {
        Ok(n) if n > 0 => Some(n),
        _ => {
            tracing::warn!(key, value = %val, "Invalid value, using default");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ClientConfig::from_lookup(lookup(&[]));
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.delivery, DeliveryPolicy::AtLeastOnce);
        assert_eq!(config.history_limit, 50);
        assert_eq!(config.feed_page_size, 10);
        assert_eq!(config.confirm_timeout, Duration::from_secs(15));
        assert!(config.db_path.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("HEARTH_API_URL", "https://api.example.org/api/"),
            ("HEARTH_DELIVERY", "at-most-once"),
            ("HEARTH_FEED_PAGE_SIZE", "25"),
            ("HEARTH_RECONNECT_ATTEMPTS", "3"),
            ("HEARTH_DB_PATH", "/tmp/h.db"),
        ]));
        assert_eq!(config.api_url, "https://api.example.org/api");
        assert_eq!(config.delivery, DeliveryPolicy::AtMostOnce);
        assert_eq!(config.feed_page_size, 25);
        assert_eq!(config.db_path, Some(PathBuf::from("/tmp/h.db")));

        let conn = config.connection_config();
        assert_eq!(conn.max_attempts, 3);
        assert_eq!(conn.delivery, DeliveryPolicy::AtMostOnce);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("HEARTH_DELIVERY", "whenever"),
            ("HEARTH_HISTORY_LIMIT", "0"),
            ("HEARTH_CONFIRM_TIMEOUT_SECS", "soon"),
        ]));
        assert_eq!(config.delivery, DeliveryPolicy::AtLeastOnce);
        assert_eq!(config.history_limit, DEFAULT_HISTORY_LIMIT);
        assert_eq!(config.confirm_timeout, Duration::from_secs(DEFAULT_CONFIRM_TIMEOUT_SECS));
    }
}
