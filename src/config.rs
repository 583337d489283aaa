// Configuration module for authgraph
// Reads from environment variables with sensible defaults

use std::env;
use std::str::FromStr;
use std::sync::OnceLock;
use tracing::warn;

/// Global configuration instance
static CONFIG: OnceLock<Config> = OnceLock::new();

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Files larger than this are skipped by the scanner (AUTHGRAPH_MAX_FILE_BYTES)
    pub max_file_bytes: u64,

    /// Worker threads used for stateless analysis (AUTHGRAPH_WORKERS)
    pub workers: usize,

    /// Database read pool size (AUTHGRAPH_POOL_SIZE)
    pub pool_size: u32,

    /// Database read pool minimum idle connections (AUTHGRAPH_POOL_MIN_IDLE)
    pub pool_min_idle: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_file_bytes: 2 * 1024 * 1024,
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            pool_size: 4,
            pool_min_idle: 1,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Self {
        let mut config = Config::default();
        override_from_env("AUTHGRAPH_MAX_FILE_BYTES", &mut config.max_file_bytes);
        override_from_env("AUTHGRAPH_WORKERS", &mut config.workers);
        override_from_env("AUTHGRAPH_POOL_SIZE", &mut config.pool_size);
        override_from_env("AUTHGRAPH_POOL_MIN_IDLE", &mut config.pool_min_idle);
        config.workers = config.workers.max(1);
        config.pool_size = config.pool_size.max(1);
        config
    }

    /// Get the global configuration instance
    pub fn get() -> &'static Config {
        CONFIG.get_or_init(Config::from_env)
    }
}

fn override_from_env<T>(key: &str, slot: &mut T)
where
    T: FromStr + std::fmt::Display,
{
    let Ok(raw) = env::var(key) else {
        return;
    };
    match parse_setting(&raw) {
        Some(parsed) => *slot = parsed,
        None => warn!(
            key,
            value = %raw,
            default = %slot,
            "invalid configuration value, using default"
        ),
    }
}

fn parse_setting<T: FromStr>(raw: &str) -> Option<T> {
    raw.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.max_file_bytes, 2 * 1024 * 1024);
        assert!(config.workers >= 1);
        assert_eq!(config.pool_size, 4);
        assert_eq!(config.pool_min_idle, 1);
    }

    #[test]
    fn parses_settings_leniently() {
        assert_eq!(parse_setting::<u64>(" 1024 "), Some(1024));
        assert_eq!(parse_setting::<usize>("many"), None);
        assert_eq!(parse_setting::<u32>("-1"), None);
    }
}
