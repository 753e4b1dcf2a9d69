//! Scheduler configuration
//!
//! Settings resolve in this order (highest priority first):
//!
//! 1. **Programmatic**: builder methods (`with_io_workers(4)`)
//! 2. **Environment**: `TETHER_*` variables, see [`SchedulerConfig::apply_env`]
//! 3. **Config file**: TOML, see [`SchedulerConfig::from_toml_str`]
//! 4. **Defaults**: [`SchedulerConfig::default()`]
//!
//! | Variable | Type | Maps to |
//! |----------|------|---------|
//! | `TETHER_IO_WORKERS` | `usize` | `io_workers` |
//! | `TETHER_THREAD_NAME_PREFIX` | `String` | `thread_name_prefix` |
//! | `TETHER_SHUTDOWN_TIMEOUT_MS` | `u64` | `shutdown_timeout_ms` |

use crate::error::SchedulerError;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Environment variable name for the worker pool size.
pub const ENV_IO_WORKERS: &str = "TETHER_IO_WORKERS";
/// Environment variable name for the worker thread name prefix.
pub const ENV_THREAD_NAME_PREFIX: &str = "TETHER_THREAD_NAME_PREFIX";
/// Environment variable name for the pool shutdown timeout.
pub const ENV_SHUTDOWN_TIMEOUT_MS: &str = "TETHER_SHUTDOWN_TIMEOUT_MS";

/// Configuration for a [`Scheduler`](crate::Scheduler)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Worker pool size (0 = number of CPU cores)
    pub io_workers: usize,

    /// Prefix for worker thread names (`<prefix>-<n>`)
    pub thread_name_prefix: String,

    /// How long `Drop` waits for each worker thread before detaching it
    pub shutdown_timeout_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            io_workers: 0,
            thread_name_prefix: "tether-io".to_string(),
            shutdown_timeout_ms: 2000,
        }
    }
}

impl SchedulerConfig {
    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, SchedulerError> {
        toml::from_str(source).map_err(|e| SchedulerError::Config(e.to_string()))
    }

    /// Read and parse a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SchedulerError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| SchedulerError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&source)
    }

    /// Apply `TETHER_*` overrides from the process environment.
    pub fn apply_env(self) -> Result<Self, SchedulerError> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// Only variables that are present are applied; a present but
    /// unparseable value is an error.
    pub fn apply_vars<F>(mut self, lookup: F) -> Result<Self, SchedulerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_IO_WORKERS) {
            self.io_workers = parse_var(ENV_IO_WORKERS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_THREAD_NAME_PREFIX) {
            if raw.trim().is_empty() {
                return Err(SchedulerError::Config(format!(
                    "{} must not be empty",
                    ENV_THREAD_NAME_PREFIX
                )));
            }
            self.thread_name_prefix = raw;
        }
        if let Some(raw) = lookup(ENV_SHUTDOWN_TIMEOUT_MS) {
            self.shutdown_timeout_ms = parse_var(ENV_SHUTDOWN_TIMEOUT_MS, &raw)?;
        }
        Ok(self)
    }

    /// Set the worker pool size (0 = number of CPU cores).
    pub fn with_io_workers(mut self, count: usize) -> Self {
        self.io_workers = count;
        self
    }

    /// Set the worker thread name prefix.
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Set the shutdown timeout.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Worker count with the CPU-count default applied.
    pub fn resolved_io_workers(&self) -> usize {
        if self.io_workers == 0 {
            num_cpus::get()
        } else {
            self.io_workers
        }
    }

    /// Shutdown timeout as a `Duration`.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, SchedulerError> {
    raw.trim()
        .parse()
        .map_err(|_| SchedulerError::Config(format!("{}: cannot parse {:?}", name, raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.io_workers, 0);
        assert_eq!(config.resolved_io_workers(), num_cpus::get());
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn test_toml_partial() {
        let config = SchedulerConfig::from_toml_str("io_workers = 3\n").unwrap();
        assert_eq!(config.io_workers, 3);
        assert_eq!(config.thread_name_prefix, "tether-io");
    }

    #[test]
    fn test_toml_unknown_key_rejected() {
        let err = SchedulerConfig::from_toml_str("workers = 3\n").unwrap_err();
        assert!(matches!(err, SchedulerError::Config(_)));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tether.toml");
        std::fs::write(&path, "thread_name_prefix = \"blk\"\nshutdown_timeout_ms = 50\n").unwrap();

        let config = SchedulerConfig::from_file(&path).unwrap();
        assert_eq!(config.thread_name_prefix, "blk");
        assert_eq!(config.shutdown_timeout(), Duration::from_millis(50));
    }

    #[test]
    fn test_env_overrides_file() {
        let config = SchedulerConfig::from_toml_str("io_workers = 3\n")
            .unwrap()
            .apply_vars(vars(&[(ENV_IO_WORKERS, "7")]))
            .unwrap();
        assert_eq!(config.io_workers, 7);
    }

    #[test]
    fn test_env_bad_value() {
        let err = SchedulerConfig::default()
            .apply_vars(vars(&[(ENV_SHUTDOWN_TIMEOUT_MS, "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_SHUTDOWN_TIMEOUT_MS));

        let err = SchedulerConfig::default()
            .apply_vars(vars(&[(ENV_THREAD_NAME_PREFIX, "  ")]))
            .unwrap_err();
        assert!(matches!(err, SchedulerError::Config(_)));
    }

    #[test]
    fn test_builder_wins() {
        let config = SchedulerConfig::default()
            .apply_vars(vars(&[(ENV_IO_WORKERS, "7")]))
            .unwrap()
            .with_io_workers(1);
        assert_eq!(config.resolved_io_workers(), 1);
    }
}
