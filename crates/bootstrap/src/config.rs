//! Operator configuration structures and loaders.
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use kubemon_runtime::{BackoffConfig, ManagerConfig};

/// Configuration required to bootstrap the operator.
#[derive(Clone, Debug, Default)]
pub struct OperatorConfig {
    pub manager: ManagerConfig,
    /// File-backed store root. In-memory store when unset.
    pub state_dir: Option<PathBuf>,
    /// RON manifest applied at start.
    pub manifest: Option<PathBuf>,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, Default)]
pub struct LoggingConfig {
    pub to_file: bool,
    /// Overrides the platform log directory.
    pub dir: Option<PathBuf>,
}

impl OperatorConfig {
    /// Construct configuration from process environment variables.
    ///
    /// Environment variables:
    /// - `KUBEMON_WORKERS` - Workers per controller (default: 2)
    /// - `KUBEMON_TURN_INTERVAL_SECS` - Delay between battle turns, at least 1 (default: 20)
    /// - `KUBEMON_STATE_DIR` - Persist objects under this directory (default: in-memory)
    /// - `KUBEMON_MANIFEST` - RON manifest to apply at start (optional)
    /// - `KUBEMON_LOG_TO_FILE` - Also write logs to a file (default: false)
    /// - `KUBEMON_LOG_DIR` - Log file directory, implies file logging (default: platform cache dir)
    /// - `KUBEMON_BACKOFF_BASE_MS` - First retry delay after a failure (default: 500)
    /// - `KUBEMON_BACKOFF_MAX_SECS` - Retry delay cap (default: 300)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(workers) = read::<usize>(&lookup, "KUBEMON_WORKERS") {
            config.manager.workers = workers.max(1);
        }

        if let Some(secs) = read::<u64>(&lookup, "KUBEMON_TURN_INTERVAL_SECS") {
            config.manager.turn_interval = Duration::from_secs(secs.max(1));
        }

        let mut backoff = BackoffConfig::default();
        if let Some(ms) = read::<u64>(&lookup, "KUBEMON_BACKOFF_BASE_MS") {
            backoff.base = Duration::from_millis(ms.max(1));
        }
        if let Some(secs) = read::<u64>(&lookup, "KUBEMON_BACKOFF_MAX_SECS") {
            backoff.max = Duration::from_secs(secs);
        }
        backoff.max = backoff.max.max(backoff.base);
        config.manager.backoff = backoff;

        config.state_dir = non_empty(&lookup, "KUBEMON_STATE_DIR").map(PathBuf::from);
        config.manifest = non_empty(&lookup, "KUBEMON_MANIFEST").map(PathBuf::from);

        config.logging.dir = non_empty(&lookup, "KUBEMON_LOG_DIR").map(PathBuf::from);
        config.logging.to_file = match read::<bool>(&lookup, "KUBEMON_LOG_TO_FILE") {
            Some(enable) => enable,
            // Accept a bare variable as "true".
            None => lookup("KUBEMON_LOG_TO_FILE").is_some() || config.logging.dir.is_some(),
        };

        config
    }
}

fn read<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T: std::str::FromStr,
{
    lookup(key)?.trim().parse().ok()
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key).filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> OperatorConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        OperatorConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_variables() {
        let config = config(&[]);
        assert_eq!(config.manager.workers, 2);
        assert_eq!(config.manager.turn_interval, Duration::from_secs(20));
        assert_eq!(config.manager.backoff, BackoffConfig::default());
        assert!(config.state_dir.is_none());
        assert!(config.manifest.is_none());
        assert!(!config.logging.to_file);
    }

    #[test]
    fn reads_all_variables() {
        let config = config(&[
            ("KUBEMON_WORKERS", "4"),
            ("KUBEMON_TURN_INTERVAL_SECS", "3"),
            ("KUBEMON_STATE_DIR", "/var/lib/kubemon"),
            ("KUBEMON_MANIFEST", "arena.ron"),
            ("KUBEMON_LOG_TO_FILE", "true"),
            ("KUBEMON_BACKOFF_BASE_MS", "100"),
            ("KUBEMON_BACKOFF_MAX_SECS", "10"),
        ]);
        assert_eq!(config.manager.workers, 4);
        assert_eq!(config.manager.turn_interval, Duration::from_secs(3));
        assert_eq!(config.state_dir, Some(PathBuf::from("/var/lib/kubemon")));
        assert_eq!(config.manifest, Some(PathBuf::from("arena.ron")));
        assert!(config.logging.to_file);
        assert_eq!(config.manager.backoff.base, Duration::from_millis(100));
        assert_eq!(config.manager.backoff.max, Duration::from_secs(10));
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let config = config(&[
            ("KUBEMON_WORKERS", "many"),
            ("KUBEMON_TURN_INTERVAL_SECS", "-1"),
            ("KUBEMON_STATE_DIR", "  "),
        ]);
        assert_eq!(config.manager.workers, 2);
        assert_eq!(config.manager.turn_interval, Duration::from_secs(20));
        assert!(config.state_dir.is_none());
    }

    #[test]
    fn zero_workers_is_clamped() {
        assert_eq!(config(&[("KUBEMON_WORKERS", "0")]).manager.workers, 1);
    }

    #[test]
    fn zero_turn_interval_is_clamped() {
        let config = config(&[("KUBEMON_TURN_INTERVAL_SECS", "0")]);
        assert_eq!(config.manager.turn_interval, Duration::from_secs(1));
    }

    #[test]
    fn log_dir_implies_file_logging() {
        let with_dir = config(&[("KUBEMON_LOG_DIR", "/tmp/logs")]);
        assert!(with_dir.logging.to_file);
        assert_eq!(with_dir.logging.dir, Some(PathBuf::from("/tmp/logs")));

        let bare = config(&[("KUBEMON_LOG_TO_FILE", "")]);
        assert!(bare.logging.to_file);
    }

    #[test]
    fn backoff_cap_never_below_base() {
        let config = config(&[
            ("KUBEMON_BACKOFF_BASE_MS", "5000"),
            ("KUBEMON_BACKOFF_MAX_SECS", "1"),
        ]);
        assert_eq!(config.manager.backoff.max, Duration::from_secs(5));
    }
}
