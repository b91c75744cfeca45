//! Per-key exponential backoff for failed reconciliations.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use kubemon_core::ObjectKey;

/// Backoff bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackoffConfig {
    pub base: Duration,
    pub max: Duration,
}

impl BackoffConfig {
    pub const DEFAULT_BASE: Duration = Duration::from_millis(500);
    pub const DEFAULT_MAX: Duration = Duration::from_secs(300);
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base: Self::DEFAULT_BASE,
            max: Self::DEFAULT_MAX,
        }
    }
}

/// Tracks consecutive failures per key: `delay = base * 2^failures`, capped.
pub(crate) struct Backoff {
    config: BackoffConfig,
    failures: Mutex<HashMap<ObjectKey, u32>>,
}

impl Backoff {
    pub(crate) fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Record a failure and return how long to wait before retrying.
    pub(crate) fn next_delay(&self, key: &ObjectKey) -> Duration {
        let attempt = match self.failures.lock() {
            Ok(mut failures) => {
                let count = failures.entry(key.clone()).or_insert(0);
                let attempt = *count;
                *count = count.saturating_add(1);
                attempt
            }
            Err(_) => 0,
        };
        let factor = 2u32.saturating_pow(attempt.min(31));
        self.config
            .base
            .saturating_mul(factor)
            .min(self.config.max)
    }

    pub(crate) fn forget(&self, key: &ObjectKey) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.remove(key);
        }
    }
}
