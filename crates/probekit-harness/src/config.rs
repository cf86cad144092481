//! Harness configuration.

use std::time::Duration;

use probekit_net::FailurePolicy;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::HarnessError;

/// Environment variable overriding [`HarnessConfig::timeout_ms`].
pub const TIMEOUT_ENV: &str = "PROBEKIT_TIMEOUT_MS";
/// Environment variable overriding [`HarnessConfig::watchdog_interval_ms`].
pub const INTERVAL_ENV: &str = "PROBEKIT_WATCHDOG_INTERVAL_MS";

/// Settings for one harness run.
///
/// Missing JSON fields take their defaults, so `{}` is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Watchdog deadline measured from the start of the run.
    pub timeout_ms: u64,
    /// How often the watchdog checks the deadline.
    pub watchdog_interval_ms: u64,
    /// What script sees when a resource handler fails.
    pub failure_policy: FailurePolicy,
    /// Enable renderer developer tooling.
    pub debug: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            watchdog_interval_ms: 1_000,
            failure_policy: FailurePolicy::NetworkError,
            debug: false,
        }
    }
}

impl HarnessConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = millis_ceil(timeout);
        self
    }

    pub fn with_watchdog_interval(mut self, interval: Duration) -> Self {
        self.watchdog_interval_ms = millis_ceil(interval);
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_millis(self.watchdog_interval_ms)
    }

    /// Parse and validate a JSON config. The top level must be an object.
    pub fn from_json(text: &str) -> Result<Self, HarnessError> {
        let raw: serde_json::Value = serde_json::from_str(text)?;
        if !raw.is_object() {
            return Err(HarnessError::ConfigJson(serde::de::Error::custom(
                "harness config must be a JSON object",
            )));
        }
        let config: Self = serde_json::from_value(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `PROBEKIT_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, HarnessError> {
        self.apply_env(|key| std::env::var(key).ok())
    }

    /// Apply overrides read through `lookup`.
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self, HarnessError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(TIMEOUT_ENV) {
            self.timeout_ms = parse_millis(TIMEOUT_ENV, &raw)?;
            debug!(timeout_ms = self.timeout_ms, "Timeout overridden from environment");
        }
        if let Some(raw) = lookup(INTERVAL_ENV) {
            self.watchdog_interval_ms = parse_millis(INTERVAL_ENV, &raw)?;
            debug!(
                interval_ms = self.watchdog_interval_ms,
                "Watchdog interval overridden from environment"
            );
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), HarnessError> {
        if self.timeout_ms == 0 {
            return Err(HarnessError::Config("timeout_ms must be positive".into()));
        }
        if self.watchdog_interval_ms == 0 {
            return Err(HarnessError::Config(
                "watchdog_interval_ms must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Whole milliseconds, rounding a partial millisecond up.
fn millis_ceil(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos().div_ceil(1_000_000)).unwrap_or(u64::MAX)
}

fn parse_millis(key: &str, raw: &str) -> Result<u64, HarnessError> {
    raw.trim()
        .parse()
        .map_err(|_| HarnessError::Config(format!("{key}={raw:?} is not a millisecond count")))
}
