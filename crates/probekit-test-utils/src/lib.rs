//! Helpers shared by the integration suites of the harness and smoke crates.

use std::time::Duration;

use probekit_harness::HarnessConfig;

/// Install a test-friendly subscriber once. Honors `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Deadline far above any headless run, short check interval.
pub fn fast_config() -> HarnessConfig {
    HarnessConfig::default()
        .with_timeout(Duration::from_secs(5))
        .with_watchdog_interval(Duration::from_millis(10))
}
