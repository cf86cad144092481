//! Test support utilities for scenario tests.

use probekit_smoke::ScenarioReport;

pub use probekit_test_utils::{fast_config, init_tracing};

/// Assert a scenario passed, printing its failure reason otherwise.
#[track_caller]
pub fn assert_passed(report: &ScenarioReport) {
    assert!(
        report.passed,
        "Scenario {} failed: {}",
        report.scenario,
        report.failure.as_deref().unwrap_or("no reason recorded")
    );
}
