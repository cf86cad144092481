//! Per-scenario results as printed by the smoke driver.

use std::time::Duration;

use probekit_harness::{HarnessOutcome, HarnessResult};
use probekit_net::FailurePolicy;
use serde::Serialize;
use tracing::{info, warn};

use crate::Scenario;

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub scenario: &'static str,
    pub passed: bool,
    pub elapsed_ms: u64,
    #[serde(flatten)]
    pub outcome: HarnessOutcome,
    pub requested: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub console: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl ScenarioReport {
    /// Judge `result` against the scenario's expectation under `policy`.
    pub fn new(
        scenario: Scenario,
        policy: FailurePolicy,
        result: HarnessResult,
        requested: Vec<String>,
        elapsed: Duration,
    ) -> Self {
        let failure = scenario.verify(policy, &result, &requested).err();
        let elapsed_ms = elapsed.as_millis() as u64;
        match &failure {
            None => info!(scenario = scenario.name(), elapsed_ms, "Scenario passed"),
            Some(reason) => warn!(scenario = scenario.name(), elapsed_ms, %reason, "Scenario failed"),
        }

        Self {
            scenario: scenario.name(),
            passed: failure.is_none(),
            elapsed_ms,
            outcome: result.into_outcome(),
            requested,
            console: Vec::new(),
            failure,
        }
    }

    /// Attach the console lines the page logged.
    pub fn with_console(mut self, console: Vec<String>) -> Self {
        self.console = console;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use probekit_harness::Value;

    #[test]
    fn test_report_json_shape() {
        let report = ScenarioReport::new(
            Scenario::JavascriptModule,
            FailurePolicy::NetworkError,
            HarnessResult::Completed(Some(Value::object([("text", Value::from("module"))]))),
            vec!["/".into(), "/test.js".into()],
            Duration::from_millis(12),
        );
        assert!(report.passed);
        assert_eq!(
            serde_json::to_string(&report).unwrap(),
            r#"{"scenario":"javascript-module","passed":true,"elapsed_ms":12,"completed":true,"value":{"text":"module"},"requested":["/","/test.js"]}"#
        );
    }

    #[test]
    fn test_failed_report_carries_reason() {
        let report = ScenarioReport::new(
            Scenario::AbsentResource,
            FailurePolicy::NetworkError,
            HarnessResult::TimedOut,
            vec!["/".into()],
            Duration::from_secs(30),
        );
        assert!(!report.passed);
        assert!(!report.outcome.completed);
        assert_eq!(report.failure.as_deref(), Some("timed out"));
    }

    #[test]
    fn test_console_lines_are_reported() {
        let report = ScenarioReport::new(
            Scenario::ImageFetch,
            FailurePolicy::NetworkError,
            HarnessResult::Completed(Some(Value::object([("pixelValue", Value::from(255))]))),
            vec!["/".into(), "/red.bmp".into()],
            Duration::from_millis(3),
        )
        .with_console(vec!["decoded 1x1 image".into()]);

        let json: serde_json::Value = serde_json::to_value(&report).unwrap();
        assert_eq!(json["console"], serde_json::json!(["decoded 1x1 image"]));
    }
}
