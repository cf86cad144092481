//! Custom assertions for harness tests.

use std::time::Duration;

use probekit_harness::{HarnessResult, Value};

/// Assert the run completed and captured a value equal to `expected`.
#[track_caller]
pub fn assert_captured(result: &HarnessResult, expected: &Value) {
    match result {
        HarnessResult::Completed(Some(actual)) => assert_eq!(
            actual,
            expected,
            "Captured value mismatch: expected {}, got {}",
            expected.to_canonical_json(),
            actual.to_canonical_json()
        ),
        other => panic!(
            "Expected a completed run capturing {}, got {:?}",
            expected.to_canonical_json(),
            other
        ),
    }
}

#[track_caller]
pub fn assert_timed_out(result: &HarnessResult) {
    assert_eq!(*result, HarnessResult::TimedOut, "Run should have timed out");
}

#[track_caller]
pub fn assert_elapsed_between(elapsed: Duration, min: Duration, max: Duration) {
    assert!(
        elapsed >= min && elapsed < max,
        "Elapsed {:?} outside [{:?}, {:?})",
        elapsed,
        min,
        max
    );
}
