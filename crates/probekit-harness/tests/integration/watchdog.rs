//! Watchdog integration tests
//!
//! A run that never signals must end as timed out no earlier than its
//! deadline and within one check interval (plus scheduling slack) after it.

use std::time::Duration;

use probekit_harness::Phase;
use probekit_net::{Resource, ResourceRouter};

use crate::support::{assert_elapsed_between, assert_timed_out, fast_config, TestRun};

const SLACK: Duration = Duration::from_millis(500);

fn silent_page() -> ResourceRouter {
    ResourceRouter::new().route("/", Resource::html("<html><body>never finishes</body></html>"))
}

#[test]
fn test_timeout_lands_in_window() {
    let deadline = Duration::from_millis(150);
    let interval = Duration::from_millis(20);
    let config = fast_config()
        .with_timeout(deadline)
        .with_watchdog_interval(interval);
    let run = TestRun::with_config(silent_page(), config);

    let (result, elapsed) = run.run();
    assert_timed_out(&result);
    assert_elapsed_between(elapsed, deadline, deadline + interval + SLACK);
    assert!(run.harness.gui().timed_out());
    assert_eq!(run.window.close_requests(), 1);
    assert_eq!(run.handle.timer_count(), 0);
}

#[test]
fn test_interval_longer_than_deadline() {
    let config = fast_config()
        .with_timeout(Duration::from_millis(30))
        .with_watchdog_interval(Duration::from_millis(60));
    let run = TestRun::with_config(silent_page(), config);

    let (result, elapsed) = run.run();
    assert_timed_out(&result);
    assert_elapsed_between(
        elapsed,
        Duration::from_millis(60),
        Duration::from_millis(60) + SLACK,
    );
}

#[test]
fn test_completion_cancels_watchdog() {
    let run = TestRun::new(silent_page());
    run.script("/", |cx| cx.call("signalTestFinished", &[]).map(|_| ()));

    let (result, elapsed) = run.run();
    assert!(result.did_not_time_out());
    assert!(elapsed < fast_config().timeout());
    assert_eq!(run.harness.gui().phase(), Phase::Completed);
    assert_eq!(run.handle.timer_count(), 0);
}
