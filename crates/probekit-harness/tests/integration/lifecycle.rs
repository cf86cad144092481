//! Run lifecycle integration tests
//!
//! - Navigation starts at `/` once the view is attached
//! - Every completion path closes the window exactly once
//! - A window closed from outside ends the run
//! - Another thread can finish a run through the loop proxy

use std::cell::Cell;
use std::rc::Rc;

use probekit_harness::headless::ScriptError;
use probekit_harness::{HarnessResult, HostWindow, Phase, Value};
use probekit_net::{from_fn, Resource, ResourceRouter};

use crate::support::{assert_captured, TestRun};

fn page() -> ResourceRouter {
    ResourceRouter::new().route("/", Resource::html("<!DOCTYPE html><html></html>"))
}

#[test]
fn test_root_request_signals_close() {
    let served = Rc::new(Cell::new(0));
    let count = served.clone();
    let run = TestRun::build(crate::support::fast_config(), move |signaller| {
        from_fn(move |path| {
            count.set(count.get() + 1);
            if path == "/" {
                signaller.signal_close();
            }
            Some(Resource::html("<html></html>"))
        })
    });

    let (result, _) = run.run();
    assert_eq!(result, HarnessResult::Completed(None));
    assert_eq!(served.get(), 1);
    assert_eq!(run.surface().requested_paths(), vec!["/"]);
    assert_eq!(run.window.close_requests(), 1);
    assert!(run.window.is_closed());
}

#[test]
fn test_repeated_completion_closes_once() {
    let run = TestRun::new(page());
    run.script("/", |cx| {
        cx.call("signalTestFinished", &[Value::from("first")])?;
        cx.call("signalTestFinished", &[Value::from("second")])?;
        cx.call("signalTestFinished", &[])?;
        Ok(())
    });

    let (result, _) = run.run();
    assert_captured(&result, &Value::from("first"));
    assert_eq!(run.harness.gui().phase(), Phase::Completed);
    assert_eq!(run.window.close_requests(), 1);
}

#[test]
fn test_window_closed_externally_ends_run() {
    let run = TestRun::new(page());
    let window = run.window.clone();
    run.script("/", move |_| {
        window.request_close();
        Ok(())
    });

    let (result, _) = run.run();
    assert!(result.did_not_time_out());
    assert_eq!(result.captured(), None);
    assert!(run.window.is_closed());
    assert_eq!(run.handle.timer_count(), 0);
}

#[test]
fn test_harness_runs_once() {
    let run = TestRun::new(page());
    run.script("/", |cx| cx.call("signalTestFinished", &[]).map(|_| ()));
    run.run();

    assert!(matches!(
        run.harness.run(),
        Err(probekit_harness::HarnessError::AlreadyRun)
    ));
}

#[test]
fn test_uncaught_script_error_is_recorded() {
    let config = crate::support::fast_config().with_timeout(std::time::Duration::from_millis(100));
    let run = TestRun::with_config(page(), config);
    run.script("/", |_| Err(ScriptError::Error("boom".into())));

    let (result, _) = run.run();
    assert_eq!(result, HarnessResult::TimedOut);
    assert_eq!(run.surface().uncaught_errors(), vec![ScriptError::Error("boom".into())]);
}

#[test]
fn test_background_thread_completes_run() {
    let run = TestRun::new(page());
    let remote = run.harness.gui().remote_signaller();
    let worker = std::thread::spawn(move || {
        std::thread::sleep(std::time::Duration::from_millis(20));
        remote
            .complete(Value::object([("from", Value::from("worker"))]))
            .expect("loop is alive while the run is pending");
    });

    let (result, elapsed) = run.run();
    worker.join().unwrap();

    assert_captured(&result, &Value::object([("from", Value::from("worker"))]));
    assert!(elapsed < std::time::Duration::from_secs(5));
    assert_eq!(run.window.close_requests(), 1);
}
