//! Bridge integration tests
//!
//! Values passed to `signalTestFinished` must arrive intact, and other bound
//! functions must answer script synchronously.

use probekit_harness::{Surface, Value};
use probekit_net::{Resource, ResourceRouter};

use crate::support::{assert_captured, TestRun};

fn page() -> ResourceRouter {
    ResourceRouter::new().route("/", Resource::html("<html></html>"))
}

#[test]
fn test_nested_value_round_trips() {
    let expected = Value::object([
        ("ok", Value::from(true)),
        ("status", Value::from(200)),
        ("ratio", Value::from(0.5)),
        ("missing", Value::Null),
        (
            "items",
            Value::array([Value::from("a"), Value::object([("deep", Value::array([1, 2]))])]),
        ),
    ]);

    let run = TestRun::new(page());
    let sent = expected.clone();
    run.script("/", move |cx| cx.call("signalTestFinished", &[sent.clone()]).map(|_| ()));

    let (result, _) = run.run();
    assert_captured(&result, &expected);
    assert_eq!(
        result.captured().unwrap().to_canonical_json(),
        expected.to_canonical_json()
    );
}

#[test]
fn test_no_argument_captures_null() {
    let run = TestRun::new(page());
    run.script("/", |cx| cx.call("signalTestFinished", &[]).map(|_| ()));

    assert_eq!(run.harness.captured(), None);
    let (result, _) = run.run();
    assert_captured(&result, &Value::Null);
    assert_eq!(run.harness.captured(), Some(Value::Null));
}

#[test]
fn test_bound_function_answers_script() {
    let run = TestRun::new(page());
    run.surface().bind("add", |args| {
        Value::from(args.iter().filter_map(Value::as_f64).sum::<f64>())
    });
    run.script("/", |cx| {
        let sum = cx.call("add", &[Value::from(2), Value::from(3)])?;
        cx.call("signalTestFinished", &[sum]).map(|_| ())
    });

    let (result, _) = run.run();
    assert_captured(&result, &Value::from(5));
    assert!(run.surface().bindings().contains("signalTestFinished"));
}

#[test]
fn test_console_lines_are_kept_in_order() {
    let run = TestRun::new(page());
    run.script("/", |cx| {
        cx.log("first");
        let answer = cx.call("signalTestFinished", &[Value::from("done")])?;
        cx.log(format!("completion returned {}", answer.to_json()));
        Ok(())
    });

    let (result, _) = run.run();
    assert_captured(&result, &Value::from("done"));
    assert_eq!(run.surface().console(), vec!["first", "completion returned null"]);
}
