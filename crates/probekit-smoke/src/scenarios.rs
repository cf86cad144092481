//! The scenario catalogue.
//!
//! Every scenario carries a real HTML page (used by the native surface) and
//! an equivalent headless script registered for the same path, so both
//! surfaces are held to the same expectation.

use std::rc::Rc;

use clap::ValueEnum;
use probekit_harness::headless::{HeadlessSurface, ScriptContext, ScriptError};
use probekit_harness::{HarnessResult, Signaller, Value};
use probekit_net::{
    from_fallible_fn, from_fn, FailurePolicy, Resource, ResourceError, ResourceHandler,
    ResourceRouter,
};

const COMPLETION: &str = "signalTestFinished";

/// A 1x1 24-bit bitmap whose only pixel is pure red.
pub const RED_PIXEL_BMP: [u8; 58] = [
    66, 77, 58, 0, 0, 0, 0, 0, 0, 0, 54, 0, 0, 0, 40, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 1, 0, 24,
    0, 0, 0, 0, 0, 4, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 255, 0,
];

const RESPONSE_PAGE: &str = r#"<!DOCTYPE html>
<html>
  <head><title>successful response</title></head>
  <body>
    <script>
      (async () => {
        try {
          const response = await fetch("./test");
          const { ok, status, statusText } = response;
          const json = await response.json();
          signalTestFinished({ text: json.text, ok, status, statusText });
        } catch (e) {
          signalTestFinished({ errorMessage: e.message });
        }
      })();
    </script>
  </body>
</html>
"#;

const ABSENT_PAGE: &str = r#"<!DOCTYPE html>
<html>
  <head><title>absent resource</title></head>
  <body>
    <script>
      (async () => {
        try {
          const { ok, status, statusText } = await fetch("./test");
          signalTestFinished({ ok, status, statusText });
        } catch (e) {
          signalTestFinished({ errorMessage: e.message });
        }
      })();
    </script>
  </body>
</html>
"#;

const FAILURE_PAGE: &str = r#"<!DOCTYPE html>
<html>
  <head><title>handler failure</title></head>
  <body>
    <script>
      (async () => {
        try {
          const { status } = await fetch("./error.json");
          signalTestFinished({ status });
        } catch (e) {
          signalTestFinished({ exceptionType: e.name });
        }
      })();
    </script>
  </body>
</html>
"#;

const MODULE_PAGE: &str = r#"<!DOCTYPE html>
<html>
  <head><title>javascript module</title></head>
  <body>
    <script type="module">
      import { runTest } from "./test.js";
      await runTest();
    </script>
  </body>
</html>
"#;

const MODULE_SOURCE: &str = r#"export async function runTest() {
  signalTestFinished({ text: "module" });
}
"#;

const IMAGE_PAGE: &str = r#"<!DOCTYPE html>
<html>
  <head><title>image fetch</title></head>
  <body>
    <img id="red" src="./red.bmp">
    <script>
      const img = document.getElementById("red");
      const report = () => {
        const canvas = document.createElement("canvas");
        canvas.width = img.width;
        canvas.height = img.height;
        const context = canvas.getContext("2d");
        context.drawImage(img, 0, 0, img.width, img.height);
        console.log(`decoded ${img.width}x${img.height} image`);
        const pixels = context.getImageData(0, 0, img.width, img.height);
        signalTestFinished({ pixelValue: pixels.data[0] });
      };
      if (img.complete && img.naturalWidth > 0) report();
      else img.addEventListener("load", report);
    </script>
  </body>
</html>
"#;

/// One end-to-end check of the harness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Scenario {
    /// The first request a surface makes is for `/`.
    InitialNavigation,
    /// `fetch` of a registered path resolves with 200 OK and its body.
    SuccessfulResponse,
    /// `fetch` of an unregistered path resolves with 404 Not Found.
    AbsentResource,
    /// A failing resource handler surfaces according to the failure policy.
    HandlerFailure,
    /// A JavaScript module is fetched, type-checked and evaluated.
    JavascriptModule,
    /// An image is fetched and decoded to pixels.
    ImageFetch,
}

impl Scenario {
    pub const ALL: [Scenario; 6] = [
        Scenario::InitialNavigation,
        Scenario::SuccessfulResponse,
        Scenario::AbsentResource,
        Scenario::HandlerFailure,
        Scenario::JavascriptModule,
        Scenario::ImageFetch,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Scenario::InitialNavigation => "initial-navigation",
            Scenario::SuccessfulResponse => "successful-response",
            Scenario::AbsentResource => "absent-resource",
            Scenario::HandlerFailure => "handler-failure",
            Scenario::JavascriptModule => "javascript-module",
            Scenario::ImageFetch => "image-fetch",
        }
    }

    /// Resources served to the surface. `signaller` finishes the run from
    /// native code, for scenarios that need no page script.
    pub fn resources(self, signaller: Signaller) -> Rc<dyn ResourceHandler> {
        let page = |html: &str| ResourceRouter::new().route("/", Resource::html(html));
        match self {
            Scenario::InitialNavigation => Rc::new(from_fn(move |_path| {
                signaller.signal_close();
                None
            })),
            Scenario::SuccessfulResponse => Rc::new(
                page(RESPONSE_PAGE).route("/test", Resource::json(r#"{"text": "it worked!"}"#)),
            ),
            Scenario::AbsentResource => Rc::new(page(ABSENT_PAGE)),
            Scenario::HandlerFailure => {
                let router = page(FAILURE_PAGE);
                Rc::new(from_fallible_fn(move |path| match router.resolve(path) {
                    Some(resource) => Ok(Some(resource)),
                    None => Err(ResourceError::Handler(format!("no handler can serve {path}"))),
                }))
            }
            Scenario::JavascriptModule => Rc::new(
                page(MODULE_PAGE).route("/test.js", Resource::guessed("/test.js", MODULE_SOURCE)),
            ),
            Scenario::ImageFetch => Rc::new(
                page(IMAGE_PAGE).route("/red.bmp", Resource::guessed("/red.bmp", RED_PIXEL_BMP)),
            ),
        }
    }

    /// Register the headless equivalents of this scenario's page scripts.
    pub fn install_scripts(self, surface: &HeadlessSurface) {
        match self {
            Scenario::InitialNavigation => {}
            Scenario::SuccessfulResponse => surface.register_script("/", |cx| report_fetch(cx, true)),
            Scenario::AbsentResource => surface.register_script("/", |cx| report_fetch(cx, false)),
            Scenario::HandlerFailure => surface.register_script("/", |cx| {
                let value = match cx.fetch("./error.json") {
                    Ok(response) => Value::object([("status", Value::from(response.status))]),
                    Err(error) => Value::object([("exceptionType", Value::from(error.name()))]),
                };
                finish(cx, value)
            }),
            Scenario::JavascriptModule => {
                surface.register_script("/", |cx| cx.import_module("./test.js"));
                surface.register_script("/test.js", |cx| {
                    finish(cx, Value::object([("text", Value::from("module"))]))
                });
            }
            Scenario::ImageFetch => surface.register_script("/", |cx| {
                let image = cx.load_image("./red.bmp")?;
                cx.log(format!("decoded {}x{} image", image.width, image.height));
                let red = image.data.first().copied().unwrap_or(0);
                finish(cx, Value::object([("pixelValue", Value::from(red))]))
            }),
        }
    }

    /// The value page script should pass to the completion function, or
    /// `None` when the scenario completes from native code.
    pub fn expected(self, policy: FailurePolicy) -> Option<Value> {
        let value = match self {
            Scenario::InitialNavigation => return None,
            Scenario::SuccessfulResponse => Value::object([
                ("text", Value::from("it worked!")),
                ("ok", Value::from(true)),
                ("status", Value::from(200)),
                ("statusText", Value::from("OK")),
            ]),
            Scenario::AbsentResource => Value::object([
                ("ok", Value::from(false)),
                ("status", Value::from(404)),
                ("statusText", Value::from("Not Found")),
            ]),
            Scenario::HandlerFailure => match policy {
                FailurePolicy::NetworkError => {
                    Value::object([("exceptionType", Value::from("TypeError"))])
                }
                FailurePolicy::Status(code) => Value::object([("status", Value::from(code))]),
            },
            Scenario::JavascriptModule => Value::object([("text", Value::from("module"))]),
            Scenario::ImageFetch => Value::object([("pixelValue", Value::from(255))]),
        };
        Some(value)
    }

    /// Check a finished run. `requested` lists the paths the surface asked
    /// for, in order.
    pub fn verify(
        self,
        policy: FailurePolicy,
        result: &HarnessResult,
        requested: &[String],
    ) -> Result<(), String> {
        if !result.did_not_time_out() {
            return Err("timed out".into());
        }
        if requested.first().map(String::as_str) != Some("/") {
            return Err(format!("first request was {:?}, expected \"/\"", requested.first()));
        }

        match (self.expected(policy), result.captured()) {
            (None, _) => Ok(()),
            (Some(expected), Some(actual)) if *actual == expected => Ok(()),
            (Some(expected), actual) => Err(format!(
                "expected {}, captured {}",
                expected.to_canonical_json(),
                actual.map(Value::to_canonical_json).unwrap_or_else(|| "nothing".into())
            )),
        }
    }
}

fn finish(cx: &ScriptContext<'_>, value: Value) -> Result<(), ScriptError> {
    cx.call(COMPLETION, &[value]).map(|_| ())
}

fn report_fetch(cx: &ScriptContext<'_>, with_text: bool) -> Result<(), ScriptError> {
    let outcome = cx.fetch("./test").and_then(|response| {
        let mut entries = Vec::with_capacity(4);
        if with_text {
            let json = response.json()?;
            entries.push(("text", json.get("text").cloned().unwrap_or_default()));
        }
        entries.push(("ok", Value::from(response.ok)));
        entries.push(("status", Value::from(response.status)));
        entries.push(("statusText", Value::from(response.status_text)));
        Ok(Value::object(entries))
    });
    let value = outcome
        .unwrap_or_else(|error| Value::object([("errorMessage", Value::from(error.message()))]));
    finish(cx, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalogue_names_are_unique_and_parse() {
        let names: HashSet<_> = Scenario::ALL.iter().map(|s| s.name()).collect();
        assert_eq!(names.len(), 6);
        for scenario in Scenario::ALL {
            assert_eq!(Scenario::from_str(scenario.name(), false), Ok(scenario));
        }
    }

    #[test]
    fn test_expected_values() {
        let policy = FailurePolicy::NetworkError;
        assert_eq!(Scenario::InitialNavigation.expected(policy), None);
        assert_eq!(
            Scenario::SuccessfulResponse.expected(policy).unwrap().to_canonical_json(),
            r#"{"ok":true,"status":200,"statusText":"OK","text":"it worked!"}"#
        );
        assert_eq!(
            Scenario::HandlerFailure.expected(FailurePolicy::Status(500)),
            Some(Value::object([("status", Value::from(500))]))
        );
        assert_eq!(
            Scenario::ImageFetch.expected(policy).unwrap().get("pixelValue"),
            Some(&Value::from(255))
        );
    }

    #[test]
    fn test_verify_reports_mismatch() {
        let policy = FailurePolicy::NetworkError;
        let requested = vec!["/".to_string()];

        let wrong = HarnessResult::Completed(Some(Value::object([("text", Value::from("nope"))])));
        let error = Scenario::JavascriptModule
            .verify(policy, &wrong, &requested)
            .unwrap_err();
        assert!(error.contains(r#"{"text":"module"}"#));

        assert_eq!(
            Scenario::ImageFetch.verify(policy, &HarnessResult::TimedOut, &requested),
            Err("timed out".into())
        );
        assert!(Scenario::InitialNavigation
            .verify(policy, &HarnessResult::Completed(None), &requested)
            .is_ok());
        assert!(Scenario::InitialNavigation
            .verify(policy, &HarnessResult::Completed(None), &[])
            .is_err());
    }

    #[test]
    fn test_resources_serve_pages() {
        use probekit_harness::{GuiHarness, HarnessConfig, LoopHandle};
        use probekit_harness::headless::HeadlessWindow;

        let handle = LoopHandle::new().unwrap();
        let gui = GuiHarness::new(&handle, HeadlessWindow::new(), HarnessConfig::default());

        let resources = Scenario::ImageFetch.resources(gui.signaller());
        let bitmap = resources.fetch("/red.bmp").unwrap().unwrap();
        assert_eq!(bitmap.media_type(), "image/bmp");
        assert_eq!(bitmap.len(), 58);
        assert!(resources.fetch("/").unwrap().unwrap().is_html());

        let module = Scenario::JavascriptModule.resources(gui.signaller());
        assert!(module.fetch("/test.js").unwrap().unwrap().is_javascript());

        let failing = Scenario::HandlerFailure.resources(gui.signaller());
        assert!(failing.fetch("/").is_ok());
        assert!(failing.fetch("/error.json").is_err());
    }
}
