//! # ProbeKit Smoke
//!
//! The scenario catalogue and the runners that execute it, either on the
//! headless surface or (with the `native` feature) in a real webview.

mod report;
mod scenarios;

#[cfg(feature = "native")]
pub mod native;

pub use report::ScenarioReport;
pub use scenarios::{Scenario, RED_PIXEL_BMP};

use std::time::Instant;

use probekit_harness::headless::{HeadlessSurface, HeadlessWindow};
use probekit_harness::{
    GuiHarness, HarnessConfig, HarnessError, LoopHandle, SurfaceOptions, WebViewHarness,
};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum SmokeError {
    #[error("Harness error: {0}")]
    Harness(#[from] HarnessError),

    #[error("Native surface unavailable: {0}")]
    NativeUnavailable(String),
}

/// Where scenarios run.
pub enum Runner {
    Headless,
    #[cfg(feature = "native")]
    Native(native::NativeHost),
}

impl Runner {
    /// A runner using a real webview. Fails when built without `native`.
    pub fn native() -> Result<Self, SmokeError> {
        #[cfg(feature = "native")]
        {
            Ok(Runner::Native(native::NativeHost::new()))
        }
        #[cfg(not(feature = "native"))]
        {
            Err(SmokeError::NativeUnavailable(
                "built without the `native` feature".into(),
            ))
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Runner::Headless => "headless",
            #[cfg(feature = "native")]
            Runner::Native(_) => "native",
        }
    }

    pub fn run(&self, scenario: Scenario, config: &HarnessConfig) -> Result<ScenarioReport, SmokeError> {
        debug!(scenario = scenario.name(), runner = self.name(), "Running scenario");
        match self {
            Runner::Headless => run_headless(scenario, config),
            #[cfg(feature = "native")]
            Runner::Native(host) => native::run_native(host, scenario, config),
        }
    }
}

/// Run one scenario on the headless window and surface.
pub fn run_headless(scenario: Scenario, config: &HarnessConfig) -> Result<ScenarioReport, SmokeError> {
    let handle = LoopHandle::new().map_err(HarnessError::from)?;
    let gui = GuiHarness::new(&handle, HeadlessWindow::new(), config.clone());

    let options = SurfaceOptions::from_rc(scenario.resources(gui.signaller()))
        .with_failure_policy(config.failure_policy)
        .with_debug(config.debug);
    let surface = HeadlessSurface::new(options);
    scenario.install_scripts(&surface);

    let harness = WebViewHarness::new(gui, surface);
    let start = Instant::now();
    let result = harness.run()?;

    Ok(ScenarioReport::new(
        scenario,
        config.failure_policy,
        result,
        harness.surface().requested_paths(),
        start.elapsed(),
    )
    .with_console(harness.surface().console()))
}
