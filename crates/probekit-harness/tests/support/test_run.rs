//! TestRun - one harness run on the headless window and surface.

use std::time::{Duration, Instant};

use probekit_harness::headless::{HeadlessSurface, HeadlessWindow, ScriptContext, ScriptError};
use probekit_harness::{
    GuiHarness, HarnessConfig, HarnessResult, LoopHandle, Signaller, SurfaceOptions,
    WebViewHarness,
};
use probekit_net::ResourceHandler;

pub use probekit_test_utils::{fast_config, init_tracing};

pub struct TestRun {
    pub handle: LoopHandle,
    pub window: HeadlessWindow,
    pub harness: WebViewHarness<HeadlessSurface>,
}

impl TestRun {
    pub fn new(resources: impl ResourceHandler + 'static) -> Self {
        Self::with_config(resources, fast_config())
    }

    pub fn with_config(resources: impl ResourceHandler + 'static, config: HarnessConfig) -> Self {
        Self::build(config, |_| resources)
    }

    /// Build the resources once the harness exists, so handlers can signal it.
    pub fn build<R, F>(config: HarnessConfig, resources: F) -> Self
    where
        R: ResourceHandler + 'static,
        F: FnOnce(Signaller) -> R,
    {
        init_tracing();
        let handle = LoopHandle::new().expect("Failed to create message loop");
        let window = HeadlessWindow::new();
        let gui = GuiHarness::new(&handle, window.clone(), config.clone());
        let options = SurfaceOptions::new(resources(gui.signaller()))
            .with_failure_policy(config.failure_policy)
            .with_debug(config.debug);
        let surface = HeadlessSurface::new(options);

        Self {
            handle,
            window,
            harness: WebViewHarness::new(gui, surface),
        }
    }

    pub fn surface(&self) -> &HeadlessSurface {
        self.harness.surface()
    }

    pub fn script<F>(&self, path: &str, script: F)
    where
        F: Fn(&ScriptContext<'_>) -> Result<(), ScriptError> + 'static,
    {
        self.surface().register_script(path, script);
    }

    /// Run to completion, returning the result and the wall time it took.
    pub fn run(&self) -> (HarnessResult, Duration) {
        let start = Instant::now();
        let result = self.harness.run().expect("Harness run failed");
        (result, start.elapsed())
    }
}
