//! ProbeKit Smoke - repeated-run harness stress driver
//!
//! Runs the whole scenario catalogue `--runs` times in one process and stops
//! at the first failing run. Each run prints one JSON summary line.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use probekit_harness::HarnessConfig;
use probekit_smoke::{Runner, Scenario};
use serde_json::json;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "probekit-smoke", version, about = "Repeatedly run the ProbeKit scenario catalogue")]
struct Args {
    /// How many times to run the full catalogue
    #[arg(long, default_value_t = 1)]
    runs: u64,

    /// Watchdog deadline per scenario, in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Watchdog check interval, in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,

    /// JSON harness config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Only run these scenarios (repeatable)
    #[arg(long, value_enum)]
    scenario: Vec<Scenario>,

    /// Use a real webview instead of the headless surface
    #[arg(long)]
    native: bool,

    /// Enable renderer developer tooling and console echo
    #[arg(long)]
    debug: bool,
}

impl Args {
    fn harness_config(&self) -> Result<HarnessConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?;
                HarnessConfig::from_json(&text)
                    .with_context(|| format!("Invalid config {}", path.display()))?
            }
            None => HarnessConfig::default(),
        }
        .with_env_overrides()?;

        if let Some(timeout_ms) = self.timeout_ms {
            config.timeout_ms = timeout_ms;
        }
        if let Some(interval_ms) = self.interval_ms {
            config.watchdog_interval_ms = interval_ms;
        }
        config.debug |= self.debug;
        config.validate()?;
        Ok(config)
    }

    fn scenarios(&self) -> Vec<Scenario> {
        if self.scenario.is_empty() {
            Scenario::ALL.to_vec()
        } else {
            self.scenario.clone()
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    let config = args.harness_config()?;
    let scenarios = args.scenarios();
    let runner = if args.native {
        Runner::native()?
    } else {
        Runner::Headless
    };

    info!(
        runs = args.runs,
        scenarios = scenarios.len(),
        runner = runner.name(),
        timeout_ms = config.timeout_ms,
        interval_ms = config.watchdog_interval_ms,
        "Starting ProbeKit smoke run"
    );

    let started = Instant::now();
    for run in 1..=args.runs {
        let run_start = Instant::now();
        let mut reports = Vec::with_capacity(scenarios.len());
        for scenario in &scenarios {
            reports.push(runner.run(*scenario, &config)?);
        }

        let failed: Vec<&str> = reports
            .iter()
            .filter(|report| !report.passed)
            .map(|report| report.scenario)
            .collect();
        let summary = json!({
            "run": run,
            "runs": args.runs,
            "status": if failed.is_empty() { "pass" } else { "fail" },
            "elapsed_ms": run_start.elapsed().as_millis() as u64,
            "scenarios": reports,
        });
        println!("{}", summary);

        if !failed.is_empty() {
            error!(run, ?failed, "Run failed");
            std::process::exit(1);
        }
    }

    info!(
        runs = args.runs,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "No failures"
    );
    Ok(())
}
