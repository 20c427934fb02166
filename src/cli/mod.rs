//! Kolosal Drift CLI Module
//!
//! Command-line front end: run a detection between two JSON datasets, or
//! print the effective configuration.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::config::{DetectorConfig, ServiceSettings};
use crate::dataset::Dataset;
use crate::drift::DriftResult;
use crate::service::{DriftDetectionService, DriftReport, InMemoryReferenceSource, JsonlTrackingStore};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString    { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }
fn warn(s: &str) -> ColoredString   { s.truecolor(240, 190, 80) }
fn bad(s: &str) -> ColoredString    { s.truecolor(240, 100, 100) }

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn status_colored(status: &str) -> ColoredString {
    match status {
        "NO_DRIFT" => ok(status),
        "DRIFT" => warn(status),
        _ => bad(status),
    }
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "kolosal-drift")]
#[command(author = "KolosalAI")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Ensemble drift detection for production models")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compare a current dataset against a reference
    Detect {
        /// Reference data file (JSON records or column form)
        #[arg(short, long)]
        reference: PathBuf,

        /// Current data file
        #[arg(short, long)]
        current: PathBuf,

        /// Target column; enables the classifier two-sample test
        #[arg(short, long)]
        target: Option<String>,

        /// Detector configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Model identifier used for metrics and tracking
        #[arg(short, long, default_value = "default")]
        model_id: String,

        /// Append a tracking record to this JSON-lines file
        #[arg(long)]
        tracking: Option<PathBuf>,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration as JSON
    Config {
        /// Detector configuration file to validate and print
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

// ─── Commands ──────────────────────────────────────────────────────────────────

fn load_dataset(path: &Path) -> anyhow::Result<Dataset> {
    Dataset::from_json_file(path)
        .map_err(|e| anyhow::anyhow!("failed to load {}: {}", path.display(), e))
}

pub fn cmd_detect(
    reference_path: &Path,
    current_path: &Path,
    target: Option<&str>,
    config_path: Option<&Path>,
    model_id: &str,
    tracking: Option<&Path>,
    json: bool,
) -> anyhow::Result<()> {
    let mut settings = ServiceSettings::from_env();
    if let Some(path) = tracking {
        settings.tracking_path = Some(path.to_path_buf());
    }
    let tracking_path = settings.tracking_path.clone();

    let mut service = DriftDetectionService::new(settings, Arc::new(InMemoryReferenceSource::new()));
    if let Some(path) = tracking_path {
        service = service.with_tracking(Arc::new(JsonlTrackingStore::new(path)));
    }
    if let Some(path) = config_path {
        service.set_config(model_id, DetectorConfig::from_json_file(path)?)?;
    }

    if json {
        let reference = load_dataset(reference_path)?;
        let current = load_dataset(current_path)?;
        service.register_reference("reference", reference);
        let report = service.detect(model_id, "reference", &current, target)?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    section("Detect");

    step_run("Loading reference");
    let start = Instant::now();
    let reference = load_dataset(reference_path)?;
    step_done(&format!("{} rows × {} cols in {:?}", reference.n_rows(), reference.n_columns(), start.elapsed()));

    step_run("Loading current");
    let start = Instant::now();
    let current = load_dataset(current_path)?;
    step_done(&format!("{} rows × {} cols in {:?}", current.n_rows(), current.n_columns(), start.elapsed()));

    service.register_reference("reference", reference);

    step_run("Running detectors");
    let start = Instant::now();
    let report = service.detect(model_id, "reference", &current, target)?;
    step_done(&format!("{:?}", start.elapsed()));

    print_report(&report);
    Ok(())
}

fn print_report(report: &DriftReport) {
    let result: &DriftResult = &report.result;

    section("Methods");
    for r in &result.per_method {
        match &r.error {
            Some(err) => println!("  {:<18} {} {}", muted(&r.method), bad("failed"), dim(err)),
            None => {
                let flag = if r.drift_detected { warn("drift") } else { ok("ok") };
                println!(
                    "  {:<18} {:>10} {:>6} {}",
                    muted(&r.method),
                    format!("{:.4}", r.drift_score).white(),
                    flag,
                    dim(&format!("{:.0}ms", r.elapsed_ms))
                );
            }
        }
    }

    section("Result");
    println!("  {:<18} {}", muted("Status"), status_colored(result.status()).bold());
    println!("  {:<18} {}", muted("Drift type"), result.drift_type.to_string().white());
    println!("  {:<18} {}", muted("Score"), format!("{:.4}", result.drift_score).white().bold());
    println!("  {:<18} {}", muted("Confidence"), format!("{:.4}", result.confidence).white());
    if !result.features_affected.is_empty() {
        println!("  {:<18} {}", muted("Features"), result.features_affected.join(", ").white());
    }

    section("Recommendation");
    for part in report.recommendation.split(" | ") {
        println!("  {} {}", accent("›"), part);
    }
    println!();
}

pub fn cmd_config(config_path: Option<&Path>) -> anyhow::Result<()> {
    let mut settings = ServiceSettings::from_env();
    if let Some(path) = config_path {
        settings.default_config = DetectorConfig::from_json_file(path)?;
    }
    settings.default_config.validate()?;
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}
