//! Result Reporter: fixed-width tables and JSON reports.
//!
//! Formatting only. Every number rendered here was measured elsewhere.

use std::fmt::{self, Write as _};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{HarnessError, HarnessResult};
use crate::runner::{BenchmarkRecord, ChaosRun};

/// File name of the sweep report under the output directory.
pub const SWEEP_REPORT_FILE: &str = "sweep_report.json";

/// File name of the chaos report under the output directory.
pub const CHAOS_REPORT_FILE: &str = "chaos_report.json";

const NOT_AVAILABLE: &str = "n/a";

/// Width of the `File` column; longer asset names are cut.
const FILE_WIDTH: usize = 25;

/// Width of the `Test Case` column.
const CASE_WIDTH: usize = 30;

/// One events-mode point of a threshold sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepPoint {
    pub file: String,
    pub threshold: f64,
    pub ratio: f64,
    /// Encode latency in milliseconds.
    pub latency: f64,
}

impl SweepPoint {
    /// Builds a point from an events-mode record with both metrics.
    #[must_use]
    pub fn from_record(record: &BenchmarkRecord) -> Option<Self> {
        Some(Self {
            file: record.asset.clone(),
            threshold: record.params.threshold()?,
            ratio: record.ratio?,
            latency: record.encode_latency_ms?,
        })
    }
}

/// Sweep points of `records`, in record order.
#[must_use]
pub fn sweep_points(records: &[BenchmarkRecord]) -> Vec<SweepPoint> {
    records.iter().filter_map(SweepPoint::from_record).collect()
}

fn ratio_cell(ratio: Option<f64>) -> String {
    ratio.map_or_else(|| NOT_AVAILABLE.to_string(), |ratio| format!("{ratio:.2}x"))
}

fn latency_cell(latency: Option<f64>) -> String {
    latency.map_or_else(|| NOT_AVAILABLE.to_string(), |ms| format!("{ms:.1}ms"))
}

/// First `width` characters of `text`.
fn fit(text: &str, width: usize) -> &str {
    text.char_indices()
        .nth(width)
        .map_or(text, |(end, _)| &text[..end])
}

fn rule(header: &str) -> String {
    "-".repeat(header.chars().count())
}

/// `File | Mode | Param | Ratio | Latency | Result`, one row per record.
#[must_use]
pub fn render_benchmark_table(records: &[BenchmarkRecord]) -> String {
    let header = format!(
        "{:<25} | {:<8} | {:<7} | {:>9} | {:>10} | {}",
        "File", "Mode", "Param", "Ratio", "Latency", "Result"
    );
    let mut out = String::new();
    let _ = writeln!(out, "{header}");
    let _ = writeln!(out, "{}", rule(&header));
    for record in records {
        let _ = writeln!(
            out,
            "{:<25} | {:<8} | {:<7} | {:>9} | {:>10} | {}",
            fit(&record.asset, FILE_WIDTH),
            record.params.mode().as_str(),
            record.params.label(),
            ratio_cell(record.ratio),
            latency_cell(record.encode_latency_ms),
            record.result.label(),
        );
    }
    out
}

/// `Test Case | Status | Recovery Result`, one row per trial.
#[must_use]
pub fn render_chaos_table(run: &ChaosRun) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Chaos: {} ({}, base {})",
        run.asset,
        run.params.label(),
        run.base_verdict.label()
    );
    let header = format!("{:<30} | {:<15} | Recovery Result", "Test Case", "Status");
    let _ = writeln!(out, "{header}");
    let _ = writeln!(out, "{}", rule(&header));
    for outcome in &run.outcomes {
        let _ = writeln!(
            out,
            "{:<30} | {:<15} | {}",
            fit(&outcome.case, CASE_WIDTH),
            outcome.verdict.label(),
            outcome.verdict.detail(),
        );
    }
    for failure in &run.failed_trials {
        let _ = writeln!(
            out,
            "{:<30} | {:<15} | {}",
            fit(&failure.case, CASE_WIDTH),
            "NOT RUN",
            failure.error,
        );
    }
    out
}

/// Table of saved sweep points.
#[must_use]
pub fn render_sweep_points(points: &[SweepPoint]) -> String {
    let header = format!(
        "{:<25} | {:>9} | {:>9} | {:>10}",
        "File", "Threshold", "Ratio", "Latency"
    );
    let mut out = String::new();
    let _ = writeln!(out, "{header}");
    let _ = writeln!(out, "{}", rule(&header));
    for point in points {
        let _ = writeln!(
            out,
            "{:<25} | {:>9} | {:>9} | {:>10}",
            fit(&point.file, FILE_WIDTH),
            format!("{:?}", point.threshold),
            ratio_cell(Some(point.ratio)),
            latency_cell(Some(point.latency)),
        );
    }
    out
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> HarnessResult<()> {
    let contents =
        serde_json::to_string_pretty(value).map_err(|err| HarnessError::json(path, err))?;
    fs::write(path, contents).map_err(|err| HarnessError::io(path, err))
}

/// Writes `sweep_report.json` under `out_dir` and returns its path.
pub fn write_sweep_report(out_dir: &Path, points: &[SweepPoint]) -> HarnessResult<PathBuf> {
    let path = out_dir.join(SWEEP_REPORT_FILE);
    write_json(&path, points)?;
    tracing::info!(path = %path.display(), points = points.len(), "sweep report written");
    Ok(path)
}

/// Reads a sweep report written by [`write_sweep_report`].
pub fn load_sweep_report(path: &Path) -> HarnessResult<Vec<SweepPoint>> {
    let contents = fs::read_to_string(path).map_err(|err| HarnessError::io(path, err))?;
    serde_json::from_str(&contents).map_err(|err| HarnessError::json(path, err))
}

/// Writes `chaos_report.json` under `out_dir` and returns its path.
pub fn write_chaos_report(out_dir: &Path, runs: &[ChaosRun]) -> HarnessResult<PathBuf> {
    let path = out_dir.join(CHAOS_REPORT_FILE);
    write_json(&path, runs)?;
    tracing::info!(path = %path.display(), runs = runs.len(), "chaos report written");
    Ok(path)
}

/// Failure counts across one harness run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub records: usize,
    pub integrity_failures: usize,
    pub invocation_failures: usize,
    pub chaos_trials: usize,
    pub chaos_defects: usize,
    /// Chaos trials whose corrupted copy could not be written.
    pub chaos_failed_trials: usize,
}

impl RunSummary {
    #[must_use]
    pub fn from_results(records: &[BenchmarkRecord], runs: &[ChaosRun]) -> Self {
        use crate::checksum::Integrity;
        use crate::runner::RecordResult;

        let mut summary = Self {
            records: records.len(),
            ..Self::default()
        };
        for record in records {
            match &record.result {
                RecordResult::Verified {
                    integrity: Integrity::Fail,
                } => summary.integrity_failures += 1,
                RecordResult::Verified { .. } => {}
                RecordResult::EncodeFailed { .. } | RecordResult::DecodeFailed { .. } => {
                    summary.invocation_failures += 1;
                }
            }
        }
        for run in runs {
            if run.base_verdict.is_defect() {
                summary.invocation_failures += 1;
            }
            summary.chaos_trials += run.outcomes.len();
            summary.chaos_defects += run.defects().count();
            summary.chaos_failed_trials += run.failed_trials.len();
        }
        summary
    }

    /// Returns `true` when nothing failed.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.integrity_failures == 0
            && self.invocation_failures == 0
            && self.chaos_defects == 0
            && self.chaos_failed_trials == 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} records, {} integrity failures, {} invocation failures, {} chaos trials, {} chaos defects",
            self.records,
            self.integrity_failures,
            self.invocation_failures,
            self.chaos_trials,
            self.chaos_defects
        )?;
        if self.chaos_failed_trials > 0 {
            write!(f, ", {} chaos trials not run", self.chaos_failed_trials)?;
        }
        Ok(())
    }
}
