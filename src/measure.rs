// scanperf - Performance-regression harness for scanner builds
// Copyright (c) 2025 Oliver Seifert
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published
// by the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Measurement Aggregator: repeated timed runs reduced to summary statistics.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use crate::config::Workload;
use crate::error::{HarnessError, Result};
use crate::file_stamp;
use crate::revision::Revision;
use crate::run::{Invoker, run_log_path};

/// Min/max/mean over the successful runs of one revision.
///
/// Only obtainable from a non-empty set of durations, so a summary always
/// describes at least one successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementSummary {
    min: f64,
    max: f64,
    mean: f64,
    successful_runs: usize,
    attempted_runs: usize,
    commit: Option<String>,
}

impl MeasurementSummary {
    /// Reduces `durations` (seconds). `attempted` counts failed runs too.
    pub fn from_durations(revision: &str, durations: &[f64], attempted: usize) -> Result<Self> {
        if durations.is_empty() {
            return Err(HarnessError::NoSuccessfulRuns {
                revision: revision.to_string(),
                attempts: attempted,
            });
        }
        let min = durations.iter().copied().fold(f64::INFINITY, f64::min);
        let max = durations.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = durations.iter().sum::<f64>() / durations.len() as f64;
        Ok(Self {
            min,
            max,
            mean,
            successful_runs: durations.len(),
            attempted_runs: attempted.max(durations.len()),
            commit: None,
        })
    }

    /// Attaches the full commit id rendered as a permalink in the report.
    pub fn with_commit(mut self, full_id: impl Into<String>) -> Self {
        self.commit = Some(full_id.into());
        self
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn successful_runs(&self) -> usize {
        self.successful_runs
    }

    pub fn attempted_runs(&self) -> usize {
        self.attempted_runs
    }

    pub fn commit(&self) -> Option<&str> {
        self.commit.as_deref()
    }
}

// ============================================================================
// TIMINGS LEDGER
// ============================================================================

/// One row of the raw timings CSV.
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub revision: String,
    pub run: usize,
    pub status: &'static str,
    pub duration_secs: Option<f64>,
    pub log_path: String,
}

/// Append-only CSV of every attempt, flushed per record so that samples
/// survive an interrupted campaign.
pub struct TimingsLedger {
    path: PathBuf,
    writer: csv::Writer<File>,
}

impl TimingsLedger {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| HarnessError::io(format!("open {}", path.display()), e))?;
        let is_empty = fs::metadata(&path).map(|m| m.len() == 0).unwrap_or(true);
        let writer = csv::WriterBuilder::new()
            .has_headers(is_empty)
            .from_writer(file);
        Ok(Self { path, writer })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&mut self, record: &RunRecord) {
        if let Err(e) = self.writer.serialize(record) {
            log::warn!("Failed to record run in {}: {}", self.path.display(), e);
            return;
        }
        if let Err(e) = self.writer.flush() {
            log::warn!("Failed to flush {}: {}", self.path.display(), e);
        }
    }
}

// ============================================================================
// AGGREGATOR
// ============================================================================

/// Drives an [`Invoker`] `run_count` times per revision, strictly one run
/// after another.
pub struct Aggregator {
    invoker: Box<dyn Invoker>,
    workload: Workload,
    logs_dir: PathBuf,
    ledger: Option<TimingsLedger>,
    show_progress: bool,
}

impl Aggregator {
    pub fn new(invoker: Box<dyn Invoker>, workload: Workload, logs_dir: impl Into<PathBuf>) -> Self {
        Self {
            invoker,
            workload,
            logs_dir: logs_dir.into(),
            ledger: None,
            show_progress: true,
        }
    }

    pub fn with_ledger(mut self, ledger: TimingsLedger) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn quiet(mut self) -> Self {
        self.show_progress = false;
        self
    }

    pub fn ledger_path(&self) -> Option<&Path> {
        self.ledger.as_ref().map(TimingsLedger::path)
    }

    /// Untimed warm-up scan with the given binary.
    pub fn warm_cache(&mut self, binary: &Path) -> Result<()> {
        log::info!("Caching workload {}", self.workload.image);
        self.invoker.warm_cache(binary, &self.workload)
    }

    /// Times `run_count` scans of `binary` and summarizes the successful ones.
    ///
    /// A run that fails with a run-level error is logged and skipped. Any
    /// other error aborts the measurement.
    pub fn measure(
        &mut self,
        revision: &Revision,
        binary: &Path,
        run_count: usize,
    ) -> Result<MeasurementSummary> {
        fs::create_dir_all(&self.logs_dir)
            .map_err(|e| HarnessError::io(format!("create {}", self.logs_dir.display()), e))?;

        let pb = self.progress(revision, run_count);
        let label = revision.file_label();
        let mut durations = Vec::with_capacity(run_count);

        for run in 1..=run_count {
            let log_path = run_log_path(&self.logs_dir, &label, run, &file_stamp());
            pb.suspend(|| log::info!("Start run {} for {}", run, revision.label));

            match self.invoker.invoke_once(binary, &self.workload, &log_path) {
                Ok(secs) => {
                    pb.suspend(|| log::info!("End run {} for {}: {:.2}s", run, revision.label, secs));
                    durations.push(secs);
                    self.record(revision, run, Some(secs), &log_path);
                }
                Err(e) if e.is_run_failure() => {
                    pb.suspend(|| log::warn!("Run {} for {} failed: {}", run, revision.label, e));
                    self.record(revision, run, None, &log_path);
                }
                Err(e) => {
                    pb.abandon();
                    return Err(e);
                }
            }
            pb.inc(1);
        }
        pb.finish_and_clear();

        let summary = MeasurementSummary::from_durations(&revision.label, &durations, run_count)?;
        Ok(match &revision.full_id {
            Some(full_id) => summary.with_commit(full_id.clone()),
            None => summary,
        })
    }

    fn record(&mut self, revision: &Revision, run: usize, secs: Option<f64>, log_path: &Path) {
        if let Some(ledger) = self.ledger.as_mut() {
            ledger.record(&RunRecord {
                revision: revision.label.clone(),
                run,
                status: if secs.is_some() { "ok" } else { "failed" },
                duration_secs: secs,
                log_path: log_path.display().to_string(),
            });
        }
    }

    fn progress(&self, revision: &Revision, run_count: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(run_count as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{prefix:.cyan} {bar:30} {pos}/{len} runs")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        pb.set_prefix(revision.label.clone());
        pb
    }
}
