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

//! Campaign Driver: wires revision source, builds, measurement and report
//! together for one harness execution.

use std::path::{Path, PathBuf};

use chrono::Local;
use owo_colors::OwoColorize;

use crate::build::Builder;
use crate::config::HarnessConfig;
use crate::env::{EnvSnapshot, HostInfo};
use crate::error::Result;
use crate::measure::{Aggregator, MeasurementSummary};
use crate::report::{Report, ReportHeader};
use crate::revision::{History, ReleaseSource, Revision};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// The latest release followed by every mainline commit after it.
    History,
    /// The mainline tip against one branch.
    Compare { branch: String },
}

impl Mode {
    pub fn from_branch(branch: Option<String>) -> Self {
        match branch {
            Some(branch) => Mode::Compare { branch },
            None => Mode::History,
        }
    }
}

/// A revision together with its measurement, in report order.
#[derive(Debug, Clone)]
pub struct MeasuredRow {
    pub revision: Revision,
    pub summary: MeasurementSummary,
}

#[derive(Debug)]
pub struct CampaignOutcome {
    pub report: PathBuf,
    pub rows: Vec<MeasuredRow>,
}

pub struct Campaign<'a> {
    config: &'a HarnessConfig,
    env: &'a EnvSnapshot,
    host: Option<HostInfo>,
    releases: Box<dyn ReleaseSource>,
    history: Box<dyn History>,
    builder: Box<dyn Builder>,
    aggregator: Aggregator,
    report_path: PathBuf,
}

impl<'a> Campaign<'a> {
    pub fn new(
        config: &'a HarnessConfig,
        env: &'a EnvSnapshot,
        releases: Box<dyn ReleaseSource>,
        history: Box<dyn History>,
        builder: Box<dyn Builder>,
        aggregator: Aggregator,
        report_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            config,
            env,
            host: None,
            releases,
            history,
            builder,
            aggregator,
            report_path: report_path.into(),
        }
    }

    pub fn with_host(mut self, host: HostInfo) -> Self {
        self.host = Some(host);
        self
    }

    pub fn report_path(&self) -> &Path {
        &self.report_path
    }

    pub fn run(&mut self, mode: &Mode) -> Result<CampaignOutcome> {
        let tag = self.releases.latest_release()?;
        log::info!("Latest release: {}", tag);

        let baseline = Revision::release(tag.clone());
        let binary = self.builder.ensure_built(&baseline)?;

        if self.config.warm_cache {
            self.aggregator.warm_cache(&binary)?;
        } else {
            log::info!("Skipping cache warm-up");
        }

        let mut rows = Vec::new();
        match mode {
            Mode::History => {
                let summary = self.measure(&baseline, &binary)?;
                let mut report = self.create_report()?;
                report.append_row(&baseline, &summary, None)?;
                rows.push(MeasuredRow {
                    revision: baseline,
                    summary,
                });

                let commits = self.history.commits_after(&tag)?;
                let total = commits.len();
                log::info!("Found {} commits after {}", total, tag);

                for (idx, commit) in commits.into_iter().enumerate() {
                    log::info!(
                        "Testing commit {}/{}: {} - {}",
                        idx + 1,
                        total,
                        commit.label,
                        commit.description
                    );
                    let binary = self.builder.ensure_built(&commit)?;
                    let summary = self.measure(&commit, &binary)?;
                    report.append_row(&commit, &summary, Some(&commit.description))?;
                    rows.push(MeasuredRow {
                        revision: commit,
                        summary,
                    });
                }
            }
            Mode::Compare { branch } => {
                log::info!("Testing branch {} against {}", branch, self.config.mainline);

                let mainline = Revision::branch(self.config.mainline.clone());
                let binary = self.builder.ensure_built(&mainline)?;
                let summary = self.measure(&mainline, &binary)?;
                let mut report = self.create_report()?;
                report.append_row(&mainline, &summary, None)?;
                rows.push(MeasuredRow {
                    revision: mainline,
                    summary,
                });

                let candidate = Revision::branch(branch.clone());
                let binary = self.builder.ensure_built(&candidate)?;
                let summary = self.measure(&candidate, &binary)?;
                report.append_row(&candidate, &summary, None)?;
                rows.push(MeasuredRow {
                    revision: candidate,
                    summary,
                });
            }
        }

        log::info!("Results written to: {}", self.report_path.display());
        Ok(CampaignOutcome {
            report: self.report_path.clone(),
            rows,
        })
    }

    fn measure(&mut self, revision: &Revision, binary: &Path) -> Result<MeasurementSummary> {
        let summary = self
            .aggregator
            .measure(revision, binary, self.config.iterations)?;
        log::info!(
            "{}: min {:.2}s max {:.2}s avg {:.2}s ({}/{} runs)",
            revision.label,
            summary.min(),
            summary.max(),
            summary.mean(),
            summary.successful_runs(),
            summary.attempted_runs()
        );
        Ok(summary)
    }

    fn create_report(&self) -> Result<Report> {
        let header = ReportHeader {
            generated: Local::now(),
            workload: &self.config.workload,
            env: self.env,
            host: self.host.as_ref(),
        };
        Report::create(&self.report_path, &self.config.commit_url_base, &header)
    }
}

// ============================================================================
// CONSOLE SUMMARY
// ============================================================================

/// Percentage change of `value` relative to `baseline`.
pub fn relative_change(baseline: f64, value: f64) -> f64 {
    if baseline == 0.0 {
        return 0.0;
    }
    (value - baseline) / baseline * 100.0
}

/// Prints each row's mean against the first row of the campaign.
pub fn print_summary(outcome: &CampaignOutcome) {
    let Some(first) = outcome.rows.first() else {
        return;
    };
    let baseline = first.summary.mean();

    println!("\n{}", "═".repeat(72));
    println!("{}", "CAMPAIGN SUMMARY".bold());
    println!("{}", "═".repeat(72));
    for row in &outcome.rows {
        let change = relative_change(baseline, row.summary.mean());
        let change_text = format!("{change:+6.1}%");
        let change_text = if change > 5.0 {
            change_text.red().to_string()
        } else if change < -5.0 {
            change_text.green().to_string()
        } else {
            change_text.dimmed().to_string()
        };
        println!(
            "  {:<12} {:>9.2}s  {}  {}",
            row.revision.label.cyan(),
            row.summary.mean(),
            change_text,
            clip(&row.revision.description, 40)
        );
    }
    println!("\nReport: {}", outcome.report.display());
}

fn clip(text: &str, len: usize) -> String {
    if text.chars().count() > len {
        let head: String = text.chars().take(len.saturating_sub(3)).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}
