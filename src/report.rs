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

//! Report Writer: cumulative markdown report, one row per measured revision.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::config::Workload;
use crate::env::{EnvSnapshot, HostInfo};
use crate::error::{HarnessError, Result};
use crate::measure::MeasurementSummary;
use crate::revision::Revision;

pub const REPORT_TITLE: &str = "Scanner Performance Test Results";
pub const TABLE_HEADER: &str = "| Version/Description | Commit | Min (s) | Max (s) | Avg (s) |";
pub const TABLE_RULE: &str = "|-------------------|--------|---------|---------|---------|";

/// Everything printed above the results table.
pub struct ReportHeader<'a> {
    pub generated: DateTime<Local>,
    pub workload: &'a Workload,
    pub env: &'a EnvSnapshot,
    pub host: Option<&'a HostInfo>,
}

impl ReportHeader<'_> {
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ReportHeader<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# {REPORT_TITLE}")?;
        writeln!(f)?;
        writeln!(f, "Date: {}", self.generated.format("%Y-%m-%d %H:%M:%S"))?;
        writeln!(f, "Container: {}", self.workload.image)?;
        writeln!(f, "Platform: {}", self.workload.platform)?;
        if let Some(host) = self.host {
            writeln!(f, "Host: {host}")?;
        }
        writeln!(f, "Environment Variables:")?;
        for (key, value) in self.env.iter() {
            writeln!(f, "- {key}={value}")?;
        }
        writeln!(f)?;
        writeln!(f, "## Results")?;
        writeln!(f)?;
        writeln!(f, "{TABLE_HEADER}")?;
        writeln!(f, "{TABLE_RULE}")
    }
}

/// Renders one table row.
///
/// A summary carrying a full commit id links the revision label to its
/// permalink and uses `description` (falling back to the label) as the first
/// cell. Otherwise the label fills the first cell and the commit cell holds
/// a `-` placeholder.
pub fn render_row(
    commit_url_base: &str,
    revision: &Revision,
    summary: &MeasurementSummary,
    description: Option<&str>,
) -> String {
    let stats = format!(
        "{:.2} | {:.2} | {:.2}",
        summary.min(),
        summary.max(),
        summary.mean()
    );
    match summary.commit() {
        Some(full_id) => {
            let first = escape_cell(description.unwrap_or(&revision.label));
            format!(
                "| {first} | [{}]({commit_url_base}{full_id}) | {stats} |",
                revision.label
            )
        }
        None => format!("| {} | - | {stats} |", escape_cell(&revision.label)),
    }
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}

/// An open report. Creating one writes the header; rows only ever append.
#[derive(Debug)]
pub struct Report {
    path: PathBuf,
    commit_url_base: String,
    rows: usize,
}

impl Report {
    /// Writes the header to `path`, replacing any existing file.
    pub fn create(
        path: impl Into<PathBuf>,
        commit_url_base: impl Into<String>,
        header: &ReportHeader<'_>,
    ) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| Self::error(&path, e))?;
        }
        fs::write(&path, header.render()).map_err(|e| Self::error(&path, e))?;
        log::info!("Report header written to {}", path.display());
        Ok(Self {
            path,
            commit_url_base: commit_url_base.into(),
            rows: 0,
        })
    }

    pub fn append_row(
        &mut self,
        revision: &Revision,
        summary: &MeasurementSummary,
        description: Option<&str>,
    ) -> Result<()> {
        let row = render_row(&self.commit_url_base, revision, summary, description);
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| Self::error(&self.path, e))?;
        writeln!(file, "{row}").map_err(|e| Self::error(&self.path, e))?;
        self.rows += 1;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    fn error(path: &Path, err: std::io::Error) -> HarnessError {
        HarnessError::Report {
            path: path.to_path_buf(),
            reason: err.to_string(),
        }
    }
}
