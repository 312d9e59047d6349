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

//! # scanperf
//!
//! Performance-regression harness for a command-line scanner. A campaign
//! builds successive revisions of the scanner's sources, times repeated
//! scans of one fixed workload per revision and appends min/max/mean rows
//! to a markdown report as it goes.
//!
//! Two campaign shapes exist:
//! - **history**: the latest release, then every mainline commit after it,
//!   oldest first
//! - **compare**: the mainline tip against a single branch
//!
//! Everything runs sequentially. Timings need the machine to themselves.

pub mod build;
pub mod campaign;
pub mod config;
pub mod env;
pub mod error;
pub mod measure;
pub mod report;
pub mod revision;
pub mod run;

pub use build::{Builder, GitBuilder};
pub use campaign::{Campaign, CampaignOutcome, MeasuredRow, Mode};
pub use config::{HarnessConfig, Workload};
pub use env::{EnvSnapshot, HostInfo};
pub use error::{HarnessError, Result};
pub use measure::{Aggregator, MeasurementSummary, TimingsLedger};
pub use report::{Report, ReportHeader};
pub use revision::{FixedRelease, GitHistory, GitHubReleases, History, ReleaseSource, Revision};
pub use run::{Invoker, ProcessInvoker};

use chrono::Local;

/// Local timestamp used in report, ledger and log file names.
pub fn file_stamp() -> String {
    Local::now().format("%Y-%m-%d_%H%M%S").to_string()
}
