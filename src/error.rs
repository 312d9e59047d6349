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

//! Error kinds raised by the harness.
//!
//! The taxonomy separates failures that sink a single timed run (and are
//! absorbed by the aggregator) from failures that end the campaign.

use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// Result alias used across the library.
pub type Result<T> = std::result::Result<T, HarnessError>;

#[derive(Debug, Error)]
pub enum HarnessError {
    /// The release listing endpoint could not be reached or answered non-2xx.
    #[error("upstream release lookup failed: {0}")]
    UpstreamUnavailable(String),

    /// A tag or mainline reference could not be resolved to a commit.
    #[error("cannot resolve history for '{reference}': {reason}")]
    HistoryResolution { reference: String, reason: String },

    /// The working copy could not be cloned, fetched or checked out.
    #[error("checkout of '{target}' failed: {reason}")]
    Checkout { target: String, reason: String },

    /// The build procedure exited unsuccessfully.
    #[error("build of '{target}' failed ({status}), see {}", .log.display())]
    Build {
        target: String,
        status: String,
        log: PathBuf,
    },

    #[error("scanner binary not found at {}", .0.display())]
    BinaryMissing(PathBuf),

    #[error("scanner invocation failed with {status}, see {}", .log.display())]
    InvocationFailed { status: ExitStatus, log: PathBuf },

    /// The untimed cache-warming scan exited unsuccessfully.
    #[error("cache-warming scan failed with {0}")]
    WarmupFailed(ExitStatus),

    /// Every timed run for a revision failed; there is nothing to summarize.
    #[error("no successful runs for {revision} ({attempts} attempted)")]
    NoSuccessfulRuns { revision: String, attempts: usize },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write report {}: {reason}", .path.display())]
    Report { path: PathBuf, reason: String },
}

impl HarnessError {
    /// Wraps an I/O error with a short description of what was attempted.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        HarnessError::Io {
            context: context.into(),
            source,
        }
    }

    /// True for failures that only invalidate one timed run.
    pub fn is_run_failure(&self) -> bool {
        matches!(
            self,
            HarnessError::BinaryMissing(_) | HarnessError::InvocationFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_failures_are_recoverable() {
        assert!(HarnessError::BinaryMissing(PathBuf::from("/nope")).is_run_failure());
        assert!(
            !HarnessError::NoSuccessfulRuns {
                revision: "abc1234".into(),
                attempts: 5,
            }
            .is_run_failure()
        );
        assert!(!HarnessError::UpstreamUnavailable("timeout".into()).is_run_failure());
    }

    #[test]
    fn test_no_successful_runs_message() {
        let err = HarnessError::NoSuccessfulRuns {
            revision: "v1.2.0".into(),
            attempts: 3,
        };
        assert_eq!(err.to_string(), "no successful runs for v1.2.0 (3 attempted)");
    }
}
