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

//! Run Executor: one timed scan of the workload.

use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Instant;

use crate::config::Workload;
use crate::env::EnvSnapshot;
use crate::error::{HarnessError, Result};

/// Runs the scanner against the workload.
pub trait Invoker {
    /// One timed invocation with combined stdout/stderr captured to `log_path`.
    /// Returns the wall-clock duration in seconds.
    fn invoke_once(&mut self, binary: &Path, workload: &Workload, log_path: &Path) -> Result<f64>;

    /// Untimed invocation whose output is discarded. Absorbs one-time costs
    /// such as pulling the workload image.
    fn warm_cache(&mut self, binary: &Path, workload: &Workload) -> Result<()>;
}

/// Log file for one run: `scan_<revision>_run<index>_<stamp>.log`.
pub fn run_log_path(logs_dir: &Path, revision_label: &str, run: usize, stamp: &str) -> PathBuf {
    logs_dir.join(format!("scan_{revision_label}_run{run}_{stamp}.log"))
}

/// Spawns the real scanner as a child process.
pub struct ProcessInvoker {
    env: EnvSnapshot,
}

impl ProcessInvoker {
    pub fn new(env: EnvSnapshot) -> Self {
        Self { env }
    }

    fn command(&self, binary: &Path, workload: &Workload, verbose: bool) -> Command {
        let mut command = Command::new(binary);
        command
            .args(workload.scan_args(verbose))
            .envs(self.env.iter())
            .stdin(Stdio::null());
        command
    }
}

fn spawn_error(binary: &Path, err: std::io::Error) -> HarnessError {
    if err.kind() == ErrorKind::NotFound {
        HarnessError::BinaryMissing(binary.to_path_buf())
    } else {
        HarnessError::io(format!("spawn {}", binary.display()), err)
    }
}

impl Invoker for ProcessInvoker {
    fn invoke_once(&mut self, binary: &Path, workload: &Workload, log_path: &Path) -> Result<f64> {
        if !binary.is_file() {
            return Err(HarnessError::BinaryMissing(binary.to_path_buf()));
        }

        let stdout = File::create(log_path)
            .map_err(|e| HarnessError::io(format!("create {}", log_path.display()), e))?;
        let stderr = stdout
            .try_clone()
            .map_err(|e| HarnessError::io(format!("clone {}", log_path.display()), e))?;

        let mut command = self.command(binary, workload, true);
        command.stdout(stdout).stderr(stderr);
        log::debug!("Running {:?}", command);

        let start = Instant::now();
        let status = command.status();
        let elapsed = start.elapsed();

        let status = status.map_err(|e| spawn_error(binary, e))?;
        if !status.success() {
            return Err(HarnessError::InvocationFailed {
                status,
                log: log_path.to_path_buf(),
            });
        }
        Ok(elapsed.as_secs_f64())
    }

    fn warm_cache(&mut self, binary: &Path, workload: &Workload) -> Result<()> {
        if !binary.is_file() {
            return Err(HarnessError::BinaryMissing(binary.to_path_buf()));
        }
        let status = self
            .command(binary, workload, false)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| spawn_error(binary, e))?;
        if !status.success() {
            return Err(HarnessError::WarmupFailed(status));
        }
        Ok(())
    }
}
