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

//! Harness configuration.
//!
//! A single [`HarnessConfig`] value is built once by the binary and handed
//! by reference to every component. Nothing in the library keeps mutable
//! process-wide settings.

use std::path::PathBuf;

pub const DEFAULT_WORKLOAD: &str =
    "docker.io/huggingface/transformers-all-latest-torch-nightly-gpu:latest";
pub const DEFAULT_PLATFORM: &str = "linux/amd64";
pub const DEFAULT_ITERATIONS: usize = 5;
pub const DEFAULT_REPO_URL: &str = "https://github.com/anchore/syft.git";
pub const DEFAULT_RELEASE_API: &str = "https://api.github.com/repos/anchore/syft/releases/latest";
pub const DEFAULT_COMMIT_BASE: &str = "https://github.com/anchore/syft/commit/";
pub const DEFAULT_ENV_PREFIX: &str = "SYFT_";

/// The fixed target every timed run scans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workload {
    /// Image reference passed to the scanner.
    pub image: String,
    pub platform: String,
}

impl Workload {
    /// Arguments for a scan whose SBOM output is thrown away.
    ///
    /// `verbose` adds `-v` so that captured logs carry the scanner's own
    /// progress lines.
    pub fn scan_args(&self, verbose: bool) -> Vec<String> {
        let mut args = Vec::with_capacity(6);
        if verbose {
            args.push("-v".to_string());
        }
        args.extend([
            "--platform".to_string(),
            self.platform.clone(),
            self.image.clone(),
            "-o".to_string(),
            "syft-json=/dev/null".to_string(),
        ]);
        args
    }
}

impl Default for Workload {
    fn default() -> Self {
        Self {
            image: DEFAULT_WORKLOAD.to_string(),
            platform: DEFAULT_PLATFORM.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub workload: Workload,
    /// Timed runs per revision.
    pub iterations: usize,
    /// Working copy of the scanner sources.
    pub build_dir: PathBuf,
    /// Reports, timing ledgers and the `logs/` directory live here.
    pub results_dir: PathBuf,
    /// Location of the built scanner, relative to `build_dir`.
    pub binary_path: PathBuf,
    pub repo_url: String,
    pub release_api: String,
    /// Prefix of commit permalinks; the full hash is appended.
    pub commit_url_base: String,
    pub mainline: String,
    pub build_command: Vec<String>,
    /// Variables with this prefix are forwarded to the scanner and listed
    /// in the report header.
    pub env_prefix: String,
    pub warm_cache: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            workload: Workload::default(),
            iterations: DEFAULT_ITERATIONS,
            build_dir: PathBuf::from("./snapshot"),
            results_dir: PathBuf::from("./results"),
            binary_path: PathBuf::from("snapshot/linux-build_linux_amd64_v1/syft"),
            repo_url: DEFAULT_REPO_URL.to_string(),
            release_api: DEFAULT_RELEASE_API.to_string(),
            commit_url_base: DEFAULT_COMMIT_BASE.to_string(),
            mainline: "main".to_string(),
            build_command: vec!["make".to_string(), "build".to_string()],
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
            warm_cache: true,
        }
    }
}

impl HarnessConfig {
    /// Absolute-or-relative path of the scanner produced by a build.
    pub fn binary(&self) -> PathBuf {
        self.build_dir.join(&self.binary_path)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.results_dir.join("logs")
    }

    pub fn report_path(&self, stamp: &str) -> PathBuf {
        self.results_dir.join(format!("results_{stamp}.md"))
    }

    pub fn timings_path(&self, stamp: &str) -> PathBuf {
        self.results_dir.join(format!("timings_{stamp}.csv"))
    }
}
