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

//! Build Controller: owns the working copy and the built scanner.
//!
//! Every request checks the working copy out again and rebuilds, even for a
//! pointer that was built a moment ago. The artifact on disk always reflects
//! the last requested revision and nothing else.

use std::fs::{self, File};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;

use git2::{AutotagOption, FetchOptions, Oid, Repository};
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::HarnessConfig;
use crate::env::EnvSnapshot;
use crate::error::{HarnessError, Result};
use crate::file_stamp;
use crate::revision::{Revision, RevisionKind};

/// Checks out and builds a revision, yielding the scanner path.
pub trait Builder {
    fn ensure_built(&mut self, revision: &Revision) -> Result<PathBuf>;
}

/// Working copy managed with libgit2, built with an external command.
pub struct GitBuilder {
    build_dir: PathBuf,
    repo_url: String,
    binary: PathBuf,
    build_command: Vec<String>,
    logs_dir: PathBuf,
    env: EnvSnapshot,
    repo: Option<Repository>,
    show_progress: bool,
}

impl GitBuilder {
    pub fn new(config: &HarnessConfig, env: EnvSnapshot) -> Self {
        Self {
            build_dir: config.build_dir.clone(),
            repo_url: config.repo_url.clone(),
            binary: config.binary(),
            build_command: config.build_command.clone(),
            logs_dir: config.logs_dir(),
            env,
            repo: None,
            show_progress: true,
        }
    }

    /// Disables the build spinner (tests, non-interactive runs).
    pub fn quiet(mut self) -> Self {
        self.show_progress = false;
        self
    }

    fn checkout_error(target: &Revision, reason: impl Into<String>) -> HarnessError {
        HarnessError::Checkout {
            target: target.label.clone(),
            reason: reason.into(),
        }
    }

    /// Opens the working copy, cloning it first if the build dir holds none.
    fn repository(&mut self, target: &Revision) -> Result<&Repository> {
        if self.repo.is_none() {
            let repo = if self.build_dir.join(".git").exists() {
                log::info!("Using existing working copy at {}", self.build_dir.display());
                let repo = Repository::open(&self.build_dir)
                    .map_err(|e| Self::checkout_error(target, e.message()))?;
                if let Err(e) = fetch(&repo, &[]) {
                    log::warn!("Could not refresh working copy: {}", e.message());
                }
                repo
            } else {
                self.clone_repository(target)?
            };
            let repo: &Repository = self.repo.insert(repo);
            return Ok(repo);
        }
        self.repo
            .as_ref()
            .ok_or_else(|| Self::checkout_error(target, "working copy unavailable"))
    }

    fn clone_repository(&self, target: &Revision) -> Result<Repository> {
        log::info!("Cloning {} into {}", self.repo_url, self.build_dir.display());
        fs::create_dir_all(&self.build_dir).map_err(|e| {
            HarnessError::io(format!("create {}", self.build_dir.display()), e)
        })?;

        let mut fetch_options = FetchOptions::new();
        fetch_options.download_tags(AutotagOption::All);

        let mut builder = git2::build::RepoBuilder::new();
        builder.fetch_options(fetch_options);
        builder
            .clone(&self.repo_url, &self.build_dir)
            .map_err(|e| Self::checkout_error(target, format!("clone {}: {}", self.repo_url, e.message())))
    }

    fn checkout(&mut self, target: &Revision) -> Result<Oid> {
        let repo = self.repository(target)?;

        if target.kind == RevisionKind::Branch {
            let refspec = format!("+refs/heads/{0}:refs/remotes/origin/{0}", target.label);
            fetch(repo, &[refspec.as_str()])
                .map_err(|e| Self::checkout_error(target, format!("fetch: {}", e.message())))?;
        }

        let oid = match resolve(repo, target) {
            Some(oid) => oid,
            None => {
                log::debug!("{} not known locally, fetching", target.label);
                fetch(repo, &[])
                    .map_err(|e| Self::checkout_error(target, format!("fetch: {}", e.message())))?;
                resolve(repo, target)
                    .ok_or_else(|| Self::checkout_error(target, "reference not found"))?
            }
        };

        let commit = repo
            .find_commit(oid)
            .map_err(|e| Self::checkout_error(target, e.message()))?;
        let mut opts = git2::build::CheckoutBuilder::new();
        opts.force();
        repo.checkout_tree(commit.as_object(), Some(&mut opts))
            .map_err(|e| Self::checkout_error(target, e.message()))?;
        repo.set_head_detached(oid)
            .map_err(|e| Self::checkout_error(target, e.message()))?;

        log::info!("Checked out {} at {:.8}", target.label, oid);
        Ok(oid)
    }

    fn build(&self, target: &Revision) -> Result<()> {
        fs::create_dir_all(&self.logs_dir)
            .map_err(|e| HarnessError::io(format!("create {}", self.logs_dir.display()), e))?;
        let log_path = self
            .logs_dir
            .join(format!("build_{}_{}.log", target.file_label(), file_stamp()));

        let build_error = |status: String| HarnessError::Build {
            target: target.label.clone(),
            status,
            log: log_path.clone(),
        };

        let (program, args) = self
            .build_command
            .split_first()
            .ok_or_else(|| build_error("empty build command".to_string()))?;

        let stdout = File::create(&log_path)
            .map_err(|e| HarnessError::io(format!("create {}", log_path.display()), e))?;
        let stderr = stdout
            .try_clone()
            .map_err(|e| HarnessError::io(format!("clone {}", log_path.display()), e))?;

        log::debug!("Running {:?} in {}", self.build_command, self.build_dir.display());
        let status = Command::new(program)
            .args(args)
            .current_dir(&self.build_dir)
            .envs(self.env.iter())
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .status()
            .map_err(|e| build_error(format!("could not start {program}: {e}")))?;

        if !status.success() {
            return Err(build_error(status.to_string()));
        }
        Ok(())
    }

    fn spinner(&self, message: String) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg} [{elapsed}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(message);
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }
}

impl Builder for GitBuilder {
    fn ensure_built(&mut self, revision: &Revision) -> Result<PathBuf> {
        let pb = self.spinner(format!("Checking out {}", revision.label));
        let outcome = self.checkout(revision).and_then(|_| {
            pb.set_message(format!("Building {}", revision.label));
            self.build(revision)
        });
        pb.finish_and_clear();
        outcome?;

        log::info!("Built {} -> {}", revision.label, self.binary.display());
        Ok(self.binary.clone())
    }
}

/// Fetches from `origin`; empty `refspecs` uses the remote's configured ones.
///
/// A working copy without an `origin` remote is treated as local-only.
fn fetch(repo: &Repository, refspecs: &[&str]) -> std::result::Result<(), git2::Error> {
    let mut remote = match repo.find_remote("origin") {
        Ok(remote) => remote,
        Err(_) => {
            log::debug!("No origin remote, skipping fetch");
            return Ok(());
        }
    };
    let mut options = FetchOptions::new();
    options.download_tags(AutotagOption::All);
    remote.fetch(refspecs, Some(&mut options), None)
}

/// Candidate reference names for a revision, most specific first.
fn candidates(target: &Revision) -> Vec<String> {
    match target.kind {
        RevisionKind::Release => vec![format!("refs/tags/{}", target.label), target.label.clone()],
        RevisionKind::Commit => target
            .full_id
            .iter()
            .cloned()
            .chain(std::iter::once(target.label.clone()))
            .collect(),
        RevisionKind::Branch => vec![
            format!("refs/remotes/origin/{}", target.label),
            format!("refs/heads/{}", target.label),
            target.label.clone(),
        ],
    }
}

fn resolve(repo: &Repository, target: &Revision) -> Option<Oid> {
    candidates(target).iter().find_map(|spec| {
        repo.revparse_single(spec)
            .and_then(|object| object.peel_to_commit())
            .map(|commit| commit.id())
            .ok()
    })
}
