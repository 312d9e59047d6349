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

//! Revision Source: where a campaign starts and which commits it visits.

use std::fmt;
use std::path::PathBuf;

use git2::{Oid, Repository, Sort};
use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use serde::Deserialize;

use crate::error::{HarnessError, Result};

/// Length of the abbreviated commit id used as a row label.
pub const SHORT_ID_LEN: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevisionKind {
    /// A published release tag.
    Release,
    /// A single commit on the mainline.
    Commit,
    /// The tip of a branch, fetched from the remote.
    Branch,
}

/// A point in the scanner's history. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision {
    pub kind: RevisionKind,
    /// Display label: a tag, an abbreviated hash or a branch name.
    pub label: String,
    /// Canonical commit id, used for permalinks. Only known for commits.
    pub full_id: Option<String>,
    /// Commit subject or branch name.
    pub description: String,
}

impl Revision {
    pub fn release(tag: impl Into<String>) -> Self {
        let tag = tag.into();
        Self {
            kind: RevisionKind::Release,
            description: tag.clone(),
            label: tag,
            full_id: None,
        }
    }

    pub fn commit(full_id: impl Into<String>, subject: impl Into<String>) -> Self {
        let full_id = full_id.into();
        Self {
            kind: RevisionKind::Commit,
            label: full_id.chars().take(SHORT_ID_LEN).collect(),
            full_id: Some(full_id),
            description: subject.into(),
        }
    }

    pub fn branch(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            kind: RevisionKind::Branch,
            description: name.clone(),
            label: name,
            full_id: None,
        }
    }

    /// Label that is safe to embed in a file name.
    pub fn file_label(&self) -> String {
        self.label
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

// ============================================================================
// RELEASES
// ============================================================================

/// Resolves the campaign's starting version.
pub trait ReleaseSource {
    fn latest_release(&self) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct Release {
    tag_name: String,
}

/// Reads the `tag_name` of a release listing document.
pub fn parse_release(body: &str) -> Result<String> {
    let release: Release = serde_json::from_str(body)
        .map_err(|e| HarnessError::UpstreamUnavailable(format!("malformed release document: {e}")))?;
    non_empty_tag(release.tag_name)
}

fn non_empty_tag(tag: String) -> Result<String> {
    let tag = tag.trim().to_string();
    if tag.is_empty() {
        return Err(HarnessError::UpstreamUnavailable(
            "release document has an empty tag_name".to_string(),
        ));
    }
    Ok(tag)
}

/// Latest release from a GitHub-style `releases/latest` endpoint.
pub struct GitHubReleases {
    url: String,
    client: Client,
}

impl GitHubReleases {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| HarnessError::UpstreamUnavailable(e.to_string()))?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

impl ReleaseSource for GitHubReleases {
    fn latest_release(&self) -> Result<String> {
        log::debug!("GET {}", self.url);
        let response = self
            .client
            .get(&self.url)
            .header(ACCEPT, "application/vnd.github+json")
            .send()
            .map_err(|e| HarnessError::UpstreamUnavailable(format!("{}: {e}", self.url)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HarnessError::UpstreamUnavailable(format!(
                "{} returned {status}",
                self.url
            )));
        }

        let release: Release = response
            .json()
            .map_err(|e| HarnessError::UpstreamUnavailable(format!("{}: {e}", self.url)))?;
        non_empty_tag(release.tag_name)
    }
}

/// A pinned starting tag; no network access.
#[derive(Debug, Clone)]
pub struct FixedRelease(pub String);

impl ReleaseSource for FixedRelease {
    fn latest_release(&self) -> Result<String> {
        non_empty_tag(self.0.clone())
    }
}

// ============================================================================
// HISTORY
// ============================================================================

/// Enumerates the commits a history campaign visits.
pub trait History {
    /// Every commit strictly after `tag` up to the mainline tip, oldest first.
    fn commits_after(&self, tag: &str) -> Result<Vec<Revision>>;
}

/// History read from the harness's working copy with libgit2. Read-only.
pub struct GitHistory {
    repo_dir: PathBuf,
    mainline: String,
}

impl GitHistory {
    pub fn new(repo_dir: impl Into<PathBuf>, mainline: impl Into<String>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
            mainline: mainline.into(),
        }
    }

    fn resolution_error(&self, reference: &str, err: git2::Error) -> HarnessError {
        HarnessError::HistoryResolution {
            reference: reference.to_string(),
            reason: err.message().to_string(),
        }
    }

    /// Remote-tracking mainline if present, otherwise the local branch.
    fn mainline_tip(&self, repo: &Repository) -> Result<Oid> {
        let candidates = [
            format!("refs/remotes/origin/{}", self.mainline),
            format!("refs/heads/{}", self.mainline),
        ];
        for name in &candidates {
            if let Ok(reference) = repo.find_reference(name)
                && let Ok(commit) = reference.peel_to_commit()
            {
                log::debug!("Mainline tip from {}: {}", name, commit.id());
                return Ok(commit.id());
            }
        }
        Err(HarnessError::HistoryResolution {
            reference: self.mainline.clone(),
            reason: "no local or remote-tracking branch".to_string(),
        })
    }
}

impl History for GitHistory {
    fn commits_after(&self, tag: &str) -> Result<Vec<Revision>> {
        let repo = Repository::open(&self.repo_dir)
            .map_err(|e| self.resolution_error(tag, e))?;

        let boundary = repo
            .revparse_single(tag)
            .and_then(|object| object.peel_to_commit())
            .map_err(|e| self.resolution_error(tag, e))?;
        let tip = self.mainline_tip(&repo)?;

        let mut revwalk = repo.revwalk().map_err(|e| self.resolution_error(tag, e))?;
        revwalk
            .set_sorting(Sort::TOPOLOGICAL | Sort::TIME | Sort::REVERSE)
            .map_err(|e| self.resolution_error(tag, e))?;
        revwalk
            .push(tip)
            .map_err(|e| self.resolution_error(&self.mainline, e))?;
        revwalk
            .hide(boundary.id())
            .map_err(|e| self.resolution_error(tag, e))?;

        let mut commits = Vec::new();
        for oid in revwalk {
            let oid = oid.map_err(|e| self.resolution_error(tag, e))?;
            let commit = repo
                .find_commit(oid)
                .map_err(|e| self.resolution_error(&oid.to_string(), e))?;
            commits.push(Revision::commit(
                oid.to_string(),
                commit.summary().unwrap_or("(no message)"),
            ));
        }
        Ok(commits)
    }
}
