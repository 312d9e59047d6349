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

//! Shared fixtures: bare upstream repositories built with libgit2.

#![allow(dead_code)]

use git2::{Oid, Repository, RepositoryInitOptions, Signature, Time};
use std::path::Path;

pub fn init_bare(path: &Path) -> Repository {
    let mut opts = RepositoryInitOptions::new();
    opts.bare(true).initial_head("main");
    Repository::init_opts(path, &opts).unwrap()
}

/// Commits `files` (top-level only) on top of `refname`, creating the ref if
/// needed. `time` is the commit timestamp in seconds.
pub fn commit_on(
    repo: &Repository,
    refname: &str,
    files: &[(&str, &str)],
    message: &str,
    time: i64,
) -> Oid {
    let parent = repo
        .find_reference(refname)
        .ok()
        .and_then(|r| r.peel_to_commit().ok());
    let base_tree = parent.as_ref().map(|c| c.tree().unwrap());

    let mut builder = repo.treebuilder(base_tree.as_ref()).unwrap();
    for (name, content) in files {
        let blob = repo.blob(content.as_bytes()).unwrap();
        builder.insert(*name, blob, 0o100644).unwrap();
    }
    let tree = repo.find_tree(builder.write().unwrap()).unwrap();

    let sig = Signature::new("Perf Bot", "perf@example.com", &Time::new(time, 0)).unwrap();
    let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
    repo.commit(Some(refname), &sig, &sig, message, &tree, &parents)
        .unwrap()
}

/// Merges `other` into `refname`, keeping the tree of `refname`'s tip.
pub fn merge_on(repo: &Repository, refname: &str, other: Oid, message: &str, time: i64) -> Oid {
    let first = repo
        .find_reference(refname)
        .and_then(|r| r.peel_to_commit())
        .unwrap();
    let second = repo.find_commit(other).unwrap();
    let tree = first.tree().unwrap();
    let sig = Signature::new("Perf Bot", "perf@example.com", &Time::new(time, 0)).unwrap();
    repo.commit(Some(refname), &sig, &sig, message, &tree, &[&first, &second])
        .unwrap()
}

pub fn tag(repo: &Repository, name: &str, oid: Oid) {
    let object = repo.find_object(oid, None).unwrap();
    repo.tag_lightweight(name, &object, false).unwrap();
}

pub fn annotated_tag(repo: &Repository, name: &str, oid: Oid) {
    let object = repo.find_object(oid, None).unwrap();
    let sig = Signature::new("Perf Bot", "perf@example.com", &Time::new(1_700_000_000, 0)).unwrap();
    repo.tag(name, &object, &sig, name, false).unwrap();
}

/// Upstream with history `v1.0.0 -> dev1 -> dev2` on main and a `feat/x`
/// branch forked from `dev1`.
pub struct Upstream {
    pub release: Oid,
    pub dev1: Oid,
    pub dev2: Oid,
    pub feature: Oid,
}

pub fn standard_upstream(path: &Path) -> Upstream {
    let repo = init_bare(path);
    let release = commit_on(
        &repo,
        "refs/heads/main",
        &[("VERSION", "1.0.0"), ("README", "scanner")],
        "Release 1.0.0",
        1_700_000_000,
    );
    tag(&repo, "v1.0.0", release);
    let dev1 = commit_on(
        &repo,
        "refs/heads/main",
        &[("VERSION", "1.1.0-dev1")],
        "Parallelize file hashing\n\nLonger body that is not part of the subject.",
        1_700_000_100,
    );
    repo.reference("refs/heads/feat/x", dev1, false, "branch feat/x")
        .unwrap();
    let feature = commit_on(
        &repo,
        "refs/heads/feat/x",
        &[("VERSION", "feat-x")],
        "Experimental cataloger",
        1_700_000_150,
    );
    let dev2 = commit_on(
        &repo,
        "refs/heads/main",
        &[("VERSION", "1.1.0-dev2")],
        "Cache package metadata",
        1_700_000_200,
    );
    Upstream {
        release,
        dev1,
        dev2,
        feature,
    }
}
