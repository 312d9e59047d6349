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

#![cfg(unix)]

mod common;

use common::{commit_on, standard_upstream};
use scanperf::build::{Builder, GitBuilder};
use scanperf::{EnvSnapshot, HarnessConfig, HarnessError, Revision};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    upstream: PathBuf,
    config: HarnessConfig,
    ids: common::Upstream,
}

/// Copies VERSION into the artifact so every build is traceable.
const COPY_VERSION: &str = "mkdir -p out && cp VERSION out/scanner";

fn fixture(build_command: &str) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let upstream = dir.path().join("upstream.git");
    let ids = standard_upstream(&upstream);
    let config = HarnessConfig {
        build_dir: dir.path().join("snapshot"),
        results_dir: dir.path().join("results"),
        binary_path: PathBuf::from("out/scanner"),
        repo_url: upstream.display().to_string(),
        build_command: vec!["sh".into(), "-c".into(), build_command.into()],
        ..HarnessConfig::default()
    };
    Fixture {
        _dir: dir,
        upstream,
        config,
        ids,
    }
}

fn builder(config: &HarnessConfig) -> GitBuilder {
    GitBuilder::new(config, EnvSnapshot::from_vars("SYFT_", Vec::new(), 2)).quiet()
}

fn artifact(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

#[test]
fn test_release_build_clones_and_builds() {
    let fx = fixture(COPY_VERSION);
    let mut builder = builder(&fx.config);

    let binary = builder.ensure_built(&Revision::release("v1.0.0")).unwrap();

    assert_eq!(binary, fx.config.binary());
    assert!(fx.config.build_dir.join(".git").exists());
    assert_eq!(artifact(&binary), "1.0.0");
}

#[test]
fn test_successive_targets_rebuild_working_copy() {
    let fx = fixture(COPY_VERSION);
    let mut builder = builder(&fx.config);

    let binary = builder.ensure_built(&Revision::release("v1.0.0")).unwrap();
    assert_eq!(artifact(&binary), "1.0.0");

    builder
        .ensure_built(&Revision::commit(fx.ids.dev1.to_string(), "dev1"))
        .unwrap();
    assert_eq!(artifact(&binary), "1.1.0-dev1");

    builder.ensure_built(&Revision::branch("main")).unwrap();
    assert_eq!(artifact(&binary), "1.1.0-dev2");

    builder.ensure_built(&Revision::branch("feat/x")).unwrap();
    assert_eq!(artifact(&binary), "feat-x");
}

#[test]
fn test_same_target_twice_is_idempotent() {
    let fx = fixture(COPY_VERSION);
    let mut builder = builder(&fx.config);

    let first = builder.ensure_built(&Revision::branch("feat/x")).unwrap();
    let second = builder.ensure_built(&Revision::branch("feat/x")).unwrap();

    assert_eq!(first, second);
    assert_eq!(artifact(&second), "feat-x");

    // Build output is captured under logs/.
    let build_logs = fs::read_dir(fx.config.logs_dir())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("build_feat_x_"))
        .count();
    assert!(build_logs >= 1);
}

#[test]
fn test_existing_working_copy_is_reused() {
    let fx = fixture(COPY_VERSION);
    builder(&fx.config)
        .ensure_built(&Revision::release("v1.0.0"))
        .unwrap();

    let mut reopened = builder(&fx.config);
    let binary = reopened.ensure_built(&Revision::branch("main")).unwrap();
    assert_eq!(artifact(&binary), "1.1.0-dev2");
    assert!(fx.upstream.exists());
}

#[test]
fn test_unknown_branch_is_checkout_error() {
    let fx = fixture(COPY_VERSION);
    let mut builder = builder(&fx.config);

    let err = builder
        .ensure_built(&Revision::branch("does-not-exist"))
        .unwrap_err();
    assert!(matches!(
        err,
        HarnessError::Checkout { ref target, .. } if target == "does-not-exist"
    ));
}

#[test]
fn test_unreachable_repository_is_checkout_error() {
    let mut fx = fixture(COPY_VERSION);
    fx.config.repo_url = fx.upstream.join("missing.git").display().to_string();
    let mut builder = builder(&fx.config);

    let err = builder
        .ensure_built(&Revision::release("v1.0.0"))
        .unwrap_err();
    assert!(matches!(err, HarnessError::Checkout { .. }));
}

#[test]
fn test_failing_build_is_build_error_with_log() {
    let fx = fixture("echo compiler exploded; exit 3");
    let mut builder = builder(&fx.config);

    let err = builder
        .ensure_built(&Revision::release("v1.0.0"))
        .unwrap_err();
    match err {
        HarnessError::Build { target, log, .. } => {
            assert_eq!(target, "v1.0.0");
            assert!(artifact(&log).contains("compiler exploded"));
        }
        other => panic!("expected build error, got {other:?}"),
    }
}

#[test]
fn test_build_sees_harness_environment() {
    let fx = fixture("mkdir -p out && printf %s \"$SYFT_PARALLELISM/$SYFT_CHECK_FOR_APP_UPDATE\" > out/scanner");
    let mut builder = builder(&fx.config);

    let binary = builder.ensure_built(&Revision::release("v1.0.0")).unwrap();
    assert_eq!(artifact(&binary), "4/false");
}

fn advance_feature(upstream: &Path) {
    let repo = git2::Repository::open_bare(upstream).unwrap();
    commit_on(
        &repo,
        "refs/heads/feat/x",
        &[("VERSION", "feat-x-v2")],
        "Rework cataloger",
        1_700_000_300,
    );
}

#[test]
fn test_branch_build_picks_up_upstream_changes() {
    let fx = fixture(COPY_VERSION);
    let binary = builder(&fx.config)
        .ensure_built(&Revision::branch("feat/x"))
        .unwrap();
    assert_eq!(artifact(&binary), "feat-x");

    advance_feature(&fx.upstream);
    builder(&fx.config)
        .ensure_built(&Revision::branch("feat/x"))
        .unwrap();
    assert_eq!(artifact(&binary), "feat-x-v2");
}

#[test]
fn test_branch_fetch_failure_does_not_build_stale_ref() {
    let fx = fixture(COPY_VERSION);
    let binary = builder(&fx.config)
        .ensure_built(&Revision::branch("feat/x"))
        .unwrap();
    assert_eq!(artifact(&binary), "feat-x");

    advance_feature(&fx.upstream);
    fs::rename(&fx.upstream, fx.upstream.with_extension("gone")).unwrap();

    let err = builder(&fx.config)
        .ensure_built(&Revision::branch("feat/x"))
        .unwrap_err();
    assert!(matches!(
        err,
        HarnessError::Checkout { ref target, ref reason } if target == "feat/x" && reason.starts_with("fetch")
    ));
    assert_eq!(artifact(&binary), "feat-x");
}
