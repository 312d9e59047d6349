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

//! # Scanner Performance Campaign
//!
//! Builds the scanner at successive revisions and times it against a fixed
//! workload, appending one row per revision to a markdown report.
//!
//! Features:
//! - History mode: latest release plus every mainline commit since, oldest first
//! - Compare mode (`--pr <branch>`): mainline tip against a branch
//! - One untimed cache-warming scan before timed runs start
//! - Per-run logs and a raw timings CSV next to the report
//! - Partial reports survive failures and Ctrl+C
//!
//! Usage:
//!   cargo run --bin scanperf -- [--pr <branch>] [--iterations <n>] [--baseline <tag>] [--results-dir <dir>]

use anyhow::{Context, Result};
use clap::Parser;
use scanperf::campaign::{self, Campaign, Mode};
use scanperf::{
    Aggregator, EnvSnapshot, FixedRelease, GitBuilder, GitHistory, GitHubReleases, HarnessConfig,
    HostInfo, ProcessInvoker, ReleaseSource, TimingsLedger, Workload,
};
use std::fs;
use std::path::PathBuf;
use std::process;

#[derive(Parser, Debug)]
#[command(name = "scanperf")]
#[command(about = "Measure scanner performance across versions", long_about = None)]
#[command(version)]
struct Args {
    /// PR branch to test against main (e.g. feat/parallelize-file-hashing)
    #[arg(long)]
    pr: Option<String>,

    /// Timed runs per revision
    #[arg(short = 'n', long, default_value_t = scanperf::config::DEFAULT_ITERATIONS)]
    iterations: usize,

    /// Container image every run scans
    #[arg(short, long, default_value = scanperf::config::DEFAULT_WORKLOAD)]
    workload: String,

    /// Platform of the workload image
    #[arg(long, default_value = scanperf::config::DEFAULT_PLATFORM)]
    platform: String,

    /// Working copy of the scanner sources
    #[arg(long, default_value = "./snapshot")]
    build_dir: PathBuf,

    /// Directory for reports, timings and run logs
    #[arg(short, long, default_value = "./results")]
    results_dir: PathBuf,

    /// Start from this tag instead of querying the latest release
    #[arg(long)]
    baseline: Option<String>,

    /// Repository to clone when the build directory is empty
    #[arg(long, default_value = scanperf::config::DEFAULT_REPO_URL)]
    repo_url: String,

    /// Skip the untimed cache-warming scan
    #[arg(long, default_value = "false")]
    skip_warmup: bool,
}

impl Args {
    fn config(&self) -> HarnessConfig {
        HarnessConfig {
            workload: Workload {
                image: self.workload.clone(),
                platform: self.platform.clone(),
            },
            iterations: self.iterations,
            build_dir: self.build_dir.clone(),
            results_dir: self.results_dir.clone(),
            repo_url: self.repo_url.clone(),
            warm_cache: !self.skip_warmup,
            ..HarnessConfig::default()
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    if args.iterations == 0 {
        anyhow::bail!("--iterations must be at least 1");
    }

    let config = args.config();
    let mode = Mode::from_branch(args.pr.clone());
    let env = EnvSnapshot::capture(&config.env_prefix);

    let logs_dir = config.logs_dir();
    fs::create_dir_all(&logs_dir)
        .with_context(|| format!("Failed to create logs dir: {}", logs_dir.display()))?;

    let stamp = scanperf::file_stamp();
    let report_path = config.report_path(&stamp);
    let ledger = TimingsLedger::open(config.timings_path(&stamp))?;

    log::info!("Workload: {} ({})", config.workload.image, config.workload.platform);
    log::info!("Iterations per revision: {}", config.iterations);
    log::info!("Report: {}", report_path.display());
    log::info!("Timings: {}", ledger.path().display());

    let interrupted_report = report_path.clone();
    ctrlc::set_handler(move || {
        println!("\n\nCtrl+C received, stopping.");
        if interrupted_report.exists() {
            println!("Partial results saved to: {}", interrupted_report.display());
        }
        process::exit(130);
    })
    .context("Failed to install Ctrl+C handler")?;

    let releases: Box<dyn ReleaseSource> = match &args.baseline {
        Some(tag) => Box::new(FixedRelease(tag.clone())),
        None => Box::new(GitHubReleases::new(config.release_api.clone())?),
    };
    let history = Box::new(GitHistory::new(&config.build_dir, config.mainline.clone()));
    let builder = Box::new(GitBuilder::new(&config, env.clone()));
    let aggregator = Aggregator::new(
        Box::new(ProcessInvoker::new(env.clone())),
        config.workload.clone(),
        logs_dir,
    )
    .with_ledger(ledger);

    let mut campaign = Campaign::new(
        &config,
        &env,
        releases,
        history,
        builder,
        aggregator,
        report_path.clone(),
    )
    .with_host(HostInfo::capture());

    match campaign.run(&mode) {
        Ok(outcome) => {
            campaign::print_summary(&outcome);
            Ok(())
        }
        Err(e) => {
            if report_path.exists() {
                log::warn!("Partial results kept in {}", report_path.display());
            }
            Err(e).context("Campaign aborted")
        }
    }
}
