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

//! Environment contract between the harness and the scanner.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fmt;

use sysinfo::System;

/// Parallelism handed to the scanner: twice the logical CPU count.
pub fn parallelism_hint(cpus: usize) -> usize {
    cpus.max(1) * 2
}

/// Prefix-matched variables forwarded to every build and scan.
///
/// Built once per campaign. Harness-owned variables override whatever the
/// caller's environment held under the same name. Iteration is sorted by
/// name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    vars: BTreeMap<String, String>,
}

impl EnvSnapshot {
    /// Captures the current process environment.
    pub fn capture(prefix: &str) -> Self {
        Self::from_vars(prefix, utf8_vars(std::env::vars_os()), num_cpus::get())
    }

    pub fn from_vars<I>(prefix: &str, vars: I, cpus: usize) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut captured: BTreeMap<String, String> = vars
            .into_iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .collect();
        captured.insert(
            format!("{prefix}PARALLELISM"),
            parallelism_hint(cpus).to_string(),
        );
        captured.insert(
            format!("{prefix}CHECK_FOR_APP_UPDATE"),
            "false".to_string(),
        );
        Self { vars: captured }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

/// Machine description recorded next to the environment snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostInfo {
    pub os: String,
    pub cpu: String,
    pub cores: usize,
    pub memory_bytes: u64,
}

impl HostInfo {
    pub fn capture() -> Self {
        let mut sys = System::new();
        sys.refresh_cpu_all();
        sys.refresh_memory();

        let cpu = sys
            .cpus()
            .first()
            .map(|c| c.brand().trim().to_string())
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| "unknown cpu".to_string());

        Self {
            os: System::long_os_version().unwrap_or_else(|| std::env::consts::OS.to_string()),
            cpu,
            cores: num_cpus::get(),
            memory_bytes: sys.total_memory(),
        }
    }
}

impl fmt::Display for HostInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, {} ({} logical cores), {:.1} GiB RAM",
            self.os,
            self.cpu,
            self.cores,
            self.memory_bytes as f64 / (1024.0 * 1024.0 * 1024.0)
        )
    }
}

/// Drops entries whose name or value is not valid UTF-8.
fn utf8_vars<I>(vars: I) -> impl Iterator<Item = (String, String)>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter()
        .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
}
