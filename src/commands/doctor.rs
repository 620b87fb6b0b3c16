// Copyright (c) 2024 Jan Holthuis <jan.holthuis@rub.de>
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a copy
// of the MPL was not distributed with this file, You can obtain one at
// http://mozilla.org/MPL/2.0/.
//
// SPDX-License-Identifier: MPL-2.0

//! `doctor`: a read-only report of cache state worth an operator's attention: directories waiting
//! on an interactive prompt, directories marked ignored, recorded release homes, and the most
//! recent audit events.

use std::path::PathBuf;

use crossterm::style::Stylize;

use crate::cache::{AuditEventRow, Cache, ReleaseHome};
use crate::error::Result;

/// A snapshot of cache state relevant to an operator.
#[derive(Debug)]
pub struct DoctorReport {
    /// Directories with a deferred prompt, and why.
    pub deferred_prompts: Vec<(PathBuf, String)>,
    /// Directories currently marked ignored.
    pub ignored_directories: Vec<PathBuf>,
    /// Recorded release homes.
    pub release_homes: Vec<(String, ReleaseHome)>,
    /// The most recent audit events, newest first.
    pub recent_events: Vec<AuditEventRow>,
}

/// Gather a [`DoctorReport`] from `cache`.
pub fn run(cache: &Cache, recent_event_limit: u32) -> Result<DoctorReport> {
    Ok(DoctorReport {
        deferred_prompts: cache.list_deferred_prompts()?,
        ignored_directories: cache.list_ignored_directories()?,
        release_homes: cache.list_release_homes()?,
        recent_events: cache.recent_audit_events(recent_event_limit)?,
    })
}

/// Render a [`DoctorReport`] as colored terminal output.
pub fn print(report: &DoctorReport) {
    println!("{}", "Deferred prompts".bold());
    if report.deferred_prompts.is_empty() {
        println!("  none");
    }
    for (path, reason) in &report.deferred_prompts {
        println!("  {} {}", path.display(), format!("({reason})").yellow());
    }

    println!("{}", "Ignored directories".bold());
    if report.ignored_directories.is_empty() {
        println!("  none");
    }
    for path in &report.ignored_directories {
        println!("  {}", path.display());
    }

    println!("{}", "Release homes".bold());
    if report.release_homes.is_empty() {
        println!("  none");
    }
    for (release_key, home) in &report.release_homes {
        println!("  {release_key} -> {}", home.directory_path.display());
    }

    println!("{}", "Recent audit events".bold());
    if report.recent_events.is_empty() {
        println!("  none");
    }
    for event in &report.recent_events {
        let directory = event
            .directory_path
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {} {} {}",
            event.recorded_at,
            event.event_type.clone().green(),
            directory
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_run_reports_deferred_and_ignored() {
        let cache = Cache::open_in_memory().unwrap();
        cache
            .defer_prompt(Path::new("/music/Ambiguous"), "ambiguous")
            .unwrap();
        cache
            .ignore_directory(Path::new("/music/Skip"), "user request")
            .unwrap();

        let report = run(&cache, 10).unwrap();
        assert_eq!(report.deferred_prompts.len(), 1);
        assert_eq!(report.ignored_directories.len(), 1);
    }
}
