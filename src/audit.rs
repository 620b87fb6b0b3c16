// Copyright (c) 2024 Jan Holthuis <jan.holthuis@rub.de>
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a copy
// of the MPL was not distributed with this file, You can obtain one at
// http://mozilla.org/MPL/2.0/.
//
// SPDX-License-Identifier: MPL-2.0

//! Typed audit events, recorded to the cache's `audit_events` table so that a run's decisions can
//! be inspected after the fact (see the `doctor` command).

use std::path::Path;

use serde::Serialize;

use crate::cache::Cache;
use crate::error::Result;

/// One classified event worth recording for later inspection.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditEvent<'a> {
    /// A directory was skipped, with a human-readable reason.
    Skipped {
        /// Why processing stopped.
        reason: &'a str,
    },
    /// A release was decided on automatically.
    Decided {
        /// The chosen release key.
        release_key: &'a str,
        /// Final adjusted score.
        score: f64,
    },
    /// The decision was deferred for later interactive resolution.
    Deferred {
        /// Why the decision couldn't be made automatically.
        reason: &'a str,
    },
    /// The user made a manual selection at a prompt.
    UserSelected {
        /// The release key the user picked or forced.
        release_key: &'a str,
    },
    /// A plan was applied successfully.
    Applied {
        /// Final path of the file after the plan was applied.
        final_path: &'a Path,
    },
    /// A plan failed to apply and was rolled back.
    RolledBack {
        /// Why the apply failed.
        reason: &'a str,
    },
}

impl AuditEvent<'_> {
    fn event_type(&self) -> &'static str {
        match self {
            AuditEvent::Skipped { .. } => "skipped",
            AuditEvent::Decided { .. } => "decided",
            AuditEvent::Deferred { .. } => "deferred",
            AuditEvent::UserSelected { .. } => "user_selected",
            AuditEvent::Applied { .. } => "applied",
            AuditEvent::RolledBack { .. } => "rolled_back",
        }
    }
}

/// Record an audit event for `directory` in `cache`.
pub fn record(cache: &Cache, directory: &Path, event: &AuditEvent<'_>) -> Result<()> {
    let payload = serde_json::to_string(event)?;
    cache.record_audit_event(event.event_type(), Some(directory), &payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_skipped_event() {
        let cache = Cache::open_in_memory().unwrap();
        let event = AuditEvent::Skipped {
            reason: "no_release_candidates",
        };
        record(&cache, Path::new("/music/Artist/Album"), &event).unwrap();

        let events = cache.recent_audit_events(10).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "skipped");
        assert!(events[0].payload.contains("no_release_candidates"));
    }

    #[test]
    fn test_record_decided_event() {
        let cache = Cache::open_in_memory().unwrap();
        let event = AuditEvent::Decided {
            release_key: "musicbrainz:abc",
            score: 0.91,
        };
        record(&cache, Path::new("/music/Artist/Album"), &event).unwrap();
        let events = cache.recent_audit_events(10).unwrap();
        assert_eq!(events[0].event_type, "decided");
    }
}
