// Copyright (c) 2024 Jan Holthuis <jan.holthuis@rub.de>
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a copy
// of the MPL was not distributed with this file, You can obtain one at
// http://mozilla.org/MPL/2.0/.
//
// SPDX-License-Identifier: MPL-2.0

//! Plan construction and apply.
//!
//! Tag I/O for specific container formats is out of this crate's scope (it is abstracted as the
//! [`TagWriter`] capability); this module only computes diffs, decides whether a plan is worth
//! keeping, and drives the move-then-write-then-rollback-on-failure apply sequence against
//! whatever [`TagWriter`] the caller supplies.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::cache::Cache;
use crate::error::{Error, Result};
use crate::model::{PlannedUpdate, TagChange, TrackMetadata};
use crate::util::fit_filename;

/// The tag-I/O capability: reading and writing a file's tags for whatever container format it
/// happens to be. A concrete implementation lives outside this crate.
pub trait TagWriter {
    /// Write `changes` to the file at `path`, replacing existing values.
    fn write_tags(&self, path: &Path, changes: &HashMap<String, TagChange>) -> Result<()>;
}

/// Build the tag-change diff between `desired` and the file's `existing_tags`, producing `None`
/// if every field already matches (so the caller can skip emitting a plan for it).
#[must_use]
pub fn diff_tags(
    desired: &HashMap<String, String>,
    existing: &HashMap<String, String>,
) -> HashMap<String, TagChange> {
    desired
        .iter()
        .filter_map(|(field, new)| {
            let old = existing.get(field).cloned();
            if old.as_deref() == Some(new.as_str()) {
                None
            } else {
                Some((
                    field.clone(),
                    TagChange {
                        old,
                        new: new.clone(),
                    },
                ))
            }
        })
        .collect()
}

/// Build a [`PlannedUpdate`] for one file, or `None` if there is nothing to do (no tag changes
/// and no relocation).
#[must_use]
pub fn build_plan(
    meta: TrackMetadata,
    score: f64,
    tag_changes: HashMap<String, TagChange>,
    target_path: Option<PathBuf>,
) -> Option<PlannedUpdate> {
    let relocating = target_path.as_deref().is_some_and(|target| target != meta.path);
    if tag_changes.is_empty() && !relocating {
        return None;
    }
    Some(PlannedUpdate {
        meta,
        score,
        tag_changes,
        target_path,
    })
}

/// One line of the dry-run journal.
#[derive(Debug, Serialize)]
struct JournalEntry<'a> {
    source_path: &'a Path,
    target_path: Option<&'a Path>,
    tag_changes: &'a HashMap<String, TagChange>,
}

/// Append `plan` to a dry-run JSONL journal at `journal_path`, performing no filesystem side
/// effects beyond the journal write itself.
pub fn record_dry_run(journal_path: &Path, plan: &PlannedUpdate) -> Result<()> {
    use std::io::Write;

    if let Some(parent) = journal_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let entry = JournalEntry {
        source_path: &plan.meta.path,
        target_path: plan.target_path.as_deref(),
        tag_changes: &plan.tag_changes,
    };
    let line = serde_json::to_string(&entry)?;
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(journal_path)?;
    writeln!(file, "{line}")?;
    Ok(())
}

/// The outcome of applying one plan.
#[derive(Debug, Clone)]
pub enum ApplyOutcome {
    /// The plan was applied in full.
    Applied {
        /// The file's final path (its original path if no relocation happened).
        final_path: PathBuf,
    },
    /// Tag writing failed and the move (if any) was rolled back.
    RolledBack {
        /// Why the apply failed.
        reason: String,
    },
}

/// Stat a file's modification time (as nanoseconds since the epoch) and size, used to populate
/// `processed_files.mtime_ns`/`size_bytes` after a successful apply.
fn file_stat(path: &Path) -> Option<(i64, i64)> {
    let metadata = fs::metadata(path).ok()?;
    let mtime_ns = metadata
        .modified()
        .ok()?
        .duration_since(std::time::UNIX_EPOCH)
        .ok()?
        .as_nanos()
        .try_into()
        .ok()?;
    let size_bytes = metadata.len().try_into().ok()?;
    Some((mtime_ns, size_bytes))
}

/// Apply a single plan: move the file to its target path (if any), write its tags, and roll the
/// move back if tag-writing fails. Records the move and processed-file state in `cache` on
/// success.
pub fn apply(cache: &Cache, tag_writer: &dyn TagWriter, plan: &PlannedUpdate) -> Result<ApplyOutcome> {
    let source = &plan.meta.path;
    let target = match &plan.target_path {
        Some(target) if target != source => fit_filename(target, |p| p.exists()),
        _ => source.clone(),
    };

    let moved = target != *source;
    if moved {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(source, &target)?;
    }

    if let Err(err) = tag_writer.write_tags(&target, &plan.tag_changes) {
        if moved {
            // Best-effort rollback; if this also fails the file is left at `target`, which is
            // still logged and reported rather than silently lost.
            let _ = fs::rename(&target, source);
        }
        return Ok(ApplyOutcome::RolledBack {
            reason: err.to_string(),
        });
    }

    if moved {
        cache.record_move(source, &target)?;
    }
    let stat = file_stat(&target);
    cache.record_processed_file(&target, None, None, true, stat)?;
    Ok(ApplyOutcome::Applied { final_path: target })
}

/// Replay every recorded move in reverse, restoring files to their pre-apply locations. Used by
/// the `rollback` command; not part of the hot apply path.
pub fn rollback_all(cache: &Cache) -> Result<Vec<(PathBuf, PathBuf)>> {
    let mut restored = Vec::new();
    for record in cache.list_moves()? {
        if !record.dest_path.exists() {
            return Err(Error::PlanApplyFailed {
                path: record.dest_path,
                reason: "recorded move destination no longer exists".to_string(),
            });
        }
        if let Some(parent) = record.source_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(&record.dest_path, &record.source_path)?;
        cache.clear_organized(&record.source_path)?;
        cache.delete_move(record.id)?;
        restored.push((record.dest_path, record.source_path.clone()));
    }
    Ok(restored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    struct NoopTagWriter;
    impl TagWriter for NoopTagWriter {
        fn write_tags(&self, _path: &Path, _changes: &HashMap<String, TagChange>) -> Result<()> {
            Ok(())
        }
    }

    struct FailingTagWriter;
    impl TagWriter for FailingTagWriter {
        fn write_tags(&self, _path: &Path, _changes: &HashMap<String, TagChange>) -> Result<()> {
            Err(Error::PlanApplyFailed {
                path: PathBuf::new(),
                reason: "boom".to_string(),
            })
        }
    }

    #[test]
    fn test_diff_tags_skips_unchanged() {
        let mut desired = HashMap::new();
        desired.insert("title".to_string(), "Song".to_string());
        let mut existing = HashMap::new();
        existing.insert("title".to_string(), "Song".to_string());
        assert!(diff_tags(&desired, &existing).is_empty());
    }

    #[test]
    fn test_diff_tags_reports_change() {
        let mut desired = HashMap::new();
        desired.insert("title".to_string(), "New".to_string());
        let mut existing = HashMap::new();
        existing.insert("title".to_string(), "Old".to_string());
        let diff = diff_tags(&desired, &existing);
        assert_eq!(diff["title"].old.as_deref(), Some("Old"));
        assert_eq!(diff["title"].new, "New");
    }

    #[test]
    fn test_build_plan_none_when_nothing_changes() {
        let meta = TrackMetadata::new("/a.flac");
        assert!(build_plan(meta, 0.9, HashMap::new(), None).is_none());
    }

    #[test]
    fn test_apply_moves_and_writes() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("a.flac");
        fs::write(&source, b"data").unwrap();
        let target = dir.path().join("sub/b.flac");

        let cache = Cache::open_in_memory().unwrap();
        let meta = TrackMetadata::new(&source);
        let plan = build_plan(meta, 0.9, HashMap::new(), Some(target.clone())).unwrap();

        let outcome = apply(&cache, &NoopTagWriter, &plan).unwrap();
        match outcome {
            ApplyOutcome::Applied { final_path } => assert_eq!(final_path, target),
            other => panic!("expected Applied, got {other:?}"),
        }
        assert!(target.exists());
        assert!(!source.exists());
        assert_eq!(cache.list_moves().unwrap().len(), 1);
    }

    #[test]
    fn test_apply_rolls_back_on_tag_failure() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("a.flac");
        fs::write(&source, b"data").unwrap();
        let target = dir.path().join("sub/b.flac");

        let cache = Cache::open_in_memory().unwrap();
        let meta = TrackMetadata::new(&source);
        let plan = build_plan(meta, 0.9, HashMap::new(), Some(target.clone())).unwrap();

        let outcome = apply(&cache, &FailingTagWriter, &plan).unwrap();
        assert!(matches!(outcome, ApplyOutcome::RolledBack { .. }));
        assert!(source.exists());
        assert!(!target.exists());
        assert!(cache.list_moves().unwrap().is_empty());
    }

    #[test]
    fn test_rollback_all_restores_files() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("a.flac");
        let dest = dir.path().join("b.flac");
        fs::write(&dest, b"data").unwrap();

        let cache = Cache::open_in_memory().unwrap();
        cache.record_move(&source, &dest).unwrap();

        let restored = rollback_all(&cache).unwrap();
        assert_eq!(restored, vec![(dest.clone(), source.clone())]);
        assert!(source.exists());
        assert!(!dest.exists());
    }
}
