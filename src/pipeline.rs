// Copyright (c) 2024 Jan Holthuis <jan.holthuis@rub.de>
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a copy
// of the MPL was not distributed with this file, You can obtain one at
// http://mozilla.org/MPL/2.0/.
//
// SPDX-License-Identifier: MPL-2.0

//! The directory pipeline: `process_directory` drives one album directory through analysis,
//! candidate gathering, decision, assignment, plan construction and apply.
//!
//! Every stage is fail-open: nothing propagates out of [`process_directory`] as an error. A
//! failure at any stage downgrades to a recorded skip reason plus a `log::warn!`/`log::error!`
//! call, per the propagation policy.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use regex::Regex;
use std::sync::OnceLock;

use crate::assignment::{
    best_assignment_max_score, build_discogs_score_matrix, build_musicbrainz_score_matrix,
    AssignmentPolicy, DiscogsTrack,
};
use crate::audit::{self, AuditEvent};
use crate::cache::Cache;
use crate::classical::{ClassicalHeuristics, CreditsReviewThresholds};
use crate::decision::{decide, Decision};
use crate::hash::DirectoryHash;
use crate::heuristics::disc_subfolder_re;
use crate::model::{
    hint_key, split_release_key, DirectoryBatch, PendingResult, ReleaseData, ReleaseExample,
    TrackMetadata,
};
use crate::plan::{apply, build_plan, diff_tags, record_dry_run, ApplyOutcome, TagWriter};
use crate::prompt::{Prompt, PromptOption, PromptOutcome};
use crate::provider::{summarize_release, Provider};
use crate::releasehome::{maybe_set_release_home, select_singleton_home};
use crate::scoring::{adjust_release_score, ScoringInput};

/// Tag-reading half of the tag I/O capability (tag-writing lives in [`crate::plan::TagWriter`]).
pub trait TagReader {
    /// Read a file's existing tags into [`TrackMetadata`] plus a raw field map used for
    /// tag-hint consensus scoring.
    fn read_tags(&self, path: &Path) -> crate::error::Result<(TrackMetadata, HashMap<String, String>)>;
}

/// The path-organizing capability: computes a file's target path given its resolved metadata.
/// Concrete layout policy lives outside this crate.
pub trait Organizer {
    /// Compute the target path for `meta`, or `None` to leave the file where it is.
    fn target_path(&self, meta: &TrackMetadata) -> Option<PathBuf>;
}

/// Capabilities and settings threaded through [`process_directory`].
pub struct PipelineDeps<'a> {
    /// Persistent cache.
    pub cache: &'a Cache,
    /// Providers to consult, in preference order (MusicBrainz before Discogs, typically).
    pub providers: &'a [Box<dyn Provider + 'a>],
    /// Tag reader capability.
    pub tag_reader: &'a dyn TagReader,
    /// Tag writer capability.
    pub tag_writer: &'a dyn TagWriter,
    /// Organizer capability.
    pub organizer: &'a dyn Organizer,
    /// Interactive prompt, used when `interactive` is set.
    pub prompt: Option<&'a dyn Prompt>,
    /// Whether this run may block on user input.
    pub interactive: bool,
    /// Whether ambiguous/low-coverage/no-candidate decisions should be deferred (instead of
    /// skipped) when not interactive.
    pub defer_prompts: bool,
    /// Dry-run mode: compute plans but don't touch the filesystem.
    pub dry_run: bool,
    /// Dry-run journal path, required when `dry_run` is set.
    pub journal_path: Option<&'a Path>,
    /// Count the number of audio files directly inside a directory (used by release-home
    /// comparisons); a thin wrapper so tests can fake directory contents.
    pub count_audio_files: &'a dyn Fn(&Path) -> usize,
    /// Classical-work detection/credit adaptation.
    pub classical: &'a ClassicalHeuristics,
    /// Thresholds gating the classical performer-credits review.
    pub classical_credits: CreditsReviewThresholds,
}

/// The outcome of one [`process_directory`] call.
#[derive(Debug)]
pub enum PipelineOutcome {
    /// One or more plans were applied (or, in dry-run mode, journaled).
    Applied(Vec<ApplyOutcome>),
    /// Nothing needed to change.
    NoChanges,
    /// The directory was skipped, with a reason.
    Skipped {
        /// Why the directory was skipped.
        reason: String,
    },
    /// The decision was deferred for later interactive resolution.
    Deferred {
        /// Why the decision couldn't be made automatically.
        reason: String,
    },
}

/// Stat a file's modification time (nanoseconds since the epoch) and size, used by the
/// directory-already-processed skip policy to compare against `processed_files`.
fn file_stat(path: &Path) -> Option<(i64, i64)> {
    let metadata = std::fs::metadata(path).ok()?;
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

fn year_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(19|20)\d{2}").expect("valid regex"))
}

/// Infer a directory's release year from its own name or its parent's, first hit wins.
fn infer_directory_year(directory: &Path) -> Option<i32> {
    let re = year_re();
    for component in [directory, directory.parent().unwrap_or(directory)] {
        if let Some(name) = component.file_name().and_then(|n| n.to_str()) {
            if let Some(m) = re.find(name) {
                if let Ok(year) = m.as_str().parse() {
                    return Some(year);
                }
            }
        }
    }
    None
}

/// Keywords whose presence in both the directory name and a candidate's release title earn the
/// directory-name-flag scoring bonus (e.g. a directory named `"Album (Deluxe Edition)"` matching
/// a release titled `"Album (Deluxe)"`).
const DIRECTORY_NAME_FLAG_KEYWORDS: [&str; 5] = ["deluxe", "bonus", "piano", "live", "remaster"];

/// Whether `directory` and `album_title` share one of [`DIRECTORY_NAME_FLAG_KEYWORDS`],
/// case-insensitively.
fn directory_name_flag_matches(directory: &Path, album_title: Option<&str>) -> bool {
    let Some(album_title) = album_title else {
        return false;
    };
    let Some(directory_name) = directory.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let directory_name = directory_name.to_lowercase();
    let album_title = album_title.to_lowercase();
    DIRECTORY_NAME_FLAG_KEYWORDS
        .iter()
        .any(|keyword| directory_name.contains(keyword) && album_title.contains(keyword))
}

/// Merge `batch` with any immediate disc-style subfolders (e.g. `"Disc 2"`), matching spec's
/// album-batching collaborator contract.
fn merge_disc_subfolders(batch: &mut DirectoryBatch) {
    let Ok(entries) = std::fs::read_dir(&batch.directory_path) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if disc_subfolder_re().is_match(name) {
            if let Ok(sub_entries) = std::fs::read_dir(&path) {
                batch
                    .file_paths
                    .extend(sub_entries.flatten().map(|e| e.path()).filter(|p| p.is_file()));
            }
        }
    }
}

/// Drive one album directory through the full pipeline. Never returns an `Err`: every failure is
/// downgraded to [`PipelineOutcome::Skipped`].
pub async fn process_directory(
    deps: &PipelineDeps<'_>,
    mut batch: DirectoryBatch,
    force_prompt: bool,
) -> PipelineOutcome {
    match process_directory_inner(deps, &mut batch, force_prompt).await {
        Ok(outcome) => outcome,
        Err(err) => {
            log::error!("Failed to process {}: {}", batch.directory_path.display(), err);
            let reason = err.to_string();
            if let Err(audit_err) = audit::record(
                deps.cache,
                &batch.directory_path,
                &AuditEvent::Skipped { reason: &reason },
            ) {
                log::warn!("Failed to record audit event: {audit_err}");
            }
            PipelineOutcome::Skipped { reason }
        }
    }
}

async fn process_directory_inner(
    deps: &PipelineDeps<'_>,
    batch: &mut DirectoryBatch,
    force_prompt: bool,
) -> crate::error::Result<PipelineOutcome> {
    let directory = batch.directory_path.clone();
    merge_disc_subfolders(batch);

    // Stage 2: directory hash & skip policy.
    let current_hash = DirectoryHash::for_directory(&directory)?;
    if !force_prompt {
        if let (Some(current), Some(cached)) = (current_hash, deps.cache.get_directory_hash(&directory)?) {
            if current == cached && deps.cache.get_directory_release(&directory)?.is_some() {
                return Ok(PipelineOutcome::Skipped {
                    reason: "directory_hash_unchanged".to_string(),
                });
            }
        }

        if !batch.file_paths.is_empty()
            && batch.file_paths.iter().all(|path| {
                file_stat(path).is_some_and(|(mtime_ns, size_bytes)| {
                    deps.cache
                        .is_file_processed(path, mtime_ns, size_bytes)
                        .unwrap_or(false)
                })
            })
        {
            return Ok(PipelineOutcome::Skipped {
                reason: "directory_already_processed".to_string(),
            });
        }
    }

    // Stage 3: initialize from cache.
    let mut forced_release_key = deps.cache.get_directory_release(&directory)?;
    let mut forced_release_score = 1.0;
    if forced_release_key.is_none() {
        if let Some(hash) = current_hash {
            if let Some((key, score)) = deps.cache.get_hash_release(hash)? {
                forced_release_key = Some(key);
                forced_release_score = score;
            }
        }
    }

    // Stage 4: analyze.
    let dir_track_count = batch.file_paths.len();
    let directory_year = infer_directory_year(&directory);
    let is_singleton = dir_track_count <= 1;

    // Stage 5: per-track enrichment.
    let mut pending_results = Vec::with_capacity(batch.file_paths.len());
    for path in &batch.file_paths {
        let (mut meta, existing_tags) = match deps.tag_reader.read_tags(path) {
            Ok(result) => result,
            Err(err) => {
                log::warn!("Failed to read tags for {}: {}", path.display(), err);
                continue;
            }
        };
        for provider in deps.providers {
            match provider.enrich(&mut meta).await {
                Ok(true) => break,
                Ok(false) => continue,
                Err(err) => {
                    log::warn!("{} enrichment failed for {}: {}", provider.name(), path.display(), err);
                }
            }
        }
        deps.classical.adapt_metadata(&mut meta);
        pending_results.push(PendingResult::new(meta, existing_tags));
    }

    if pending_results.is_empty() {
        return Ok(PipelineOutcome::Skipped {
            reason: "no_readable_tracks".to_string(),
        });
    }

    // Stage 5b: classical performer-credits review.
    if deps
        .classical
        .should_review_credits(&deps.classical_credits, pending_results.iter().map(|p| &p.meta))
    {
        let reason = "classical_credits_review";
        deps.cache.defer_prompt(&directory, reason)?;
        audit::record(deps.cache, &directory, &AuditEvent::Deferred { reason })?;
        return Ok(PipelineOutcome::Deferred {
            reason: reason.to_string(),
        });
    }

    // Stage 6-7: candidate sources + score adjustment.
    let mut candidates: HashMap<String, ReleaseData> = HashMap::new();
    let mut scores: HashMap<String, f64> = HashMap::new();
    let mut examples: HashMap<String, ReleaseExample> = HashMap::new();

    if let Some(key) = &forced_release_key {
        if let Some((provider_name, release_id)) = split_release_key(key) {
            if let Some(provider) = deps.providers.iter().find(|p| p.name() == provider_name) {
                if let Ok(Some(release)) = provider.get_release(release_id).await {
                    scores.insert(key.clone(), forced_release_score);
                    examples.insert(
                        key.clone(),
                        ReleaseExample {
                            provider: provider.name(),
                            release_key: key.clone(),
                            summary: summarize_release(&release),
                            score: forced_release_score,
                        },
                    );
                    candidates.insert(key.clone(), release);
                }
            }
        }
    }

    for provider in deps.providers {
        let found = match provider.search_release_candidates(&pending_results, &directory).await {
            Ok(found) => found,
            Err(err) => {
                log::warn!("{} candidate search failed: {}", provider.name(), err);
                continue;
            }
        };
        for candidate in found {
            let directory_name_flag_match =
                directory_name_flag_matches(&directory, candidate.release.album_title.as_deref());
            let input = ScoringInput {
                release: &candidate.release,
                pending_results: &pending_results,
                directory_year,
                directory_name_flag_match,
            };
            let adjusted = adjust_release_score(candidate.base_score, &input);
            scores.insert(candidate.release_key.clone(), adjusted);
            examples.insert(
                candidate.release_key.clone(),
                ReleaseExample {
                    provider: provider.name(),
                    release_key: candidate.release_key.clone(),
                    summary: candidate.summary,
                    score: adjusted,
                },
            );
            candidates.insert(candidate.release_key, candidate.release);
        }
    }

    // Stage 8: release decision.
    let singleton_home_key = if is_singleton {
        candidates.keys().find_map(|key| {
            let score = scores.get(key).copied().unwrap_or(0.0);
            select_singleton_home(
                deps.cache,
                key,
                &directory,
                score,
                crate::scoring::release_match_coverage(&candidates[key], &pending_results),
                deps.count_audio_files,
            )
            .ok()
            .flatten()
            .map(|_| key.clone())
        })
    } else {
        None
    };

    let decision = decide(&candidates, &scores, &pending_results, singleton_home_key.as_deref());

    let resolved_key = match resolve_decision(deps, &directory, decision, &examples, force_prompt)? {
        Resolution::Decided(key) if candidates.contains_key(&key) || scores.contains_key(&key) => key,
        Resolution::Decided(_) => {
            return Ok(PipelineOutcome::Skipped {
                reason: "decided_release_vanished".to_string(),
            })
        }
        Resolution::Deferred(reason) => return Ok(PipelineOutcome::Deferred { reason }),
        Resolution::Skipped(reason) => return Ok(PipelineOutcome::Skipped { reason }),
    };

    let Some(mut release) = candidates.remove(&resolved_key) else {
        return Ok(PipelineOutcome::Skipped {
            reason: "decided_release_vanished".to_string(),
        });
    };
    let final_score = scores.get(&resolved_key).copied().unwrap_or(0.0);

    // Stage 9: finalize release.
    let Some((provider_name, _)) = split_release_key(&resolved_key) else {
        return Ok(PipelineOutcome::Skipped {
            reason: "malformed_release_key".to_string(),
        });
    };
    if let Some(provider) = deps.providers.iter().find(|p| p.name() == provider_name) {
        for pending in &mut pending_results {
            let _ = provider.supplement(&mut pending.meta, &release).await;
        }
    }

    deps.cache.set_directory_release(&directory, &resolved_key)?;
    if let Some(sample) = pending_results.first() {
        if let (Some(artist), Some(album)) = (
            sample.meta.album_artist.as_deref().or(sample.meta.artist.as_deref()),
            sample.meta.album.as_deref(),
        ) {
            deps.cache.set_hint_release(&hint_key(artist, album), &resolved_key)?;
        }
    }

    audit::record(
        deps.cache,
        &directory,
        &AuditEvent::Decided {
            release_key: &resolved_key,
            score: final_score,
        },
    )?;

    // Stage 10: assign tracks.
    assign_tracks(provider_name, &mut pending_results, &mut release);

    // Stage 11: unmatched policy.
    let unmatched = pending_results.iter().filter(|p| !p.matched).count();
    if unmatched > 0 {
        log::info!(
            "{} of {} tracks unmatched in {}",
            unmatched,
            pending_results.len(),
            directory.display()
        );
    }

    // Stage 12: plan construction.
    let mut plans = Vec::new();
    for pending in pending_results {
        let desired = desired_tags(&pending.meta);
        let tag_changes = diff_tags(&desired, &pending.existing_tags);
        let target_path = deps.organizer.target_path(&pending.meta);
        if let Some(plan) = build_plan(pending.meta, pending.score.unwrap_or(final_score), tag_changes, target_path)
        {
            plans.push(plan);
        }
    }

    if plans.is_empty() {
        finalize_directory(deps, &directory, current_hash, &resolved_key, final_score)?;
        maybe_set_release_home(
            deps.cache,
            &resolved_key,
            &directory,
            dir_track_count,
            current_hash,
            deps.count_audio_files,
        )?;
        return Ok(PipelineOutcome::NoChanges);
    }

    // Stage 14: apply.
    let mut outcomes = Vec::new();
    if deps.dry_run {
        let journal_path = deps.journal_path.ok_or_else(|| crate::error::Error::PlanApplyFailed {
            path: directory.clone(),
            reason: "dry run requested with no journal path configured".to_string(),
        })?;
        for plan in &plans {
            record_dry_run(journal_path, plan)?;
        }
    } else {
        for plan in &plans {
            let outcome = apply(deps.cache, deps.tag_writer, plan)?;
            match &outcome {
                ApplyOutcome::Applied { final_path } => {
                    audit::record(deps.cache, &directory, &AuditEvent::Applied { final_path })?;
                }
                ApplyOutcome::RolledBack { reason } => {
                    audit::record(deps.cache, &directory, &AuditEvent::RolledBack { reason })?;
                }
            }
            outcomes.push(outcome);
        }
    }

    // Stage 15: finalize directory.
    finalize_directory(deps, &directory, current_hash, &resolved_key, final_score)?;
    maybe_set_release_home(
        deps.cache,
        &resolved_key,
        &directory,
        dir_track_count,
        current_hash,
        deps.count_audio_files,
    )?;

    Ok(PipelineOutcome::Applied(outcomes))
}

/// How a release decision resolved after the prompt/defer step.
enum Resolution {
    /// A release key to proceed with.
    Decided(String),
    /// Deferred for later interactive resolution; recorded in the deferred-prompt queue.
    Deferred(String),
    /// Skipped outright, with a reason.
    Skipped(String),
}

/// Look up a candidate's [`ReleaseExample`], falling back to the bare release key as its own
/// summary with a zero score if the candidate somehow fell out of the `examples` map between the
/// scoring and decision stages.
fn example_or_fallback(examples: &HashMap<String, ReleaseExample>, key: &str) -> ReleaseExample {
    examples.get(key).cloned().unwrap_or_else(|| {
        let provider = split_release_key(key).map_or("unknown", |(provider, _)| provider);
        ReleaseExample {
            provider: match provider {
                "musicbrainz" => "musicbrainz",
                "discogs" => "discogs",
                _ => "unknown",
            },
            release_key: key.to_string(),
            summary: key.to_string(),
            score: 0.0,
        }
    })
}

fn resolve_decision(
    deps: &PipelineDeps<'_>,
    directory: &Path,
    decision: Decision,
    examples: &HashMap<String, ReleaseExample>,
    force_prompt: bool,
) -> crate::error::Result<Resolution> {
    match decision {
        Decision::Decided { release_key } => Ok(Resolution::Decided(release_key)),
        Decision::NoCandidates => {
            resolve_via_prompt(deps, directory, &[], "no_release_candidates", force_prompt)
        }
        Decision::LowCoverage { release_key, coverage } => {
            log::info!(
                "Low coverage ({:.2}) for {} candidate {}",
                coverage,
                directory.display(),
                release_key
            );
            let option = example_or_fallback(examples, &release_key);
            resolve_via_prompt(deps, directory, &[option], "low_coverage", force_prompt)
        }
        Decision::Ambiguous { candidates: keys } => {
            let options: Vec<ReleaseExample> = keys
                .iter()
                .map(|key| example_or_fallback(examples, key))
                .collect();
            resolve_via_prompt(deps, directory, &options, "ambiguous", force_prompt)
        }
    }
}

fn resolve_via_prompt(
    deps: &PipelineDeps<'_>,
    directory: &Path,
    candidates: &[ReleaseExample],
    defer_reason: &str,
    force_prompt: bool,
) -> crate::error::Result<Resolution> {
    if deps.interactive || force_prompt {
        let Some(prompt) = deps.prompt else {
            return Ok(Resolution::Skipped("no_prompt_capability".to_string()));
        };
        let options: Vec<PromptOption> = candidates
            .iter()
            .map(|example| PromptOption {
                release_key: example.release_key.clone(),
                label: example.summary.clone(),
                score: example.score,
            })
            .collect();
        return match prompt.select_release(&directory.display().to_string(), &options) {
            PromptOutcome::Selected { release_key } | PromptOutcome::Forced { release_id: release_key, .. } => {
                audit::record(deps.cache, directory, &AuditEvent::UserSelected { release_key: &release_key })?;
                Ok(Resolution::Decided(release_key))
            }
            PromptOutcome::Skip => Ok(Resolution::Skipped("user_skipped".to_string())),
            PromptOutcome::Delete | PromptOutcome::Archive => {
                deps.cache.ignore_directory(directory, "archived_or_deleted")?;
                Ok(Resolution::Skipped("archived_or_deleted".to_string()))
            }
            PromptOutcome::Ignore => {
                deps.cache.ignore_directory(directory, "user request")?;
                Ok(Resolution::Skipped("user_request".to_string()))
            }
        };
    }

    if deps.defer_prompts {
        deps.cache.defer_prompt(directory, defer_reason)?;
        audit::record(deps.cache, directory, &AuditEvent::Deferred { reason: defer_reason })?;
        return Ok(Resolution::Deferred(defer_reason.to_string()));
    }
    Ok(Resolution::Skipped(defer_reason.to_string()))
}

fn assign_tracks(provider_name: &str, pending_results: &mut [PendingResult], release: &mut ReleaseData) {
    let policy = if provider_name == "discogs" {
        AssignmentPolicy::DISCOGS
    } else {
        AssignmentPolicy::MUSICBRAINZ
    };

    let matrix = if provider_name == "discogs" {
        let tracks: Vec<DiscogsTrack> = release
            .tracks
            .iter()
            .map(|t| DiscogsTrack {
                position: None,
                track_number: t.number,
                title: t.title.clone(),
                duration_seconds: t.duration_seconds,
            })
            .collect();
        build_discogs_score_matrix(pending_results, &tracks)
    } else {
        build_musicbrainz_score_matrix(pending_results, release)
    };

    let assignment = best_assignment_max_score(&matrix, policy.dummy_score);
    for (row, column) in assignment.into_iter().enumerate() {
        let Some(column) = column else { continue };
        let score = matrix[row][column];
        if score < policy.accept_threshold {
            continue;
        }
        let Some((recording_id, number, disc_number)) = release
            .tracks
            .get(column)
            .map(|track| (track.recording_id.clone(), track.number, track.disc_number))
        else {
            continue;
        };
        if let Some(recording_id) = &recording_id {
            if release.is_claimed(recording_id) {
                continue;
            }
            release.mark_claimed(recording_id.clone());
        }

        let pending = &mut pending_results[row];
        pending.matched = true;
        pending.score = Some(score);
        if pending.meta.track_number.is_none() {
            pending.meta.track_number = number;
        }
        if pending.meta.disc_number.is_none() {
            pending.meta.disc_number = disc_number;
        }
    }
}

fn desired_tags(meta: &TrackMetadata) -> HashMap<String, String> {
    let mut tags = HashMap::new();
    if let Some(title) = &meta.title {
        tags.insert("title".to_string(), title.clone());
    }
    if let Some(album) = &meta.album {
        tags.insert("album".to_string(), album.clone());
    }
    if let Some(artist) = &meta.artist {
        tags.insert("artist".to_string(), artist.clone());
    }
    if let Some(album_artist) = &meta.album_artist {
        tags.insert("album_artist".to_string(), album_artist.clone());
    }
    if let Some(number) = meta.track_number {
        tags.insert("track_number".to_string(), number.to_string());
    }
    if let Some(number) = meta.disc_number {
        tags.insert("disc_number".to_string(), number.to_string());
    }
    tags
}

fn finalize_directory(
    deps: &PipelineDeps<'_>,
    directory: &Path,
    current_hash: Option<DirectoryHash>,
    resolved_key: &str,
    score: f64,
) -> crate::error::Result<()> {
    if let Some(hash) = current_hash {
        deps.cache.set_directory_hash(directory, hash)?;
        deps.cache.set_hash_release(hash, resolved_key, score)?;
    }
    deps.cache.set_directory_release(directory, resolved_key)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_directory_year_from_own_name() {
        let year = infer_directory_year(Path::new("/music/Artist/1999 - Album"));
        assert_eq!(year, Some(1999));
    }

    #[test]
    fn test_infer_directory_year_none_when_absent() {
        let year = infer_directory_year(Path::new("/music/Artist/Album"));
        assert_eq!(year, None);
    }

    #[test]
    fn test_directory_name_flag_matches_shared_keyword() {
        let directory = Path::new("/music/Artist/Album (Deluxe Edition)");
        assert!(directory_name_flag_matches(directory, Some("Album (Deluxe)")));
        assert!(!directory_name_flag_matches(directory, Some("Album")));
        assert!(!directory_name_flag_matches(directory, None));
    }

    #[test]
    fn test_desired_tags_only_includes_set_fields() {
        let mut meta = TrackMetadata::new("/a.flac");
        meta.title = Some("Song".to_string());
        let tags = desired_tags(&meta);
        assert_eq!(tags.get("title"), Some(&"Song".to_string()));
        assert!(!tags.contains_key("album"));
    }

    #[test]
    fn test_example_or_fallback_prefers_summary_over_raw_key() {
        let mut examples = HashMap::new();
        examples.insert(
            "musicbrainz:r1".to_string(),
            ReleaseExample {
                provider: "musicbrainz",
                release_key: "musicbrainz:r1".to_string(),
                summary: "Artist - Album (1999, CD, 10 tracks)".to_string(),
                score: 0.87,
            },
        );

        let found = example_or_fallback(&examples, "musicbrainz:r1");
        assert_eq!(found.summary, "Artist - Album (1999, CD, 10 tracks)");
        assert_eq!(found.score, 0.87);

        let missing = example_or_fallback(&examples, "discogs:r9");
        assert_eq!(missing.summary, "discogs:r9");
        assert_eq!(missing.score, 0.0);
    }
}
