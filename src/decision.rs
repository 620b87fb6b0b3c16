// Copyright (c) 2024 Jan Holthuis <jan.holthuis@rub.de>
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a copy
// of the MPL was not distributed with this file, You can obtain one at
// http://mozilla.org/MPL/2.0/.
//
// SPDX-License-Identifier: MPL-2.0

//! The release-decision state machine: turns a set of scored candidates into a single decision.

use std::collections::HashMap;

use crate::model::{PendingResult, ReleaseData};
use crate::scoring::release_match_coverage;

/// Maximum score gap (relative to the top candidate) within which two candidates are considered
/// ambiguous with each other.
const AMBIGUITY_GAP: f64 = 0.05;

/// Coverage threshold below which a release is considered low-coverage.
const LOW_COVERAGE_THRESHOLD: f64 = 0.7;

/// Minimum fit (coverage) and minimum gap to the runner-up required for the best-fit override to
/// short-circuit an otherwise-ambiguous decision.
const BEST_FIT_MIN_FIT: f64 = 0.92;
const BEST_FIT_MIN_GAP: f64 = 0.07;
const BEST_FIT_MIN_SCORE: f64 = 0.5;

/// The outcome of running the decision cascade for one directory batch.
#[derive(Debug, Clone)]
pub enum Decision {
    /// A single release was decided on, unambiguously.
    Decided {
        /// The chosen release key.
        release_key: String,
    },
    /// Multiple releases remain within the ambiguity gap; the caller should prompt (or, in
    /// non-interactive mode, defer).
    Ambiguous {
        /// Candidate keys within [`AMBIGUITY_GAP`] of the top score, best first.
        candidates: Vec<String>,
    },
    /// The best candidate's file/track coverage is too low to commit to automatically.
    LowCoverage {
        /// The release key that would otherwise have won.
        release_key: String,
        /// The computed coverage fraction.
        coverage: f64,
    },
    /// No usable candidates were found at all.
    NoCandidates,
}

/// Canonical signature used to collapse equivalent releases reported by different providers:
/// normalized title + normalized artist + track count.
fn canonical_signature(release: &ReleaseData) -> (String, String, usize) {
    let title = release
        .album_title
        .as_deref()
        .map(crate::distance::normalize_title_for_match)
        .unwrap_or_default();
    let artist = release
        .album_artist
        .as_deref()
        .map(crate::distance::normalize_title_for_match)
        .unwrap_or_default();
    (title, artist, release.tracks.len())
}

/// Collapse candidates that share a canonical signature, keeping the MusicBrainz-sourced entry
/// (or, if none of the colliding entries are from MusicBrainz, the highest-scored one).
///
/// Returns the collapsed `(release_key, score)` pairs, best score first.
fn collapse_equivalent_releases(
    candidates: &HashMap<String, ReleaseData>,
    scores: &HashMap<String, f64>,
) -> Vec<(String, f64)> {
    let mut groups: HashMap<(String, String, usize), Vec<&str>> = HashMap::new();
    for key in candidates.keys() {
        let release = &candidates[key];
        groups
            .entry(canonical_signature(release))
            .or_default()
            .push(key);
    }

    let mut collapsed: Vec<(String, f64)> = groups
        .into_values()
        .filter_map(|keys| {
            let chosen = keys
                .iter()
                .max_by(|a, b| {
                    let a_is_mb = a.starts_with("musicbrainz:");
                    let b_is_mb = b.starts_with("musicbrainz:");
                    a_is_mb
                        .cmp(&b_is_mb)
                        .then_with(|| {
                            let score_a = scores.get(**a).copied().unwrap_or(f64::MIN);
                            let score_b = scores.get(**b).copied().unwrap_or(f64::MIN);
                            score_a.partial_cmp(&score_b).unwrap_or(std::cmp::Ordering::Equal)
                        })
                })
                .copied()?;
            let score = scores.get(chosen).copied().unwrap_or(f64::MIN);
            Some((chosen.to_string(), score))
        })
        .collect();

    collapsed.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    collapsed
}

/// Run the full decision cascade.
///
/// `singleton_home` is the release key that the release-home cache already associates with this
/// directory (e.g. from a prior run placing a singleton track here). It only overrides the
/// decision once the candidate set is already ambiguous (more than one candidate within
/// [`AMBIGUITY_GAP`] of the top score) and is still among those candidates; an unambiguous
/// clear-winner decision is never overridden by a cached home release.
#[must_use]
pub fn decide(
    candidates: &HashMap<String, ReleaseData>,
    scores: &HashMap<String, f64>,
    pending_results: &[PendingResult],
    singleton_home: Option<&str>,
) -> Decision {
    if candidates.is_empty() {
        return Decision::NoCandidates;
    }

    let collapsed = collapse_equivalent_releases(candidates, scores);
    if collapsed.is_empty() {
        return Decision::NoCandidates;
    }

    let (top_key, top_score) = collapsed[0].clone();
    let ambiguous: Vec<String> = collapsed
        .iter()
        .filter(|(_, score)| top_score - score <= AMBIGUITY_GAP)
        .map(|(key, _)| key.clone())
        .collect();

    if ambiguous.len() > 1 {
        if let Some(home_key) = singleton_home {
            if collapsed.iter().any(|(key, _)| key == home_key) {
                return Decision::Decided {
                    release_key: home_key.to_string(),
                };
            }
        }

        let runner_up_score = collapsed[1].1;
        let gap = top_score - runner_up_score;
        let top_release = &candidates[&top_key];
        let fit = release_match_coverage(top_release, pending_results);

        let is_singleton = pending_results.len() <= 1;
        let best_fit_eligible = fit >= BEST_FIT_MIN_FIT
            && gap >= BEST_FIT_MIN_GAP
            && top_score >= BEST_FIT_MIN_SCORE
            && !is_singleton;

        if !best_fit_eligible {
            return Decision::Ambiguous {
                candidates: ambiguous,
            };
        }
    }

    let top_release = &candidates[&top_key];
    let coverage = release_match_coverage(top_release, pending_results);
    let is_singleton = pending_results.len() <= 1;
    let effective_threshold = if is_singleton {
        // A singleton disables the low-coverage check: there is only one file, so a single
        // title/duration mismatch against a multi-track release would otherwise always trip
        // the floor. Use a negative threshold so it can never fire.
        -1.0
    } else {
        LOW_COVERAGE_THRESHOLD
    };

    if coverage < effective_threshold {
        return Decision::LowCoverage {
            release_key: top_key,
            coverage,
        };
    }

    Decision::Decided {
        release_key: top_key,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ReleaseTrack, TrackMetadata};
    use std::collections::HashMap;

    fn release(id: &str, title: &str, track_count: usize) -> ReleaseData {
        ReleaseData {
            release_id: id.into(),
            album_title: Some(title.into()),
            album_artist: Some("Artist".into()),
            release_date: None,
            disc_count: Some(1),
            formats: vec![],
            tracks: (0..track_count)
                .map(|i| ReleaseTrack {
                    recording_id: None,
                    disc_number: None,
                    number: Some(i as u32 + 1),
                    title: Some(format!("Track {i}")),
                    duration_seconds: Some(200),
                })
                .collect(),
            claimed: Default::default(),
        }
    }

    fn pending(title: &str) -> PendingResult {
        let mut meta = TrackMetadata::new("/x.flac");
        meta.title = Some(title.to_string());
        meta.duration_seconds = Some(200);
        PendingResult::new(meta, HashMap::new())
    }

    #[test]
    fn test_no_candidates() {
        let decision = decide(&HashMap::new(), &HashMap::new(), &[], None);
        assert!(matches!(decision, Decision::NoCandidates));
    }

    #[test]
    fn test_clear_winner_decided() {
        let mut candidates = HashMap::new();
        candidates.insert(
            "musicbrainz:a".to_string(),
            release("a", "Album A", 2),
        );
        candidates.insert(
            "musicbrainz:b".to_string(),
            release("b", "Album B", 2),
        );
        let mut scores = HashMap::new();
        scores.insert("musicbrainz:a".to_string(), 0.9);
        scores.insert("musicbrainz:b".to_string(), 0.3);

        let pending_results = vec![pending("Track 0"), pending("Track 1")];
        let decision = decide(&candidates, &scores, &pending_results, None);
        match decision {
            Decision::Decided { release_key } => assert_eq!(release_key, "musicbrainz:a"),
            other => panic!("expected Decided, got {other:?}"),
        }
    }

    #[test]
    fn test_ambiguous_when_scores_close() {
        let mut candidates = HashMap::new();
        candidates.insert("musicbrainz:a".to_string(), release("a", "Album A", 2));
        candidates.insert("musicbrainz:b".to_string(), release("b", "Album B", 2));
        let mut scores = HashMap::new();
        scores.insert("musicbrainz:a".to_string(), 0.9);
        scores.insert("musicbrainz:b".to_string(), 0.87);

        let pending_results = vec![pending("Track 0"), pending("Track 1")];
        let decision = decide(&candidates, &scores, &pending_results, None);
        assert!(matches!(decision, Decision::Ambiguous { .. }));
    }

    #[test]
    fn test_singleton_home_short_circuits() {
        let mut candidates = HashMap::new();
        candidates.insert("musicbrainz:a".to_string(), release("a", "Album A", 10));
        candidates.insert("musicbrainz:b".to_string(), release("b", "Album B", 10));
        let mut scores = HashMap::new();
        scores.insert("musicbrainz:a".to_string(), 0.5);
        scores.insert("musicbrainz:b".to_string(), 0.52);

        let pending_results = vec![pending("Track 0")];
        let decision = decide(
            &candidates,
            &scores,
            &pending_results,
            Some("musicbrainz:a"),
        );
        match decision {
            Decision::Decided { release_key } => assert_eq!(release_key, "musicbrainz:a"),
            other => panic!("expected Decided, got {other:?}"),
        }
    }

    #[test]
    fn test_singleton_home_does_not_override_clear_winner() {
        let mut candidates = HashMap::new();
        candidates.insert("musicbrainz:a".to_string(), release("a", "Album A", 10));
        candidates.insert("musicbrainz:b".to_string(), release("b", "Album B", 10));
        let mut scores = HashMap::new();
        scores.insert("musicbrainz:a".to_string(), 0.95);
        scores.insert("musicbrainz:b".to_string(), 0.3);

        let pending_results = vec![pending("Track 0")];
        let decision = decide(
            &candidates,
            &scores,
            &pending_results,
            Some("musicbrainz:b"),
        );
        match decision {
            Decision::Decided { release_key } => assert_eq!(release_key, "musicbrainz:a"),
            other => panic!("expected Decided, got {other:?}"),
        }
    }

    #[test]
    fn test_low_coverage_defers() {
        let mut candidates = HashMap::new();
        candidates.insert("musicbrainz:a".to_string(), release("a", "Album A", 10));
        let mut scores = HashMap::new();
        scores.insert("musicbrainz:a".to_string(), 0.9);

        let pending_results = vec![pending("Completely Unrelated"), pending("Also Unrelated")];
        let decision = decide(&candidates, &scores, &pending_results, None);
        assert!(matches!(decision, Decision::LowCoverage { .. }));
    }
}
