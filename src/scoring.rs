// Copyright (c) 2024 Jan Holthuis <jan.holthuis@rub.de>
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a copy
// of the MPL was not distributed with this file, You can obtain one at
// http://mozilla.org/MPL/2.0/.
//
// SPDX-License-Identifier: MPL-2.0

//! Candidate score adjustment: the bonuses and penalties applied to a provider's raw release
//! score before the decision stage sees it.

use std::collections::HashMap;

use itertools::Itertools;
use unicode_normalization::UnicodeNormalization;

use crate::distance::combined_similarity;
use crate::model::{PendingResult, ReleaseData};

/// Inputs available to the scoring stage for one candidate release.
pub struct ScoringInput<'a> {
    /// The release candidate being scored.
    pub release: &'a ReleaseData,
    /// Files in the directory batch, as matched so far.
    pub pending_results: &'a [PendingResult],
    /// Year parsed from the directory name, if any (e.g. from a `"1999 - Album"` layout).
    pub directory_year: Option<i32>,
    /// Whether the directory name carries a flag matching this release (e.g. `"(Deluxe
    /// Edition)"` matching a release tagged as a deluxe edition).
    pub directory_name_flag_match: bool,
}

/// Apply every bonus/penalty to `base_score` and return the adjusted score.
///
/// `base_score` is whatever the provider reported (MusicBrainz's `support_factor`-derived score,
/// or Discogs' flat default of `0.5`).
#[must_use]
pub fn adjust_release_score(base_score: f64, input: &ScoringInput<'_>) -> f64 {
    let mut score = base_score;

    score += track_count_ratio_bonus(input.release.tracks.len(), input.pending_results.len());
    score += year_delta_bonus(input.directory_year, input.release.release_date.as_deref());

    if input.directory_name_flag_match {
        score += 0.02;
    }

    score += tag_overlap_bonus(input);
    score += release_match_quality_bonus(input);

    score
}

/// Bonus/penalty based on how closely the release's track count matches the number of files in
/// the directory.
fn track_count_ratio_bonus(release_track_count: usize, pending_count: usize) -> f64 {
    if release_track_count == 0 || pending_count == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let ratio = (release_track_count.min(pending_count) as f64)
        / (release_track_count.max(pending_count) as f64);

    if ratio >= 0.95 {
        0.08
    } else if ratio >= 0.85 {
        0.05
    } else if ratio >= 0.7 {
        0.02
    } else if ratio <= 0.4 {
        -0.12
    } else if ratio <= 0.55 {
        -0.07
    } else {
        0.0
    }
}

/// Bonus/penalty based on the delta between the directory's inferred year and the release date.
fn year_delta_bonus(directory_year: Option<i32>, release_date: Option<&str>) -> f64 {
    let directory_year = match directory_year {
        Some(y) => y,
        None => return 0.0,
    };
    let release_year: Option<i32> = release_date.and_then(|date| date.get(0..4)?.parse().ok());
    let release_year = match release_year {
        Some(y) => y,
        None => return 0.0,
    };

    match (directory_year - release_year).abs() {
        0 => 0.035,
        1 => 0.015,
        d if d >= 3 => -0.03,
        _ => 0.0,
    }
}

/// Aggregate the tag hints (existing tag values read from files before provider enrichment) for
/// a given field across all pending results, so that a consensus value can be derived.
fn aggregated_tag_hints<'a>(
    pending_results: &'a [PendingResult],
    field: &str,
) -> Vec<&'a str> {
    pending_results
        .iter()
        .filter_map(|p| p.existing_tags.get(field))
        .map(String::as_str)
        .filter(|v| !v.trim().is_empty())
        .collect()
}

/// NFKD-normalize a tag hint value for comparison, stripping leading/trailing whitespace and
/// lowercasing.
fn clean_tag_hint(value: &str) -> String {
    let normalized: String = value.nfkd().collect();
    normalized.trim().to_lowercase()
}

/// Find the dominant (consensus) value among a set of tag hints: the most common cleaned value,
/// if it appears in at least 70% of non-empty hints and at least 2 of them.
fn dominant_value_consensus(hints: &[&str]) -> Option<String> {
    if hints.len() < 2 {
        return None;
    }
    let counts: HashMap<String, usize> = hints
        .iter()
        .map(|h| clean_tag_hint(h))
        .filter(|h| !h.is_empty())
        .counts();

    let total: usize = counts.values().sum();
    if total < 2 {
        return None;
    }

    let (value, count) = counts.into_iter().max_by_key(|(_, count)| *count)?;
    #[allow(clippy::cast_precision_loss)]
    let ratio = count as f64 / total as f64;
    if ratio >= 0.7 && count >= 2 {
        Some(value)
    } else {
        None
    }
}

/// Bonus/penalty for how well the release's fields agree with the tag-hint consensus, clamped to
/// `[-0.05, 0.05]`.
fn tag_overlap_bonus(input: &ScoringInput<'_>) -> f64 {
    const FIELDS: [&str; 2] = ["album", "album_artist"];
    const WEIGHT_PER_FIELD: f64 = 0.025;

    let mut delta = 0.0;
    for field in FIELDS {
        let hints = aggregated_tag_hints(input.pending_results, field);
        let Some(consensus) = dominant_value_consensus(&hints) else {
            continue;
        };
        let release_value = match field {
            "album" => input.release.album_title.as_deref(),
            "album_artist" => input.release.album_artist.as_deref(),
            _ => None,
        };
        let Some(release_value) = release_value else {
            continue;
        };
        if clean_tag_hint(release_value) == consensus {
            delta += WEIGHT_PER_FIELD;
        } else {
            delta -= WEIGHT_PER_FIELD;
        }
    }
    delta.clamp(-0.05, 0.05)
}

/// Coverage-weighted match-quality bonus, up to `0.08`.
///
/// Coverage is the fraction of pending files whose title (and duration, if known) align with
/// some track on the release above a `0.6` combined-similarity floor. A release where every file
/// is a plausible textual/duration match to one of its tracks earns the full bonus even before
/// track-to-release assignment runs.
fn release_match_quality_bonus(input: &ScoringInput<'_>) -> f64 {
    if input.pending_results.is_empty() || input.release.tracks.is_empty() {
        return 0.0;
    }

    const MATCH_FLOOR: f64 = 0.6;

    let matched = input
        .pending_results
        .iter()
        .filter(|pending| {
            let title = pending.meta.title.as_deref().unwrap_or_default();
            input.release.tracks.iter().any(|track| {
                let track_title = track.title.as_deref().unwrap_or_default();
                combined_similarity(
                    title,
                    track_title,
                    pending.meta.duration_seconds,
                    track.duration_seconds,
                ) >= MATCH_FLOOR
            })
        })
        .count();

    #[allow(clippy::cast_precision_loss)]
    let coverage = matched as f64 / input.pending_results.len() as f64;
    coverage * 0.08
}

/// Coverage fraction used by the decision stage's low-coverage check: the same computation as
/// [`release_match_quality_bonus`] without the scaling, exposed separately so the decision stage
/// doesn't need to re-derive it from the bonus value.
#[must_use]
pub fn release_match_coverage(release: &ReleaseData, pending_results: &[PendingResult]) -> f64 {
    let input = ScoringInput {
        release,
        pending_results,
        directory_year: None,
        directory_name_flag_match: false,
    };
    release_match_quality_bonus(&input) / 0.08
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ReleaseTrack, TrackMetadata};
    use float_eq::assert_float_eq;
    use std::collections::HashMap;

    fn release_with_tracks(n: usize) -> ReleaseData {
        ReleaseData {
            release_id: "r".into(),
            album_title: Some("Album".into()),
            album_artist: Some("Artist".into()),
            release_date: Some("1999-01-01".into()),
            disc_count: Some(1),
            formats: vec![],
            tracks: (0..n)
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
    fn test_track_count_ratio_exact_match_bonus() {
        assert_float_eq!(track_count_ratio_bonus(10, 10), 0.08, abs <= 0.000_1);
    }

    #[test]
    fn test_track_count_ratio_large_mismatch_penalty() {
        assert_float_eq!(track_count_ratio_bonus(10, 3), -0.12, abs <= 0.000_1);
    }

    #[test]
    fn test_year_delta_bonus() {
        assert_float_eq!(
            year_delta_bonus(Some(1999), Some("1999-03-01")),
            0.035,
            abs <= 0.000_1
        );
        assert_float_eq!(
            year_delta_bonus(Some(1999), Some("2010-03-01")),
            -0.03,
            abs <= 0.000_1
        );
    }

    #[test]
    fn test_dominant_value_consensus_requires_majority_and_min_count() {
        assert_eq!(dominant_value_consensus(&["Album"]), None);
        assert_eq!(
            dominant_value_consensus(&["Album", "Album", "Other"]),
            Some("album".to_string())
        );
        assert_eq!(
            dominant_value_consensus(&["Album", "Other"]),
            None
        );
    }

    #[test]
    fn test_release_match_quality_bonus_full_coverage() {
        let release = release_with_tracks(2);
        let pending_results = vec![pending("Track 0"), pending("Track 1")];
        let input = ScoringInput {
            release: &release,
            pending_results: &pending_results,
            directory_year: None,
            directory_name_flag_match: false,
        };
        assert_float_eq!(release_match_quality_bonus(&input), 0.08, abs <= 0.000_1);
    }

    #[test]
    fn test_adjust_release_score_combines_bonuses() {
        let release = release_with_tracks(2);
        let pending_results = vec![pending("Track 0"), pending("Track 1")];
        let input = ScoringInput {
            release: &release,
            pending_results: &pending_results,
            directory_year: Some(1999),
            directory_name_flag_match: true,
        };
        let score = adjust_release_score(0.5, &input);
        assert!(score > 0.5);
    }
}
