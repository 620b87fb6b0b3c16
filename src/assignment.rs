// Copyright (c) 2024 Jan Holthuis <jan.holthuis@rub.de>
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a copy
// of the MPL was not distributed with this file, You can obtain one at
// http://mozilla.org/MPL/2.0/.
//
// SPDX-License-Identifier: MPL-2.0

//! Track-to-release assignment via the Hungarian algorithm.
//!
//! Builds a score matrix (one row per pending file, one column per release track), pads it to
//! square with a dummy score so unmatched rows/columns are assignable without distorting the
//! optimal solution, then finds the maximum-score assignment.

use crate::distance::{duration_similarity, normalize_title_for_match, title_similarity};
use crate::model::{PendingResult, ReleaseData, ReleaseTrack};

/// Since the `hungarian` crate minimizes non-negative integer costs, scores (which are in `[0,
/// 1]`, higher is better) are converted to costs via `cost = SCALE - round(score * SCALE)`.
const SCORE_PRECISION_FACTOR: f64 = 100_000.0;

/// Find the assignment of rows to columns that maximizes total score.
///
/// `scores[row][col]` must be in `[0, 1]`. The matrix is padded to square with `dummy_score`
/// before solving, so that every row always receives an assignment (possibly to a padding
/// column, which the caller recognizes via the returned index being out of the original bounds).
///
/// Returns one entry per input row: `Some(col)` if assigned to a real column, `None` if the
/// number of rows exceeds the number of columns and this row was left unmatched.
#[must_use]
pub fn best_assignment_max_score(scores: &[Vec<f64>], dummy_score: f64) -> Vec<Option<usize>> {
    let rows = scores.len();
    if rows == 0 {
        return Vec::new();
    }
    let cols = scores[0].len();
    debug_assert!(scores.iter().all(|row| row.len() == cols));

    if cols == 0 {
        return vec![None; rows];
    }

    let size = rows.max(cols);
    let mut padded = vec![0u64; size * size];
    for (r, row) in padded.chunks_mut(size).enumerate() {
        for (c, cell) in row.iter_mut().enumerate() {
            let score = if r < rows && c < cols {
                scores[r][c]
            } else {
                dummy_score
            };
            *cell = score_to_cost(score);
        }
    }

    let assignment = hungarian::minimize(&padded, size, size);
    assignment
        .into_iter()
        .take(rows)
        .map(|col| col.filter(|&c| c < cols))
        .collect()
}

/// Convert a score in `[0, 1]` into a non-negative integer cost for the Hungarian solver: higher
/// score means lower cost.
fn score_to_cost(score: f64) -> u64 {
    let clamped = score.clamp(0.0, 1.0);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let scaled = (clamped * SCORE_PRECISION_FACTOR).round() as u64;
    (SCORE_PRECISION_FACTOR as u64).saturating_sub(scaled)
}

/// Acceptance threshold and dummy-padding score for a provider's track assignment pass.
#[derive(Debug, Clone, Copy)]
pub struct AssignmentPolicy {
    /// Score assigned to padding cells, roughly "no real track fits here".
    pub dummy_score: f64,
    /// Minimum score required to accept an assignment; below this the row is left unmatched.
    pub accept_threshold: f64,
}

/// MusicBrainz track assignment scoring weights, exactly as tuned against the original service.
impl AssignmentPolicy {
    /// Policy used for MusicBrainz release track assignment.
    pub const MUSICBRAINZ: Self = Self {
        dummy_score: 0.62,
        accept_threshold: 0.63,
    };

    /// Policy used for Discogs release track assignment.
    pub const DISCOGS: Self = Self {
        dummy_score: 0.55,
        accept_threshold: 0.58,
    };
}

/// Build the MusicBrainz score matrix: rows are `pending_results`, columns are
/// `release_data.tracks`.
///
/// An exact `musicbrainz_track_id` match short-circuits to a score of `1.0`, since a
/// fingerprint- or prior-match-sourced recording ID is considered ground truth (see the
/// fingerprint-mismatch open question in `DESIGN.md`).
#[must_use]
pub fn build_musicbrainz_score_matrix(
    pending_results: &[PendingResult],
    release_data: &ReleaseData,
) -> Vec<Vec<f64>> {
    pending_results
        .iter()
        .map(|pending| musicbrainz_row(pending, &release_data.tracks))
        .collect()
}

fn musicbrainz_row(pending: &PendingResult, tracks: &[ReleaseTrack]) -> Vec<f64> {
    let meta = &pending.meta;
    let title = meta.title.clone().unwrap_or_default();
    let title_norm = normalize_title_for_match(&title);

    tracks
        .iter()
        .map(|track| {
            if let (Some(meta_id), Some(track_id)) =
                (&meta.musicbrainz_track_id, &track.recording_id)
            {
                if meta_id == track_id {
                    return 1.0;
                }
            }

            let mut score = 0.0;

            if let (Some(track_number), Some(number)) = (meta.track_number, track.number) {
                let diff = track_number.abs_diff(number);
                score += match diff {
                    0 => 0.62,
                    1 => 0.28,
                    2 => 0.12,
                    _ => 0.0,
                };
            }

            if let (Some(disc_number), Some(track_disc)) = (meta.disc_number, track.disc_number) {
                if disc_number == track_disc {
                    score += 0.08;
                } else {
                    score -= 0.04;
                }
            }

            if let Some(track_title) = &track.title {
                if !title_norm.is_empty() {
                    if let Some(ratio) = title_similarity(&title_norm, track_title) {
                        score += 0.25 * ratio;
                        if ratio >= 0.98 {
                            score += 0.45;
                        }
                    }
                } else if !title.is_empty() {
                    if let Some(ratio) = title_similarity(&title, track_title) {
                        score += 0.2 * ratio;
                    }
                }
            }

            if let Some(ratio) = duration_similarity(meta.duration_seconds, track.duration_seconds)
            {
                score += 0.05 * ratio;
            }

            score.clamp(0.0, 1.0)
        })
        .collect()
}

/// A track from a Discogs release tracklist, pre-parsed from the provider's raw track listing.
#[derive(Debug, Clone)]
pub struct DiscogsTrack {
    /// Raw position string as reported by Discogs (e.g. `"A1"`, `"2"`).
    pub position: Option<String>,
    /// Parsed numeric track position, if `position` could be interpreted as one.
    pub track_number: Option<u32>,
    /// Track title.
    pub title: Option<String>,
    /// Duration in seconds, parsed from Discogs' `"mm:ss"` string.
    pub duration_seconds: Option<u32>,
}

/// Build the Discogs score matrix: rows are `pending_results`, columns are `tracks`.
#[must_use]
pub fn build_discogs_score_matrix(
    pending_results: &[PendingResult],
    tracks: &[DiscogsTrack],
) -> Vec<Vec<f64>> {
    pending_results
        .iter()
        .map(|pending| discogs_row(pending, tracks))
        .collect()
}

fn discogs_row(pending: &PendingResult, tracks: &[DiscogsTrack]) -> Vec<f64> {
    let meta = &pending.meta;
    let title = meta.title.clone().unwrap_or_default();
    let title_norm = normalize_title_for_match(&title);
    let title_for_match = if title_norm.is_empty() { &title } else { &title_norm };

    tracks
        .iter()
        .map(|track| {
            let mut score = 0.0;

            if let (Some(track_number), Some(pos)) = (meta.track_number, track.track_number) {
                let diff = track_number.abs_diff(pos);
                score += match diff {
                    0 => 0.6,
                    1 => 0.25,
                    2 => 0.1,
                    _ => 0.0,
                };
            }

            if let Some(track_title) = &track.title {
                if let Some(ratio) = title_similarity(title_for_match, track_title) {
                    score += 0.3 * ratio;
                }
            }

            if let Some(ratio) = duration_similarity(meta.duration_seconds, track.duration_seconds)
            {
                score += 0.1 * ratio;
            }

            score.clamp(0.0, 1.0)
        })
        .collect()
}

/// Parse a Discogs duration string (`"mm:ss"`) into whole seconds.
#[must_use]
pub fn parse_discogs_duration(value: &str) -> Option<u32> {
    let (minutes, seconds) = value.split_once(':')?;
    let minutes: u32 = minutes.trim().parse().ok()?;
    let seconds: u32 = seconds.trim().parse().ok()?;
    Some(minutes * 60 + seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TrackMetadata;
    use std::collections::HashMap;

    fn pending(title: &str, track_number: Option<u32>) -> PendingResult {
        let mut meta = TrackMetadata::new(format!("/music/{title}.flac"));
        meta.title = Some(title.to_string());
        meta.track_number = track_number;
        PendingResult::new(meta, HashMap::new())
    }

    fn track(number: u32, title: &str) -> ReleaseTrack {
        ReleaseTrack {
            recording_id: None,
            disc_number: None,
            number: Some(number),
            title: Some(title.to_string()),
            duration_seconds: None,
        }
    }

    #[test]
    fn test_best_assignment_identity() {
        let scores = vec![
            vec![1.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.0, 0.0, 1.0],
        ];
        let assignment = best_assignment_max_score(&scores, 0.1);
        assert_eq!(assignment, vec![Some(0), Some(1), Some(2)]);
    }

    #[test]
    fn test_best_assignment_prefers_higher_score() {
        let scores = vec![vec![0.9, 0.1], vec![0.2, 0.8]];
        let assignment = best_assignment_max_score(&scores, 0.0);
        assert_eq!(assignment, vec![Some(0), Some(1)]);
    }

    #[test]
    fn test_best_assignment_more_rows_than_columns_leaves_one_unmatched() {
        let scores = vec![vec![0.9], vec![0.1]];
        let assignment = best_assignment_max_score(&scores, 0.5);
        assert_eq!(assignment[0], Some(0));
        assert_eq!(assignment[1], None);
    }

    #[test]
    fn test_musicbrainz_score_matrix_track_number_dominates() {
        let pending_results = vec![pending("Song A", Some(1)), pending("Song B", Some(2))];
        let release = ReleaseData {
            release_id: "r1".into(),
            album_title: None,
            album_artist: None,
            release_date: None,
            disc_count: None,
            formats: vec![],
            tracks: vec![track(1, "Song A"), track(2, "Song B")],
            claimed: Default::default(),
        };
        let matrix = build_musicbrainz_score_matrix(&pending_results, &release);
        assert!(matrix[0][0] > matrix[0][1]);
        assert!(matrix[1][1] > matrix[1][0]);

        let assignment =
            best_assignment_max_score(&matrix, AssignmentPolicy::MUSICBRAINZ.dummy_score);
        assert_eq!(assignment, vec![Some(0), Some(1)]);
    }

    #[test]
    fn test_exact_recording_id_short_circuits() {
        let mut meta = TrackMetadata::new("/music/a.flac");
        meta.musicbrainz_track_id = Some("rec-1".into());
        let pending_results = vec![PendingResult::new(meta, HashMap::new())];
        let release = ReleaseData {
            release_id: "r1".into(),
            album_title: None,
            album_artist: None,
            release_date: None,
            disc_count: None,
            formats: vec![],
            tracks: vec![ReleaseTrack {
                recording_id: Some("rec-1".into()),
                disc_number: None,
                number: Some(5),
                title: Some("Totally Different Title".into()),
                duration_seconds: None,
            }],
            claimed: Default::default(),
        };
        let matrix = build_musicbrainz_score_matrix(&pending_results, &release);
        assert_eq!(matrix[0][0], 1.0);
    }

    #[test]
    fn test_parse_discogs_duration() {
        assert_eq!(parse_discogs_duration("3:45"), Some(225));
        assert_eq!(parse_discogs_duration("bogus"), None);
    }
}
