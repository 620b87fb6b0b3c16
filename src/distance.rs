// Copyright (c) 2024 Jan Holthuis <jan.holthuis@rub.de>
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a copy
// of the MPL was not distributed with this file, You can obtain one at
// http://mozilla.org/MPL/2.0/.
//
// SPDX-License-Identifier: MPL-2.0

//! String and duration similarity used by scoring and track assignment.

use std::cmp;

use levenshtein::levenshtein;
use unidecode::unidecode;

/// Normalize a title for matching: ASCII-fold, lowercase, strip punctuation, collapse
/// whitespace.
#[must_use]
pub fn normalize_title_for_match(value: &str) -> String {
    let mut folded = unidecode(value);
    folded.make_ascii_lowercase();

    let mut out = String::with_capacity(folded.len());
    let mut last_was_space = false;
    for ch in folded.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch);
            last_was_space = false;
        } else if !last_was_space {
            out.push(' ');
            last_was_space = true;
        }
    }
    out.trim().to_string()
}

/// Similarity between two titles in `[0, 1]`, where `1.0` means identical after normalization.
///
/// Both inputs are normalized with [`normalize_title_for_match`] before comparing, so punctuation,
/// case and diacritics never affect the result.
#[must_use]
pub fn title_similarity(lhs: &str, rhs: &str) -> Option<f64> {
    if lhs.is_empty() || rhs.is_empty() {
        return None;
    }
    let lhs_norm = normalize_title_for_match(lhs);
    let rhs_norm = normalize_title_for_match(rhs);
    if lhs_norm.is_empty() || rhs_norm.is_empty() {
        return None;
    }
    if lhs_norm == rhs_norm {
        return Some(1.0);
    }

    let distance = levenshtein(&lhs_norm, &rhs_norm);
    let max_len = cmp::max(lhs_norm.chars().count(), rhs_norm.chars().count());
    if max_len == 0 {
        return Some(1.0);
    }
    #[allow(clippy::cast_precision_loss)]
    let ratio = 1.0 - (distance as f64 / max_len as f64);
    Some(ratio.clamp(0.0, 1.0))
}

/// Similarity between two durations (in seconds) in `[0, 1]`.
///
/// `None` if either duration is missing or zero (a zero-length track can't meaningfully be
/// compared by relative difference).
#[must_use]
pub fn duration_similarity(lhs: Option<u32>, rhs: Option<u32>) -> Option<f64> {
    let (lhs, rhs) = (lhs?, rhs?);
    if lhs == 0 || rhs == 0 {
        return None;
    }
    let diff = lhs.abs_diff(rhs);
    let max = cmp::max(lhs, rhs);
    #[allow(clippy::cast_precision_loss)]
    let ratio = 1.0 - (f64::from(diff) / f64::from(max));
    Some(ratio.clamp(0.0, 1.0))
}

/// Combined title+duration similarity used by the per-track match-quality coverage bonus:
/// `0.7 * title + 0.3 * duration`. Missing components fall back to `0.0` for that component
/// rather than excluding the track, since a track with no duration should still be scoreable on
/// title alone.
#[must_use]
pub fn combined_similarity(
    title_lhs: &str,
    title_rhs: &str,
    duration_lhs: Option<u32>,
    duration_rhs: Option<u32>,
) -> f64 {
    let title = title_similarity(title_lhs, title_rhs).unwrap_or(0.0);
    let duration = duration_similarity(duration_lhs, duration_rhs).unwrap_or(0.0);
    0.7 * title + 0.3 * duration
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_eq::assert_float_eq;

    #[test]
    fn test_normalize_strips_punctuation_and_case() {
        assert_eq!(
            normalize_title_for_match("Don't Stop Believin'!"),
            "don t stop believin"
        );
    }

    #[test]
    fn test_title_similarity_identical() {
        assert_float_eq!(
            title_similarity("Hey Jude", "hey   jude").unwrap(),
            1.0,
            abs <= 0.000_1
        );
    }

    #[test]
    fn test_title_similarity_missing() {
        assert_eq!(title_similarity("", "Hey Jude"), None);
    }

    #[test]
    fn test_duration_similarity_exact() {
        assert_float_eq!(
            duration_similarity(Some(180), Some(180)).unwrap(),
            1.0,
            abs <= 0.000_1
        );
    }

    #[test]
    fn test_duration_similarity_partial() {
        let ratio = duration_similarity(Some(100), Some(120)).unwrap();
        assert_float_eq!(ratio, 1.0 - 20.0 / 120.0, abs <= 0.000_1);
    }

    #[test]
    fn test_duration_similarity_missing() {
        assert_eq!(duration_similarity(None, Some(120)), None);
        assert_eq!(duration_similarity(Some(0), Some(120)), None);
    }
}
