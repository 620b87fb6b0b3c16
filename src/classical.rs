// Copyright (c) 2024 Jan Holthuis <jan.holthuis@rub.de>
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a copy
// of the MPL was not distributed with this file, You can obtain one at
// http://mozilla.org/MPL/2.0/.
//
// SPDX-License-Identifier: MPL-2.0

//! Classical-work detection and the credit adaptation/review it drives.
//!
//! A track's genre, title shape, duration and composer/artist split are weighed into a score;
//! above threshold, the track is treated as classical and its credits are reshaped so the
//! composer sits in `album_artist` and the performing musicians sit in `artist`, matching how
//! classical releases are tagged in practice (as opposed to the "artist == the one band" model
//! that works for everything else this crate handles).

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::config::ClassicalConfig;
use crate::model::{normalize_hint_component, TrackMetadata};

fn title_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(symphony|concerto|suite|sonata|opus|op\.)").expect("valid regex")
    })
}

/// Split a joined credit string into individual names, on `;`, `,`, `/` or `&`.
fn split_artist_tokens(value: &str) -> Vec<String> {
    value
        .split([';', ',', '/', '&'])
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// The first token of `value` (see [`split_artist_tokens`]), or the trimmed whole string if it
/// doesn't split into anything.
fn first_token(value: &str) -> Option<String> {
    split_artist_tokens(value).into_iter().next()
}

/// `value` if it's both present and different from `composer` (a present `composer` makes an
/// equal value not count; an absent `composer` makes any present value count).
fn present_and_differs(value: &Option<String>, composer: &Option<String>) -> Option<String> {
    value
        .as_ref()
        .filter(|v| composer.as_deref() != Some(v.as_str()))
        .cloned()
}

/// The outcome of [`ClassicalHeuristics::evaluate`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassicalDecision {
    /// Whether `score` clears the classical threshold (`>= 0.5`).
    pub is_classical: bool,
    /// Weighted score in `[0, 1]`, rounded to 2 decimals.
    pub score: f64,
}

/// Classical-work scoring and credit adaptation.
pub struct ClassicalHeuristics {
    genre_keywords: Vec<String>,
    min_duration_seconds: u32,
}

impl ClassicalHeuristics {
    /// Build heuristics from explicit settings.
    #[must_use]
    pub fn new(genre_keywords: Vec<String>, min_duration_seconds: u32) -> Self {
        Self {
            genre_keywords,
            min_duration_seconds,
        }
    }

    /// Build heuristics from configuration, falling back to the built-in defaults for any unset
    /// field.
    #[must_use]
    pub fn from_config(config: &ClassicalConfig) -> Self {
        Self {
            genre_keywords: config
                .genre_keywords
                .clone()
                .unwrap_or_else(|| vec!["classical".to_string()]),
            min_duration_seconds: config.min_duration_seconds.unwrap_or(180),
        }
    }

    /// Score `meta` against the classical-work heuristic: genre keyword match (+0.4), a
    /// work-shaped title like "Symphony No. 5" (+0.3), duration at or above the configured
    /// floor (+0.2), and a composer distinct from the credited artist (+0.1).
    #[must_use]
    pub fn evaluate(&self, meta: &TrackMetadata) -> ClassicalDecision {
        let mut score = 0.0;
        if let Some(genre) = &meta.genre {
            let lower = genre.to_lowercase();
            if self.genre_keywords.iter().any(|keyword| lower.contains(&keyword.to_lowercase())) {
                score += 0.4;
            }
        }
        if let Some(title) = &meta.title {
            if title_pattern().is_match(title) {
                score += 0.3;
            }
        }
        if let Some(duration) = meta.duration_seconds {
            if duration >= self.min_duration_seconds {
                score += 0.2;
            }
        }
        if let (Some(composer), Some(artist)) = (&meta.composer, &meta.artist) {
            if composer != artist {
                score += 0.1;
            }
        }
        let score = (score * 100.0).round() / 100.0;
        ClassicalDecision {
            is_classical: score >= 0.5,
            score,
        }
    }

    /// Reshape `meta`'s credits into the classical convention (composer in `album_artist`,
    /// performers in `artist`, work title prefixed onto the track title), returning whether any
    /// change was made (i.e. whether `meta` was classical at all).
    pub fn adapt_metadata(&self, meta: &mut TrackMetadata) -> bool {
        if !self.evaluate(meta).is_classical {
            return false;
        }

        if meta.composer.is_none() {
            let inferred = meta
                .album_artist
                .as_deref()
                .and_then(first_token)
                .or_else(|| meta.artist.as_deref().and_then(first_token));
            if let Some(composer) = inferred {
                meta.composer = Some(composer);
            }
        }

        if let Some(composer) = meta.composer.clone() {
            let original_artist = meta.artist.clone();
            let original_album_artist = meta.album_artist.clone();
            meta.album_artist = Some(composer.clone());

            let mut performer_names = meta.performers.clone();
            if let Some(conductor) = meta.conductor.clone() {
                performer_names.push(conductor);
            }
            if performer_names.is_empty() {
                if let Some(album_artist) = present_and_differs(&original_album_artist, &Some(composer.clone())) {
                    performer_names.push(album_artist);
                } else if let Some(artist) = present_and_differs(&original_artist, &Some(composer.clone())) {
                    performer_names.push(artist);
                } else {
                    performer_names.push(original_artist.unwrap_or(composer));
                }
            }
            meta.artist = Some(performer_names.join("; "));
        }

        if let (Some(work), Some(title)) = (meta.work.clone(), meta.title.clone()) {
            if !Self::work_already_in_title(&work, &title) {
                meta.title = Some(format!("{work}: {title}"));
            }
        }

        if !meta.performers.is_empty() {
            meta.extra.insert("PERFORMERS".to_string(), meta.performers.join("; "));
        }
        if let Some(conductor) = &meta.conductor {
            meta.extra.insert("CONDUCTOR".to_string(), conductor.clone());
        }
        true
    }

    fn work_already_in_title(work: &str, title: &str) -> bool {
        let work_norm = normalize_hint_component(work);
        let title_norm = normalize_hint_component(title);
        if work_norm.is_empty() || title_norm.is_empty() {
            return false;
        }
        title_norm.contains(&work_norm)
    }

    /// Gather hint-coverage/consensus statistics across `metas`' classical tracks.
    #[must_use]
    pub fn calculate_credits_stats<'a>(
        &self,
        metas: impl IntoIterator<Item = &'a TrackMetadata>,
    ) -> CreditsStats {
        let classical: Vec<&TrackMetadata> = metas.into_iter().filter(|m| self.evaluate(m).is_classical).collect();

        let mut hints: Vec<String> = Vec::new();
        let mut missing = 0usize;
        for meta in &classical {
            let mut parts: Vec<String> = meta.performers.clone();
            if let Some(album_artist) = present_and_differs(&meta.album_artist, &meta.composer) {
                parts.push(album_artist);
            } else if let Some(artist) = present_and_differs(&meta.artist, &meta.composer) {
                parts.push(artist);
            }
            if let Some(conductor) = present_and_differs(&meta.conductor, &meta.composer) {
                parts.push(conductor);
            }

            let mut unique: Vec<String> = Vec::new();
            for value in &parts {
                for token in split_artist_tokens(value) {
                    if meta.composer.as_deref() == Some(token.as_str()) {
                        continue;
                    }
                    if !unique.iter().any(|u| u == &token) {
                        unique.push(token);
                    }
                }
            }

            if unique.is_empty() {
                missing += 1;
            } else {
                hints.push(unique.join("; "));
            }
        }

        let coverage = if classical.is_empty() {
            1.0
        } else {
            hints.len() as f64 / classical.len() as f64
        };

        let mut counts: HashMap<String, usize> = HashMap::new();
        let mut canonical_to_display: HashMap<String, String> = HashMap::new();
        for hint in &hints {
            let canonical = normalize_hint_component(hint);
            if canonical.is_empty() {
                continue;
            }
            *counts.entry(canonical.clone()).or_insert(0) += 1;
            canonical_to_display.entry(canonical).or_insert_with(|| hint.clone());
        }

        let mut top_hints: Vec<(String, usize)> = counts
            .iter()
            .map(|(canonical, count)| (canonical_to_display[canonical].clone(), *count))
            .collect();
        top_hints.sort_by(|a, b| b.1.cmp(&a.1));
        top_hints.truncate(5);

        let consensus = if !hints.is_empty() && !counts.is_empty() {
            let best = counts.values().copied().max().unwrap_or(0);
            Some(best as f64 / hints.len() as f64)
        } else {
            None
        };

        CreditsStats {
            classical_tracks: classical.len(),
            hinted_tracks: hints.len(),
            missing_hints: missing,
            coverage,
            consensus,
            top_hints,
        }
    }

    /// Whether `metas` (one directory's tracks) warrants a performer-credits review, per
    /// `thresholds`: too few classical tracks to judge at all skips review; below-threshold
    /// coverage, hinted-track count, or consensus all trigger it.
    #[must_use]
    pub fn should_review_credits<'a>(
        &self,
        thresholds: &CreditsReviewThresholds,
        metas: impl IntoIterator<Item = &'a TrackMetadata>,
    ) -> bool {
        let stats = self.calculate_credits_stats(metas);
        if stats.classical_tracks < thresholds.min_tracks {
            return false;
        }
        if stats.coverage < thresholds.min_coverage {
            return true;
        }
        if stats.hinted_tracks < thresholds.min_tracks {
            return true;
        }
        match stats.consensus {
            None => true,
            Some(consensus) => consensus < thresholds.min_consensus,
        }
    }
}

/// Coverage/consensus statistics over one directory's classical tracks.
#[derive(Debug, Clone, PartialEq)]
pub struct CreditsStats {
    /// Number of tracks that scored as classical.
    pub classical_tracks: usize,
    /// Number of classical tracks with at least one performer hint.
    pub hinted_tracks: usize,
    /// Number of classical tracks with no extractable performer hint.
    pub missing_hints: usize,
    /// `hinted_tracks / classical_tracks` (`1.0` if there are no classical tracks).
    pub coverage: f64,
    /// Fraction of hinted tracks that agree on the most common hint, or `None` if there are no
    /// hints at all.
    pub consensus: Option<f64>,
    /// Up to 5 most common hints, most frequent first.
    pub top_hints: Vec<(String, usize)>,
}

/// Thresholds gating [`ClassicalHeuristics::should_review_credits`].
#[derive(Debug, Clone, Copy)]
pub struct CreditsReviewThresholds {
    /// Minimum classical-track count before review applies at all.
    pub min_tracks: usize,
    /// Minimum acceptable hinted/classical coverage ratio.
    pub min_coverage: f64,
    /// Minimum acceptable consensus ratio among hinted tracks.
    pub min_consensus: f64,
}

impl CreditsReviewThresholds {
    /// Build thresholds from configuration, falling back to the built-in defaults for any unset
    /// field.
    #[must_use]
    pub fn from_config(config: &ClassicalConfig) -> Self {
        Self {
            min_tracks: config.credits_min_tracks.unwrap_or(3),
            min_coverage: config.credits_min_coverage.unwrap_or(0.6),
            min_consensus: config.credits_min_consensus.unwrap_or(0.7),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heuristics() -> ClassicalHeuristics {
        ClassicalHeuristics::new(vec!["classical".to_string()], 10)
    }

    fn base_meta() -> TrackMetadata {
        let mut meta = TrackMetadata::new("/music/Chopin/01.flac");
        meta.genre = Some("Classical".to_string());
        meta.title = Some("Etude Op. 10 No. 1".to_string());
        meta.duration_seconds = Some(120);
        meta
    }

    #[test]
    fn test_adapt_metadata_sets_album_artist_to_composer() {
        let mut meta = base_meta();
        meta.artist = Some("Maurizio Pollini".to_string());
        meta.composer = Some("Frédéric Chopin".to_string());

        assert!(heuristics().adapt_metadata(&mut meta));
        assert_eq!(meta.album_artist.as_deref(), Some("Frédéric Chopin"));
    }

    #[test]
    fn test_adapt_metadata_infers_composer_from_album_artist() {
        let mut meta = base_meta();
        meta.artist = Some("Pollini; Chopin".to_string());
        meta.album_artist = Some("Chopin; Pollini".to_string());

        assert!(heuristics().adapt_metadata(&mut meta));
        assert_eq!(meta.composer.as_deref(), Some("Chopin"));
    }

    #[test]
    fn test_adapt_metadata_uses_album_artist_as_performer_when_composer_present() {
        let mut meta = base_meta();
        meta.title = Some("Pavane".to_string());
        meta.album_artist = Some("Martha Argerich".to_string());
        meta.artist = Some("Maurice Ravel".to_string());
        meta.composer = Some("Maurice Ravel".to_string());

        assert!(heuristics().adapt_metadata(&mut meta));
        assert_eq!(meta.album_artist.as_deref(), Some("Maurice Ravel"));
        assert!(meta.artist.as_deref().unwrap().contains("Martha Argerich"));
    }

    #[test]
    fn test_adapt_metadata_prefers_performers_then_conductor() {
        let mut meta = base_meta();
        meta.title = Some("Concerto".to_string());
        meta.composer = Some("Maurice Ravel".to_string());
        meta.album_artist = Some("Maurice Ravel".to_string());
        meta.artist = Some("Maurice Ravel".to_string());
        meta.performers = vec!["Martha Argerich".to_string(), "Berliner Philharmoniker".to_string()];
        meta.conductor = Some("Claudio Abbado".to_string());

        assert!(heuristics().adapt_metadata(&mut meta));
        assert_eq!(
            meta.artist.as_deref(),
            Some("Martha Argerich; Berliner Philharmoniker; Claudio Abbado")
        );
    }

    #[test]
    fn test_non_classical_track_is_not_adapted() {
        let mut meta = TrackMetadata::new("/music/Pop/01.flac");
        meta.genre = Some("Pop".to_string());
        meta.title = Some("Dance Tonight".to_string());
        meta.artist = Some("Some Band".to_string());
        meta.composer = Some("Some Band".to_string());
        meta.duration_seconds = Some(200);

        assert!(!heuristics().adapt_metadata(&mut meta));
        assert_eq!(meta.album_artist, None);
    }

    fn classical_track(path: &str, performers: Vec<&str>, conductor: Option<&str>) -> TrackMetadata {
        let mut meta = TrackMetadata::new(path);
        meta.genre = Some("Classical".to_string());
        meta.title = Some("Symphony".to_string());
        meta.composer = Some("Gustav Mahler".to_string());
        meta.duration_seconds = Some(600);
        meta.performers = performers.into_iter().map(str::to_string).collect();
        meta.conductor = conductor.map(str::to_string);
        meta
    }

    #[test]
    fn test_review_when_missing_performer_hints() {
        let heur = heuristics();
        let mut metas = Vec::new();
        for i in 0..3 {
            let mut meta = classical_track(&format!("/music/a{i}.flac"), vec![], None);
            meta.album_artist = Some("Gustav Mahler".to_string());
            meta.artist = Some("Gustav Mahler".to_string());
            metas.push(meta);
        }
        let thresholds = CreditsReviewThresholds {
            min_tracks: 3,
            min_coverage: 0.6,
            min_consensus: 0.7,
        };

        assert!(heur.should_review_credits(&thresholds, &metas));
        let stats = heur.calculate_credits_stats(&metas);
        assert_eq!(stats.classical_tracks, 3);
        assert_eq!(stats.hinted_tracks, 0);
        assert_eq!(stats.missing_hints, 3);
    }

    #[test]
    fn test_no_review_when_performers_consistent() {
        let heur = heuristics();
        let mut metas = Vec::new();
        for i in 0..3 {
            let mut meta = classical_track(
                &format!("/music/a{i}.flac"),
                vec!["Martha Argerich", "Berliner Philharmoniker"],
                Some("Claudio Abbado"),
            );
            meta.title = Some("Concerto".to_string());
            meta.composer = Some("Maurice Ravel".to_string());
            metas.push(meta);
        }
        let thresholds = CreditsReviewThresholds {
            min_tracks: 3,
            min_coverage: 0.6,
            min_consensus: 0.7,
        };

        assert!(!heur.should_review_credits(&thresholds, &metas));
    }

    #[test]
    fn test_review_when_performers_inconsistent() {
        let heur = heuristics();
        let mut a1 = TrackMetadata::new("/music/a1.flac");
        a1.genre = Some("Classical".to_string());
        a1.title = Some("Etude".to_string());
        a1.composer = Some("Frédéric Chopin".to_string());
        a1.performers = vec!["Maurizio Pollini".to_string()];
        a1.duration_seconds = Some(300);

        let mut a2 = TrackMetadata::new("/music/a2.flac");
        a2.genre = Some("Classical".to_string());
        a2.title = Some("Etude".to_string());
        a2.composer = Some("Frédéric Chopin".to_string());
        a2.performers = vec!["Murray Perahia".to_string()];
        a2.duration_seconds = Some(300);

        let mut a3 = TrackMetadata::new("/music/a3.flac");
        a3.genre = Some("Classical".to_string());
        a3.title = Some("Etude".to_string());
        a3.composer = Some("Frédéric Chopin".to_string());
        a3.performers = vec!["Murray Perahia".to_string()];
        a3.duration_seconds = Some(300);

        let metas = vec![a1, a2, a3];
        let thresholds = CreditsReviewThresholds {
            min_tracks: 3,
            min_coverage: 0.6,
            min_consensus: 0.7,
        };

        assert!(heur.should_review_credits(&thresholds, &metas));
    }

    #[test]
    fn test_work_title_not_duplicated_when_already_present() {
        let mut meta = base_meta();
        meta.composer = Some("Frédéric Chopin".to_string());
        meta.artist = Some("Maurizio Pollini".to_string());
        meta.work = Some("Etude Op. 10 No. 1".to_string());
        meta.title = Some("Etude Op. 10 No. 1 (Allegro)".to_string());

        heuristics().adapt_metadata(&mut meta);
        assert_eq!(meta.title.as_deref(), Some("Etude Op. 10 No. 1 (Allegro)"));
    }
}
