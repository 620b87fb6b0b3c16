// Copyright (c) 2024 Jan Holthuis <jan.holthuis@rub.de>
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a copy
// of the MPL was not distributed with this file, You can obtain one at
// http://mozilla.org/MPL/2.0/.
//
// SPDX-License-Identifier: MPL-2.0

//! Discogs [`Provider`] implementation.
//!
//! No Discogs client crate is part of the corpus this project is grounded on, so this adapter
//! talks to the Discogs REST API directly through a small `fetch` hook the caller supplies (kept
//! out of this type so tests can substitute a canned response), following the same
//! cache-then-fetch shape as [`crate::provider::musicbrainz::MusicBrainzProvider`].

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::assignment::parse_discogs_duration;
use crate::cache::Cache;
use crate::error::Result;
use crate::model::{release_key, PendingResult, ReleaseData, ReleaseTrack, TrackMetadata};
use crate::provider::{summarize_release, CandidateRelease, Provider};
use crate::retry::NetworkPolicy;

/// Default base score Discogs candidates are given before scoring-stage adjustment, since
/// Discogs (unlike MusicBrainz) doesn't report a comparable search relevance figure.
const DISCOGS_BASE_SCORE: f64 = 0.5;

/// Raw Discogs release payload, deserialized directly from the API response.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscogsRelease {
    /// Discogs release identifier.
    pub id: u64,
    /// Release title.
    pub title: Option<String>,
    /// Artist name as reported by Discogs (already a single joined string there).
    pub artists_sort: Option<String>,
    /// Release year.
    pub year: Option<i32>,
    /// Format descriptions (e.g. `["Vinyl", "LP"]`).
    #[serde(default)]
    pub formats: Vec<DiscogsFormat>,
    /// Tracklist.
    #[serde(default)]
    pub tracklist: Vec<DiscogsTracklistEntry>,
}

/// One entry of a Discogs release's `formats` array.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscogsFormat {
    /// Format name, e.g. `"Vinyl"`.
    pub name: String,
}

/// One entry of a Discogs release's `tracklist` array.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscogsTracklistEntry {
    /// Position string, e.g. `"A1"` or `"2"`.
    pub position: Option<String>,
    /// Track title.
    pub title: Option<String>,
    /// Duration string, `"mm:ss"`.
    pub duration: Option<String>,
    /// Entry type; non-track entries (headings, indices) report something other than `"track"`.
    #[serde(rename = "type_", default)]
    pub entry_type: Option<String>,
}

impl DiscogsTracklistEntry {
    /// Whether this entry represents a playable track (as opposed to a heading/index entry).
    #[must_use]
    pub fn is_track(&self) -> bool {
        matches!(self.entry_type.as_deref(), None | Some("") | Some("track"))
    }
}

/// Parse a Discogs track position string into a numeric track number, if it looks like one
/// (plain digits, or a letter-prefixed vinyl side like `"A1"` whose trailing digits are used).
#[must_use]
pub fn parse_track_number(position: &str) -> Option<u32> {
    let digits: String = position.chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok()
}

/// Discogs adapter. Constructed with a fetch callback so tests can avoid real network access.
pub struct DiscogsProvider<'a> {
    cache: &'a Cache,
    policy: NetworkPolicy,
    fetch_release: Box<dyn Fn(&str) -> futures::future::BoxFuture<'static, Result<DiscogsRelease>> + Send + Sync + 'a>,
    search: Box<
        dyn Fn(&str, &str) -> futures::future::BoxFuture<'static, Result<Vec<DiscogsRelease>>>
            + Send
            + Sync
            + 'a,
    >,
}

impl<'a> DiscogsProvider<'a> {
    /// Create a new Discogs adapter backed by `cache`, using `fetch_release`/`search` as the
    /// underlying HTTP calls.
    pub fn new(
        cache: &'a Cache,
        fetch_release: impl Fn(&str) -> futures::future::BoxFuture<'static, Result<DiscogsRelease>>
            + Send
            + Sync
            + 'a,
        search: impl Fn(&str, &str) -> futures::future::BoxFuture<'static, Result<Vec<DiscogsRelease>>>
            + Send
            + Sync
            + 'a,
    ) -> Self {
        Self {
            cache,
            policy: NetworkPolicy::new("discogs", 3, Duration::from_millis(500)),
            fetch_release: Box::new(fetch_release),
            search: Box::new(search),
        }
    }

    fn to_release_data(release: &DiscogsRelease) -> ReleaseData {
        let tracks = release
            .tracklist
            .iter()
            .filter(|t| t.is_track())
            .map(|t| ReleaseTrack {
                recording_id: None,
                disc_number: None,
                number: t.position.as_deref().and_then(parse_track_number),
                title: t.title.clone(),
                duration_seconds: t.duration.as_deref().and_then(parse_discogs_duration),
            })
            .collect();

        ReleaseData {
            release_id: release.id.to_string(),
            album_title: release.title.clone(),
            album_artist: release.artists_sort.clone(),
            release_date: release.year.map(|y| y.to_string()),
            disc_count: None,
            formats: release.formats.iter().map(|f| f.name.clone()).collect(),
            tracks,
            claimed: Default::default(),
        }
    }
}

#[async_trait]
impl<'a> Provider for DiscogsProvider<'a> {
    fn name(&self) -> &'static str {
        "discogs"
    }

    async fn enrich(&self, _meta: &mut TrackMetadata) -> Result<bool> {
        // Discogs has no per-track fingerprint lookup; per-track enrichment is MusicBrainz's
        // job. Discogs only contributes release-level data via `supplement`.
        Ok(false)
    }

    async fn search_release_candidates(
        &self,
        pending_results: &[PendingResult],
        _directory: &Path,
    ) -> Result<Vec<CandidateRelease>> {
        let artist = pending_results
            .iter()
            .find_map(|p| p.meta.album_artist.clone().or_else(|| p.meta.artist.clone()))
            .unwrap_or_default();
        let album = pending_results
            .iter()
            .find_map(|p| p.meta.album.clone())
            .unwrap_or_default();
        if artist.is_empty() && album.is_empty() {
            return Ok(Vec::new());
        }

        let releases = self
            .policy
            .call(|| (self.search)(&artist, &album))
            .await?;

        Ok(releases
            .iter()
            .map(|release| {
                let release_data = Self::to_release_data(release);
                CandidateRelease {
                    release_key: release_key("discogs", &release.id.to_string()),
                    base_score: DISCOGS_BASE_SCORE,
                    summary: summarize_release(&release_data),
                    release: release_data,
                }
            })
            .collect())
    }

    async fn get_release(&self, release_id: &str) -> Result<Option<ReleaseData>> {
        if let Some(cached) = self.cache.get_release_json("discogs", release_id)? {
            let release: DiscogsRelease = serde_json::from_str(&cached)?;
            return Ok(Some(Self::to_release_data(&release)));
        }

        let release = self.policy.call(|| (self.fetch_release)(release_id)).await?;
        let json = serde_json::to_string(&release)?;
        self.cache.put_release_json("discogs", release_id, &json)?;
        Ok(Some(Self::to_release_data(&release)))
    }

    async fn supplement(&self, meta: &mut TrackMetadata, release: &ReleaseData) -> Result<()> {
        if meta.album.is_none() {
            meta.album = release.album_title.clone();
        }
        if meta.album_artist.is_none() {
            meta.album_artist = release.album_artist.clone();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_track_number_plain() {
        assert_eq!(parse_track_number("3"), Some(3));
    }

    #[test]
    fn test_parse_track_number_vinyl_side() {
        assert_eq!(parse_track_number("A1"), Some(1));
    }

    #[test]
    fn test_parse_track_number_none() {
        assert_eq!(parse_track_number("heading"), None);
    }

    #[test]
    fn test_entry_type_defaults_to_track() {
        let entry = DiscogsTracklistEntry {
            position: Some("1".into()),
            title: Some("Song".into()),
            duration: None,
            entry_type: None,
        };
        assert!(entry.is_track());
    }
}
