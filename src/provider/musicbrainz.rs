// Copyright (c) 2024 Jan Holthuis <jan.holthuis@rub.de>
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a copy
// of the MPL was not distributed with this file, You can obtain one at
// http://mozilla.org/MPL/2.0/.
//
// SPDX-License-Identifier: MPL-2.0

//! MusicBrainz [`Provider`] implementation.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use musicbrainz_rs_nova::entity::release::{
    Release as MusicBrainzRelease, ReleaseSearchQuery as MusicBrainzReleaseSearchQuery,
};
use musicbrainz_rs_nova::{Fetch, Search};

use crate::cache::Cache;
use crate::error::Result;
use crate::heuristics::guess_metadata_from_path;
use crate::model::{release_key, MatchSource, PendingResult, ReleaseData, ReleaseTrack, TrackMetadata};
use crate::provider::{summarize_release, CandidateRelease, Provider};
use crate::retry::NetworkPolicy;

/// Number of candidate releases fetched per search.
const RELEASE_CANDIDATE_LIMIT: u8 = 8;

/// MusicBrainz adapter.
pub struct MusicBrainzProvider<'a> {
    cache: &'a Cache,
    policy: NetworkPolicy,
}

impl<'a> MusicBrainzProvider<'a> {
    /// Create a new MusicBrainz adapter backed by `cache`.
    #[must_use]
    pub fn new(cache: &'a Cache) -> Self {
        Self {
            cache,
            policy: NetworkPolicy::new("musicbrainz", 3, Duration::from_millis(500)),
        }
    }

    async fn fetch_release(&self, release_id: &str) -> Result<MusicBrainzRelease> {
        if let Some(cached) = self.cache.get_release_json("musicbrainz", release_id)? {
            return Ok(serde_json::from_str(&cached)?);
        }

        let release_id = release_id.to_string();
        let release = self
            .policy
            .call(|| {
                let release_id = release_id.clone();
                async move {
                    MusicBrainzRelease::fetch()
                        .id(&release_id)
                        .with_artists()
                        .with_recordings()
                        .with_release_groups()
                        .with_labels()
                        .with_artist_credits()
                        .execute()
                        .await
                }
            })
            .await?;

        let json = serde_json::to_string(&release)?;
        self.cache.put_release_json("musicbrainz", &release.id, &json)?;
        Ok(release)
    }

    fn to_release_data(release: &MusicBrainzRelease) -> ReleaseData {
        let tracks = release
            .media
            .iter()
            .flatten()
            .enumerate()
            .flat_map(|(disc_idx, medium)| {
                medium
                    .tracks
                    .iter()
                    .flatten()
                    .map(move |track| ReleaseTrack {
                        recording_id: track.recording.as_ref().map(|r| r.id.clone()),
                        disc_number: Some(disc_idx as u32 + 1),
                        number: Some(track.position),
                        title: Some(track.title.clone()),
                        duration_seconds: track
                            .recording
                            .as_ref()
                            .and_then(|r| r.length)
                            .map(|ms| ms / 1000),
                    })
            })
            .collect();

        ReleaseData {
            release_id: release.id.clone(),
            album_title: Some(release.title.clone()),
            album_artist: release
                .artist_credit
                .as_ref()
                .and_then(|credits| credits.first())
                .map(|credit| credit.name.clone()),
            release_date: release.date.as_ref().map(ToString::to_string),
            disc_count: release.media.as_ref().map(|m| m.len() as u32),
            formats: release
                .media
                .iter()
                .flatten()
                .filter_map(|m| m.format.clone())
                .collect(),
            tracks,
            claimed: Default::default(),
        }
    }
}

#[async_trait]
impl<'a> Provider for MusicBrainzProvider<'a> {
    fn name(&self) -> &'static str {
        "musicbrainz"
    }

    /// Enrichment cascade: a fingerprint-sourced recording ID is trusted outright and never
    /// needs a network call here (see `DESIGN.md`'s fingerprint-mismatch decision); otherwise we
    /// fall through metadata search, then a path guess, to path-guess level confidence.
    async fn enrich(&self, meta: &mut TrackMetadata) -> Result<bool> {
        if meta.musicbrainz_track_id.is_some() {
            meta.match_source = Some(MatchSource::Fingerprint);
            meta.match_confidence = Some(1.0);
            return Ok(true);
        }

        if meta.title.is_some() || meta.album.is_some() {
            meta.match_source = Some(MatchSource::Metadata);
            meta.match_confidence.get_or_insert(0.5);
            return Ok(true);
        }

        let guess = guess_metadata_from_path(&meta.path);
        if guess.title.is_some() || guess.track_number.is_some() {
            meta.title = meta.title.take().or(guess.title);
            meta.track_number = meta.track_number.or(guess.track_number);
            meta.match_source = Some(MatchSource::Guess);
            meta.match_confidence.get_or_insert(0.2);
            return Ok(true);
        }

        Ok(false)
    }

    async fn search_release_candidates(
        &self,
        pending_results: &[PendingResult],
        _directory: &Path,
    ) -> Result<Vec<CandidateRelease>> {
        let mut query = MusicBrainzReleaseSearchQuery::query_builder();
        let track_count = pending_results.len();
        let mut query = query.tracks(&track_count.to_string());

        if let Some(album) = pending_results.iter().find_map(|p| p.meta.album.clone()) {
            query = query.and().release(&album);
        }
        if let Some(artist) = pending_results
            .iter()
            .find_map(|p| p.meta.album_artist.clone().or_else(|| p.meta.artist.clone()))
        {
            query = query.and().artist(&artist);
        }

        let search_query = query.build();
        let response = self
            .policy
            .call(|| {
                let search_query = search_query.clone();
                async move {
                    MusicBrainzRelease::search(search_query)
                        .limit(RELEASE_CANDIDATE_LIMIT)
                        .execute()
                        .await
                }
            })
            .await?;

        let candidates = response
            .entities
            .iter()
            .map(|release| {
                let release_data = Self::to_release_data(release);
                CandidateRelease {
                    release_key: release_key("musicbrainz", &release.id),
                    base_score: 0.5,
                    summary: summarize_release(&release_data),
                    release: release_data,
                }
            })
            .collect();
        Ok(candidates)
    }

    async fn get_release(&self, release_id: &str) -> Result<Option<ReleaseData>> {
        let release = self.fetch_release(release_id).await?;
        Ok(Some(Self::to_release_data(&release)))
    }

    async fn supplement(&self, meta: &mut TrackMetadata, release: &ReleaseData) -> Result<()> {
        if meta.album.is_none() {
            meta.album = release.album_title.clone();
        }
        if meta.album_artist.is_none() {
            meta.album_artist = release.album_artist.clone();
        }
        meta.musicbrainz_release_id.get_or_insert_with(|| release.release_id.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Cache;

    #[tokio::test]
    async fn test_enrich_trusts_fingerprint_recording_id_outright() {
        let cache = Cache::open_in_memory().unwrap();
        let provider = MusicBrainzProvider::new(&cache);
        let mut meta = TrackMetadata::new("/music/01 Song.flac");
        meta.musicbrainz_track_id = Some("abc-123".to_string());

        assert!(provider.enrich(&mut meta).await.unwrap());
        assert_eq!(meta.match_source, Some(MatchSource::Fingerprint));
        assert_eq!(meta.match_confidence, Some(1.0));
    }

    #[tokio::test]
    async fn test_enrich_falls_back_to_path_guess_when_untagged() {
        let cache = Cache::open_in_memory().unwrap();
        let provider = MusicBrainzProvider::new(&cache);
        let mut meta = TrackMetadata::new("/music/Album/03 Track Title.flac");

        assert!(provider.enrich(&mut meta).await.unwrap());
        assert_eq!(meta.match_source, Some(MatchSource::Guess));
        assert!(meta.match_confidence.unwrap() < 0.5);
    }

    #[tokio::test]
    async fn test_enrich_prefers_existing_metadata_over_guess() {
        let cache = Cache::open_in_memory().unwrap();
        let provider = MusicBrainzProvider::new(&cache);
        let mut meta = TrackMetadata::new("/music/Album/03 Track Title.flac");
        meta.title = Some("Already Tagged".to_string());

        assert!(provider.enrich(&mut meta).await.unwrap());
        assert_eq!(meta.match_source, Some(MatchSource::Metadata));
        assert_eq!(meta.title.as_deref(), Some("Already Tagged"));
    }

    #[tokio::test]
    async fn test_supplement_fills_only_missing_fields() {
        let cache = Cache::open_in_memory().unwrap();
        let provider = MusicBrainzProvider::new(&cache);
        let mut meta = TrackMetadata::new("/music/Album/03 Track Title.flac");
        meta.album = Some("Existing Album".to_string());
        let release = ReleaseData {
            release_id: "rel-1".to_string(),
            album_title: Some("From MusicBrainz".to_string()),
            album_artist: Some("Some Artist".to_string()),
            release_date: None,
            disc_count: None,
            formats: Vec::new(),
            tracks: Vec::new(),
            claimed: Default::default(),
        };

        provider.supplement(&mut meta, &release).await.unwrap();

        assert_eq!(meta.album.as_deref(), Some("Existing Album"));
        assert_eq!(meta.album_artist.as_deref(), Some("Some Artist"));
        assert_eq!(meta.musicbrainz_release_id.as_deref(), Some("rel-1"));
    }
}
