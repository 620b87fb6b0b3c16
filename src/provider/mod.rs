// Copyright (c) 2024 Jan Holthuis <jan.holthuis@rub.de>
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a copy
// of the MPL was not distributed with this file, You can obtain one at
// http://mozilla.org/MPL/2.0/.
//
// SPDX-License-Identifier: MPL-2.0

//! The provider adapter contract: a common trait implemented by each metadata backend
//! (MusicBrainz, Discogs, ...), so the directory pipeline never has to special-case a particular
//! backend.

pub mod discogs;
pub mod musicbrainz;

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{PendingResult, ReleaseData, TrackMetadata};

/// A single candidate release surfaced by [`Provider::search_release_candidates`], paired with
/// the provider's own (pre-adjustment) confidence score.
#[derive(Debug, Clone)]
pub struct CandidateRelease {
    /// Provider-qualified release key, see [`crate::model::release_key`].
    pub release_key: String,
    /// The release data itself.
    pub release: ReleaseData,
    /// The provider's raw score for this candidate, before scoring-stage adjustment.
    pub base_score: f64,
    /// Human-readable summary shown in prompts, see [`summarize_release`].
    pub summary: String,
}

/// Build the human-readable summary carried by a [`CandidateRelease`] and, once scored, by its
/// [`crate::model::ReleaseExample`] (`"Artist - Album (1999, CD, 12 tracks)"`-shaped).
#[must_use]
pub fn summarize_release(release: &ReleaseData) -> String {
    let artist = release.album_artist.as_deref().unwrap_or("Unknown Artist");
    let album = release.album_title.as_deref().unwrap_or("Unknown Album");

    let mut details = Vec::new();
    if let Some(date) = &release.release_date {
        details.push(date.clone());
    }
    if let Some(format) = release.formats.first() {
        details.push(format.clone());
    }
    details.push(format!("{} tracks", release.tracks.len()));

    format!("{artist} - {album} ({})", details.join(", "))
}

/// Provider-agnostic adapter contract.
///
/// Each method corresponds to one stage of the directory pipeline (spec §4.1/§4.6): `enrich` is
/// the per-track enrichment cascade, `search_release_candidates` is the candidate-sources stage,
/// and `get_release`/`supplement` back the track-to-release assignment and plan-construction
/// stages respectively.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable provider name, used as the prefix of every [`crate::model::release_key`] this
    /// provider produces.
    fn name(&self) -> &'static str;

    /// Attempt to enrich `meta` in place from whatever identifying information it already
    /// carries (fingerprint, existing tags, or failing those a best-effort guess from the file
    /// path). Returns `Ok(true)` if any field was populated.
    async fn enrich(&self, meta: &mut TrackMetadata) -> Result<bool>;

    /// Search for candidate releases that plausibly correspond to this directory's files.
    async fn search_release_candidates(
        &self,
        pending_results: &[PendingResult],
        directory: &Path,
    ) -> Result<Vec<CandidateRelease>>;

    /// Fetch full release data (including tracks) for a previously-seen release key.
    async fn get_release(&self, release_id: &str) -> Result<Option<ReleaseData>>;

    /// Backfill additional fields on `meta` from release-level data once a release has been
    /// decided on, for fields that per-track enrichment alone wouldn't set (e.g. catalog number,
    /// label, genre inherited from the release).
    async fn supplement(&self, meta: &mut TrackMetadata, release: &ReleaseData) -> Result<()>;
}
