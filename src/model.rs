// Copyright (c) 2024 Jan Holthuis <jan.holthuis@rub.de>
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a copy
// of the MPL was not distributed with this file, You can obtain one at
// http://mozilla.org/MPL/2.0/.
//
// SPDX-License-Identifier: MPL-2.0

//! Core data model shared by the directory pipeline, provider adapters and the cache.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Where a [`TrackMetadata`]'s fields were populated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSource {
    /// Populated via acoustic fingerprint lookup.
    Fingerprint,
    /// Populated via a provider metadata search.
    Metadata,
    /// Populated via a best-effort guess from the file path.
    Guess,
    /// Populated from a remembered release association for this directory.
    ReleaseMemory,
}

/// Metadata for a single track, as read from (or about to be written to) a tagged file.
///
/// `album_artist` is always a single atomic string; callers must not split it on delimiters such
/// as `;` or `/`, since a multi-artist album artist is a single named entity (e.g. a collaborative
/// alias), not a list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackMetadata {
    /// Path to the file this metadata was read from.
    pub path: PathBuf,
    /// Acoustic fingerprint, if computed.
    pub fingerprint: Option<String>,
    /// AcoustID identifier resolved from the fingerprint.
    pub acoustid_id: Option<String>,
    /// MusicBrainz recording (track) identifier.
    pub musicbrainz_track_id: Option<String>,
    /// MusicBrainz release identifier this track was matched against.
    pub musicbrainz_release_id: Option<String>,
    /// Track title.
    pub title: Option<String>,
    /// Album/release title.
    pub album: Option<String>,
    /// Track artist.
    pub artist: Option<String>,
    /// Release (album) artist. Always an atomic string; never split into multiple names.
    pub album_artist: Option<String>,
    /// Composer. Populated/rewritten by [`crate::classical::ClassicalHeuristics::adapt_metadata`]
    /// for tracks that score as classical.
    pub composer: Option<String>,
    /// Conductor, folded into `artist` for classical tracks; see
    /// [`crate::classical::ClassicalHeuristics`].
    pub conductor: Option<String>,
    /// Work title (classical music), prefixed onto `title` by credit adaptation when not already
    /// present there.
    pub work: Option<String>,
    /// Movement name or number (classical music). Not rewritten by credit adaptation.
    pub movement: Option<String>,
    /// Genre.
    pub genre: Option<String>,
    /// Performers, in original order with duplicates removed.
    pub performers: Vec<String>,
    /// Duration in seconds.
    pub duration_seconds: Option<u32>,
    /// Track number within its medium.
    pub track_number: Option<u32>,
    /// Disc/medium number.
    pub disc_number: Option<u32>,
    /// Total number of tracks on the medium, if known.
    pub track_total: Option<u32>,
    /// Confidence of the current match, in `[0, 1]`.
    pub match_confidence: Option<f64>,
    /// Where the currently-populated fields came from.
    pub match_source: Option<MatchSource>,
    /// Provider-specific fields that don't have a first-class slot above.
    pub extra: HashMap<String, String>,
}

impl TrackMetadata {
    /// Create empty metadata for a file at the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Append a performer if it isn't already present, preserving insertion order.
    pub fn add_performer(&mut self, performer: impl Into<String>) {
        let performer = performer.into();
        if !self.performers.iter().any(|p| p == &performer) {
            self.performers.push(performer);
        }
    }
}

/// A single track that is part of a [`ReleaseData`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseTrack {
    /// MusicBrainz recording identifier (or equivalent for other providers).
    pub recording_id: Option<String>,
    /// Disc/medium number.
    pub disc_number: Option<u32>,
    /// Track number within its medium, normalized to `1..=N`.
    pub number: Option<u32>,
    /// Track title.
    pub title: Option<String>,
    /// Duration in seconds.
    pub duration_seconds: Option<u32>,
}

/// Provider-agnostic release information, as built by a [`crate::provider::Provider`] and
/// consulted during track-to-release assignment.
///
/// `claimed` records which `recording_id`s have already been assigned to a track in this
/// directory batch, so that re-running assignment (e.g. after `force`) behaves deterministically
/// and doesn't double-claim a recording.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseData {
    /// Provider-qualified release identifier, see [`ReleaseKey`].
    pub release_id: String,
    /// Release/album title.
    pub album_title: Option<String>,
    /// Release (album) artist.
    pub album_artist: Option<String>,
    /// Release date (ISO 8601, partial dates allowed, e.g. `"1999"` or `"1999-03"`).
    pub release_date: Option<String>,
    /// Number of discs/media.
    pub disc_count: Option<u32>,
    /// Physical/digital formats reported by the provider (e.g. `"CD"`, `"Vinyl"`).
    pub formats: Vec<String>,
    /// Tracks belonging to this release.
    pub tracks: Vec<ReleaseTrack>,
    /// Recording identifiers already claimed by a track in the current batch.
    pub claimed: HashSet<String>,
}

impl ReleaseData {
    /// Mark a recording as claimed by an assigned track.
    pub fn mark_claimed(&mut self, recording_id: impl Into<String>) {
        self.claimed.insert(recording_id.into());
    }

    /// Whether a recording has already been claimed.
    #[must_use]
    pub fn is_claimed(&self, recording_id: &str) -> bool {
        self.claimed.contains(recording_id)
    }
}

/// Provider-tagged summary of a release candidate, used to build a prompt for the user and to
/// record which candidates were considered in an audit event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseExample {
    /// Name of the provider that produced this candidate (e.g. `"musicbrainz"`, `"discogs"`).
    pub provider: &'static str,
    /// `ReleaseKey` the candidate resolves to.
    pub release_key: String,
    /// Human-readable summary shown in prompts (`"Artist - Album (1999, CD, 12 tracks)"`-shaped).
    pub summary: String,
    /// Adjusted candidate score in `[0, 1]` (can be negative after penalties, see scoring).
    pub score: f64,
}

/// One file awaiting (or having received) a track-to-release match within a directory batch.
#[derive(Debug, Clone)]
pub struct PendingResult {
    /// Metadata for the file, updated in place as matching proceeds.
    pub meta: TrackMetadata,
    /// Match score of the current result, if any.
    pub score: Option<f64>,
    /// Whether this file has been matched to a release track.
    pub matched: bool,
    /// Existing tag values read from the file before any provider enrichment, used to compute
    /// tag-hint consensus in the scoring stage.
    pub existing_tags: HashMap<String, String>,
}

impl PendingResult {
    /// Create a pending result for a freshly-read file, with no match yet.
    pub fn new(meta: TrackMetadata, existing_tags: HashMap<String, String>) -> Self {
        Self {
            meta,
            score: None,
            matched: false,
            existing_tags,
        }
    }
}

/// A batch of files forming one logical album directory, as produced by directory scanning
/// (scanning itself is out of scope for this crate; this is the contract a caller must satisfy).
#[derive(Debug, Clone)]
pub struct DirectoryBatch {
    /// Root directory of the album.
    pub directory_path: PathBuf,
    /// Audio file paths found within it (and any disc subfolders merged into it).
    pub file_paths: Vec<PathBuf>,
}

/// A tag value to write and the value it is replacing, kept so that a failed apply can be
/// diagnosed and so that a dry-run journal can show a meaningful diff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagChange {
    /// Previous value, if any.
    pub old: Option<String>,
    /// New value to write.
    pub new: String,
}

/// A planned change to a single file: tag updates and, optionally, a new path.
#[derive(Debug, Clone)]
pub struct PlannedUpdate {
    /// Metadata the plan was derived from.
    pub meta: TrackMetadata,
    /// Final adjusted score for the release this track was matched to.
    pub score: f64,
    /// Tag field name to [`TagChange`].
    pub tag_changes: HashMap<String, TagChange>,
    /// New path to move the file to, if the plan includes a relocation.
    pub target_path: Option<PathBuf>,
}

/// Mutable state threaded through all stages of processing a single directory batch.
pub struct DirectoryContext {
    /// The batch being processed.
    pub batch: DirectoryBatch,
    /// Directory content hash computed at the start of processing.
    pub directory_hash: Option<crate::hash::DirectoryHash>,
    /// Per-file state as the pipeline progresses.
    pub pending: Vec<PendingResult>,
    /// Release candidates gathered from all providers, keyed by [`ReleaseKey`].
    pub candidates: HashMap<String, ReleaseData>,
    /// Adjusted candidate scores, keyed by [`ReleaseKey`].
    pub scores: HashMap<String, f64>,
    /// The release key ultimately decided on, if any.
    pub decided_release: Option<String>,
    /// Plans constructed for this batch.
    pub plans: Vec<PlannedUpdate>,
}

impl DirectoryContext {
    /// Start a fresh context for a batch.
    pub fn new(batch: DirectoryBatch) -> Self {
        Self {
            batch,
            directory_hash: None,
            pending: Vec::new(),
            candidates: HashMap::new(),
            scores: HashMap::new(),
            decided_release: None,
            plans: Vec::new(),
        }
    }
}

/// Build the canonical `"<provider>:<release_id>"` key used throughout the cache and candidate
/// maps.
#[must_use]
pub fn release_key(provider: &str, release_id: &str) -> String {
    format!("{provider}:{release_id}")
}

/// Split a [`release_key`] back into its `(provider, release_id)` parts.
#[must_use]
pub fn split_release_key(key: &str) -> Option<(&str, &str)> {
    key.split_once(':')
}

/// Compute the canonical hint key used to persist a release association by artist/album name
/// rather than by path, e.g. for directories that get renamed between runs.
///
/// Normalization: NFKD decompose, drop to ASCII, lowercase, collapse any run of characters that
/// isn't `[a-z0-9]` to a single space, then trim.
#[must_use]
pub fn hint_key(artist: &str, album: &str) -> String {
    format!(
        "hint://{}|{}",
        normalize_hint_component(artist),
        normalize_hint_component(album)
    )
}

pub(crate) fn normalize_hint_component(value: &str) -> String {
    use unicode_normalization::UnicodeNormalization;

    let decomposed: String = value.nfkd().collect();
    let ascii = unidecode::unidecode(&decomposed);
    let lower = ascii.to_lowercase();

    let mut out = String::with_capacity(lower.len());
    let mut last_was_space = false;
    for ch in lower.chars() {
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

/// Return every ancestor of `path` up to (and including) `library_root`, innermost first.
///
/// Used by the release cache contract (spec §4.5) to persist a release association under every
/// directory level between the album root and the library root.
pub fn ancestors_up_to<'a>(path: &'a Path, library_root: &'a Path) -> Vec<&'a Path> {
    let mut out = Vec::new();
    let mut current = Some(path);
    while let Some(p) = current {
        out.push(p);
        if p == library_root {
            break;
        }
        current = p.parent();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hint_key_normalizes() {
        assert_eq!(
            hint_key("Sigur Rós", "( )"),
            hint_key("Sigur Ros", "  ")
        );
        assert_eq!(hint_key("AC/DC", "Back In Black"), "hint://ac dc|back in black");
    }

    #[test]
    fn test_ancestors_up_to_stops_at_root() {
        let root = Path::new("/music");
        let path = Path::new("/music/Artist/Album");
        let ancestors = ancestors_up_to(path, root);
        assert_eq!(
            ancestors,
            vec![
                Path::new("/music/Artist/Album"),
                Path::new("/music/Artist"),
                Path::new("/music"),
            ]
        );
    }

    #[test]
    fn test_release_key_roundtrip() {
        let key = release_key("musicbrainz", "abc-123");
        assert_eq!(key, "musicbrainz:abc-123");
        assert_eq!(split_release_key(&key), Some(("musicbrainz", "abc-123")));
    }
}
