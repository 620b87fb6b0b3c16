// Copyright (c) 2024 Jan Holthuis <jan.holthuis@rub.de>
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a copy
// of the MPL was not distributed with this file, You can obtain one at
// http://mozilla.org/MPL/2.0/.
//
// SPDX-License-Identifier: MPL-2.0

//! Release-home bookkeeping: which directory a release's tracks are actually filed into, used by
//! the singleton-home preference decision step and to retarget a lone track into an existing
//! album directory instead of leaving it in a directory of its own.

use std::path::{Path, PathBuf};

use crate::cache::Cache;
use crate::error::Result;
use crate::hash::DirectoryHash;

/// Minimum number of audio files a candidate home directory must already contain to be
/// considered a real album home rather than another singleton.
const MIN_HOME_TRACKS: usize = 3;

/// Minimum release score required before a singleton is relocated into an existing home at all.
const MIN_RELEASE_SCORE: f64 = 0.65;

/// Minimum title/duration match against the release's sample track before relocating.
const MIN_TRACK_MATCH: f64 = 0.85;

/// Record (or refresh) the home directory for `release_key`.
///
/// If an existing home is recorded, it's kept unless its directory vanished, its hash changed
/// (the directory was edited/reorganized outside this tool), or the directory being finalized
/// now has *more* audio files than the recorded home and so is the better home going forward.
pub fn maybe_set_release_home(
    cache: &Cache,
    release_key: &str,
    directory: &Path,
    track_count: usize,
    directory_hash: Option<DirectoryHash>,
    count_audio_files: impl Fn(&Path) -> usize,
) -> Result<()> {
    if let Some(existing) = cache.get_release_home(release_key)? {
        if !existing.directory_path.exists() {
            cache.evict_release_home(release_key)?;
        } else {
            let current_hash = cache.get_directory_hash(&existing.directory_path)?;
            if let Some(current_hash) = current_hash {
                if current_hash != existing.directory_hash {
                    cache.evict_release_home(release_key)?;
                } else {
                    let existing_count = count_audio_files(&existing.directory_path);
                    if existing.directory_path != directory && existing_count >= track_count {
                        cache.set_release_home(
                            release_key,
                            &existing.directory_path,
                            current_hash,
                        )?;
                        return Ok(());
                    }
                }
            }
        }
    }

    if let Some(hash) = directory_hash {
        cache.set_release_home(release_key, directory, hash)?;
    }
    Ok(())
}

/// Choose an existing album directory to relocate a singleton track into, or `None` if no
/// suitable home is recorded/discoverable.
///
/// `release_key` must be a MusicBrainz key (Discogs releases don't carry enough recording-level
/// identity to support this short-circuit, see `DESIGN.md`).
pub fn select_singleton_home(
    cache: &Cache,
    release_key: &str,
    current_dir: &Path,
    best_release_score: f64,
    track_match_quality: f64,
    count_audio_files: impl Fn(&Path) -> usize,
) -> Result<Option<PathBuf>> {
    if best_release_score < MIN_RELEASE_SCORE || track_match_quality < MIN_TRACK_MATCH {
        return Ok(None);
    }
    if !release_key.starts_with("musicbrainz:") {
        return Ok(None);
    }

    let Some(home) = cache.get_release_home(release_key)? else {
        return Ok(None);
    };
    if home.directory_path == current_dir {
        return Ok(None);
    }
    if !home.directory_path.exists() {
        cache.evict_release_home(release_key)?;
        return Ok(None);
    }
    if let Some(current_hash) = cache.get_directory_hash(&home.directory_path)? {
        if current_hash != home.directory_hash {
            cache.evict_release_home(release_key)?;
            return Ok(None);
        }
    }

    if count_audio_files(&home.directory_path) < MIN_HOME_TRACKS {
        return Ok(None);
    }

    Ok(Some(home.directory_path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maybe_set_release_home_records_first_home() {
        let cache = Cache::open_in_memory().unwrap();
        let dir = Path::new("/music/Artist/Album");
        let hash = DirectoryHash::compute([("a.flac", 1)]);
        maybe_set_release_home(&cache, "musicbrainz:r1", dir, 10, Some(hash), |_| 10).unwrap();
        let home = cache.get_release_home("musicbrainz:r1").unwrap().unwrap();
        assert_eq!(home.directory_path, dir);
    }

    #[test]
    fn test_maybe_set_release_home_keeps_larger_existing_home() {
        let cache = Cache::open_in_memory().unwrap();
        let home_dir = Path::new("/music/Artist/Album");
        let hash = DirectoryHash::compute([("a.flac", 1)]);
        cache.set_release_home("musicbrainz:r1", home_dir, hash).unwrap();
        cache.set_directory_hash(home_dir, hash).unwrap();

        let singleton_dir = Path::new("/music/Incoming/Track");
        maybe_set_release_home(
            &cache,
            "musicbrainz:r1",
            singleton_dir,
            1,
            Some(hash),
            |p| if p == home_dir { 12 } else { 1 },
        )
        .unwrap();

        let home = cache.get_release_home("musicbrainz:r1").unwrap().unwrap();
        assert_eq!(home.directory_path, home_dir);
    }

    #[test]
    fn test_select_singleton_home_rejects_low_score() {
        let cache = Cache::open_in_memory().unwrap();
        let result =
            select_singleton_home(&cache, "musicbrainz:r1", Path::new("/x"), 0.4, 0.99, |_| 10)
                .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_select_singleton_home_returns_recorded_home() {
        let cache = Cache::open_in_memory().unwrap();
        let home_dir = Path::new("/music/Artist/Album");
        let hash = DirectoryHash::compute([("a.flac", 1)]);
        cache.set_release_home("musicbrainz:r1", home_dir, hash).unwrap();
        cache.set_directory_hash(home_dir, hash).unwrap();

        let result = select_singleton_home(
            &cache,
            "musicbrainz:r1",
            Path::new("/music/Incoming/Track"),
            0.9,
            0.95,
            |_| 12,
        )
        .unwrap();
        assert_eq!(result, Some(home_dir.to_path_buf()));
    }
}
