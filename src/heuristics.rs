// Copyright (c) 2024 Jan Holthuis <jan.holthuis@rub.de>
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a copy
// of the MPL was not distributed with this file, You can obtain one at
// http://mozilla.org/MPL/2.0/.
//
// SPDX-License-Identifier: MPL-2.0

//! Best-effort metadata guesses derived purely from a file's path, used as the last resort in
//! the per-track enrichment cascade and as a fallback source for track assignment when a file
//! carries no title/track-number tag at all.

use std::path::Path;

use regex::Regex;
use std::sync::OnceLock;

/// A guess at track number/title derived from a filename.
#[derive(Debug, Clone, Default)]
pub struct PathGuess {
    /// Guessed track number.
    pub track_number: Option<u32>,
    /// Guessed title (the remainder of the filename stem after stripping a leading track
    /// number and separator).
    pub title: Option<String>,
}

fn leading_track_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{1,3})\s*[-._)]\s*").expect("valid regex"))
}

/// Matches a standalone disc/side marker inside a directory name, e.g. `"Disc 2"`, `"CD1"`.
pub fn disc_subfolder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(^|\s)(disc|cd|disk)\s*\d").expect("valid regex")
    })
}

/// Guess track number and title from a file's path.
#[must_use]
pub fn guess_metadata_from_path(path: &Path) -> PathGuess {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let re = leading_track_number_re();
    if let Some(caps) = re.captures(&stem) {
        let track_number = caps.get(1).and_then(|m| m.as_str().parse().ok());
        let rest = stem[caps.get(0).unwrap().end()..].trim();
        let title = if rest.is_empty() {
            None
        } else {
            Some(rest.to_string())
        };
        return PathGuess {
            track_number,
            title,
        };
    }

    PathGuess {
        track_number: None,
        title: if stem.is_empty() { None } else { Some(stem) },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_guess_with_leading_number() {
        let guess = guess_metadata_from_path(&PathBuf::from("01 - Intro.flac"));
        assert_eq!(guess.track_number, Some(1));
        assert_eq!(guess.title.as_deref(), Some("Intro"));
    }

    #[test]
    fn test_guess_without_leading_number() {
        let guess = guess_metadata_from_path(&PathBuf::from("Intro.flac"));
        assert_eq!(guess.track_number, None);
        assert_eq!(guess.title.as_deref(), Some("Intro"));
    }

    #[test]
    fn test_disc_subfolder_regex() {
        assert!(disc_subfolder_re().is_match("Disc 2"));
        assert!(disc_subfolder_re().is_match("cd1"));
        assert!(!disc_subfolder_re().is_match("Discography"));
    }
}
