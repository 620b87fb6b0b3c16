// Copyright (c) 2022 Jan Holthuis <jan.holthuis@rub.de>
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a copy
// of the MPL was not distributed with this file, You can obtain one at
// http://mozilla.org/MPL/2.0/.
//
// SPDX-License-Identifier: MPL-2.0

//! Small filesystem utilities shared by the directory pipeline and the apply stage.

use std::collections::VecDeque;
use std::fs::read_dir;
use std::io;
use std::path::{Path, PathBuf};

/// Maximum length, in bytes, of a single path component on the filesystems this tool targets.
const MAX_BASENAME_BYTES: usize = 255;

const ELLIPSIS: char = '…';

/// An iterator that recursively walks through a directory structure and yields a tuple `(path,
/// dirs, files)` for each directory it visits.
///
/// This struct is created by [`walk_dir`]. See its documentation for more.
pub struct DirWalk {
    queue: VecDeque<PathBuf>,
}

/// Creates an iterator that walks through a directory structure recursively and yields a tuple
/// consisting of the path of current directory and the files and directories in that directory.
pub fn walk_dir(path: PathBuf) -> DirWalk {
    let mut queue = VecDeque::new();
    queue.push_back(path);
    DirWalk { queue }
}

impl Iterator for DirWalk {
    type Item = io::Result<(PathBuf, Vec<PathBuf>, Vec<PathBuf>)>;

    fn next(&mut self) -> Option<Self::Item> {
        let queued_path = self.queue.pop_front();

        queued_path.map(move |path| {
            read_dir(&path).and_then(move |entries| {
                let mut files = vec![];
                let mut dirs = vec![];
                for entry in entries {
                    let entry_path = entry?.path();

                    if entry_path.is_dir() {
                        dirs.push(entry_path.clone());
                    } else {
                        files.push(entry_path);
                    }
                }

                dirs.sort_unstable();
                files.sort_unstable();

                self.queue.extend(dirs.clone());
                Ok((path, dirs.clone(), files))
            })
        })
    }
}

/// Shorten `path`'s filename so its basename fits within [`MAX_BASENAME_BYTES`], preserving the
/// extension and appending an ellipsis marker, adding a numeric disambiguator if the shortened
/// name collides with something `exists` already reports as present.
#[must_use]
pub fn fit_filename(path: &Path, exists: impl Fn(&Path) -> bool) -> PathBuf {
    let name = match path.file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        None => return path.to_path_buf(),
    };
    if name.len() <= MAX_BASENAME_BYTES {
        return path.to_path_buf();
    }

    let extension = path
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());

    let mut counter = 0u32;
    loop {
        let suffix = if counter == 0 {
            String::new()
        } else {
            format!("_{counter}")
        };
        let reserved = extension.len() + ELLIPSIS.len_utf8() + suffix.len();
        let allowed = MAX_BASENAME_BYTES.saturating_sub(reserved);
        let truncated = truncate_utf8_lossy(&stem, allowed);
        let truncated = if truncated.is_empty() {
            "file".to_string()
        } else {
            truncated
        };
        let candidate = path.with_file_name(format!("{truncated}{suffix}{ELLIPSIS}{extension}"));
        if !exists(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

/// Truncate `s` to at most `max_bytes` UTF-8 bytes without splitting a multi-byte character.
fn truncate_utf8_lossy(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_string();
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_walk_dir_visits_nested_directories() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("a.flac"), b"").unwrap();
        fs::write(dir.path().join("sub/b.flac"), b"").unwrap();

        let visited: Vec<_> = walk_dir(dir.path().to_path_buf())
            .collect::<io::Result<Vec<_>>>()
            .unwrap();
        assert_eq!(visited.len(), 2);
        assert_eq!(visited[0].2, vec![dir.path().join("a.flac")]);
    }

    #[test]
    fn test_fit_filename_short_name_unchanged() {
        let path = Path::new("/music/Artist/Album/01 Song.flac");
        assert_eq!(fit_filename(path, |_| false), path);
    }

    #[test]
    fn test_fit_filename_truncates_long_name() {
        let long_stem = "a".repeat(300);
        let path = PathBuf::from(format!("/music/{long_stem}.flac"));
        let fitted = fit_filename(&path, |_| false);
        let name = fitted.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.len() <= MAX_BASENAME_BYTES);
        assert!(name.ends_with(&format!("{ELLIPSIS}.flac")));
    }

    #[test]
    fn test_fit_filename_disambiguates_collision() {
        let long_stem = "b".repeat(300);
        let path = PathBuf::from(format!("/music/{long_stem}.flac"));
        let first = fit_filename(&path, |_| false);
        let second = fit_filename(&path, |p| p == first);
        assert_ne!(first, second);
    }
}
