// Copyright (c) 2024 Jan Holthuis <jan.holthuis@rub.de>
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a copy
// of the MPL was not distributed with this file, You can obtain one at
// http://mozilla.org/MPL/2.0/.
//
// SPDX-License-Identifier: MPL-2.0

//! Directory content hashing, used by the skip policy and the release-home eviction rule.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A stable 256-bit digest of a directory's contents, derived from the sorted set of
/// `(filename, size)` pairs of its files.
///
/// Deliberately excludes modification time and file content so that re-tagging a file (which
/// changes both) doesn't change the hash, while adding, removing or resizing a file does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryHash([u8; 32]);

impl DirectoryHash {
    /// Compute the hash from an iterator of `(filename, size)` pairs.
    ///
    /// The caller does not need to sort the input; this function sorts a local copy before
    /// hashing so that the result is independent of directory read order.
    pub fn compute<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, u64)>,
    {
        let mut pairs: Vec<(&str, u64)> = entries.into_iter().collect();
        pairs.sort_unstable();

        let mut hasher = Sha256::new();
        for (name, size) in pairs {
            hasher.update(name.as_bytes());
            hasher.update(b"\0");
            hasher.update(size.to_le_bytes());
            hasher.update(b"\n");
        }
        let digest = hasher.finalize();
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        DirectoryHash(out)
    }

    /// Compute the hash for the files directly inside `directory` (non-recursive).
    ///
    /// Returns `Ok(None)` if `directory` cannot be read (e.g. it was removed between scheduling
    /// and processing), which the directory pipeline treats as a skip rather than an error.
    pub fn for_directory(directory: &Path) -> std::io::Result<Option<Self>> {
        let read_dir = match std::fs::read_dir(directory) {
            Ok(rd) => rd,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err),
        };

        let mut entries = Vec::new();
        for entry in read_dir {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                let size = entry.metadata()?.len();
                entries.push((entry.file_name().to_string_lossy().into_owned(), size));
            }
        }
        let refs: Vec<(&str, u64)> = entries.iter().map(|(n, s)| (n.as_str(), *s)).collect();
        Ok(Some(Self::compute(refs)))
    }

    /// Render as a lowercase hex string, e.g. for use as a cache column value.
    #[must_use]
    pub fn to_hex(self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Parse a lowercase hex string produced by [`Self::to_hex`].
    #[must_use]
    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() != 64 {
            return None;
        }
        let mut out = [0u8; 32];
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
        }
        Some(DirectoryHash(out))
    }
}

impl fmt::Display for DirectoryHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_independent_of_order() {
        let a = DirectoryHash::compute([("b.flac", 10), ("a.flac", 20)]);
        let b = DirectoryHash::compute([("a.flac", 20), ("b.flac", 10)]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_hash_changes_on_size() {
        let a = DirectoryHash::compute([("a.flac", 10)]);
        let b = DirectoryHash::compute([("a.flac", 11)]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_hex_roundtrip() {
        let hash = DirectoryHash::compute([("x", 1)]);
        let hex = hash.to_hex();
        assert_eq!(hex.len(), 64);
        assert_eq!(DirectoryHash::from_hex(&hex), Some(hash));
    }
}
