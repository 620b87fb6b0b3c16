// Copyright (c) 2024 Jan Holthuis <jan.holthuis@rub.de>
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a copy
// of the MPL was not distributed with this file, You can obtain one at
// http://mozilla.org/MPL/2.0/.
//
// SPDX-License-Identifier: MPL-2.0

//! `rollback`: undo every recorded move, restoring files to their pre-apply locations.

use crate::cache::Cache;
use crate::error::Result;
use crate::plan::rollback_all;

/// Replay every recorded move in reverse and report how many were restored.
pub fn run(cache: &Cache) -> Result<usize> {
    let restored = rollback_all(cache)?;
    for (dest, source) in &restored {
        log::info!("Restored {} to {}", dest.display(), source.display());
    }
    Ok(restored.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_run_restores_and_reports_count() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("a.flac");
        let dest = dir.path().join("b.flac");
        fs::write(&dest, b"data").unwrap();

        let cache = Cache::open_in_memory().unwrap();
        cache.record_move(&source, &dest).unwrap();

        let count = run(&cache).unwrap();
        assert_eq!(count, 1);
        assert!(source.exists());
    }
}
