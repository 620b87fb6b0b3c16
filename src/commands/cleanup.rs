// Copyright (c) 2024 Jan Holthuis <jan.holthuis@rub.de>
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a copy
// of the MPL was not distributed with this file, You can obtain one at
// http://mozilla.org/MPL/2.0/.
//
// SPDX-License-Identifier: MPL-2.0

//! `cleanup`: drop cache rows for directories that no longer exist on disk.

use crate::cache::Cache;
use crate::error::Result;

/// Remove stale directory bookkeeping and report how many rows were dropped.
pub fn run(cache: &Cache) -> Result<usize> {
    let removed = cache.cleanup_stale_directories()?;
    log::info!("Removed {removed} stale directory rows");
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_run_removes_rows_for_missing_directories() {
        let cache = Cache::open_in_memory().unwrap();
        cache
            .ignore_directory(Path::new("/does/not/exist"), "user request")
            .unwrap();

        let removed = run(&cache).unwrap();
        assert_eq!(removed, 1);
        assert!(cache.list_ignored_directories().unwrap().is_empty());
    }
}
