// Copyright (c) 2024 Jan Holthuis <jan.holthuis@rub.de>
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a copy
// of the MPL was not distributed with this file, You can obtain one at
// http://mozilla.org/MPL/2.0/.
//
// SPDX-License-Identifier: MPL-2.0

//! Configuration utils.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Encountered when the configuration cannot be loaded.
#[derive(Error, Debug)]
#[error("configuration error: {0}")]
pub struct ConfigError(#[from] toml::de::Error);

/// Default configuration TOML string.
const DEFAULT_CONFIG: &str = include_str!("../default_config.toml");

/// Represents a piece of configuration that can be merged with another one.
trait MergeableConfig {
    /// Merge this configuration object with another one, taking values not set in this object
    /// from the other one (if present).
    fn merge(&self, other: &Self) -> Self;
}

/// Library scanning configuration.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct LibraryConfig {
    /// Root directories to watch/process.
    pub roots: Option<Vec<PathBuf>>,
    /// File extensions considered audio files (without the leading dot).
    pub extensions: Option<Vec<String>>,
}

impl MergeableConfig for LibraryConfig {
    fn merge(&self, other: &Self) -> Self {
        LibraryConfig {
            roots: self.roots.clone().or_else(|| other.roots.clone()),
            extensions: self.extensions.clone().or_else(|| other.extensions.clone()),
        }
    }
}

/// Worker pool configuration.
#[derive(Debug, Default, Clone, Copy, Deserialize, Serialize)]
pub struct ConcurrencyConfig {
    /// Number of directory-processing workers. Forced to 1 in interactive mode regardless of
    /// this setting.
    pub worker_concurrency: Option<usize>,
}

impl MergeableConfig for ConcurrencyConfig {
    fn merge(&self, other: &Self) -> Self {
        ConcurrencyConfig {
            worker_concurrency: self.worker_concurrency.or(other.worker_concurrency),
        }
    }
}

/// Provider network configuration.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    /// Discogs personal access token; absent disables the Discogs provider.
    pub discogs_token: Option<String>,
    /// Number of retries for a transient network failure.
    pub network_retries: Option<u32>,
    /// Base backoff in milliseconds, doubled per retry attempt.
    pub network_backoff_ms: Option<u64>,
    /// Candidate releases fetched per search.
    pub release_candidate_limit: Option<u8>,
}

impl ProviderConfig {
    /// The configured base backoff as a [`Duration`], falling back to 500ms.
    #[must_use]
    pub fn network_backoff(&self) -> Duration {
        Duration::from_millis(self.network_backoff_ms.unwrap_or(500))
    }
}

impl MergeableConfig for ProviderConfig {
    fn merge(&self, other: &Self) -> Self {
        ProviderConfig {
            discogs_token: self.discogs_token.clone().or_else(|| other.discogs_token.clone()),
            network_retries: self.network_retries.or(other.network_retries),
            network_backoff_ms: self.network_backoff_ms.or(other.network_backoff_ms),
            release_candidate_limit: self
                .release_candidate_limit
                .or(other.release_candidate_limit)
                .filter(|&x| x != 0),
        }
    }
}

/// Scoring and decision thresholds. Mirrors the constants in [`crate::decision`] and
/// [`crate::scoring`], overridable for experimentation without a rebuild.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct ScoringConfig {
    /// Score gap within which candidates are considered ambiguous.
    pub ambiguity_gap: Option<f64>,
    /// Coverage below which a release is deferred as low-coverage.
    pub low_coverage_threshold: Option<f64>,
    /// Whether low-coverage/ambiguous decisions should be deferred instead of skipped when not
    /// interactive.
    pub defer_prompts: Option<bool>,
}

impl MergeableConfig for ScoringConfig {
    fn merge(&self, other: &Self) -> Self {
        ScoringConfig {
            ambiguity_gap: self.ambiguity_gap.or(other.ambiguity_gap),
            low_coverage_threshold: self.low_coverage_threshold.or(other.low_coverage_threshold),
            defer_prompts: self.defer_prompts.or(other.defer_prompts),
        }
    }
}

/// Cache database location.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Path to the SQLite cache database. Defaults to the XDG data directory when unset.
    pub database_path: Option<PathBuf>,
}

impl MergeableConfig for CacheConfig {
    fn merge(&self, other: &Self) -> Self {
        CacheConfig {
            database_path: self.database_path.clone().or_else(|| other.database_path.clone()),
        }
    }
}

/// Classical-work detection and performer-credits review thresholds.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct ClassicalConfig {
    /// Genre substrings (case-insensitive) that count toward the classical-work score.
    pub genre_keywords: Option<Vec<String>>,
    /// Minimum track duration, in seconds, that counts toward the classical-work score.
    pub min_duration_seconds: Option<u32>,
    /// Minimum number of classical tracks in a directory before credits review applies at all.
    pub credits_min_tracks: Option<usize>,
    /// Minimum fraction of classical tracks that must carry a performer hint.
    pub credits_min_coverage: Option<f64>,
    /// Minimum fraction of hinted tracks that must agree on the same performer hint.
    pub credits_min_consensus: Option<f64>,
    /// What to do when credits review is triggered: `"defer"` or `"prompt"`.
    pub credits_action: Option<String>,
}

impl MergeableConfig for ClassicalConfig {
    fn merge(&self, other: &Self) -> Self {
        ClassicalConfig {
            genre_keywords: self.genre_keywords.clone().or_else(|| other.genre_keywords.clone()),
            min_duration_seconds: self.min_duration_seconds.or(other.min_duration_seconds),
            credits_min_tracks: self.credits_min_tracks.or(other.credits_min_tracks),
            credits_min_coverage: self.credits_min_coverage.or(other.credits_min_coverage),
            credits_min_consensus: self.credits_min_consensus.or(other.credits_min_consensus),
            credits_action: self.credits_action.clone().or_else(|| other.credits_action.clone()),
        }
    }
}

/// The main configuration struct.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Library scanning configuration.
    pub library: LibraryConfig,
    /// Worker pool configuration.
    pub concurrency: ConcurrencyConfig,
    /// Provider configuration.
    pub providers: ProviderConfig,
    /// Scoring/decision thresholds.
    pub scoring: ScoringConfig,
    /// Cache configuration.
    pub cache: CacheConfig,
    /// Classical-work detection and credits-review thresholds.
    pub classical: ClassicalConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self::load_default().expect("failed to load default config")
    }
}

impl MergeableConfig for Config {
    fn merge(&self, other: &Self) -> Self {
        Config {
            library: self.library.merge(&other.library),
            concurrency: self.concurrency.merge(&other.concurrency),
            providers: self.providers.merge(&other.providers),
            scoring: self.scoring.merge(&other.scoring),
            cache: self.cache.merge(&other.cache),
            classical: self.classical.merge(&other.classical),
        }
    }
}

impl Config {
    /// Load the configuration from a string slice.
    fn load_from_str(text: &str) -> Result<Self, ConfigError> {
        let config = toml::from_str(text)?;
        Ok(config)
    }

    /// Load the default configuration.
    fn load_default() -> Result<Self, ConfigError> {
        Self::load_from_str(DEFAULT_CONFIG)
    }

    /// Load the configuration from a file located at the given path.
    ///
    /// # Errors
    ///
    /// This method can fail if the file cannot be accessed or if it contains malformed
    /// configuration markup.
    pub fn load_from_path<T: AsRef<Path>>(path: T) -> crate::error::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::load_from_str(&text)?;
        Ok(config)
    }

    /// Merge this configuration struct with the default values, filling in anything left unset.
    #[must_use]
    pub fn with_defaults(&self) -> Self {
        let default = Self::default();
        self.merge(&default)
    }

    /// Resolve the cache database path, falling back to the XDG data directory.
    pub fn resolve_cache_path(&self) -> crate::error::Result<PathBuf> {
        if let Some(path) = &self.cache.database_path {
            return Ok(path.clone());
        }
        let dirs = xdg::BaseDirectories::with_prefix("auricle")?;
        Ok(dirs.place_data_file("cache.sqlite3")?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_loads() {
        let config = Config::default();
        assert!(config.concurrency.worker_concurrency.unwrap_or(4) >= 1);
    }

    #[test]
    fn test_merge_prefers_self_then_falls_back() {
        let mut a = Config::default();
        a.providers.network_retries = Some(5);
        let b = Config::default();
        let merged = a.merge(&b);
        assert_eq!(merged.providers.network_retries, Some(5));
    }

    #[test]
    fn test_release_candidate_limit_zero_is_treated_as_unset() {
        let mut a = ProviderConfig::default();
        a.release_candidate_limit = Some(0);
        let b = ProviderConfig {
            release_candidate_limit: Some(8),
            ..ProviderConfig::default()
        };
        let merged = a.merge(&b);
        assert_eq!(merged.release_candidate_limit, Some(8));
    }
}
