// Copyright (c) 2024 Jan Holthuis <jan.holthuis@rub.de>
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a copy
// of the MPL was not distributed with this file, You can obtain one at
// http://mozilla.org/MPL/2.0/.
//
// SPDX-License-Identifier: MPL-2.0

//! Error and result types.

use std::io;
use thiserror::Error;

/// Main error type.
///
/// Per the propagation policy, none of these variants are ever allowed to escape
/// [`crate::pipeline::process_directory`]; they are downgraded to a recorded skip reason and a
/// log message instead.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
    /// Cache access failed.
    #[error("cache access failed: {0}")]
    Cache(#[from] rusqlite::Error),
    /// I/O error.
    #[error("input/output error: {0}")]
    Io(#[from] io::Error),
    /// JSON (de)serialization failure, e.g. while reading/writing a cache envelope.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// XDG BaseDirectories error.
    #[error("base directories error: {0}")]
    BaseDirectories(#[from] xdg::BaseDirectoriesError),
    /// A MusicBrainz API request failed.
    #[error("MusicBrainz request failed: {0}")]
    MusicBrainzRequest(#[from] musicbrainz_rs_nova::Error),
    /// A provider lookup could not be completed after retrying.
    #[error("provider lookup failed for {provider}: {reason}")]
    ProviderLookupFailed {
        /// Name of the provider that failed.
        provider: &'static str,
        /// Human readable failure reason.
        reason: String,
    },
    /// The provider is in its cooldown window after repeated failures.
    #[error("provider {0} is in cooldown")]
    ProviderCooldown(&'static str),
    /// An error from the interactive prompt capability.
    #[error("prompt error: {0}")]
    Prompt(#[from] inquire::InquireError),
    /// A planned update could not be applied and was rolled back.
    #[error("failed to apply plan for {path}: {reason}")]
    PlanApplyFailed {
        /// Path the plan targeted.
        path: std::path::PathBuf,
        /// Human readable failure reason.
        reason: String,
    },
}

/// Convenience type.
pub type Result<T> = std::result::Result<T, Error>;
