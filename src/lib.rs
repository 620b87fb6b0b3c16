// Copyright (c) 2024 Jan Holthuis <jan.holthuis@rub.de>
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a copy
// of the MPL was not distributed with this file, You can obtain one at
// http://mozilla.org/MPL/2.0/.
//
// SPDX-License-Identifier: MPL-2.0

//! Release resolution and track assignment daemon core for tagged music libraries.
//!
//! This crate owns the part of an audio-library tagging daemon that decides *what a directory
//! of audio files is*: matching a directory's tracks against release candidates from metadata
//! providers, assigning tracks to release positions, and turning the result into a plan of tag
//! and filesystem changes. Filesystem scanning, tag container I/O and the interactive terminal
//! frontend live outside this crate and plug in through the capability traits in
//! [`provider`], [`pipeline`] and [`plan`].

pub mod assignment;
pub mod audit;
pub mod cache;
pub mod classical;
pub mod commands;
pub mod config;
pub mod decision;
pub mod distance;
pub mod error;
pub mod hash;
pub mod heuristics;
pub mod model;
pub mod pipeline;
pub mod plan;
pub mod prompt;
pub mod provider;
pub mod releasehome;
pub mod retry;
pub mod scoring;
pub mod util;

pub use error::{Error, Result};
