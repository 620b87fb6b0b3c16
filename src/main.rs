// Copyright (c) 2024 Jan Holthuis <jan.holthuis@rub.de>
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a copy
// of the MPL was not distributed with this file, You can obtain one at
// http://mozilla.org/MPL/2.0/.
//
// SPDX-License-Identifier: MPL-2.0

//! Command line entry point.
//!
//! This binary is thin wiring around [`auricle`]'s library: it parses arguments, loads
//! configuration, opens the cache, and for `scan` supplies the capability implementations the
//! library leaves to its caller (tag I/O, organizing, providers). A real desktop/daemon frontend
//! would supply its own tag reader/writer and organizer; the ones here are a practical minimum so
//! the crate is runnable standalone.

use std::borrow::Cow;
use std::collections::HashMap;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use auricle::cache::Cache;
use auricle::classical::{ClassicalHeuristics, CreditsReviewThresholds};
use auricle::commands;
use auricle::config::Config;
use auricle::error::Result;
use auricle::heuristics::guess_metadata_from_path;
use auricle::model::{DirectoryBatch, TrackMetadata};
use auricle::pipeline::{self, Organizer, PipelineDeps, PipelineOutcome, TagReader};
use auricle::plan::TagWriter;
use auricle::provider::discogs::{DiscogsRelease, DiscogsProvider};
use auricle::provider::musicbrainz::MusicBrainzProvider;
use auricle::provider::Provider;
use auricle::prompt::InquirePrompt;
use auricle::util::walk_dir;

use clap::{Args as ClapArgs, Parser, Subcommand};
use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use log::LevelFilter;
use serde::Deserialize;
use simplelog::{ConfigBuilder as LogConfigBuilder, WriteLogger};
use xdg::BaseDirectories;

/// Crate name, used for the XDG application prefix and the MusicBrainz `User-Agent`.
const PKG_NAME: &str = "auricle";
/// Crate version, reported in the `User-Agent` header.
const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");
/// `User-Agent` MusicBrainz's API requires for application identification.
const USER_AGENT: &str = concat!("auricle/", env!("CARGO_PKG_VERSION"), " ( +https://github.com/Holzhaus/helicon )");

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Command to run.
    #[command(subcommand)]
    command: Commands,
    /// Path to a configuration file, merged on top of the built-in defaults.
    #[arg(short, long)]
    config_path: Option<PathBuf>,
    /// Show debug-level log output on the terminal as well as the log file.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve releases and build plans for every album directory under a library root.
    Scan(ScanArgs),
    /// Undo every recorded move, restoring files to their pre-apply locations.
    Rollback,
    /// Report deferred prompts, ignored directories, release homes and recent audit events.
    Doctor {
        /// Number of recent audit events to show.
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Drop cache rows for directories that no longer exist on disk.
    Cleanup,
}

#[derive(ClapArgs, Debug)]
struct ScanArgs {
    /// Library root to scan.
    path: PathBuf,
    /// Prompt interactively for ambiguous/low-coverage/no-candidate directories instead of
    /// deferring or skipping them.
    #[arg(short, long)]
    interactive: bool,
    /// Record planned changes to a JSONL journal instead of applying them.
    #[arg(long)]
    dry_run: bool,
    /// Re-prompt every directory regardless of its cached release/hash, even ones that would
    /// otherwise be skipped as unchanged.
    #[arg(long)]
    force_prompt: bool,
}

/// Append a numeric suffix (e.g. `.1`) to a path's extension.
fn append_numeric_suffix_to_path(base_path: impl AsRef<Path>, number: usize) -> PathBuf {
    let suffix: OsString = format!(".{number}").into();
    let new_extension = base_path.as_ref().extension().map_or_else(
        || OsString::from(&suffix),
        |ext| {
            let mut extension = ext.to_os_string();
            extension.push(&suffix);
            extension
        },
    );
    base_path.as_ref().with_extension(new_extension)
}

/// Rotate logfiles by renaming `<log>` to `<log>.0`, `<log>.1` to `<log>.2`, etc., keeping the
/// last 8 runs.
fn rotate_logfiles(base_path: impl AsRef<Path>) -> io::Result<()> {
    let paths_to_rename = (0..7)
        .rev()
        .map(|i| {
            (
                append_numeric_suffix_to_path(&base_path, i),
                append_numeric_suffix_to_path(&base_path, i + 1),
            )
        })
        .chain(std::iter::once((
            base_path.as_ref().to_path_buf(),
            append_numeric_suffix_to_path(&base_path, 0),
        )));
    for (old_path, new_path) in paths_to_rename {
        fs::rename(old_path, new_path).or_else(|err| match err.kind() {
            io::ErrorKind::NotFound => Ok(()),
            _ => Err(err),
        })?;
    }
    Ok(())
}

/// Best-effort [`TagReader`]: this crate's scope stops at deciding what to write, so container
/// formats aren't read here. Metadata is filled in from the filename alone; a real frontend
/// supplies a format-aware reader instead.
struct PathGuessTagReader;

impl TagReader for PathGuessTagReader {
    fn read_tags(&self, path: &Path) -> Result<(TrackMetadata, HashMap<String, String>)> {
        let mut meta = TrackMetadata::new(path);
        let guess = guess_metadata_from_path(path);
        meta.title = guess.title;
        meta.track_number = guess.track_number;
        Ok((meta, HashMap::new()))
    }
}

/// [`TagWriter`] that only logs what it would have written. Tag container I/O is out of this
/// crate's scope; a real frontend supplies one per format it supports.
struct LoggingTagWriter;

impl TagWriter for LoggingTagWriter {
    fn write_tags(&self, path: &Path, changes: &HashMap<String, auricle::model::TagChange>) -> Result<()> {
        for (field, change) in changes {
            log::info!(
                "{}: {} {:?} -> {:?}",
                path.display(),
                field,
                change.old,
                change.new
            );
        }
        Ok(())
    }
}

/// [`Organizer`] that never relocates files. Move/rollback plumbing specifics are out of this
/// crate's scope; a real frontend supplies a templated path layout instead.
struct NoopOrganizer;

impl Organizer for NoopOrganizer {
    fn target_path(&self, _meta: &TrackMetadata) -> Option<PathBuf> {
        None
    }
}

/// Raw response envelope from Discogs's `/database/search` endpoint.
#[derive(Debug, Deserialize)]
struct DiscogsSearchResponse {
    #[serde(default)]
    results: Vec<DiscogsSearchResult>,
}

/// One entry of a Discogs search response; only the release identifier is trustworthy here, so
/// the full release is fetched separately.
#[derive(Debug, Deserialize)]
struct DiscogsSearchResult {
    id: u64,
}

/// Maximum number of search results resolved into full releases per directory.
const DISCOGS_SEARCH_LIMIT: usize = 5;

async fn discogs_fetch_release(client: &reqwest::Client, token: &str, id: &str) -> Result<DiscogsRelease> {
    let url = format!("https://api.discogs.com/releases/{id}");
    let release = client
        .get(url)
        .header("Authorization", format!("Discogs token={token}"))
        .send()
        .await
        .map_err(reqwest_err)?
        .json::<DiscogsRelease>()
        .await
        .map_err(reqwest_err)?;
    Ok(release)
}

async fn discogs_search(
    client: &reqwest::Client,
    token: &str,
    artist: &str,
    album: &str,
) -> Result<Vec<DiscogsRelease>> {
    let response = client
        .get("https://api.discogs.com/database/search")
        .header("Authorization", format!("Discogs token={token}"))
        .query(&[("artist", artist), ("release_title", album), ("type", "release")])
        .send()
        .await
        .map_err(reqwest_err)?
        .json::<DiscogsSearchResponse>()
        .await
        .map_err(reqwest_err)?;

    let mut releases = Vec::new();
    for result in response.results.into_iter().take(DISCOGS_SEARCH_LIMIT) {
        releases.push(discogs_fetch_release(client, token, &result.id.to_string()).await?);
    }
    Ok(releases)
}

/// Convert a [`reqwest::Error`] into this crate's error type via its [`io::Error`] conversion,
/// since Discogs isn't part of the corpus this project is grounded on and so has no dedicated
/// error variant of its own.
fn reqwest_err(err: reqwest::Error) -> auricle::error::Error {
    io::Error::new(io::ErrorKind::Other, err.to_string()).into()
}

/// Count how many entries under `directory` have one of `extensions`, non-recursively.
fn count_audio_files(directory: &Path, extensions: &[String]) -> usize {
    let Ok(entries) = fs::read_dir(directory) else {
        return 0;
    };
    entries
        .filter_map(std::result::Result::ok)
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext)))
        })
        .count()
}

/// Walk `root` and yield one [`DirectoryBatch`] per directory containing at least one file with
/// an extension in `extensions`.
fn collect_directory_batches(root: PathBuf, extensions: &[String]) -> Vec<DirectoryBatch> {
    walk_dir(root)
        .filter_map(std::result::Result::ok)
        .filter_map(|(directory_path, _dirs, files)| {
            let file_paths: Vec<PathBuf> = files
                .into_iter()
                .filter(|path| {
                    path.extension()
                        .and_then(|ext| ext.to_str())
                        .is_some_and(|ext| extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext)))
                })
                .collect();
            if file_paths.is_empty() {
                None
            } else {
                Some(DirectoryBatch {
                    directory_path,
                    file_paths,
                })
            }
        })
        .collect()
}

async fn run_scan<'a>(config: &Config, cache: &'a Cache, args: ScanArgs) -> Result<()> {
    let extensions = config
        .library
        .extensions
        .clone()
        .unwrap_or_else(|| vec!["flac".to_string(), "mp3".to_string()]);

    let musicbrainz = MusicBrainzProvider::new(cache);
    let mut providers: Vec<Box<dyn Provider + 'a>> = vec![Box::new(musicbrainz)];

    if let Some(token) = config.providers.discogs_token.clone() {
        let discogs_client = Arc::new(
            reqwest::Client::builder()
                .user_agent(USER_AGENT)
                .build()
                .map_err(reqwest_err)?,
        );
        let fetch_client = Arc::clone(&discogs_client);
        let fetch_token = token.clone();
        let search_client = Arc::clone(&discogs_client);
        let search_token = token;
        let discogs = DiscogsProvider::new(
            cache,
            move |id: &str| -> BoxFuture<'static, Result<DiscogsRelease>> {
                let client = Arc::clone(&fetch_client);
                let token = fetch_token.clone();
                let id = id.to_string();
                Box::pin(async move { discogs_fetch_release(&client, &token, &id).await })
            },
            move |artist: &str, album: &str| -> BoxFuture<'static, Result<Vec<DiscogsRelease>>> {
                let client = Arc::clone(&search_client);
                let token = search_token.clone();
                let artist = artist.to_string();
                let album = album.to_string();
                Box::pin(async move { discogs_search(&client, &token, &artist, &album).await })
            },
        );
        providers.push(Box::new(discogs));
    }

    let tag_reader = PathGuessTagReader;
    let tag_writer = LoggingTagWriter;
    let organizer = NoopOrganizer;
    let prompt = InquirePrompt;
    let journal_path = if args.dry_run {
        Some(Path::new("dry_run.jsonl"))
    } else {
        None
    };

    let extensions_for_count = extensions.clone();
    let count_fn = move |path: &Path| count_audio_files(path, &extensions_for_count);

    let classical = ClassicalHeuristics::from_config(&config.classical);
    let classical_credits = CreditsReviewThresholds::from_config(&config.classical);

    let deps = PipelineDeps {
        cache,
        providers: &providers,
        tag_reader: &tag_reader,
        tag_writer: &tag_writer,
        organizer: &organizer,
        prompt: Some(&prompt),
        interactive: args.interactive,
        defer_prompts: config.scoring.defer_prompts.unwrap_or(true),
        dry_run: args.dry_run,
        journal_path,
        count_audio_files: &count_fn,
        classical: &classical,
        classical_credits,
    };

    let batches = collect_directory_batches(args.path, &extensions);
    log::info!("Found {} directories to process", batches.len());

    // Single-writer-per-directory cooperative scheduling over a bounded worker pool; forced to
    // size 1 in interactive mode so prompts are serialized.
    let worker_concurrency = if args.interactive {
        1
    } else {
        config.concurrency.worker_concurrency.unwrap_or(4).max(1)
    };

    stream::iter(batches)
        .map(|batch| {
            let directory = batch.directory_path.clone();
            let deps = &deps;
            async move {
                let outcome = pipeline::process_directory(deps, batch, args.force_prompt).await;
                (directory, outcome)
            }
        })
        .buffer_unordered(worker_concurrency)
        .for_each(|(directory, outcome)| async move {
            match outcome {
                PipelineOutcome::Applied(outcomes) => {
                    log::info!("{}: applied {} change(s)", directory.display(), outcomes.len());
                }
                PipelineOutcome::NoChanges => log::debug!("{}: no changes", directory.display()),
                PipelineOutcome::Skipped { reason } => {
                    log::info!("{}: skipped ({reason})", directory.display());
                }
                PipelineOutcome::Deferred { reason } => {
                    log::info!("{}: deferred ({reason})", directory.display());
                }
            }
        })
        .await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let base_dirs = BaseDirectories::with_prefix(PKG_NAME)?;

    let logfile_path = base_dirs.place_state_file(format!("{PKG_NAME}.log"))?;
    rotate_logfiles(&logfile_path)?;
    let logfile = File::create(logfile_path)?;
    let log_level = if args.verbose { LevelFilter::Debug } else { LevelFilter::Info };
    WriteLogger::init(
        log_level,
        LogConfigBuilder::new().add_filter_ignore_str("hyper").build(),
        logfile,
    )
    .expect("failed to initialize logging");
    log::info!("Started {PKG_NAME} {PKG_VERSION}");

    let config = match &args.config_path {
        Some(path) => Config::load_from_path(path)?.with_defaults(),
        None => {
            let found: Vec<Cow<'_, Path>> = base_dirs
                .find_config_files("config.toml")
                .map(Cow::from)
                .collect();
            match found.last() {
                Some(path) => Config::load_from_path(path)?.with_defaults(),
                None => Config::default(),
            }
        }
    };

    let cache_path = config.resolve_cache_path()?;
    let cache = Cache::open(&cache_path)?;

    musicbrainz_rs_nova::config::set_user_agent(USER_AGENT);

    match args.command {
        Commands::Scan(scan_args) => run_scan(&config, &cache, scan_args).await?,
        Commands::Rollback => {
            let count = commands::rollback::run(&cache)?;
            println!("Restored {count} file(s).");
        }
        Commands::Doctor { limit } => {
            let report = commands::doctor::run(&cache, limit)?;
            commands::doctor::print(&report);
        }
        Commands::Cleanup => {
            let removed = commands::cleanup::run(&cache)?;
            println!("Removed {removed} stale row(s).");
        }
    }

    Ok(())
}
