// Copyright (c) 2024 Jan Holthuis <jan.holthuis@rub.de>
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a copy
// of the MPL was not distributed with this file, You can obtain one at
// http://mozilla.org/MPL/2.0/.
//
// SPDX-License-Identifier: MPL-2.0

//! Persistent SQLite-backed cache: provider payload cache, the release cache contract (directory
//! and hint-keyed release associations, release homes), processed-file/move bookkeeping, and
//! audit events.
//!
//! A single [`rusqlite::Connection`] is shared behind one [`std::sync::Mutex`], matching the
//! concurrency model's "single SQLite connection guarded by a mutex, one transaction per write"
//! rule; every write method below opens exactly one transaction.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::hash::DirectoryHash;

/// Persistent cache handle.
pub struct Cache {
    conn: Mutex<Connection>,
}

impl Cache {
    /// Open (creating if necessary) the cache database at `path`, applying schema migrations.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(std::time::Duration::from_secs(15))?;

        let cache = Self {
            conn: Mutex::new(conn),
        };
        cache.migrate()?;
        Ok(cache)
    }

    /// Open an in-memory cache, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let cache = Self {
            conn: Mutex::new(conn),
        };
        cache.migrate()?;
        Ok(cache)
    }

    /// Forward-compatible schema migration: every table is created with `IF NOT EXISTS`, and
    /// any column added by a later version of this crate is added with `ALTER TABLE ... ADD
    /// COLUMN`, ignoring the error if the column already exists. This lets an older cache file
    /// be opened by a newer binary without an explicit migration step.
    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().expect("cache mutex poisoned");
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS provider_payloads (
                provider TEXT NOT NULL,
                kind TEXT NOT NULL,
                key TEXT NOT NULL,
                payload TEXT NOT NULL,
                inserted_at TEXT NOT NULL,
                PRIMARY KEY (provider, kind, key)
            );

            CREATE TABLE IF NOT EXISTS processed_files (
                path TEXT PRIMARY KEY,
                directory_hash TEXT,
                release_key TEXT,
                organized INTEGER NOT NULL DEFAULT 0,
                mtime_ns INTEGER,
                size_bytes INTEGER,
                processed_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS moves (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source_path TEXT NOT NULL,
                dest_path TEXT NOT NULL,
                moved_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS directory_releases (
                directory_path TEXT PRIMARY KEY,
                release_key TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS directory_hashes (
                directory_path TEXT PRIMARY KEY,
                directory_hash TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS hint_releases (
                hint_key TEXT PRIMARY KEY,
                release_key TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS hash_releases (
                directory_hash TEXT PRIMARY KEY,
                release_key TEXT NOT NULL,
                score REAL NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS release_homes (
                release_key TEXT PRIMARY KEY,
                directory_path TEXT NOT NULL,
                directory_hash TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS ignored_directories (
                directory_path TEXT PRIMARY KEY,
                reason TEXT NOT NULL,
                ignored_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS deferred_prompts (
                directory_path TEXT PRIMARY KEY,
                reason TEXT NOT NULL,
                deferred_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS canonical_names (
                raw_name TEXT PRIMARY KEY,
                canonical_name TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS audit_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                event_type TEXT NOT NULL,
                directory_path TEXT,
                payload TEXT NOT NULL,
                recorded_at TEXT NOT NULL
            );
            ",
        )?;
        // Forward-compatible column additions for caches created before these columns existed;
        // the error (duplicate column) is expected and ignored on every run after the first.
        let _ = conn.execute("ALTER TABLE processed_files ADD COLUMN mtime_ns INTEGER", []);
        let _ = conn.execute("ALTER TABLE processed_files ADD COLUMN size_bytes INTEGER", []);
        Ok(())
    }

    // -- provider payload cache ------------------------------------------------------------

    /// Fetch a cached provider payload (e.g. a serialized release) by provider/kind/key.
    pub fn get_payload(&self, provider: &str, kind: &str, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().expect("cache mutex poisoned");
        let payload = conn
            .query_row(
                "SELECT payload FROM provider_payloads WHERE provider = ?1 AND kind = ?2 AND key = ?3",
                params![provider, kind, key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(payload)
    }

    /// Insert or replace a cached provider payload.
    pub fn put_payload(&self, provider: &str, kind: &str, key: &str, payload: &str) -> Result<()> {
        let conn = self.conn.lock().expect("cache mutex poisoned");
        conn.execute(
            "INSERT INTO provider_payloads (provider, kind, key, payload, inserted_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(provider, kind, key) DO UPDATE SET payload = excluded.payload, inserted_at = excluded.inserted_at",
            params![provider, kind, key, payload, now()],
        )?;
        Ok(())
    }

    /// Fetch a cached release payload (shorthand for `get_payload(provider, "release", id)`).
    pub fn get_release_json(&self, provider: &str, release_id: &str) -> Result<Option<String>> {
        self.get_payload(provider, "release", release_id)
    }

    /// Cache a release payload.
    pub fn put_release_json(&self, provider: &str, release_id: &str, payload: &str) -> Result<()> {
        self.put_payload(provider, "release", release_id, payload)
    }

    // -- processed files / moves -------------------------------------------------------------

    /// Record that a file has been processed (and, if `organized`, moved/tagged in place).
    /// `stat` is the post-apply `(mtime_ns, size_bytes)`, used by the directory-already-processed
    /// skip policy to detect that a file has changed since it was last organized.
    pub fn record_processed_file(
        &self,
        path: &Path,
        directory_hash: Option<DirectoryHash>,
        release_key: Option<&str>,
        organized: bool,
        stat: Option<(i64, i64)>,
    ) -> Result<()> {
        let conn = self.conn.lock().expect("cache mutex poisoned");
        conn.execute(
            "INSERT INTO processed_files (path, directory_hash, release_key, organized, mtime_ns, size_bytes, processed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(path) DO UPDATE SET
                directory_hash = excluded.directory_hash,
                release_key = excluded.release_key,
                organized = excluded.organized,
                mtime_ns = excluded.mtime_ns,
                size_bytes = excluded.size_bytes,
                processed_at = excluded.processed_at",
            params![
                path.to_string_lossy(),
                directory_hash.map(DirectoryHash::to_hex),
                release_key,
                organized as i64,
                stat.map(|(mtime_ns, _)| mtime_ns),
                stat.map(|(_, size_bytes)| size_bytes),
                now(),
            ],
        )?;
        Ok(())
    }

    /// Whether `path` is recorded as processed and organized, with `mtime_ns`/`size_bytes`
    /// matching its current stat (the directory-already-processed skip policy, spec §4.1 stage
    /// 2's second skip condition).
    pub fn is_file_processed(&self, path: &Path, mtime_ns: i64, size_bytes: i64) -> Result<bool> {
        let conn = self.conn.lock().expect("cache mutex poisoned");
        let matches: bool = conn
            .query_row(
                "SELECT EXISTS(
                    SELECT 1 FROM processed_files
                    WHERE path = ?1 AND organized = 1 AND mtime_ns = ?2 AND size_bytes = ?3
                )",
                params![path.to_string_lossy(), mtime_ns, size_bytes],
                |row| row.get(0),
            )
            .optional()?
            .unwrap_or(false);
        Ok(matches)
    }

    /// Record a file move for rollback purposes.
    pub fn record_move(&self, source: &Path, dest: &Path) -> Result<()> {
        let conn = self.conn.lock().expect("cache mutex poisoned");
        conn.execute(
            "INSERT INTO moves (source_path, dest_path, moved_at) VALUES (?1, ?2, ?3)",
            params![source.to_string_lossy(), dest.to_string_lossy(), now()],
        )?;
        Ok(())
    }

    /// Fetch all recorded moves, most recent first (used by the rollback command).
    pub fn list_moves(&self) -> Result<Vec<MoveRecord>> {
        let conn = self.conn.lock().expect("cache mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, source_path, dest_path, moved_at FROM moves ORDER BY id DESC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(MoveRecord {
                    id: row.get(0)?,
                    source_path: PathBuf::from(row.get::<_, String>(1)?),
                    dest_path: PathBuf::from(row.get::<_, String>(2)?),
                    moved_at: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Delete a move record once it has been rolled back.
    pub fn delete_move(&self, id: i64) -> Result<()> {
        let conn = self.conn.lock().expect("cache mutex poisoned");
        conn.execute("DELETE FROM moves WHERE id = ?1", params![id])?;
        Ok(())
    }

    /// Clear the `organized` flag for a path after rolling it back.
    pub fn clear_organized(&self, path: &Path) -> Result<()> {
        let conn = self.conn.lock().expect("cache mutex poisoned");
        conn.execute(
            "UPDATE processed_files SET organized = 0 WHERE path = ?1",
            params![path.to_string_lossy()],
        )?;
        Ok(())
    }

    // -- release cache contract --------------------------------------------------------------

    /// Associate `directory_path` with `release_key` (one of possibly several ancestor paths
    /// persisted per the release cache contract).
    pub fn set_directory_release(&self, directory_path: &Path, release_key: &str) -> Result<()> {
        let conn = self.conn.lock().expect("cache mutex poisoned");
        conn.execute(
            "INSERT INTO directory_releases (directory_path, release_key, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(directory_path) DO UPDATE SET release_key = excluded.release_key, updated_at = excluded.updated_at",
            params![directory_path.to_string_lossy(), release_key, now()],
        )?;
        Ok(())
    }

    /// Look up the release associated with a directory path.
    pub fn get_directory_release(&self, directory_path: &Path) -> Result<Option<String>> {
        let conn = self.conn.lock().expect("cache mutex poisoned");
        let value = conn
            .query_row(
                "SELECT release_key FROM directory_releases WHERE directory_path = ?1",
                params![directory_path.to_string_lossy()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Persist the directory content hash used by the skip policy.
    pub fn set_directory_hash(&self, directory_path: &Path, hash: DirectoryHash) -> Result<()> {
        let conn = self.conn.lock().expect("cache mutex poisoned");
        conn.execute(
            "INSERT INTO directory_hashes (directory_path, directory_hash, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(directory_path) DO UPDATE SET directory_hash = excluded.directory_hash, updated_at = excluded.updated_at",
            params![directory_path.to_string_lossy(), hash.to_hex(), now()],
        )?;
        Ok(())
    }

    /// Look up the last-seen content hash for a directory.
    pub fn get_directory_hash(&self, directory_path: &Path) -> Result<Option<DirectoryHash>> {
        let conn = self.conn.lock().expect("cache mutex poisoned");
        let hex: Option<String> = conn
            .query_row(
                "SELECT directory_hash FROM directory_hashes WHERE directory_path = ?1",
                params![directory_path.to_string_lossy()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(hex.and_then(|hex| DirectoryHash::from_hex(&hex)))
    }

    /// Associate a canonical artist/album hint key with a release.
    pub fn set_hint_release(&self, hint_key: &str, release_key: &str) -> Result<()> {
        let conn = self.conn.lock().expect("cache mutex poisoned");
        conn.execute(
            "INSERT INTO hint_releases (hint_key, release_key, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(hint_key) DO UPDATE SET release_key = excluded.release_key, updated_at = excluded.updated_at",
            params![hint_key, release_key, now()],
        )?;
        Ok(())
    }

    /// Look up the release associated with a canonical hint key.
    pub fn get_hint_release(&self, hint_key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().expect("cache mutex poisoned");
        let value = conn
            .query_row(
                "SELECT release_key FROM hint_releases WHERE hint_key = ?1",
                params![hint_key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Associate a directory content hash with the release it was last resolved to. Unlike
    /// [`Self::set_hint_release`] (keyed by normalized artist/album name), this recognizes a
    /// directory that was renamed or moved but whose file contents are unchanged.
    pub fn set_hash_release(&self, directory_hash: DirectoryHash, release_key: &str, score: f64) -> Result<()> {
        let conn = self.conn.lock().expect("cache mutex poisoned");
        conn.execute(
            "INSERT INTO hash_releases (directory_hash, release_key, score, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(directory_hash) DO UPDATE SET
                release_key = excluded.release_key,
                score = excluded.score,
                updated_at = excluded.updated_at",
            params![directory_hash.to_hex(), release_key, score, now()],
        )?;
        Ok(())
    }

    /// Look up the release (and its last score) associated with a directory content hash.
    pub fn get_hash_release(&self, directory_hash: DirectoryHash) -> Result<Option<(String, f64)>> {
        let conn = self.conn.lock().expect("cache mutex poisoned");
        let value = conn
            .query_row(
                "SELECT release_key, score FROM hash_releases WHERE directory_hash = ?1",
                params![directory_hash.to_hex()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        Ok(value)
    }

    /// Record (or update) the "home" directory for a release: the directory its tracks were
    /// actually filed into, used by the singleton-home preference decision step.
    pub fn set_release_home(
        &self,
        release_key: &str,
        directory_path: &Path,
        hash: DirectoryHash,
    ) -> Result<()> {
        let conn = self.conn.lock().expect("cache mutex poisoned");
        conn.execute(
            "INSERT INTO release_homes (release_key, directory_path, directory_hash, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(release_key) DO UPDATE SET
                directory_path = excluded.directory_path,
                directory_hash = excluded.directory_hash,
                updated_at = excluded.updated_at",
            params![release_key, directory_path.to_string_lossy(), hash.to_hex(), now()],
        )?;
        Ok(())
    }

    /// Fetch the release-home record for a release, if any.
    pub fn get_release_home(&self, release_key: &str) -> Result<Option<ReleaseHome>> {
        let conn = self.conn.lock().expect("cache mutex poisoned");
        let row = conn
            .query_row(
                "SELECT directory_path, directory_hash FROM release_homes WHERE release_key = ?1",
                params![release_key],
                |row| {
                    let path: String = row.get(0)?;
                    let hash: String = row.get(1)?;
                    Ok((path, hash))
                },
            )
            .optional()?;
        Ok(row.and_then(|(path, hash)| {
            DirectoryHash::from_hex(&hash).map(|hash| ReleaseHome {
                directory_path: PathBuf::from(path),
                directory_hash: hash,
            })
        }))
    }

    /// Evict a release-home record, e.g. because its directory's content no longer matches.
    pub fn evict_release_home(&self, release_key: &str) -> Result<()> {
        let conn = self.conn.lock().expect("cache mutex poisoned");
        conn.execute(
            "DELETE FROM release_homes WHERE release_key = ?1",
            params![release_key],
        )?;
        Ok(())
    }

    /// Mark a directory as ignored (e.g. the user chose "skip" at a prompt).
    pub fn ignore_directory(&self, directory_path: &Path, reason: &str) -> Result<()> {
        let conn = self.conn.lock().expect("cache mutex poisoned");
        conn.execute(
            "INSERT INTO ignored_directories (directory_path, reason, ignored_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(directory_path) DO UPDATE SET reason = excluded.reason, ignored_at = excluded.ignored_at",
            params![directory_path.to_string_lossy(), reason, now()],
        )?;
        Ok(())
    }

    /// Whether a directory is currently ignored.
    pub fn is_ignored(&self, directory_path: &Path) -> Result<bool> {
        let conn = self.conn.lock().expect("cache mutex poisoned");
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM ignored_directories WHERE directory_path = ?1)",
            params![directory_path.to_string_lossy()],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Defer a prompt for a directory (e.g. low coverage in non-interactive mode).
    pub fn defer_prompt(&self, directory_path: &Path, reason: &str) -> Result<()> {
        let conn = self.conn.lock().expect("cache mutex poisoned");
        conn.execute(
            "INSERT INTO deferred_prompts (directory_path, reason, deferred_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(directory_path) DO UPDATE SET reason = excluded.reason, deferred_at = excluded.deferred_at",
            params![directory_path.to_string_lossy(), reason, now()],
        )?;
        Ok(())
    }

    /// Clear a deferred prompt once it's been resolved (decided on, or the user responded).
    pub fn clear_deferred_prompt(&self, directory_path: &Path) -> Result<()> {
        let conn = self.conn.lock().expect("cache mutex poisoned");
        conn.execute(
            "DELETE FROM deferred_prompts WHERE directory_path = ?1",
            params![directory_path.to_string_lossy()],
        )?;
        Ok(())
    }

    /// List every directory with a pending deferred prompt (used by the doctor command).
    pub fn list_deferred_prompts(&self) -> Result<Vec<(PathBuf, String)>> {
        let conn = self.conn.lock().expect("cache mutex poisoned");
        let mut stmt =
            conn.prepare("SELECT directory_path, reason FROM deferred_prompts ORDER BY directory_path")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((PathBuf::from(row.get::<_, String>(0)?), row.get(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// List every currently-ignored directory (used by the doctor command).
    pub fn list_ignored_directories(&self) -> Result<Vec<PathBuf>> {
        let conn = self.conn.lock().expect("cache mutex poisoned");
        let mut stmt =
            conn.prepare("SELECT directory_path FROM ignored_directories ORDER BY directory_path")?;
        let rows = stmt
            .query_map([], |row| Ok(PathBuf::from(row.get::<_, String>(0)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// List every release home, for the doctor command's stale-hash report.
    pub fn list_release_homes(&self) -> Result<Vec<(String, ReleaseHome)>> {
        let conn = self.conn.lock().expect("cache mutex poisoned");
        let mut stmt = conn
            .prepare("SELECT release_key, directory_path, directory_hash FROM release_homes")?;
        let rows = stmt
            .query_map([], |row| {
                let release_key: String = row.get(0)?;
                let path: String = row.get(1)?;
                let hash: String = row.get(2)?;
                Ok((release_key, path, hash))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows
            .into_iter()
            .filter_map(|(release_key, path, hash)| {
                DirectoryHash::from_hex(&hash).map(|hash| {
                    (
                        release_key,
                        ReleaseHome {
                            directory_path: PathBuf::from(path),
                            directory_hash: hash,
                        },
                    )
                })
            })
            .collect())
    }

    /// Remove cache rows whose directory no longer exists on disk. Returns the number of rows
    /// removed across all affected tables.
    pub fn cleanup_stale_directories(&self) -> Result<usize> {
        let conn = self.conn.lock().expect("cache mutex poisoned");
        let mut removed = 0usize;
        for table in [
            "directory_releases",
            "directory_hashes",
            "ignored_directories",
            "deferred_prompts",
        ] {
            let mut stmt =
                conn.prepare(&format!("SELECT directory_path FROM {table}"))?;
            let stale: Vec<String> = stmt
                .query_map([], |row| row.get(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?
                .into_iter()
                .filter(|path: &String| !Path::new(path).exists())
                .collect();
            for path in stale {
                conn.execute(&format!("DELETE FROM {table} WHERE directory_path = ?1"), params![path])?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    // -- canonical names ---------------------------------------------------------------------

    /// Record the canonical form of a raw artist/album name (populated by the identity
    /// clustering collaborator; this cache only stores/serves the result).
    pub fn set_canonical_name(&self, raw_name: &str, canonical_name: &str) -> Result<()> {
        let conn = self.conn.lock().expect("cache mutex poisoned");
        conn.execute(
            "INSERT INTO canonical_names (raw_name, canonical_name) VALUES (?1, ?2)
             ON CONFLICT(raw_name) DO UPDATE SET canonical_name = excluded.canonical_name",
            params![raw_name, canonical_name],
        )?;
        Ok(())
    }

    /// Look up the canonical form of a raw name, if recorded.
    pub fn get_canonical_name(&self, raw_name: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().expect("cache mutex poisoned");
        let value = conn
            .query_row(
                "SELECT canonical_name FROM canonical_names WHERE raw_name = ?1",
                params![raw_name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    // -- audit events ------------------------------------------------------------------------

    /// Record an audit event.
    pub fn record_audit_event(
        &self,
        event_type: &str,
        directory_path: Option<&Path>,
        payload: &str,
    ) -> Result<()> {
        let conn = self.conn.lock().expect("cache mutex poisoned");
        conn.execute(
            "INSERT INTO audit_events (event_type, directory_path, payload, recorded_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                event_type,
                directory_path.map(|p| p.to_string_lossy().into_owned()),
                payload,
                now(),
            ],
        )?;
        Ok(())
    }

    /// Fetch the most recent `limit` audit events, newest first.
    pub fn recent_audit_events(&self, limit: u32) -> Result<Vec<AuditEventRow>> {
        let conn = self.conn.lock().expect("cache mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT event_type, directory_path, payload, recorded_at FROM audit_events ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit], |row| {
                Ok(AuditEventRow {
                    event_type: row.get(0)?,
                    directory_path: row.get::<_, Option<String>>(1)?.map(PathBuf::from),
                    payload: row.get(2)?,
                    recorded_at: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

/// A recorded file move, used by the rollback command.
#[derive(Debug, Clone)]
pub struct MoveRecord {
    /// Row identifier.
    pub id: i64,
    /// Original path.
    pub source_path: PathBuf,
    /// Destination path.
    pub dest_path: PathBuf,
    /// When the move happened.
    pub moved_at: String,
}

/// A release's recorded "home" directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseHome {
    /// Directory path the release was last filed into.
    pub directory_path: PathBuf,
    /// Directory content hash at the time it was filed.
    pub directory_hash: DirectoryHash,
}

/// One row read back from `audit_events`.
#[derive(Debug, Clone)]
pub struct AuditEventRow {
    /// Event type name.
    pub event_type: String,
    /// Directory the event concerns, if any.
    pub directory_path: Option<PathBuf>,
    /// JSON-encoded payload.
    pub payload: String,
    /// Timestamp the event was recorded at.
    pub recorded_at: String,
}

fn now() -> String {
    DateTime::<Utc>::from(std::time::SystemTime::now()).to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_payload_roundtrip() {
        let cache = Cache::open_in_memory().unwrap();
        assert_eq!(cache.get_release_json("musicbrainz", "abc").unwrap(), None);
        cache.put_release_json("musicbrainz", "abc", "{}").unwrap();
        assert_eq!(
            cache.get_release_json("musicbrainz", "abc").unwrap(),
            Some("{}".to_string())
        );
    }

    #[test]
    fn test_directory_release_upsert() {
        let cache = Cache::open_in_memory().unwrap();
        let path = Path::new("/music/Artist/Album");
        cache.set_directory_release(path, "musicbrainz:r1").unwrap();
        assert_eq!(
            cache.get_directory_release(path).unwrap(),
            Some("musicbrainz:r1".to_string())
        );
        cache.set_directory_release(path, "musicbrainz:r2").unwrap();
        assert_eq!(
            cache.get_directory_release(path).unwrap(),
            Some("musicbrainz:r2".to_string())
        );
    }

    #[test]
    fn test_release_home_roundtrip() {
        let cache = Cache::open_in_memory().unwrap();
        let hash = DirectoryHash::compute([("a.flac", 1)]);
        cache
            .set_release_home("musicbrainz:r1", Path::new("/music/A"), hash)
            .unwrap();
        let home = cache.get_release_home("musicbrainz:r1").unwrap().unwrap();
        assert_eq!(home.directory_path, Path::new("/music/A"));
        assert_eq!(home.directory_hash, hash);
    }

    #[test]
    fn test_processed_file_stat_roundtrip() {
        let cache = Cache::open_in_memory().unwrap();
        let path = Path::new("/music/Artist/Album/01.flac");
        assert!(!cache.is_file_processed(path, 100, 200).unwrap());

        cache
            .record_processed_file(path, None, None, true, Some((100, 200)))
            .unwrap();
        assert!(cache.is_file_processed(path, 100, 200).unwrap());
        assert!(!cache.is_file_processed(path, 101, 200).unwrap());
    }

    #[test]
    fn test_hash_release_roundtrip() {
        let cache = Cache::open_in_memory().unwrap();
        let hash = DirectoryHash::compute([("a.flac", 1)]);
        assert_eq!(cache.get_hash_release(hash).unwrap(), None);

        cache.set_hash_release(hash, "musicbrainz:r1", 0.8).unwrap();
        assert_eq!(
            cache.get_hash_release(hash).unwrap(),
            Some(("musicbrainz:r1".to_string(), 0.8))
        );
    }

    #[test]
    fn test_hint_release_independent_of_hash_release() {
        let cache = Cache::open_in_memory().unwrap();
        let hash = DirectoryHash::compute([("a.flac", 1)]);
        cache.set_hash_release(hash, "musicbrainz:r1", 0.8).unwrap();
        cache.set_hint_release("hint://artist|album", "discogs:r2").unwrap();

        assert_eq!(
            cache.get_hash_release(hash).unwrap(),
            Some(("musicbrainz:r1".to_string(), 0.8))
        );
        assert_eq!(
            cache.get_hint_release("hint://artist|album").unwrap(),
            Some("discogs:r2".to_string())
        );
    }

    #[test]
    fn test_ignored_directories() {
        let cache = Cache::open_in_memory().unwrap();
        let path = Path::new("/music/Skip");
        assert!(!cache.is_ignored(path).unwrap());
        cache.ignore_directory(path, "user skipped").unwrap();
        assert!(cache.is_ignored(path).unwrap());
    }

    #[test]
    fn test_moves_and_rollback() {
        let cache = Cache::open_in_memory().unwrap();
        cache
            .record_move(Path::new("/a/1.flac"), Path::new("/b/1.flac"))
            .unwrap();
        let moves = cache.list_moves().unwrap();
        assert_eq!(moves.len(), 1);
        cache.delete_move(moves[0].id).unwrap();
        assert!(cache.list_moves().unwrap().is_empty());
    }

    #[test]
    fn test_audit_events_ordering() {
        let cache = Cache::open_in_memory().unwrap();
        cache.record_audit_event("skip", None, "{\"n\":1}").unwrap();
        cache.record_audit_event("skip", None, "{\"n\":2}").unwrap();
        let events = cache.recent_audit_events(10).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].payload, "{\"n\":2}");
    }
}
