//! SQLite-backed named cache storage with file blob support
//!
//! Mirrors the platform Cache Storage API: a set of named caches, each a
//! map from request key to a complete response. Small bodies are stored
//! inline in SQLite, large bodies (>10KB) as files.

use chrono::Utc;
use reqwest::Url;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::key::{blob_hash, request_key};
use crate::client::Response;
use crate::error::CacheError;

/// Schema version - increment to trigger nuke-and-rebuild
const SCHEMA_VERSION: i32 = 1;

/// Bodies larger than this are stored as external blobs
const INLINE_THRESHOLD: usize = 10 * 1024; // 10KB

type Result<T> = std::result::Result<T, CacheError>;

/// Named cache storage shared by every worker component.
///
/// Each operation is atomic on its own; a read followed by a write is not.
pub struct CacheStore {
    conn: Mutex<Connection>,
    blobs_dir: PathBuf,
    root: PathBuf,
}

impl CacheStore {
    /// Open storage at `dir`, or the default XDG cache location
    pub fn open_default(dir: Option<&Path>) -> Result<Self> {
        match dir {
            Some(dir) => Self::open_at(dir),
            None => Self::open_at(&Self::default_dir()?),
        }
    }

    /// Default cache directory (~/.cache/nhka-offline on Linux)
    pub fn default_dir() -> Result<PathBuf> {
        let cache_base = dirs::cache_dir().ok_or(CacheError::NoCacheDir)?;
        Ok(cache_base.join("nhka-offline"))
    }

    /// Open storage at a specific directory
    pub fn open_at(cache_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(cache_dir)
            .map_err(|e| CacheError::Io(format!("Failed to create cache dir: {}", e)))?;

        let db_path = cache_dir.join("cache.db");
        let blobs_dir = cache_dir.join("blobs");
        std::fs::create_dir_all(&blobs_dir)
            .map_err(|e| CacheError::Io(format!("Failed to create blobs dir: {}", e)))?;

        let conn = Connection::open(&db_path)?;

        let version: i32 = conn
            .pragma_query_value(None, "user_version", |r| r.get(0))
            .unwrap_or(0);

        if version != 0 && version != SCHEMA_VERSION {
            log::info!(
                "Cache schema version mismatch ({} != {}), rebuilding",
                version,
                SCHEMA_VERSION
            );
            drop(conn);
            Self::nuke(&db_path, &blobs_dir)?;
            return Self::open_at(cache_dir);
        }

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS caches (
                name TEXT PRIMARY KEY NOT NULL,
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS entries (
                cache_name TEXT NOT NULL,
                request_key TEXT NOT NULL,
                url TEXT NOT NULL,
                status INTEGER NOT NULL,
                headers TEXT NOT NULL,
                body BLOB,
                blob_path TEXT,
                size_bytes INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                PRIMARY KEY (cache_name, request_key)
            );

            CREATE TABLE IF NOT EXISTS registration (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                active_generation TEXT,
                waiting_generation TEXT,
                state TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )?;

        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;

        Ok(Self {
            conn: Mutex::new(conn),
            blobs_dir,
            root: cache_dir.to_path_buf(),
        })
    }

    /// Directory this store lives in
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| CacheError::Database("cache connection lock poisoned".to_string()))
    }

    /// Open (creating if needed) a named cache. Idempotent.
    pub fn open(&self, name: &str) -> Result<()> {
        self.conn()?.execute(
            "INSERT OR IGNORE INTO caches (name, created_at) VALUES (?1, ?2)",
            params![name, Utc::now().timestamp()],
        )?;
        Ok(())
    }

    /// Whether a named cache exists
    pub fn has(&self, name: &str) -> Result<bool> {
        let found: Option<String> = self
            .conn()?
            .query_row("SELECT name FROM caches WHERE name = ?1", [name], |r| {
                r.get(0)
            })
            .optional()?;
        Ok(found.is_some())
    }

    /// Names of all caches, in creation order
    pub fn keys(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT name FROM caches ORDER BY created_at, rowid")?;
        let names = stmt
            .query_map([], |r| r.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(names)
    }

    /// Store a copy of `response` under the request key of `url`,
    /// overwriting any previous entry. Opens the cache if needed.
    pub fn put(&self, name: &str, url: &Url, response: &Response) -> Result<()> {
        self.open(name)?;

        let key = request_key(url);
        let headers = serde_json::to_string(&response.headers)
            .map_err(|e| CacheError::Serialize(e.to_string()))?;
        let now = Utc::now().timestamp();

        // Drop any blob of the entry being replaced
        self.remove_blob_for(name, &key)?;

        if response.body.len() <= INLINE_THRESHOLD {
            self.conn()?.execute(
                "INSERT OR REPLACE INTO entries
                 (cache_name, request_key, url, status, headers, body, blob_path, size_bytes, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, ?7, ?8)",
                params![
                    name,
                    key,
                    url.as_str(),
                    response.status,
                    headers,
                    response.body,
                    response.body.len(),
                    now
                ],
            )?;
        } else {
            let blob_path = self.write_blob(name, &key, &response.body)?;
            self.conn()?.execute(
                "INSERT OR REPLACE INTO entries
                 (cache_name, request_key, url, status, headers, body, blob_path, size_bytes, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6, ?7, ?8)",
                params![
                    name,
                    key,
                    url.as_str(),
                    response.status,
                    headers,
                    blob_path,
                    response.body.len(),
                    now
                ],
            )?;
        }
        Ok(())
    }

    /// Look up `url` in one named cache
    pub fn match_in(&self, name: &str, url: &Url) -> Result<Option<Response>> {
        let key = request_key(url);

        let row: Option<(u16, String, Option<Vec<u8>>, Option<String>)> = self
            .conn()?
            .query_row(
                "SELECT status, headers, body, blob_path FROM entries
                 WHERE cache_name = ?1 AND request_key = ?2",
                params![name, key],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
            )
            .optional()?;

        let Some((status, headers, body, blob_path)) = row else {
            return Ok(None);
        };

        let headers: Vec<(String, String)> = serde_json::from_str(&headers)
            .map_err(|e| CacheError::Serialize(e.to_string()))?;

        let body = match (body, blob_path) {
            (Some(body), None) => body,
            (None, Some(blob_path)) => match std::fs::read(self.blobs_dir.join(&blob_path)) {
                Ok(data) => data,
                Err(e) => {
                    log::warn!("Failed to read blob {}: {}", blob_path, e);
                    // Delete stale entry
                    let _ = self.conn()?.execute(
                        "DELETE FROM entries WHERE cache_name = ?1 AND request_key = ?2",
                        params![name, key],
                    );
                    return Ok(None);
                }
            },
            _ => Vec::new(),
        };

        Ok(Some(Response::new(status, headers, body)))
    }

    /// Remove one entry from a named cache. Returns whether it existed.
    pub fn remove(&self, name: &str, url: &Url) -> Result<bool> {
        let key = request_key(url);
        self.remove_blob_for(name, &key)?;
        let removed = self.conn()?.execute(
            "DELETE FROM entries WHERE cache_name = ?1 AND request_key = ?2",
            params![name, key],
        )?;
        Ok(removed > 0)
    }

    /// Look up `url` across every cache whose name satisfies `filter`, in
    /// cache creation order. First hit wins.
    pub fn match_any<P>(&self, url: &Url, filter: P) -> Result<Option<Response>>
    where
        P: Fn(&str) -> bool,
    {
        for name in self.keys()?.into_iter().filter(|n| filter(n)) {
            if let Some(response) = self.match_in(&name, url)? {
                return Ok(Some(response));
            }
        }
        Ok(None)
    }

    /// Delete a named cache with all its entries. Returns whether it existed.
    pub fn delete(&self, name: &str) -> Result<bool> {
        let blob_paths: Vec<String> = {
            let conn = self.conn()?;
            let mut stmt = conn.prepare(
                "SELECT blob_path FROM entries WHERE cache_name = ?1 AND blob_path IS NOT NULL",
            )?;
            stmt.query_map([name], |r| r.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?
        };

        for blob in blob_paths {
            if let Err(e) = std::fs::remove_file(self.blobs_dir.join(&blob)) {
                log::warn!("Failed to remove blob {}: {}", blob, e);
            }
        }

        let conn = self.conn()?;
        conn.execute("DELETE FROM entries WHERE cache_name = ?1", [name])?;
        let deleted = conn.execute("DELETE FROM caches WHERE name = ?1", [name])?;
        Ok(deleted > 0)
    }

    /// Delete every cache whose name satisfies `predicate`; returns the
    /// names that were deleted.
    pub fn delete_matching<P>(&self, predicate: P) -> Result<Vec<String>>
    where
        P: Fn(&str) -> bool,
    {
        let mut deleted = Vec::new();
        for name in self.keys()?.into_iter().filter(|n| predicate(n)) {
            if self.delete(&name)? {
                deleted.push(name);
            }
        }
        Ok(deleted)
    }

    /// Number of entries in a named cache
    pub fn entry_count(&self, name: &str) -> Result<usize> {
        let count: i64 = self.conn()?.query_row(
            "SELECT COUNT(*) FROM entries WHERE cache_name = ?1",
            [name],
            |r| r.get(0),
        )?;
        Ok(count as usize)
    }

    /// Summaries of every entry in a named cache
    pub fn entries(&self, name: &str) -> Result<Vec<EntrySummary>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT url, status, size_bytes, created_at FROM entries
             WHERE cache_name = ?1 ORDER BY url",
        )?;
        let entries = stmt
            .query_map([name], |r| {
                Ok(EntrySummary {
                    url: r.get(0)?,
                    status: r.get(1)?,
                    size_bytes: r.get::<_, i64>(2)? as usize,
                    created_at: r.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Aggregate statistics over all caches
    pub fn stats(&self) -> Result<CacheStats> {
        let conn = self.conn()?;
        let caches: i64 = conn.query_row("SELECT COUNT(*) FROM caches", [], |r| r.get(0))?;
        let total_entries: i64 =
            conn.query_row("SELECT COUNT(*) FROM entries", [], |r| r.get(0))?;
        let total_size: i64 = conn.query_row(
            "SELECT COALESCE(SUM(size_bytes), 0) FROM entries",
            [],
            |r| r.get(0),
        )?;

        Ok(CacheStats {
            caches: caches as usize,
            total_entries: total_entries as usize,
            total_size_bytes: total_size as usize,
        })
    }

    /// Load the persisted worker registration, if any
    pub fn load_registration(&self) -> Result<Option<RegistrationRecord>> {
        let record = self
            .conn()?
            .query_row(
                "SELECT active_generation, waiting_generation, state, updated_at
                 FROM registration WHERE id = 1",
                [],
                |r| {
                    Ok(RegistrationRecord {
                        active_generation: r.get(0)?,
                        waiting_generation: r.get(1)?,
                        state: r.get(2)?,
                        updated_at: r.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    /// Persist the worker registration
    pub fn save_registration(&self, record: &RegistrationRecord) -> Result<()> {
        self.conn()?.execute(
            "INSERT OR REPLACE INTO registration
             (id, active_generation, waiting_generation, state, updated_at)
             VALUES (1, ?1, ?2, ?3, ?4)",
            params![
                record.active_generation,
                record.waiting_generation,
                record.state,
                record.updated_at
            ],
        )?;
        Ok(())
    }

    fn remove_blob_for(&self, name: &str, key: &str) -> Result<()> {
        let existing: Option<Option<String>> = self
            .conn()?
            .query_row(
                "SELECT blob_path FROM entries WHERE cache_name = ?1 AND request_key = ?2",
                params![name, key],
                |r| r.get(0),
            )
            .optional()?;

        if let Some(Some(blob)) = existing {
            if let Err(e) = std::fs::remove_file(self.blobs_dir.join(&blob)) {
                log::warn!("Failed to remove replaced blob {}: {}", blob, e);
            }
        }
        Ok(())
    }

    /// Write a blob file, sharded by first 2 chars of its hash
    fn write_blob(&self, name: &str, key: &str, data: &[u8]) -> Result<String> {
        let hash = blob_hash(name, key);
        let shard = &hash[..2];
        let shard_dir = self.blobs_dir.join(shard);
        std::fs::create_dir_all(&shard_dir)
            .map_err(|e| CacheError::Io(format!("Failed to create shard dir: {}", e)))?;

        let filename = format!("{}.bin", hash);
        let rel_path = format!("{}/{}", shard, filename);

        std::fs::write(shard_dir.join(&filename), data)
            .map_err(|e| CacheError::Io(format!("Failed to write blob: {}", e)))?;

        Ok(rel_path)
    }

    /// Nuke the store (delete DB and all blobs)
    fn nuke(db_path: &Path, blobs_dir: &Path) -> Result<()> {
        if db_path.exists() {
            std::fs::remove_file(db_path)
                .map_err(|e| CacheError::Io(format!("Failed to remove cache DB: {}", e)))?;
        }
        if blobs_dir.exists() {
            std::fs::remove_dir_all(blobs_dir)
                .map_err(|e| CacheError::Io(format!("Failed to remove blobs dir: {}", e)))?;
        }
        Ok(())
    }
}

/// One row of a cache listing
#[derive(Debug, Clone)]
pub struct EntrySummary {
    pub url: String,
    pub status: u16,
    pub size_bytes: usize,
    pub created_at: i64,
}

/// Statistics about the whole store
#[derive(Debug)]
pub struct CacheStats {
    pub caches: usize,
    pub total_entries: usize,
    pub total_size_bytes: usize,
}

/// Persisted worker registration, stored as plain strings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationRecord {
    pub active_generation: Option<String>,
    pub waiting_generation: Option<String>,
    pub state: String,
    pub updated_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_store() -> (CacheStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::open_at(dir.path()).unwrap();
        (store, dir)
    }

    fn url(path: &str) -> Url {
        Url::parse("http://localhost:5173").unwrap().join(path).unwrap()
    }

    #[test]
    fn test_open_is_idempotent() {
        let (store, _dir) = test_store();
        store.open("nhka-static-v3").unwrap();
        store.open("nhka-static-v3").unwrap();
        assert_eq!(store.keys().unwrap(), vec!["nhka-static-v3"]);
        assert!(store.has("nhka-static-v3").unwrap());
        assert!(!store.has("nhka-data-v3").unwrap());
    }

    #[test]
    fn test_put_match_inline() {
        let (store, _dir) = test_store();
        let resp = Response::text(200, "hello");

        store.put("nhka-data-v3", &url("/rest/v1/wyke"), &resp).unwrap();

        let hit = store.match_in("nhka-data-v3", &url("/rest/v1/wyke")).unwrap();
        assert_eq!(hit, Some(resp));
        assert!(store.match_in("nhka-static-v3", &url("/rest/v1/wyke")).unwrap().is_none());
    }

    #[test]
    fn test_put_match_blob() {
        let (store, dir) = test_store();
        let body = vec![0xffu8; 20_000]; // 20KB - will use blob
        let resp = Response::new(200, vec![], body.clone());

        store.put("nhka-documents-v3", &url("/big.pdf"), &resp).unwrap();

        let hit = store
            .match_in("nhka-documents-v3", &url("/big.pdf"))
            .unwrap()
            .unwrap();
        assert_eq!(hit.body, body);
        assert!(dir.path().join("blobs").read_dir().unwrap().count() > 0);
    }

    #[test]
    fn test_put_overwrites() {
        let (store, _dir) = test_store();
        store.put("c", &url("/a.js"), &Response::text(200, "v1")).unwrap();
        store.put("c", &url("/a.js"), &Response::text(200, "v2")).unwrap();

        let hit = store.match_in("c", &url("/a.js")).unwrap().unwrap();
        assert_eq!(hit.body_text(), Some("v2"));
        assert_eq!(store.entry_count("c").unwrap(), 1);
    }

    #[test]
    fn test_remove_single_entry() {
        let (store, _dir) = test_store();
        store.put("c", &url("/a.js"), &Response::text(200, "a")).unwrap();
        store
            .put("c", &url("/big.pdf"), &Response::new(200, vec![], vec![7; 20_000]))
            .unwrap();

        assert!(store.remove("c", &url("/big.pdf")).unwrap());
        assert!(!store.remove("c", &url("/big.pdf")).unwrap());
        assert_eq!(store.entry_count("c").unwrap(), 1);
        assert!(store.has("c").unwrap());
    }

    #[test]
    fn test_match_any_respects_filter_and_order() {
        let (store, _dir) = test_store();
        store.put("other-v1", &url("/"), &Response::text(200, "foreign")).unwrap();
        store.put("nhka-static-v3", &url("/"), &Response::text(200, "shell")).unwrap();

        let hit = store
            .match_any(&url("/"), |n| n.starts_with("nhka-"))
            .unwrap()
            .unwrap();
        assert_eq!(hit.body_text(), Some("shell"));
    }

    #[test]
    fn test_delete_removes_entries_and_blobs() {
        let (store, _dir) = test_store();
        store
            .put("c", &url("/big.pdf"), &Response::new(200, vec![], vec![1; 20_000]))
            .unwrap();

        assert!(store.delete("c").unwrap());
        assert!(!store.delete("c").unwrap());
        assert!(store.match_in("c", &url("/big.pdf")).unwrap().is_none());
        assert_eq!(store.stats().unwrap().total_entries, 0);
    }

    #[test]
    fn test_delete_matching() {
        let (store, _dir) = test_store();
        for name in ["nhka-static-v2", "nhka-data-v2", "nhka-static-v3", "other-v2"] {
            store.open(name).unwrap();
        }

        let deleted = store
            .delete_matching(|n| n.starts_with("nhka-") && !n.ends_with("-v3"))
            .unwrap();

        assert_eq!(deleted.len(), 2);
        assert_eq!(store.keys().unwrap(), vec!["nhka-static-v3", "other-v2"]);
    }

    #[test]
    fn test_entries_and_stats() {
        let (store, _dir) = test_store();
        store.put("c", &url("/a.js"), &Response::text(200, "aaa")).unwrap();
        store.put("c", &url("/b.css"), &Response::text(200, "bb")).unwrap();

        let entries = store.entries("c").unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].url.ends_with("/a.js"));
        assert_eq!(entries[0].size_bytes, 3);

        let stats = store.stats().unwrap();
        assert_eq!(stats.caches, 1);
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.total_size_bytes, 5);
    }

    #[test]
    fn test_registration_roundtrip() {
        let (store, _dir) = test_store();
        assert!(store.load_registration().unwrap().is_none());

        let record = RegistrationRecord {
            active_generation: Some("v3".to_string()),
            waiting_generation: None,
            state: "active".to_string(),
            updated_at: 42,
        };
        store.save_registration(&record).unwrap();
        assert_eq!(store.load_registration().unwrap(), Some(record));
    }

    #[test]
    fn test_reopen_keeps_data() {
        let dir = TempDir::new().unwrap();
        {
            let store = CacheStore::open_at(dir.path()).unwrap();
            store.put("c", &url("/a.js"), &Response::text(200, "x")).unwrap();
        }
        let store = CacheStore::open_at(dir.path()).unwrap();
        assert!(store.match_in("c", &url("/a.js")).unwrap().is_some());
    }
}
