//! Cache store for persisting API responses to disk
//!
//! Provides a `CacheStore` that keeps one JSON file per request identity,
//! named by the identity's hashed key. Freshness is decided at read time from
//! the entry's write timestamp and the [`ExpirationPolicy`] of its category.

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::key::{derive_category, derive_key};
use super::policy::ExpirationPolicy;

/// File extension of cache entries
const ENTRY_EXTENSION: &str = "json";

/// Errors raised by the cache's read and write paths
///
/// None of these reach callers of [`CacheStore::lookup`]; they exist so code
/// that cares can tell a miss from a failure.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Filesystem operation failed
    #[error("Cache I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Stored entry could not be parsed
    #[error("Corrupt cache entry {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Entry could not be serialized
    #[error("Failed to serialize cache entry: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl CacheError {
    fn io(path: &Path, source: io::Error) -> Self {
        CacheError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A cached response as stored on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Request identity the payload was fetched for
    pub url: String,
    /// Category used to pick the expiration policy
    pub category: String,
    /// When the payload was written
    pub cached_at: DateTime<Utc>,
    /// The upstream payload, stored verbatim
    pub data: Value,
}

/// Summary of the cache contents
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Number of readable entries
    pub total: usize,
    /// Entry count per category
    pub by_category: BTreeMap<String, usize>,
    /// Write time of the oldest entry
    pub oldest: Option<DateTime<Utc>>,
    /// Write time of the newest entry
    pub newest: Option<DateTime<Utc>>,
    /// Combined size of all readable entries in bytes
    pub total_size: u64,
}

/// Reads and writes cached responses under a single directory
///
/// Entries are never removed on expiry. A stale entry stays on disk and is
/// reported as absent by [`lookup`](Self::lookup) until it is overwritten or
/// cleared.
#[derive(Debug, Clone)]
pub struct CacheStore {
    /// Directory where cache files are stored
    cache_dir: PathBuf,
    /// TTL per category
    policy: ExpirationPolicy,
}

impl CacheStore {
    /// Creates a CacheStore using the XDG-compliant cache directory
    ///
    /// Uses `~/.cache/pitwall/` on Linux, or the equivalent path on other
    /// platforms. Returns `None` if no home directory can be determined.
    pub fn new(policy: ExpirationPolicy) -> Option<Self> {
        let cache_dir = default_cache_dir()?;
        Some(Self { cache_dir, policy })
    }

    /// Creates a CacheStore rooted at a custom directory
    pub fn with_dir(cache_dir: PathBuf, policy: ExpirationPolicy) -> Self {
        Self { cache_dir, policy }
    }

    /// Returns the cache root directory
    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Returns the expiration policy
    pub fn policy(&self) -> &ExpirationPolicy {
        &self.policy
    }

    /// Returns the path of the cache file for a request identity
    pub fn entry_path(&self, identity: &str) -> PathBuf {
        self.cache_dir
            .join(format!("{}.{}", derive_key(identity), ENTRY_EXTENSION))
    }

    /// Returns the cached payload for a request identity if it is still fresh
    ///
    /// Returns `None` when the entry is missing, expired or unreadable. A
    /// corrupt entry is deleted as a side effect.
    pub fn lookup(&self, identity: &str) -> Option<Value> {
        self.lookup_at(identity, Utc::now())
    }

    /// Same as [`lookup`](Self::lookup), with freshness judged at `now`
    pub fn lookup_at(&self, identity: &str, now: DateTime<Utc>) -> Option<Value> {
        let path = self.entry_path(identity);

        let entry = match self.read_entry(&path) {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                debug!(url = identity, "cache miss");
                return None;
            }
            Err(err) => {
                self.discard_unreadable(&path, &err);
                return None;
            }
        };

        let category = derive_category(identity);
        // A TTL reaching past the representable range never expires
        let Some(expires_at) = entry.cached_at.checked_add_signed(self.policy.ttl_for(&category)) else {
            debug!(url = identity, category = %category, "using cached data");
            return Some(entry.data);
        };

        if now < expires_at {
            debug!(url = identity, category = %category, "using cached data");
            Some(entry.data)
        } else {
            debug!(url = identity, category = %category, %expires_at, "cached data expired");
            None
        }
    }

    /// Writes a payload for a request identity, replacing any existing entry
    ///
    /// The write goes through a temporary file in the cache directory and is
    /// renamed into place, so readers never observe a partial entry.
    pub fn store(&self, identity: &str, payload: &Value) -> Result<(), CacheError> {
        self.store_at(identity, payload, Utc::now())
    }

    /// Same as [`store`](Self::store), recording `cached_at` as the write time
    pub fn store_at(
        &self,
        identity: &str,
        payload: &Value,
        cached_at: DateTime<Utc>,
    ) -> Result<(), CacheError> {
        self.ensure_dir()?;

        let entry = CacheEntry {
            url: identity.to_string(),
            category: derive_category(identity),
            cached_at,
            data: payload.clone(),
        };
        let json = serde_json::to_vec_pretty(&entry)?;

        let path = self.entry_path(identity);
        let mut file =
            NamedTempFile::new_in(&self.cache_dir).map_err(|e| CacheError::io(&self.cache_dir, e))?;
        file.write_all(&json).map_err(|e| CacheError::io(file.path(), e))?;
        file.persist(&path).map_err(|e| CacheError::io(&path, e.error))?;

        debug!(url = identity, category = %entry.category, "cached response");
        Ok(())
    }

    /// Deletes cached entries
    ///
    /// # Arguments
    /// * `category` - Only delete entries in this category, or all when `None`
    ///
    /// # Returns
    /// * `Ok(count)` - Number of entries deleted. Unreadable files are deleted
    ///   too but not counted.
    /// * `Err(CacheError)` - If the cache directory cannot be listed
    pub fn clear(&self, category: Option<&str>) -> Result<usize, CacheError> {
        let mut cleared = 0;

        for path in self.entry_files()? {
            match self.read_entry(&path) {
                Ok(Some(entry)) => {
                    if category.map_or(true, |c| c == entry.category) {
                        match fs::remove_file(&path) {
                            Ok(()) => cleared += 1,
                            Err(e) => warn!(path = %path.display(), error = %e, "failed to delete cache entry"),
                        }
                    }
                }
                Ok(None) => {}
                Err(err) => self.discard_unreadable(&path, &err),
            }
        }

        match category {
            Some(c) => info!(cleared, category = c, "cleared cache entries"),
            None => info!(cleared, "cleared cache entries"),
        }
        Ok(cleared)
    }

    /// Computes statistics over all readable entries
    ///
    /// Unreadable entries are deleted and left out of the counts.
    pub fn stats(&self) -> Result<CacheStats, CacheError> {
        let mut stats = CacheStats::default();

        for path in self.entry_files()? {
            let entry = match self.read_entry(&path) {
                Ok(Some(entry)) => entry,
                Ok(None) => continue,
                Err(err) => {
                    self.discard_unreadable(&path, &err);
                    continue;
                }
            };

            let size = match fs::metadata(&path) {
                Ok(metadata) => metadata.len(),
                Err(_) => continue,
            };

            stats.total += 1;
            stats.total_size += size;
            *stats.by_category.entry(entry.category).or_insert(0) += 1;

            if stats.oldest.map_or(true, |oldest| entry.cached_at < oldest) {
                stats.oldest = Some(entry.cached_at);
            }
            if stats.newest.map_or(true, |newest| entry.cached_at > newest) {
                stats.newest = Some(entry.cached_at);
            }
        }

        Ok(stats)
    }

    /// Ensures the cache directory exists
    fn ensure_dir(&self) -> Result<(), CacheError> {
        fs::create_dir_all(&self.cache_dir).map_err(|e| CacheError::io(&self.cache_dir, e))
    }

    /// Reads and parses one entry file
    ///
    /// # Returns
    /// * `Ok(None)` - The file does not exist
    /// * `Err(CacheError::Corrupt)` - The file exists but is not a valid entry
    /// * `Err(CacheError::Io)` - The file could not be read
    fn read_entry(&self, path: &Path) -> Result<Option<CacheEntry>, CacheError> {
        let content = match fs::read(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::io(path, e)),
        };

        serde_json::from_slice(&content)
            .map(Some)
            .map_err(|source| CacheError::Corrupt {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Removes a corrupt entry; other read failures are only logged
    fn discard_unreadable(&self, path: &Path, err: &CacheError) {
        match err {
            CacheError::Corrupt { .. } => {
                warn!(error = %err, "deleting corrupt cache entry");
                if let Err(e) = fs::remove_file(path) {
                    if e.kind() != io::ErrorKind::NotFound {
                        warn!(path = %path.display(), error = %e, "failed to delete corrupt cache entry");
                    }
                }
            }
            _ => debug!(error = %err, "skipping unreadable cache entry"),
        }
    }

    /// Lists entry files in the cache directory
    ///
    /// A missing directory is an empty cache.
    fn entry_files(&self) -> Result<Vec<PathBuf>, CacheError> {
        let read_dir = match fs::read_dir(&self.cache_dir) {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CacheError::io(&self.cache_dir, e)),
        };

        let mut files = Vec::new();
        for dir_entry in read_dir {
            let path = dir_entry.map_err(|e| CacheError::io(&self.cache_dir, e))?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == ENTRY_EXTENSION) {
                files.push(path);
            }
        }
        Ok(files)
    }
}

/// Returns the platform cache directory for pitwall, if one exists
pub fn default_cache_dir() -> Option<PathBuf> {
    let project_dirs = ProjectDirs::from("", "", "pitwall")?;
    Some(project_dirs.cache_dir().to_path_buf())
}
