//! Content-addressed on-disk cache for API responses.
//!
//! Entries are keyed by a stable hash of the request URL plus its
//! parameters serialized in canonical (sorted-key) form, so parameter
//! ordering never affects cache identity. Validity is gated at read time
//! by a TTL; stale entries are simply misses and are never evicted.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Envelope format version. Bump on any incompatible change; entries
/// with a different version read as misses.
const ENVELOPE_VERSION: u32 = 1;

/// Errors that can occur during cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache envelope error: {0}")]
    Envelope(#[from] serde_json::Error),
}

/// A cached API response with a subset of its headers.
///
/// Only successful (200) responses are ever stored; the fetch layer
/// enforces this.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheEnvelope {
    pub version: u32,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// Epoch seconds at the time of `put`.
    pub stored_at: u64,
}

impl CacheEnvelope {
    pub fn new(status: u16, headers: Vec<(String, String)>, body: Vec<u8>) -> Self {
        Self {
            version: ENVELOPE_VERSION,
            status,
            headers,
            body,
            stored_at: epoch_seconds(),
        }
    }
}

fn epoch_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Compute the cache key for a URL and parameter set.
///
/// Parameters are sorted by key before hashing, so any insertion order
/// yields the same key.
#[must_use]
pub fn cache_key(url: &str, params: &[(String, String)]) -> String {
    let mut sorted: Vec<&(String, String)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    for (k, v) in sorted {
        hasher.update(b"&");
        hasher.update(k.as_bytes());
        hasher.update(b"=");
        hasher.update(v.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// TTL-bounded on-disk response cache, one JSON file per key.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    dir: PathBuf,
    ttl: Duration,
}

impl ResponseCache {
    /// Open (and create if needed) a cache rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>, ttl: Duration) -> Result<Self, CacheError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, ttl })
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    /// Look up an entry. Absent, unreadable, wrong-version, and expired
    /// entries are all misses.
    pub fn get(&self, key: &str) -> Option<CacheEnvelope> {
        let path = self.entry_path(key);
        let bytes = fs::read(&path).ok()?;
        let envelope: CacheEnvelope = serde_json::from_slice(&bytes).ok()?;

        if envelope.version != ENVELOPE_VERSION {
            return None;
        }
        if epoch_seconds().saturating_sub(envelope.stored_at) >= self.ttl.as_secs() {
            return None;
        }
        Some(envelope)
    }

    /// Store an entry. Failures are surfaced so the caller can log and
    /// continue; a failed write never aborts a harvest.
    pub fn put(&self, key: &str, envelope: &CacheEnvelope) -> Result<(), CacheError> {
        let path = self.entry_path(key);
        let bytes = serde_json::to_vec(envelope)?;
        fs::write(path, bytes)?;
        Ok(())
    }
}
