use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use crate::config::FileRole;
use crate::error::{RegistryError, Result};

pub fn compute_hash(source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRANSFORM CACHE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransformKey {
    pub path: PathBuf,
    pub role: FileRole,
    pub block_id: String,
}

type Slot = Arc<OnceLock<Option<Arc<str>>>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: usize,
    pub misses: usize,
}

/// Memoized transformation results for one pipeline run.
///
/// Unbounded; dropped with the run. Concurrent requests for the same key
/// block on the first caller instead of transforming twice.
#[derive(Debug, Default)]
pub struct TransformCache {
    slots: Mutex<HashMap<TransformKey, Slot>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl TransformCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_insert_with<F>(&self, key: TransformKey, compute: F) -> Option<String>
    where
        F: FnOnce() -> Option<String>,
    {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            slots.entry(key).or_default().clone()
        };

        let mut computed = false;
        let value = slot.get_or_init(|| {
            computed = true;
            compute().map(Arc::from)
        });

        if computed {
            self.misses.fetch_add(1, Ordering::Relaxed);
        } else {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        value.as_deref().map(str::to_string)
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.slots.lock().unwrap_or_else(|e| e.into_inner()).len();
        CacheStats {
            entries,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    pub fn clear(&self) {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SCHEMA CACHE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaCacheEntry {
    pub name: String,
    pub url: String,
    pub schema: serde_json::Value,
    pub hash: String,
    pub fetched_at: DateTime<Utc>,
}

impl SchemaCacheEntry {
    pub fn new(name: &str, url: &str, schema: serde_json::Value) -> Self {
        let hash = hash_schema(&schema);
        Self {
            name: name.to_string(),
            url: url.to_string(),
            schema,
            hash,
            fetched_at: Utc::now(),
        }
    }
}

/// Hash of the compact serialization, so formatting changes upstream are not drift.
pub fn hash_schema(schema: &serde_json::Value) -> String {
    compute_hash(&schema.to_string())
}

/// On-disk record of the last fetched schemas, kept for drift diagnosis.
pub struct SchemaCache {
    cache_dir: PathBuf,
}

impl SchemaCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    fn get_cache_path(&self, name: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", name))
    }

    pub fn get(&self, name: &str) -> Option<SchemaCacheEntry> {
        let cache_path = self.get_cache_path(name);
        let data = fs::read_to_string(&cache_path).ok()?;

        match serde_json::from_str(&data) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(path = %cache_path.display(), error = %e, "discarding corrupt schema cache entry");
                fs::remove_file(cache_path).ok();
                None
            }
        }
    }

    pub fn set(&self, entry: &SchemaCacheEntry) -> Result<()> {
        fs::create_dir_all(&self.cache_dir).map_err(|e| RegistryError::io(&self.cache_dir, e))?;
        let cache_path = self.get_cache_path(&entry.name);
        let data = serde_json::to_string_pretty(entry)?;
        fs::write(&cache_path, data).map_err(|e| RegistryError::io(&cache_path, e))
    }
}
