//! Content-addressed local store for remotely fetched files.
//!
//! Files live under `<root>/<bucket>/<relative path>` with a single JSON
//! index (`<root>/index.json`) recording the checksum and size of every
//! fully fetched object. Entries are kept in an arena; callers hold
//! [`EntryId`] handles, and the cache is the sole mutator.

use crate::error::Result;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

const INDEX_FILE: &str = "index.json";

/// Stable handle to one cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId(usize);

/// One object tracked by the cache.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    bucket: String,
    relative_path: String,
    full_path: PathBuf,
    sha1: Option<String>,
    size: Option<u64>,
    stale: bool,
}

impl CacheEntry {
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    /// Absolute path of the stored file.
    pub fn full_path(&self) -> &Path {
        &self.full_path
    }

    pub fn sha1(&self) -> Option<&str> {
        self.sha1.as_deref()
    }

    pub fn size(&self) -> Option<u64> {
        self.size
    }

    /// A stale entry has no valid local copy and must be (re)fetched.
    pub fn is_stale(&self) -> bool {
        self.stale
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexRecord {
    bucket: String,
    path: String,
    sha1: String,
    size: u64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct IndexDocument {
    #[serde(default)]
    entries: Vec<IndexRecord>,
}

/// The local download cache, keyed by (bucket, relative path).
#[derive(Debug)]
pub struct ContentCache {
    root: PathBuf,
    entries: Vec<CacheEntry>,
    lookup: HashMap<(String, String), EntryId>,
}

impl ContentCache {
    /// Open the cache at `root`, reading the persisted index if present.
    /// A corrupt index is discarded and rebuilt from scratch.
    pub fn load(root: &Path) -> Result<Self> {
        let mut cache = Self {
            root: root.to_path_buf(),
            entries: Vec::new(),
            lookup: HashMap::new(),
        };

        let index_path = root.join(INDEX_FILE);
        if index_path.exists() {
            let data = fs::read_to_string(&index_path)?;
            match serde_json::from_str::<IndexDocument>(&data) {
                Ok(doc) => {
                    for record in doc.entries {
                        cache.insert_record(record);
                    }
                }
                Err(e) => {
                    log::warn!("discarding corrupt cache index {:?}: {}", index_path, e);
                }
            }
        }

        Ok(cache)
    }

    /// Persist the index. Only entries with a known checksum are recorded.
    pub fn save(&self) -> Result<()> {
        let doc = IndexDocument {
            entries: self
                .entries
                .iter()
                .filter_map(|entry| {
                    let sha1 = entry.sha1.clone()?;
                    Some(IndexRecord {
                        bucket: entry.bucket.clone(),
                        path: entry.relative_path.clone(),
                        sha1,
                        size: entry.size.unwrap_or(0),
                    })
                })
                .collect(),
        };

        fs::create_dir_all(&self.root)?;
        let index_path = self.root.join(INDEX_FILE);
        fs::write(&index_path, serde_json::to_vec_pretty(&doc).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e)
        })?)?;
        Ok(())
    }

    /// Resolve (bucket, relative path) into an entry handle, creating the
    /// entry if it is not yet known. Staleness is recomputed from the
    /// filesystem on every call; resolution itself never fails.
    pub fn resolve_entry(&mut self, bucket: &str, relative_path: &str) -> EntryId {
        let key = (bucket.to_string(), relative_path.to_string());
        if let Some(&id) = self.lookup.get(&key) {
            let stale = self.compute_stale(id);
            self.entries[id.0].stale = stale;
            return id;
        }

        let full_path = self.root.join(bucket).join(relative_path);
        let id = EntryId(self.entries.len());
        self.entries.push(CacheEntry {
            bucket: bucket.to_string(),
            relative_path: relative_path.to_string(),
            full_path,
            sha1: None,
            size: None,
            stale: true,
        });
        self.lookup.insert(key, id);
        id
    }

    pub fn entry(&self, id: EntryId) -> &CacheEntry {
        &self.entries[id.0]
    }

    /// Drop the entry's record, forcing a re-fetch on the next resolution.
    pub fn evict_entry(&mut self, id: EntryId) {
        let entry = &mut self.entries[id.0];
        log::debug!("evicting cache entry {}/{}", entry.bucket, entry.relative_path);
        entry.sha1 = None;
        entry.size = None;
        entry.stale = true;
    }

    /// Record a completed fetch: the file at the entry's path now matches
    /// `sha1` and `size`, and the entry is no longer stale.
    pub fn mark_fresh(&mut self, id: EntryId, sha1: String, size: u64) {
        let entry = &mut self.entries[id.0];
        entry.sha1 = Some(sha1);
        entry.size = Some(size);
        entry.stale = false;
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn insert_record(&mut self, record: IndexRecord) {
        let key = (record.bucket.clone(), record.path.clone());
        if self.lookup.contains_key(&key) {
            return;
        }
        let full_path = self.root.join(&record.bucket).join(&record.path);
        let id = EntryId(self.entries.len());
        self.entries.push(CacheEntry {
            bucket: record.bucket,
            relative_path: record.path,
            full_path,
            sha1: Some(record.sha1),
            size: Some(record.size),
            stale: true,
        });
        self.lookup.insert(key, id);
    }

    /// An entry is stale when the file is absent, when nothing was ever
    /// recorded for it, or when the recorded size no longer matches the file.
    /// A mismatch never fails resolution; the entry simply needs a re-fetch.
    fn compute_stale(&self, id: EntryId) -> bool {
        let entry = &self.entries[id.0];
        let Ok(metadata) = fs::metadata(&entry.full_path) else {
            return true;
        };
        if entry.sha1.is_none() {
            return true;
        }
        match entry.size {
            Some(size) => size != metadata.len(),
            None => true,
        }
    }
}

/// Compute the SHA-1 of a local file, hex-encoded.
pub fn file_sha1(path: &Path) -> anyhow::Result<String> {
    use sha1::{Digest, Sha1};
    let bytes =
        fs::read(path).with_context(|| format!("read file for hashing: {:?}", path))?;
    let mut hasher = Sha1::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn resolve_is_idempotent_and_starts_stale() {
        let tmp = tempdir().unwrap();
        let mut cache = ContentCache::load(tmp.path()).unwrap();

        let first = cache.resolve_entry("libraries", "lwjgl/lwjgl.jar");
        let second = cache.resolve_entry("libraries", "lwjgl/lwjgl.jar");
        assert_eq!(first, second);
        assert!(cache.entry(first).is_stale());
        assert_eq!(
            cache.entry(first).full_path(),
            tmp.path().join("libraries").join("lwjgl/lwjgl.jar")
        );
    }

    #[test]
    fn mark_fresh_flips_staleness_and_later_resolutions_observe_it() {
        let tmp = tempdir().unwrap();
        let mut cache = ContentCache::load(tmp.path()).unwrap();

        let id = cache.resolve_entry("versions", "1.5.2/1.5.2.jar");
        let path = cache.entry(id).full_path().to_path_buf();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"jar bytes").unwrap();

        cache.mark_fresh(id, file_sha1(&path).unwrap(), 9);
        assert!(!cache.entry(id).is_stale());

        let again = cache.resolve_entry("versions", "1.5.2/1.5.2.jar");
        assert_eq!(again, id);
        assert!(!cache.entry(again).is_stale());
    }

    #[test]
    fn size_mismatch_makes_entry_stale_again() {
        let tmp = tempdir().unwrap();
        let mut cache = ContentCache::load(tmp.path()).unwrap();

        let id = cache.resolve_entry("libraries", "a.jar");
        let path = cache.entry(id).full_path().to_path_buf();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"original").unwrap();
        cache.mark_fresh(id, file_sha1(&path).unwrap(), 8);

        fs::write(&path, b"truncated-differently").unwrap();
        let id = cache.resolve_entry("libraries", "a.jar");
        assert!(cache.entry(id).is_stale());
    }

    #[test]
    fn evicted_entry_resolves_stale_even_with_file_present() {
        let tmp = tempdir().unwrap();
        let mut cache = ContentCache::load(tmp.path()).unwrap();

        let id = cache.resolve_entry("asset_indexes", "legacy.json");
        let path = cache.entry(id).full_path().to_path_buf();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"{}").unwrap();
        cache.mark_fresh(id, file_sha1(&path).unwrap(), 2);
        assert!(!cache.entry(id).is_stale());

        cache.evict_entry(id);
        assert!(cache.entry(id).is_stale());
        let id = cache.resolve_entry("asset_indexes", "legacy.json");
        assert!(cache.entry(id).is_stale());
    }

    #[test]
    fn index_roundtrips_through_save_and_load() {
        let tmp = tempdir().unwrap();
        {
            let mut cache = ContentCache::load(tmp.path()).unwrap();
            let id = cache.resolve_entry("fmllibs", "argo-2.25.jar");
            let path = cache.entry(id).full_path().to_path_buf();
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, b"12345").unwrap();
            cache.mark_fresh(id, file_sha1(&path).unwrap(), 5);
            cache.save().unwrap();
        }

        let mut cache = ContentCache::load(tmp.path()).unwrap();
        let id = cache.resolve_entry("fmllibs", "argo-2.25.jar");
        assert!(!cache.entry(id).is_stale());
        assert_eq!(cache.entry(id).size(), Some(5));
    }

    #[test]
    fn corrupt_index_is_discarded() {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join("index.json"), b"not json at all").unwrap();
        let mut cache = ContentCache::load(tmp.path()).unwrap();
        let id = cache.resolve_entry("libraries", "b.jar");
        assert!(cache.entry(id).is_stale());
    }
}
