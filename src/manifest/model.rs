//! Manifest document model
//!
//! Field names are camelCase on disk. Every struct is `#[serde(default)]`
//! so older or newer manifests still load.

use crate::hashing::ContentHash;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current on-disk format version
pub const FORMAT_VERSION: u32 = 1;

/// Root manifest for one cache namespace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Manifest {
    pub format_version: u32,

    /// Buckets keyed by their slash-joined bucket path
    pub buckets: BTreeMap<String, VersionBucket>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            format_version: FORMAT_VERSION,
            buckets: BTreeMap::new(),
        }
    }
}

impl Manifest {
    pub fn bucket(&self, key: &str) -> Option<&VersionBucket> {
        self.buckets.get(key)
    }

    /// Get a bucket, creating it if absent
    pub fn bucket_mut(&mut self, key: &str) -> &mut VersionBucket {
        self.buckets.entry(key.to_string()).or_default()
    }

    pub fn entry(&self, bucket: &str, key: &str) -> Option<&CacheEntry> {
        self.buckets.get(bucket).and_then(|b| b.entries.get(key))
    }

    /// Insert or replace an entry
    pub fn insert(&mut self, bucket: &str, key: &str, entry: CacheEntry) {
        self.bucket_mut(bucket).entries.insert(key.to_string(), entry);
    }

    /// Remove an entry, dropping the bucket once it holds nothing
    pub fn remove(&mut self, bucket: &str, key: &str) -> Option<CacheEntry> {
        let removed = self.buckets.get_mut(bucket)?.entries.remove(key);
        if self
            .buckets
            .get(bucket)
            .is_some_and(|b| {
                b.entries.is_empty() && b.last_update_check == 0 && b.permalinks.is_empty()
            })
        {
            self.buckets.remove(bucket);
        }
        removed
    }

    pub fn entry_count(&self) -> usize {
        self.buckets.values().map(|b| b.entries.len()).sum()
    }
}

/// Entries sharing a version or channel
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VersionBucket {
    /// Epoch millis of the last remote "latest" query for this bucket
    pub last_update_check: i64,

    pub entries: BTreeMap<String, CacheEntry>,

    /// Last known target of each moving alias (e.g. Jenkins `lastStableBuild`)
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub permalinks: BTreeMap<String, PermalinkState>,
}

/// What a permalink resolved to, and when that was asked
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PermalinkState {
    pub build: u64,
    pub last_update_check: i64,
}

impl VersionBucket {
    /// Highest build number recorded in this bucket
    pub fn latest_build(&self) -> Option<u64> {
        self.entries.values().filter_map(|e| e.build).max()
    }

    /// Entry recorded for a specific build number
    pub fn find_build(&self, build: u64) -> Option<(&String, &CacheEntry)> {
        self.entries.iter().find(|(_, e)| e.build == Some(build))
    }

    pub fn is_permalink_target(&self, build: u64) -> bool {
        self.permalinks.values().any(|p| p.build == build)
    }

    pub fn unpinned_count(&self) -> usize {
        self.entries.values().filter(|e| !e.pinned).count()
    }
}

/// One cached artifact
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheEntry {
    /// File name inside the bucket directory
    pub file_name: String,

    /// Build number when the provider has one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<u64>,

    /// Epoch millis of the last download or revalidation
    pub last_checked: i64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<ContentHash>,

    /// Fetched through an explicit reference; survives eviction
    pub pinned: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl CacheEntry {
    pub fn new(file_name: impl Into<String>, content_hash: ContentHash, now_ms: i64) -> Self {
        Self {
            file_name: file_name.into(),
            build: None,
            last_checked: now_ms,
            etag: None,
            content_hash: Some(content_hash),
            pinned: false,
            display_name: None,
        }
    }

    pub fn with_build(mut self, build: u64) -> Self {
        self.build = Some(build);
        self
    }

    pub fn with_etag(mut self, etag: Option<String>) -> Self {
        self.etag = etag;
        self
    }

    pub fn with_pinned(mut self, pinned: bool) -> Self {
        self.pinned = pinned;
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}
