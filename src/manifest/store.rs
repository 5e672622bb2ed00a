//! Manifest persistence
//!
//! One `manifest.json` lives at the root of every namespace directory. It is
//! loaded at the start of each resolution and rewritten after each mutation.

use crate::error::{RunTaskError, RunTaskResult};
use crate::hashing::{hash_file_async, ContentHash};
use crate::manifest::model::{CacheEntry, Manifest};
use crate::manifest::namespace::{bucket_dir, Namespace};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

/// File name of the manifest inside a namespace directory
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// Reads and writes the manifest of one namespace
#[derive(Debug, Clone)]
pub struct ManifestStore {
    dir: PathBuf,
}

impl ManifestStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn for_namespace(cache_root: &Path, namespace: &Namespace) -> Self {
        Self::new(namespace.dir(cache_root))
    }

    /// Namespace directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE_NAME)
    }

    pub fn bucket_dir(&self, bucket: &str) -> PathBuf {
        bucket_dir(&self.dir, bucket)
    }

    /// Location of an entry's file on disk
    pub fn entry_path(&self, bucket: &str, entry: &CacheEntry) -> PathBuf {
        self.bucket_dir(bucket).join(&entry.file_name)
    }

    /// Load the manifest.
    ///
    /// A missing file yields an empty manifest. An unreadable document is
    /// logged and also treated as empty; entries are then rebuilt by the
    /// next downloads.
    pub async fn load(&self) -> RunTaskResult<Manifest> {
        let path = self.manifest_path();
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No manifest at {}, starting empty", path.display());
                return Ok(Manifest::default());
            }
            Err(e) => {
                return Err(RunTaskError::io(
                    format!("reading manifest {}", path.display()),
                    e,
                ))
            }
        };

        match serde_json::from_str(&content) {
            Ok(manifest) => Ok(manifest),
            Err(e) => {
                warn!(
                    "Ignoring unreadable manifest {} ({}); cached entries will be re-downloaded",
                    path.display(),
                    e
                );
                Ok(Manifest::default())
            }
        }
    }

    /// Write the manifest, replacing the previous document atomically
    pub async fn write(&self, manifest: &Manifest) -> RunTaskResult<()> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| RunTaskError::io(format!("creating {}", self.dir.display()), e))?;

        let path = self.manifest_path();
        let temp = self
            .dir
            .join(format!(".{}.{}.tmp", MANIFEST_FILE_NAME, Uuid::new_v4()));

        let content = serde_json::to_string_pretty(manifest)?;
        fs::write(&temp, content)
            .await
            .map_err(|e| RunTaskError::io(format!("writing {}", temp.display()), e))?;

        if let Err(e) = fs::rename(&temp, &path).await {
            let _ = fs::remove_file(&temp).await;
            return Err(RunTaskError::io(
                format!("replacing manifest {}", path.display()),
                e,
            ));
        }
        Ok(())
    }
}

/// Load, mutate, persist.
///
/// Holds the manifest only for the duration of one resolution; nothing is
/// retained between calls.
#[derive(Debug)]
pub struct ManifestTxn {
    store: ManifestStore,
    manifest: Manifest,
}

impl ManifestTxn {
    pub async fn begin(store: ManifestStore) -> RunTaskResult<Self> {
        let manifest = store.load().await?;
        Ok(Self { store, manifest })
    }

    pub fn store(&self) -> &ManifestStore {
        &self.store
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn manifest_mut(&mut self) -> &mut Manifest {
        &mut self.manifest
    }

    /// Persist the current state. May be called repeatedly.
    pub async fn commit(&self) -> RunTaskResult<()> {
        self.store.write(&self.manifest).await
    }
}

/// Result of checking a cached file against its recorded hash
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryStatus {
    Verified,
    Missing,
    /// Recorded without a hash, so it cannot be trusted
    Unhashed,
    Mismatch {
        expected: ContentHash,
        actual: ContentHash,
    },
}

impl EntryStatus {
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified)
    }
}

/// Recompute the hash of `path` and compare with the entry's record
pub async fn verify_entry(path: &Path, entry: &CacheEntry) -> RunTaskResult<EntryStatus> {
    if !fs::try_exists(path).await.unwrap_or(false) {
        return Ok(EntryStatus::Missing);
    }
    let Some(expected) = entry.content_hash.clone() else {
        return Ok(EntryStatus::Unhashed);
    };

    let actual = hash_file_async(expected.algorithm, path.to_path_buf()).await?;
    if expected.matches(&actual.hex) {
        Ok(EntryStatus::Verified)
    } else {
        Ok(EntryStatus::Mismatch { expected, actual })
    }
}
