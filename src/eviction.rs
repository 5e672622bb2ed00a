//! Bounded-cache maintenance
//!
//! Keeps at most [`RETAINED_UNPINNED`] unpinned entries per bucket, removes
//! abandoned partial downloads, and implements the explicit full clear.

use crate::error::{RunTaskError, RunTaskResult};
use crate::manifest::{ManifestTxn, Namespace, VersionBucket};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tracing::{debug, info, warn};

/// Unpinned entries kept per bucket
pub const RETAINED_UNPINNED: usize = 5;

/// Partial downloads older than this are considered abandoned
pub const STALE_PARTIAL_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// Suffix of in-flight download files
pub const PARTIAL_SUFFIX: &str = ".part";

/// Keys of the unpinned entries that must go so that `keep` remain.
///
/// Oldest first: lowest build number, then earliest check time. The
/// `protect`ed key and builds a permalink currently points at are never
/// chosen, but still count towards `keep`.
pub fn select_evictions(
    bucket: &VersionBucket,
    keep: usize,
    protect: Option<&str>,
) -> Vec<String> {
    let unpinned = bucket.unpinned_count();
    let excess = unpinned.saturating_sub(keep);
    if excess == 0 {
        return Vec::new();
    }

    let mut candidates: Vec<(&String, u64, i64)> = bucket
        .entries
        .iter()
        .filter(|(k, e)| !e.pinned && protect != Some(k.as_str()))
        .filter(|(_, e)| !e.build.is_some_and(|b| bucket.is_permalink_target(b)))
        .map(|(k, e)| (k, e.build.unwrap_or(0), e.last_checked))
        .collect();

    candidates.sort_by(|a, b| (a.1, a.2, a.0).cmp(&(b.1, b.2, b.0)));
    candidates
        .into_iter()
        .take(excess)
        .map(|(k, _, _)| k.clone())
        .collect()
}

/// Evict excess entries from one bucket, persisting after each removal.
///
/// `protect` names an entry that must survive, normally the one just
/// resolved.
pub async fn evict_bucket(
    txn: &mut ManifestTxn,
    bucket: &str,
    protect: Option<&str>,
) -> RunTaskResult<usize> {
    let victims = match txn.manifest().bucket(bucket) {
        Some(b) => select_evictions(b, RETAINED_UNPINNED, protect),
        None => return Ok(0),
    };

    let mut removed = 0;
    for key in victims {
        let Some(entry) = txn.manifest_mut().remove(bucket, &key) else {
            continue;
        };
        let path = txn.store().entry_path(bucket, &entry);
        match fs::remove_file(&path).await {
            Ok(()) => debug!("Evicted {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to delete evicted file {}: {}", path.display(), e),
        }
        txn.commit().await?;
        removed += 1;
    }
    Ok(removed)
}

/// Evict excess entries from every bucket in the namespace
pub async fn evict_all(txn: &mut ManifestTxn) -> RunTaskResult<usize> {
    let buckets: Vec<String> = txn.manifest().buckets.keys().cloned().collect();
    let mut removed = 0;
    for bucket in buckets {
        removed += evict_bucket(txn, &bucket, None).await?;
    }
    Ok(removed)
}

/// Delete `*.part` files under `dir` that were last touched before `max_age`.
///
/// Failures are logged and skipped.
pub async fn sweep_partials(dir: &Path, max_age: Duration) -> usize {
    let now = SystemTime::now();
    let mut pending: Vec<PathBuf> = vec![dir.to_path_buf()];
    let mut removed = 0;

    while let Some(current) = pending.pop() {
        let mut entries = match fs::read_dir(&current).await {
            Ok(entries) => entries,
            Err(_) => continue,
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            let Ok(metadata) = entry.metadata().await else {
                continue;
            };
            if metadata.is_dir() {
                pending.push(path);
                continue;
            }
            if !path
                .file_name()
                .is_some_and(|n| n.to_string_lossy().ends_with(PARTIAL_SUFFIX))
            {
                continue;
            }
            let age = metadata
                .modified()
                .ok()
                .and_then(|m| now.duration_since(m).ok())
                .unwrap_or_default();
            if age < max_age {
                continue;
            }
            match fs::remove_file(&path).await {
                Ok(()) => {
                    debug!("Removed abandoned partial download {}", path.display());
                    removed += 1;
                }
                Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
            }
        }
    }
    removed
}

/// Post-resolution maintenance for one namespace
pub async fn maintain(txn: &mut ManifestTxn) -> RunTaskResult<()> {
    let evicted = evict_all(txn).await?;
    if evicted > 0 {
        debug!("Evicted {} cached artifact(s) from {}", evicted, txn.store().dir().display());
    }
    sweep_partials(txn.store().dir(), STALE_PARTIAL_AGE).await;
    Ok(())
}

/// Remove a namespace (or the whole cache) including pinned entries.
///
/// Returns whether anything existed to remove.
pub async fn clear(cache_root: &Path, namespace: Option<&Namespace>) -> RunTaskResult<bool> {
    let target = match namespace {
        Some(ns) => ns.dir(cache_root),
        None => cache_root.to_path_buf(),
    };

    match fs::remove_dir_all(&target).await {
        Ok(()) => {
            info!("Cleared {}", target.display());
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(RunTaskError::io(format!("clearing {}", target.display()), e)),
    }
}
