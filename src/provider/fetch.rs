//! Fetch pipeline shared by every provider
//!
//! Verify what is cached, download what is not, record the result in the
//! manifest, then trim the bucket.

use crate::download::{Download, DownloadOutcome, Prior};
use crate::download::http::Headers;
use crate::error::{RunTaskError, RunTaskResult};
use crate::eviction;
use crate::freshness::{revalidation, Revalidation};
use crate::hashing::ContentHash;
use crate::manifest::{verify_entry, CacheEntry, EntryStatus, ManifestStore, ManifestTxn, Namespace};
use crate::provider::{url, ResolveContext};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// A cache entry whose file matched its recorded hash
#[derive(Debug, Clone)]
pub(crate) struct Cached {
    pub path: PathBuf,
    pub entry: CacheEntry,
}

/// Everything needed to download one artifact into a bucket
#[derive(Debug, Clone)]
pub(crate) struct FetchPlan {
    pub bucket: String,
    pub key: String,
    pub file_name: String,
    pub url: String,
    pub display_name: String,
    pub expected: Option<ContentHash>,
    pub build: Option<u64>,
    pub pinned: bool,
    pub headers: Headers,
    /// Reject downloads that do not open as a zip archive
    pub check_archive: bool,
}

impl FetchPlan {
    pub fn new(
        bucket: impl Into<String>,
        key: impl Into<String>,
        file_name: impl Into<String>,
        url: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            file_name: file_name.into(),
            url: url.into(),
            display_name: display_name.into(),
            expected: None,
            build: None,
            pinned: true,
            headers: Vec::new(),
            check_archive: false,
        }
    }
}

/// Load a namespace's manifest and run maintenance on it
pub(crate) async fn open(ctx: &ResolveContext<'_>, namespace: &Namespace) -> RunTaskResult<ManifestTxn> {
    let store = ManifestStore::for_namespace(&ctx.config.cache_root, namespace);
    let mut txn = ManifestTxn::begin(store).await?;
    eviction::maintain(&mut txn).await?;
    Ok(txn)
}

/// Look up an entry and check its file.
///
/// Entries that fail verification are removed together with their file.
pub(crate) async fn verified_entry(
    txn: &mut ManifestTxn,
    bucket: &str,
    key: &str,
) -> RunTaskResult<Option<Cached>> {
    let Some(entry) = txn.manifest().entry(bucket, key).cloned() else {
        return Ok(None);
    };
    let path = txn.store().entry_path(bucket, &entry);

    match verify_entry(&path, &entry).await? {
        EntryStatus::Verified => return Ok(Some(Cached { path, entry })),
        EntryStatus::Missing => {
            debug!("Cached file {} is gone, forgetting it", path.display());
        }
        EntryStatus::Unhashed => {
            debug!("Cached file {} has no recorded hash, discarding", path.display());
            remove_file_logged(&path).await;
        }
        EntryStatus::Mismatch { expected, actual } => {
            warn!(
                "Invalid {} hash for cached {}: expected {}, got {}. Deleting it.",
                expected.algorithm, entry.file_name, expected.hex, actual.hex
            );
            remove_file_logged(&path).await;
        }
    }

    txn.manifest_mut().remove(bucket, key);
    txn.commit().await?;
    Ok(None)
}

/// Mark an entry as pinned, persisting only when it changes
pub(crate) async fn pin(txn: &mut ManifestTxn, bucket: &str, key: &str) -> RunTaskResult<()> {
    let changed = match txn
        .manifest_mut()
        .buckets
        .get_mut(bucket)
        .and_then(|b| b.entries.get_mut(key))
    {
        Some(entry) if !entry.pinned => {
            entry.pinned = true;
            true
        }
        _ => false,
    };
    if changed {
        txn.commit().await?;
    }
    Ok(())
}

/// Download per `plan`, record the entry and trim the bucket.
///
/// The entry just written is never evicted, even when it is the oldest.
///
/// `prior` is the verified entry being revalidated, if any; it enables a
/// conditional request.
pub(crate) async fn fetch_into(
    ctx: &ResolveContext<'_>,
    txn: &mut ManifestTxn,
    plan: &FetchPlan,
    prior: Option<&CacheEntry>,
) -> RunTaskResult<PathBuf> {
    let destination = txn.store().bucket_dir(&plan.bucket).join(&plan.file_name);

    let mut download = Download::new(
        ctx.client,
        ctx.reporter,
        &plan.url,
        &destination,
        &plan.display_name,
    )
    .expect_hash(plan.expected.clone())
    .prior(prior.map(Prior::from));
    for (name, value) in &plan.headers {
        download = download.header(name, value);
    }

    let outcome = download.run().await.map_err(|e| match e {
        RunTaskError::HashMismatch { .. } => e,
        other => RunTaskError::download(&plan.display_name, other),
    })?;

    match outcome {
        DownloadOutcome::Downloaded { etag, hash, .. } => {
            if plan.check_archive {
                url::quarantine_if_invalid(txn, plan, &destination).await?;
            }
            let was_pinned = txn
                .manifest()
                .entry(&plan.bucket, &plan.key)
                .is_some_and(|e| e.pinned);
            let pinned = plan.pinned || was_pinned || prior.is_some_and(|p| p.pinned);
            let mut entry = CacheEntry::new(&plan.file_name, hash, ctx.now_ms)
                .with_etag(etag)
                .with_pinned(pinned)
                .with_display_name(&plan.display_name);
            entry.build = plan.build;
            txn.manifest_mut().insert(&plan.bucket, &plan.key, entry);
        }
        DownloadOutcome::NotModified { etag } => {
            let Some(entry) = txn
                .manifest_mut()
                .buckets
                .get_mut(&plan.bucket)
                .and_then(|b| b.entries.get_mut(&plan.key))
            else {
                return Err(RunTaskError::Internal(format!(
                    "server reported {} unchanged but it has no cache entry",
                    plan.display_name
                )));
            };
            entry.last_checked = ctx.now_ms;
            if etag.is_some() {
                entry.etag = etag;
            }
            entry.pinned |= plan.pinned;
        }
    }

    txn.commit().await?;
    eviction::evict_bucket(txn, &plan.bucket, Some(&plan.key)).await?;
    Ok(destination)
}

/// Resolve an artifact whose coordinate may change content over time.
///
/// A verified copy is reused for the revalidation interval, then checked
/// with a conditional request.
pub(crate) async fn resolve_mutable(
    ctx: &ResolveContext<'_>,
    txn: &mut ManifestTxn,
    plan: &FetchPlan,
) -> RunTaskResult<PathBuf> {
    let cached = verified_entry(txn, &plan.bucket, &plan.key).await?;
    let policy = ctx.policy();

    match revalidation(
        cached.as_ref().map(|c| &c.entry),
        cached.is_some(),
        &policy,
        ctx.now_ms,
    ) {
        Revalidation::Reuse => {
            let cached = cached.ok_or_else(|| {
                RunTaskError::Internal("reuse decided without a cached entry".to_string())
            })?;
            info!("Located {} in local cache.", plan.display_name);
            if plan.pinned {
                pin(txn, &plan.bucket, &plan.key).await?;
            }
            Ok(cached.path)
        }
        Revalidation::OfflineMiss => Err(RunTaskError::OfflineNotCached(plan.display_name.clone())),
        Revalidation::Revalidate => {
            let prior = cached.map(|c| c.entry);
            fetch_into(ctx, txn, plan, prior.as_ref()).await
        }
        Revalidation::Download => fetch_into(ctx, txn, plan, None).await,
    }
}

async fn remove_file_logged(path: &std::path::Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to delete {}: {}", path.display(), e),
    }
}
