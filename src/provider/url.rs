//! Plain URL downloads
//!
//! The bucket is the SHA-1 of the URL string, so the same URL always lands
//! in the same directory. Downloads must open as a zip archive (jar).

use crate::error::{RunTaskError, RunTaskResult};
use crate::hashing::{hash_bytes, HashAlgorithm};
use crate::manifest::{sanitize_segment, ManifestTxn, Namespace};
use crate::provider::fetch::{self, FetchPlan};
use crate::provider::ResolveContext;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Fallback file name when the URL path has no usable segment
pub const DEFAULT_FILE_NAME: &str = "download.jar";

/// Suffix given to downloads that failed the archive check
pub const INVALID_SUFFIX: &str = ".invalid";

/// Lowercase hex SHA-1 of the URL string
pub fn url_hash(url: &str) -> String {
    hash_bytes(HashAlgorithm::Sha1, url.as_bytes()).hex
}

/// Last non-empty path segment of the URL, or [`DEFAULT_FILE_NAME`]
pub fn file_name_for(url: &str) -> String {
    ::url::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|segments| segments.filter(|s| !s.is_empty()).last().map(str::to_string))
        })
        .and_then(|segment| sanitize_segment(&segment).ok())
        .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string())
}

pub(crate) async fn resolve(ctx: &ResolveContext<'_>, url: &str) -> RunTaskResult<PathBuf> {
    let namespace = Namespace::new(&["url"])?;
    let mut txn = fetch::open(ctx, &namespace).await?;

    let file_name = file_name_for(url);
    let mut plan = FetchPlan::new(url_hash(url), file_name.clone(), file_name, url, url);
    plan.check_archive = true;

    fetch::resolve_mutable(ctx, &mut txn, &plan).await
}

/// Check whether the file opens as a zip archive
pub(crate) async fn archive_error(path: &Path) -> RunTaskResult<Option<String>> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let file = std::fs::File::open(&path)
            .map_err(|e| RunTaskError::io(format!("opening {}", path.display()), e))?;
        Ok(zip::ZipArchive::new(file).err().map(|e| e.to_string()))
    })
    .await
    .map_err(|e| RunTaskError::Internal(format!("archive check failed: {}", e)))?
}

/// Move a download that is not a valid archive aside and fail.
///
/// The file is kept next to where it would have gone, with an `.invalid`
/// suffix, and any cache entry for it is dropped.
pub(crate) async fn quarantine_if_invalid(
    txn: &mut ManifestTxn,
    plan: &FetchPlan,
    path: &Path,
) -> RunTaskResult<()> {
    let Some(reason) = archive_error(path).await? else {
        return Ok(());
    };

    let mut invalid = path.as_os_str().to_owned();
    invalid.push(INVALID_SUFFIX);
    let invalid_path = PathBuf::from(invalid);

    warn!(
        "{} is not a valid jar ({}), moving it to {}",
        plan.url,
        reason,
        invalid_path.display()
    );
    tokio::fs::rename(path, &invalid_path).await.map_err(|e| {
        RunTaskError::io(format!("moving invalid download to {}", invalid_path.display()), e)
    })?;

    if txn.manifest_mut().remove(&plan.bucket, &plan.key).is_some() {
        txn.commit().await?;
    }

    Err(RunTaskError::MalformedArtifact {
        url: plan.url.clone(),
        invalid_path,
        reason,
    })
}
