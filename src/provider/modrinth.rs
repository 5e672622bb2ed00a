//! Modrinth plugin downloads
//!
//! Version metadata is fetched once and stored as `version.json` in the
//! bucket directory; it supplies the file URL and its published hash.

use crate::error::{RunTaskError, RunTaskResult};
use crate::hashing::{ContentHash, HashAlgorithm};
use crate::manifest::{bucket_key, sanitize_segment, ManifestTxn, Namespace};
use crate::provider::fetch::{self, FetchPlan};
use crate::provider::{host_of, join_url, ResolveContext};
use serde::Deserialize;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Cached version metadata file name
pub const METADATA_FILE: &str = "version.json";

#[derive(Debug, Clone, Deserialize)]
pub struct VersionResponse {
    pub id: String,
    #[serde(default)]
    pub version_number: Option<String>,
    #[serde(default)]
    pub files: Vec<VersionFile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VersionFile {
    pub url: String,
    pub filename: String,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub hashes: FileHashes,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileHashes {
    #[serde(default)]
    pub sha512: Option<String>,
    #[serde(default)]
    pub sha1: Option<String>,
}

impl VersionResponse {
    /// The primary file, or the first one listed
    pub fn primary_file(&self) -> Option<&VersionFile> {
        self.files
            .iter()
            .find(|f| f.primary)
            .or_else(|| self.files.first())
    }
}

impl VersionFile {
    /// SHA-512 when published, otherwise SHA-1
    pub fn content_hash(&self) -> Option<ContentHash> {
        self.hashes
            .sha512
            .as_ref()
            .map(|h| ContentHash::new(HashAlgorithm::Sha512, h))
            .or_else(|| {
                self.hashes
                    .sha1
                    .as_ref()
                    .map(|h| ContentHash::new(HashAlgorithm::Sha1, h))
            })
    }
}

async fn load_metadata(
    ctx: &ResolveContext<'_>,
    txn: &ManifestTxn,
    bucket: &str,
    url: &str,
    label: &str,
) -> RunTaskResult<VersionResponse> {
    let path = txn.store().bucket_dir(bucket).join(METADATA_FILE);
    let policy = ctx.policy();

    if !policy.refresh || policy.offline {
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(cached) => {
                    debug!("Using cached Modrinth metadata {}", path.display());
                    return Ok(cached);
                }
                Err(e) => warn!("Ignoring unreadable {}: {}", path.display(), e),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(RunTaskError::io(format!("reading {}", path.display()), e));
            }
        }
    }

    if policy.offline {
        return Err(RunTaskError::OfflineNotCached(label.to_string()));
    }

    let body = ctx.client.get_text(url, &Vec::new()).await?;
    let response: VersionResponse = crate::download::http::parse_json(url, &body)?;

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| RunTaskError::io(format!("creating {}", parent.display()), e))?;
    }
    tokio::fs::write(&path, body)
        .await
        .map_err(|e| RunTaskError::io(format!("writing {}", path.display()), e))?;
    Ok(response)
}

pub(crate) async fn resolve(
    ctx: &ResolveContext<'_>,
    base_url: Option<&str>,
    project: &str,
    version: &str,
) -> RunTaskResult<PathBuf> {
    let base = base_url.unwrap_or(&ctx.config.endpoints.modrinth);
    let namespace = Namespace::new(&["modrinth".to_string(), host_of(base)?])?;
    let mut txn = fetch::open(ctx, &namespace).await?;

    let bucket = bucket_key(&[project, version])?;
    let label = format!("{} {}", project, version);
    let metadata_url = join_url(base, &["v2", "project", project, "version", version])?;

    let metadata = load_metadata(ctx, &txn, &bucket, &metadata_url, &label).await?;
    let file = metadata.primary_file().ok_or_else(|| {
        RunTaskError::metadata(&metadata_url, format!("version {} lists no files", metadata.id))
    })?;
    let file_name = sanitize_segment(&file.filename)?;
    let expected = file.content_hash();

    if let Some(cached) = fetch::verified_entry(&mut txn, &bucket, &file_name).await? {
        let same_content = match (&expected, &cached.entry.content_hash) {
            (Some(expected), Some(recorded)) => {
                expected.algorithm == recorded.algorithm && expected.matches(&recorded.hex)
            }
            (None, _) => true,
            _ => false,
        };
        if same_content {
            info!("Located {} in local cache.", label);
            fetch::pin(&mut txn, &bucket, &file_name).await?;
            return Ok(cached.path);
        }
        debug!("Published hash of {} changed, downloading again", label);
    }

    if ctx.policy().offline {
        return Err(RunTaskError::OfflineNotCached(label));
    }

    let mut plan = FetchPlan::new(bucket, file_name.clone(), file_name, file.url.clone(), label);
    plan.expected = expected;
    fetch::fetch_into(ctx, &mut txn, &plan, None).await
}
