//! Server builds from the Fill v3 downloads API
//!
//! Builds live at `<root>/<project>/<version>/<build>.jar`. "Latest"
//! lookups are throttled per version bucket by the recheck interval.

use crate::error::{RunTaskError, RunTaskResult};
use crate::freshness::{decide_latest, fallback_build, LatestDecision};
use crate::hashing::{ContentHash, HashAlgorithm};
use crate::manifest::{bucket_key, ManifestTxn, Namespace};
use crate::provider::fetch::{self, FetchPlan};
use crate::provider::{join_url, BuildSelector, ResolveContext};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{info, warn};

/// Download key of the server jar in a build response
pub const SERVER_DOWNLOAD: &str = "server:default";

/// One build as returned by the downloads API
#[derive(Debug, Clone, Deserialize)]
pub struct BuildResponse {
    pub id: u64,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub downloads: HashMap<String, BuildDownload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuildDownload {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub checksums: Checksums,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Checksums {
    #[serde(default)]
    pub sha256: Option<String>,
}

/// Human name for a project id: known projects are spelled properly,
/// others are split on `-` and capitalised.
pub fn display_name(project: &str) -> String {
    match project {
        "paper" => "Paper".to_string(),
        "folia" => "Folia".to_string(),
        "velocity" => "Velocity".to_string(),
        "waterfall" => "Waterfall".to_string(),
        other => other
            .split('-')
            .filter(|part| !part.is_empty())
            .map(|part| {
                let mut chars = part.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" "),
    }
}

struct Channel<'a> {
    project: &'a str,
    version: &'a str,
    bucket: String,
    name: String,
}

impl Channel<'_> {
    fn label(&self, build: u64) -> String {
        format!("{} {} build {}", self.name, self.version, build)
    }

    fn builds_url(&self, ctx: &ResolveContext<'_>, build: &str) -> RunTaskResult<String> {
        join_url(
            &ctx.config.endpoints.fill,
            &["projects", self.project, "versions", self.version, "builds", build],
        )
    }

    async fn fetch_build(&self, ctx: &ResolveContext<'_>, build: &str) -> RunTaskResult<BuildResponse> {
        let url = self.builds_url(ctx, build)?;
        ctx.client.get_json(&url, &Vec::new()).await
    }

    /// Verified local copy of `build`, pinning it when asked to
    async fn cached(
        &self,
        txn: &mut ManifestTxn,
        build: u64,
        pin: bool,
    ) -> RunTaskResult<Option<PathBuf>> {
        let key = build.to_string();
        let Some(cached) = fetch::verified_entry(txn, &self.bucket, &key).await? else {
            return Ok(None);
        };
        info!("Located {} in local cache.", self.label(build));
        if pin {
            fetch::pin(txn, &self.bucket, &key).await?;
        }
        Ok(Some(cached.path))
    }

    async fn download(
        &self,
        ctx: &ResolveContext<'_>,
        txn: &mut ManifestTxn,
        response: &BuildResponse,
        pinned: bool,
    ) -> RunTaskResult<PathBuf> {
        let label = self.label(response.id);
        let download = response.downloads.get(SERVER_DOWNLOAD).ok_or_else(|| {
            RunTaskError::metadata(
                self.builds_url(ctx, &response.id.to_string()).unwrap_or_default(),
                format!("build {} has no '{}' download", response.id, SERVER_DOWNLOAD),
            )
        })?;

        let mut plan = FetchPlan::new(
            self.bucket.clone(),
            response.id.to_string(),
            format!("{}.jar", response.id),
            download.url.clone(),
            label,
        );
        plan.build = Some(response.id);
        plan.pinned = pinned;
        plan.expected = download
            .checksums
            .sha256
            .as_ref()
            .map(|hex| ContentHash::new(HashAlgorithm::Sha256, hex));

        fetch::fetch_into(ctx, txn, &plan, None).await
    }
}

pub(crate) async fn resolve(
    ctx: &ResolveContext<'_>,
    project: &str,
    version: &str,
    selector: BuildSelector,
) -> RunTaskResult<PathBuf> {
    let namespace = Namespace::new(&[project])?;
    let channel = Channel {
        project,
        version,
        bucket: bucket_key(&[version])?,
        name: display_name(project),
    };
    let mut txn = fetch::open(ctx, &namespace).await?;

    match selector {
        BuildSelector::Specific(build) => resolve_specific(ctx, &mut txn, &channel, build).await,
        BuildSelector::Latest => resolve_latest(ctx, &mut txn, &channel).await,
    }
}

async fn resolve_specific(
    ctx: &ResolveContext<'_>,
    txn: &mut ManifestTxn,
    channel: &Channel<'_>,
    build: u64,
) -> RunTaskResult<PathBuf> {
    let policy = ctx.policy();

    // A forced refresh re-downloads even a verified copy
    if !policy.refresh || policy.offline {
        if let Some(path) = channel.cached(txn, build, true).await? {
            return Ok(path);
        }
    }

    if policy.offline {
        return Err(RunTaskError::OfflineBuildNotCached {
            name: channel.name.clone(),
            version: channel.version.to_string(),
            build,
        });
    }

    let response = channel.fetch_build(ctx, &build.to_string()).await?;
    if response.id != build {
        return Err(RunTaskError::metadata(
            channel.builds_url(ctx, &build.to_string())?,
            format!("asked for build {} but got build {}", build, response.id),
        ));
    }
    channel.download(ctx, txn, &response, true).await
}

async fn resolve_latest(
    ctx: &ResolveContext<'_>,
    txn: &mut ManifestTxn,
    channel: &Channel<'_>,
) -> RunTaskResult<PathBuf> {
    let policy = ctx.policy();

    match decide_latest(txn.manifest().bucket(&channel.bucket), &policy, ctx.now_ms) {
        LatestDecision::OfflineUnknown => Err(RunTaskError::OfflineUnknownVersion {
            name: channel.name.clone(),
            version: channel.version.to_string(),
        }),
        LatestDecision::Local(build) => {
            if let Some(path) = channel.cached(txn, build, false).await? {
                return Ok(path);
            }
            if policy.offline {
                return Err(RunTaskError::OfflineBuildNotCached {
                    name: channel.name.clone(),
                    version: channel.version.to_string(),
                    build,
                });
            }
            let response = channel.fetch_build(ctx, &build.to_string()).await?;
            channel.download(ctx, txn, &response, false).await
        }
        LatestDecision::Remote => match channel.fetch_build(ctx, "latest").await {
            Ok(response) => {
                txn.manifest_mut()
                    .bucket_mut(&channel.bucket)
                    .last_update_check = ctx.now_ms;
                txn.commit().await?;

                // As with specific builds, a forced refresh downloads again
                if !policy.refresh {
                    if let Some(path) = channel.cached(txn, response.id, false).await? {
                        return Ok(path);
                    }
                }
                channel.download(ctx, txn, &response, false).await
            }
            Err(e) if e.is_transient() => {
                let fallback = fallback_build(txn.manifest().bucket(&channel.bucket));
                let Some(build) = fallback else {
                    return Err(RunTaskError::LatestUnavailable {
                        name: channel.name.clone(),
                        version: channel.version.to_string(),
                        source: Box::new(e),
                    });
                };
                warn!(
                    "Failed to check for latest {} {} build, using locally cached build {}: {}",
                    channel.name, channel.version, build, e
                );
                match channel.cached(txn, build, false).await? {
                    Some(path) => Ok(path),
                    None => Err(RunTaskError::LatestUnavailable {
                        name: channel.name.clone(),
                        version: channel.version.to_string(),
                        source: Box::new(e),
                    }),
                }
            }
            Err(e) => Err(e),
        },
    }
}
