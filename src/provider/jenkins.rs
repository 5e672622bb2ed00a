//! Jenkins build artifacts
//!
//! A numeric build is pinned. Anything else is a permalink (by default
//! `lastSuccessfulBuild`) and follows the same "latest" throttling as
//! channel builds, tracked per permalink so `lastStableBuild` never answers
//! for `lastSuccessfulBuild`. Cached files are named `<number>-<fileName>`.

use crate::error::{RunTaskError, RunTaskResult};
use crate::freshness::{decide_known, LatestDecision};
use crate::manifest::{bucket_key, sanitize_segment, ManifestTxn, Namespace, PermalinkState};
use crate::provider::fetch::{self, FetchPlan};
use crate::provider::{host_of, join_url, ResolveContext};
use regex::Regex;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::{info, warn};

/// Permalink used when no build is given
pub const DEFAULT_PERMALINK: &str = "lastSuccessfulBuild";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    pub number: u64,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub file_name: String,
    pub relative_path: String,
}

/// Job path split into folder segments, e.g. `Folder/job` or `Folder/job/main`
pub fn job_segments(job: &str) -> Vec<&str> {
    job.split('/').filter(|s| !s.trim().is_empty()).collect()
}

/// Pick the single artifact to download
pub fn select_artifact<'a>(
    job: &str,
    artifacts: &'a [Artifact],
    pattern: Option<&Regex>,
) -> RunTaskResult<&'a Artifact> {
    let candidates: Vec<&Artifact> = artifacts
        .iter()
        .filter(|a| pattern.is_none_or(|p| p.is_match(&a.file_name)))
        .collect();

    match candidates.as_slice() {
        [single] => Ok(single),
        [] => Err(RunTaskError::ArtifactSelection {
            job: job.to_string(),
            reason: match pattern {
                Some(p) => format!("no artifact matches '{}'", p.as_str()),
                None => "the build has no artifacts".to_string(),
            },
        }),
        many => Err(RunTaskError::ArtifactSelection {
            job: job.to_string(),
            reason: format!(
                "{} artifacts match ({}); narrow it down with an artifact pattern",
                many.len(),
                many.iter()
                    .map(|a| a.file_name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }),
    }
}

struct Job<'a> {
    base: &'a str,
    job: &'a str,
    segments: Vec<&'a str>,
    pattern: Option<Regex>,
    bucket: String,
}

impl Job<'_> {
    fn build_url(&self, build: &str, tail: &[&str]) -> RunTaskResult<String> {
        let mut segments = Vec::with_capacity(self.segments.len() * 2 + tail.len() + 1);
        for segment in &self.segments {
            segments.push("job");
            segments.push(*segment);
        }
        segments.push(build);
        segments.extend_from_slice(tail);
        join_url(self.base, &segments)
    }

    async fn build_info(&self, ctx: &ResolveContext<'_>, build: &str) -> RunTaskResult<BuildInfo> {
        let url = self.build_url(build, &["api", "json"])?;
        ctx.client.get_json(&url, &Vec::new()).await
    }

    fn matches_file(&self, build: u64, file_name: &str) -> bool {
        let original = file_name
            .strip_prefix(&format!("{}-", build))
            .unwrap_or(file_name);
        self.pattern.as_ref().is_none_or(|p| p.is_match(original))
    }

    /// Verified copy of an artifact of `build` accepted by the pattern
    async fn cached(&self, txn: &mut ManifestTxn, build: u64, pin: bool) -> RunTaskResult<Option<PathBuf>> {
        let keys: Vec<String> = txn
            .manifest()
            .bucket(&self.bucket)
            .map(|b| {
                b.entries
                    .iter()
                    .filter(|(_, e)| e.build == Some(build) && self.matches_file(build, &e.file_name))
                    .map(|(k, _)| k.clone())
                    .collect()
            })
            .unwrap_or_default();

        for key in keys {
            if let Some(cached) = fetch::verified_entry(txn, &self.bucket, &key).await? {
                info!("Located {} build {} in local cache.", self.job, build);
                if pin {
                    fetch::pin(txn, &self.bucket, &key).await?;
                }
                return Ok(Some(cached.path));
            }
        }
        Ok(None)
    }

    async fn download(
        &self,
        ctx: &ResolveContext<'_>,
        txn: &mut ManifestTxn,
        info: &BuildInfo,
        pinned: bool,
    ) -> RunTaskResult<PathBuf> {
        let artifact = select_artifact(self.job, &info.artifacts, self.pattern.as_ref())?;
        let build = info.number.to_string();

        let mut tail = vec!["artifact"];
        tail.extend(artifact.relative_path.split('/').filter(|s| !s.is_empty()));
        let url = self.build_url(&build, &tail)?;

        let file_name = sanitize_segment(&format!("{}-{}", info.number, artifact.file_name))?;
        let mut plan = FetchPlan::new(
            self.bucket.clone(),
            file_name.clone(),
            file_name,
            url,
            format!("{} build {} ({})", self.job, info.number, artifact.file_name),
        );
        plan.build = Some(info.number);
        plan.pinned = pinned;
        fetch::fetch_into(ctx, txn, &plan, None).await
    }
}

pub(crate) async fn resolve(
    ctx: &ResolveContext<'_>,
    base_url: &str,
    job: &str,
    artifact_pattern: Option<&str>,
    build: Option<&str>,
) -> RunTaskResult<PathBuf> {
    let pattern = artifact_pattern
        .map(Regex::new)
        .transpose()
        .map_err(|e| RunTaskError::InvalidReference(format!("invalid artifact pattern: {}", e)))?;
    let segments = job_segments(job);
    let job = Job {
        base: base_url,
        job,
        bucket: bucket_key(&segments)?,
        segments,
        pattern,
    };
    let namespace = Namespace::new(&["jenkins".to_string(), host_of(base_url)?])?;
    let mut txn = fetch::open(ctx, &namespace).await?;

    let selector = build.map(str::trim).unwrap_or(DEFAULT_PERMALINK);
    match selector.parse::<u64>() {
        Ok(number) => resolve_number(ctx, &mut txn, &job, number).await,
        Err(_) => resolve_permalink(ctx, &mut txn, &job, selector).await,
    }
}

async fn resolve_number(
    ctx: &ResolveContext<'_>,
    txn: &mut ManifestTxn,
    job: &Job<'_>,
    number: u64,
) -> RunTaskResult<PathBuf> {
    let policy = ctx.policy();
    if !policy.refresh || policy.offline {
        if let Some(path) = job.cached(txn, number, true).await? {
            return Ok(path);
        }
    }
    if policy.offline {
        return Err(RunTaskError::OfflineNotCached(format!(
            "{} build {}",
            job.job, number
        )));
    }

    let info = job.build_info(ctx, &number.to_string()).await?;
    job.download(ctx, txn, &info, true).await
}

/// Build a permalink last resolved to, and when that was asked
fn permalink_state(
    txn: &ManifestTxn,
    job: &Job<'_>,
    permalink: &str,
) -> Option<PermalinkState> {
    txn.manifest()
        .bucket(&job.bucket)
        .and_then(|b| b.permalinks.get(permalink))
        .copied()
}

async fn resolve_permalink(
    ctx: &ResolveContext<'_>,
    txn: &mut ManifestTxn,
    job: &Job<'_>,
    permalink: &str,
) -> RunTaskResult<PathBuf> {
    let policy = ctx.policy();
    let state = permalink_state(txn, job, permalink);

    match decide_known(
        state.map(|s| s.build),
        state.map_or(0, |s| s.last_update_check),
        &policy,
        ctx.now_ms,
    ) {
        LatestDecision::OfflineUnknown => Err(RunTaskError::OfflineUnknownVersion {
            name: job.job.to_string(),
            version: permalink.to_string(),
        }),
        LatestDecision::Local(number) => {
            if let Some(path) = job.cached(txn, number, false).await? {
                return Ok(path);
            }
            if policy.offline {
                return Err(RunTaskError::OfflineNotCached(format!(
                    "{} build {}",
                    job.job, number
                )));
            }
            let info = job.build_info(ctx, permalink).await?;
            remember(ctx, txn, job, permalink, info.number).await?;
            download_or_reuse(ctx, txn, job, &info).await
        }
        LatestDecision::Remote => match job.build_info(ctx, permalink).await {
            Ok(info) => {
                remember(ctx, txn, job, permalink, info.number).await?;
                download_or_reuse(ctx, txn, job, &info).await
            }
            Err(e) if e.is_transient() => {
                let unavailable = |e| RunTaskError::LatestUnavailable {
                    name: job.job.to_string(),
                    version: permalink.to_string(),
                    source: Box::new(e),
                };
                let Some(number) = state.map(|s| s.build) else {
                    return Err(unavailable(e));
                };
                warn!(
                    "Failed to check {} {}, using locally cached build {}: {}",
                    job.job, permalink, number, e
                );
                match job.cached(txn, number, false).await? {
                    Some(path) => Ok(path),
                    None => Err(unavailable(e)),
                }
            }
            Err(e) => Err(e),
        },
    }
}

async fn remember(
    ctx: &ResolveContext<'_>,
    txn: &mut ManifestTxn,
    job: &Job<'_>,
    permalink: &str,
    build: u64,
) -> RunTaskResult<()> {
    txn.manifest_mut().bucket_mut(&job.bucket).permalinks.insert(
        permalink.to_string(),
        PermalinkState {
            build,
            last_update_check: ctx.now_ms,
        },
    );
    txn.commit().await
}

async fn download_or_reuse(
    ctx: &ResolveContext<'_>,
    txn: &mut ManifestTxn,
    job: &Job<'_>,
    info: &BuildInfo,
) -> RunTaskResult<PathBuf> {
    if let Some(path) = job.cached(txn, info.number, false).await? {
        return Ok(path);
    }
    job.download(ctx, txn, info, false).await
}
