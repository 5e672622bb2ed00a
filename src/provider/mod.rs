//! Artifact references and provider dispatch
//!
//! An [`ArtifactReference`] names one remote artifact. [`resolve`] validates
//! it and hands it to the matching provider, which returns the path of a
//! verified local copy.

pub mod channel;
pub mod discord;
mod fetch;
pub mod github;
pub mod hangar;
pub mod jenkins;
pub mod modrinth;
pub mod url;

use crate::config::ResolverConfig;
use crate::download::{HttpClient, ProgressReporter};
use crate::error::{RunTaskError, RunTaskResult};
use crate::freshness::FreshnessPolicy;
use crate::manifest::sanitize_segment;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Which build of a channel to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildSelector {
    Latest,
    Specific(u64),
}

impl BuildSelector {
    /// Parse `latest` or a build number
    pub fn parse(raw: &str) -> RunTaskResult<Self> {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("latest") {
            return Ok(Self::Latest);
        }
        trimmed.parse().map(Self::Specific).map_err(|_| {
            RunTaskError::InvalidReference(format!(
                "build must be 'latest' or a build number, got '{}'",
                raw
            ))
        })
    }
}

impl fmt::Display for BuildSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => write!(f, "latest"),
            Self::Specific(build) => write!(f, "{}", build),
        }
    }
}

/// A logical reference to a remote artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "kebab-case")]
pub enum ArtifactReference {
    /// A server build from a distribution-channel API (Paper, Velocity, ...)
    ChannelBuild {
        project: String,
        version: String,
        build: BuildSelector,
    },
    Hangar {
        base_url: Option<String>,
        plugin: String,
        version: String,
        platform: String,
    },
    Modrinth {
        base_url: Option<String>,
        project: String,
        version: String,
    },
    #[serde(rename = "github")]
    GitHub {
        owner: String,
        repo: String,
        tag: String,
        asset: String,
    },
    Url {
        url: String,
    },
    Jenkins {
        base_url: String,
        job: String,
        artifact_pattern: Option<String>,
        /// Build number, or a permalink such as `lastSuccessfulBuild`
        build: Option<String>,
    },
    Discord {
        channel_id: String,
        message_id: String,
        token: String,
    },
}

/// Top-level cache directories owned by providers other than the channel API
pub const PROVIDER_NAMESPACES: [&str; 6] =
    ["hangar", "modrinth", "github", "url", "jenkins", "discord"];

fn require(field: &str, value: &str) -> RunTaskResult<()> {
    if value.trim().is_empty() {
        return Err(RunTaskError::InvalidReference(format!(
            "{} must not be empty",
            field
        )));
    }
    Ok(())
}

fn require_segment(field: &str, value: &str) -> RunTaskResult<()> {
    require(field, value)?;
    sanitize_segment(value).map(|_| ())
}

fn require_url(field: &str, value: &str) -> RunTaskResult<()> {
    let parsed = ::url::Url::parse(value).map_err(|e| {
        RunTaskError::InvalidReference(format!("{} '{}' is not a valid URL: {}", field, value, e))
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(RunTaskError::InvalidReference(format!(
            "{} '{}' must use http or https",
            field, value
        )));
    }
    Ok(())
}

impl ArtifactReference {
    /// Short provider name, also used in log lines
    pub fn provider(&self) -> &'static str {
        match self {
            Self::ChannelBuild { .. } => "channel",
            Self::Hangar { .. } => "hangar",
            Self::Modrinth { .. } => "modrinth",
            Self::GitHub { .. } => "github",
            Self::Url { .. } => "url",
            Self::Jenkins { .. } => "jenkins",
            Self::Discord { .. } => "discord",
        }
    }

    /// Check required fields and syntax before any I/O happens
    pub fn validate(&self) -> RunTaskResult<()> {
        match self {
            Self::ChannelBuild {
                project, version, ..
            } => {
                require_segment("project", project)?;
                if PROVIDER_NAMESPACES
                    .iter()
                    .any(|ns| ns.eq_ignore_ascii_case(project.trim()))
                {
                    return Err(RunTaskError::InvalidReference(format!(
                        "project '{}' clashes with the {} cache directory",
                        project,
                        project.trim().to_ascii_lowercase()
                    )));
                }
                require_segment("version", version)
            }
            Self::Hangar {
                base_url,
                plugin,
                version,
                platform,
            } => {
                if let Some(base) = base_url {
                    require_url("base URL", base)?;
                }
                require_segment("plugin", plugin)?;
                require_segment("version", version)?;
                require_segment("platform", platform)
            }
            Self::Modrinth {
                base_url,
                project,
                version,
            } => {
                if let Some(base) = base_url {
                    require_url("base URL", base)?;
                }
                require_segment("project", project)?;
                require_segment("version", version)
            }
            Self::GitHub {
                owner,
                repo,
                tag,
                asset,
            } => {
                require_segment("owner", owner)?;
                require_segment("repo", repo)?;
                require_segment("tag", tag)?;
                require_segment("asset", asset)
            }
            Self::Url { url } => require_url("url", url),
            Self::Jenkins {
                base_url,
                job,
                artifact_pattern,
                build,
            } => {
                require_url("base URL", base_url)?;
                let segments = jenkins::job_segments(job);
                if segments.is_empty() {
                    return Err(RunTaskError::InvalidReference(
                        "job must not be empty".to_string(),
                    ));
                }
                for segment in segments {
                    sanitize_segment(segment)?;
                }
                if let Some(pattern) = artifact_pattern {
                    regex::Regex::new(pattern).map_err(|e| {
                        RunTaskError::InvalidReference(format!(
                            "artifact pattern '{}' is not a valid regex: {}",
                            pattern, e
                        ))
                    })?;
                }
                if let Some(build) = build {
                    require("build", build)?;
                }
                Ok(())
            }
            Self::Discord {
                channel_id,
                message_id,
                token,
            } => {
                require_segment("channel id", channel_id)?;
                require_segment("message id", message_id)?;
                require("token", token)
            }
        }
    }

    /// The logical identity of this reference
    pub fn key(&self) -> ArtifactKey {
        let (coordinates, build) = match self {
            Self::ChannelBuild {
                project,
                version,
                build,
            } => (
                vec![project.clone(), version.clone()],
                match build {
                    BuildSelector::Specific(n) => Some(*n),
                    BuildSelector::Latest => None,
                },
            ),
            Self::Hangar {
                plugin,
                version,
                platform,
                ..
            } => (vec![plugin.clone(), platform.clone(), version.clone()], None),
            Self::Modrinth {
                project, version, ..
            } => (vec![project.clone(), version.clone()], None),
            Self::GitHub {
                owner,
                repo,
                tag,
                asset,
            } => (
                vec![owner.clone(), repo.clone(), tag.clone(), asset.clone()],
                None,
            ),
            Self::Url { url } => (vec![url::url_hash(url)], None),
            Self::Jenkins { job, build, .. } => (
                vec![job.clone()],
                build.as_deref().and_then(|b| b.parse().ok()),
            ),
            Self::Discord {
                channel_id,
                message_id,
                ..
            } => (vec![channel_id.clone(), message_id.clone()], None),
        };
        ArtifactKey {
            provider: self.provider(),
            coordinates,
            build,
        }
    }
}

/// Immutable identity of a logical artifact
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactKey {
    pub provider: &'static str,
    pub coordinates: Vec<String>,
    pub build: Option<u64>,
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider, self.coordinates.join("/"))?;
        if let Some(build) = self.build {
            write!(f, "#{}", build)?;
        }
        Ok(())
    }
}

/// Everything a provider needs for one resolution
pub struct ResolveContext<'a> {
    pub config: &'a ResolverConfig,
    pub client: &'a HttpClient,
    pub reporter: &'a dyn ProgressReporter,
    pub now_ms: i64,
}

impl ResolveContext<'_> {
    pub fn policy(&self) -> FreshnessPolicy {
        self.config.freshness()
    }
}

/// Resolve a reference to a verified local file
pub async fn resolve(
    reference: &ArtifactReference,
    ctx: &ResolveContext<'_>,
) -> RunTaskResult<PathBuf> {
    reference.validate()?;
    match reference {
        ArtifactReference::ChannelBuild {
            project,
            version,
            build,
        } => channel::resolve(ctx, project, version, *build).await,
        ArtifactReference::Hangar {
            base_url,
            plugin,
            version,
            platform,
        } => hangar::resolve(ctx, base_url.as_deref(), plugin, version, platform).await,
        ArtifactReference::Modrinth {
            base_url,
            project,
            version,
        } => modrinth::resolve(ctx, base_url.as_deref(), project, version).await,
        ArtifactReference::GitHub {
            owner,
            repo,
            tag,
            asset,
        } => github::resolve(ctx, owner, repo, tag, asset).await,
        ArtifactReference::Url { url } => url::resolve(ctx, url).await,
        ArtifactReference::Jenkins {
            base_url,
            job,
            artifact_pattern,
            build,
        } => {
            jenkins::resolve(
                ctx,
                base_url,
                job,
                artifact_pattern.as_deref(),
                build.as_deref(),
            )
            .await
        }
        ArtifactReference::Discord {
            channel_id,
            message_id,
            token,
        } => discord::resolve(ctx, channel_id, message_id, token).await,
    }
}

/// Append path segments to a base URL, percent-encoding each one
pub(crate) fn join_url(base: &str, segments: &[&str]) -> RunTaskResult<String> {
    let mut url = ::url::Url::parse(base).map_err(|e| {
        RunTaskError::InvalidReference(format!("'{}' is not a valid URL: {}", base, e))
    })?;
    url.path_segments_mut()
        .map_err(|_| RunTaskError::InvalidReference(format!("'{}' cannot be a base URL", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url.into())
}

/// Host (and port) of a base URL, for namespace directories
pub(crate) fn host_of(base: &str) -> RunTaskResult<String> {
    let url = ::url::Url::parse(base).map_err(|e| {
        RunTaskError::InvalidReference(format!("'{}' is not a valid URL: {}", base, e))
    })?;
    let host = url
        .host_str()
        .ok_or_else(|| RunTaskError::InvalidReference(format!("'{}' has no host", base)))?;
    Ok(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}
