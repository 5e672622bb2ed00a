//! CLI argument definitions using clap derive

use crate::error::RunTaskResult;
use crate::provider::{ArtifactReference, BuildSelector};
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

/// runtask - fetch and cache server jars and plugins
///
/// Resolves build-channel servers, Hangar, Modrinth, GitHub, Jenkins and
/// Discord artifacts into a verified local cache and prints the file path.
#[derive(Parser, Debug)]
#[command(name = "runtask")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "RUNTASK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Cache root directory
    #[arg(long, global = true, env = "RUNTASK_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Never touch the network; fail if the artifact is not cached
    #[arg(long, global = true, env = "RUNTASK_OFFLINE")]
    pub offline: bool,

    /// Ignore freshness bookkeeping and ask the remote again
    #[arg(long, global = true, env = "RUNTASK_REFRESH", conflicts_with = "offline")]
    pub refresh: bool,

    /// How long a latest-build answer is trusted (e.g. 30m, 1h, 1d)
    #[arg(long, global = true, env = "RUNTASK_RECHECK_INTERVAL")]
    pub recheck_interval: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve an artifact and print its local path
    Resolve(ResolveArgs),

    /// Inspect or clear the artifact cache
    Cache(CacheArgs),

    /// Show configuration
    Config(ConfigArgs),
}

#[derive(Parser, Debug)]
pub struct ResolveArgs {
    #[command(subcommand)]
    pub source: ResolveSource,

    /// Print the resolved path as JSON together with the artifact key
    #[arg(long, global = true)]
    pub json: bool,
}

/// Where the artifact comes from
#[derive(Subcommand, Debug)]
pub enum ResolveSource {
    /// A server build from a download channel (paper, velocity, folia, ...)
    Channel {
        /// Project name
        project: String,
        /// Game version
        #[arg(id = "game_version", value_name = "VERSION")]
        version: String,
        /// Build number or "latest"
        #[arg(default_value = "latest")]
        build: String,
    },

    /// A plugin version from Hangar
    Hangar {
        plugin: String,
        #[arg(id = "plugin_version", value_name = "VERSION")]
        version: String,
        /// Platform the file is built for
        #[arg(long, default_value = "paper")]
        platform: String,
        /// Hangar instance
        #[arg(long)]
        base_url: Option<String>,
    },

    /// A project version from Modrinth
    Modrinth {
        /// Project slug or id
        project: String,
        /// Version id or number
        #[arg(id = "project_version", value_name = "VERSION")]
        version: String,
        #[arg(long)]
        base_url: Option<String>,
    },

    /// A GitHub release asset
    Github(GithubArgs),

    /// Any direct download link
    Url { url: String },

    /// A Jenkins build artifact
    Jenkins {
        /// Jenkins root URL
        base_url: String,
        /// Job path, nested folders separated by '/'
        job: String,
        /// Regex the artifact file name must match
        #[arg(short, long)]
        pattern: Option<String>,
        /// Build number or permalink (default lastSuccessfulBuild)
        #[arg(short, long)]
        build: Option<String>,
    },

    /// The first attachment of a Discord message
    Discord {
        channel_id: String,
        message_id: String,
        /// Bot token
        #[arg(long, env = "RUNTASK_DISCORD_TOKEN", hide_env_values = true)]
        token: String,
    },
}

#[derive(Args, Debug)]
pub struct GithubArgs {
    /// Repository as owner/repo
    pub repository: String,
    /// Release tag
    pub tag: String,
    /// Asset file name
    pub asset: String,
}

impl ResolveSource {
    /// Turn command line coordinates into a reference
    pub fn into_reference(self) -> RunTaskResult<ArtifactReference> {
        let reference = match self {
            Self::Channel {
                project,
                version,
                build,
            } => ArtifactReference::ChannelBuild {
                project,
                version,
                build: BuildSelector::parse(&build)?,
            },
            Self::Hangar {
                plugin,
                version,
                platform,
                base_url,
            } => ArtifactReference::Hangar {
                base_url,
                plugin,
                version,
                platform,
            },
            Self::Modrinth {
                project,
                version,
                base_url,
            } => ArtifactReference::Modrinth {
                base_url,
                project,
                version,
            },
            Self::Github(args) => {
                let (owner, repo) = args
                    .repository
                    .split_once('/')
                    .unwrap_or((args.repository.as_str(), ""));
                ArtifactReference::GitHub {
                    owner: owner.to_string(),
                    repo: repo.to_string(),
                    tag: args.tag,
                    asset: args.asset,
                }
            }
            Self::Url { url } => ArtifactReference::Url { url },
            Self::Jenkins {
                base_url,
                job,
                pattern,
                build,
            } => ArtifactReference::Jenkins {
                base_url,
                job,
                artifact_pattern: pattern,
                build,
            },
            Self::Discord {
                channel_id,
                message_id,
                token,
            } => ArtifactReference::Discord {
                channel_id,
                message_id,
                token,
            },
        };
        reference.validate()?;
        Ok(reference)
    }
}

#[derive(Parser, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub action: CacheAction,
}

#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Print the cache root
    Path,

    /// List cached artifacts
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete a namespace (e.g. "paper" or "hangar/hangar.papermc.io") or everything
    Clear {
        /// Namespace to delete; omit to clear the whole cache
        namespace: Option<String>,

        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write a default configuration file
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}
