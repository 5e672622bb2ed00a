//! runtask - artifact resolution for game-server launchers
//!
//! Resolves server builds and plugins from download channels, Hangar,
//! Modrinth, GitHub, Jenkins, Discord and plain URLs into a local cache
//! whose contents are hash-verified before they are handed out.

pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod eviction;
pub mod freshness;
pub mod hashing;
pub mod manifest;
pub mod provider;
pub mod service;
pub mod ui;

pub use config::{ConfigOverrides, ResolverConfig};
pub use error::{RunTaskError, RunTaskResult};
pub use provider::{ArtifactReference, BuildSelector};
pub use service::{resolve_artifact, ArtifactService};
