//! Error types for runtask
//!
//! All modules use `RunTaskResult<T>` as their return type.

use crate::hashing::HashAlgorithm;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for runtask operations
pub type RunTaskResult<T> = Result<T, RunTaskError>;

/// All errors that can occur while resolving artifacts
#[derive(Error, Debug)]
pub enum RunTaskError {
    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot parse a duration from '{input}'. Accepted format is a number followed by a unit abbreviation (d, h, m, s), e.g. 1d, 12h, 1m, 30s")]
    InvalidDuration { input: String },

    #[error("Invalid artifact reference: {0}")]
    InvalidReference(String),

    // Offline errors
    #[error("Offline mode is enabled and no build of {name} {version} is known locally")]
    OfflineUnknownVersion { name: String, version: String },

    #[error("Offline mode is enabled and could not locate a locally cached build {build} of {name} {version}")]
    OfflineBuildNotCached {
        name: String,
        version: String,
        build: u64,
    },

    #[error("Offline mode is enabled and could not locate a locally cached copy of {0}")]
    OfflineNotCached(String),

    // Network errors
    #[error("Request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: Box<ureq::Error>,
    },

    #[error("Request to {url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("Unexpected response from {url}: {reason}")]
    Metadata { url: String, reason: String },

    #[error("Could not determine the latest build of {name} {version}: {source}")]
    LatestUnavailable {
        name: String,
        version: String,
        #[source]
        source: Box<RunTaskError>,
    },

    #[error("Failed to download {name}: {source}")]
    Download {
        name: String,
        #[source]
        source: Box<RunTaskError>,
    },

    // Integrity errors
    #[error("Invalid {algorithm} hash for {name}: expected {expected}, got {actual}")]
    HashMismatch {
        name: String,
        algorithm: HashAlgorithm,
        expected: String,
        actual: String,
    },

    #[error("Downloaded file from {url} is not a valid archive ({reason}); kept for inspection at {invalid_path}")]
    MalformedArtifact {
        url: String,
        invalid_path: PathBuf,
        reason: String,
    },

    #[error("Artifact selection failed for {job}: {reason}")]
    ArtifactSelection { job: String, reason: String },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl RunTaskError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a network error for a failed request
    pub fn network(url: impl Into<String>, source: ureq::Error) -> Self {
        Self::Network {
            url: url.into(),
            source: Box::new(source),
        }
    }

    /// Create a metadata error for a response that could not be understood
    pub fn metadata(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Metadata {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Wrap a failure that happened while downloading `name`
    pub fn download(name: impl Into<String>, source: RunTaskError) -> Self {
        Self::Download {
            name: name.into(),
            source: Box::new(source),
        }
    }

    /// Whether the failure came from talking to a remote server.
    ///
    /// Used to decide if a latest-build lookup may degrade to the local cache.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network { .. } | Self::HttpStatus { .. } | Self::Metadata { .. } => true,
            Self::Json(_) => true,
            Self::Download { source, .. } | Self::LatestUnavailable { source, .. } => {
                source.is_transient()
            }
            _ => false,
        }
    }

    /// Whether this error was raised because offline mode prevented a fetch
    pub fn is_offline(&self) -> bool {
        matches!(
            self,
            Self::OfflineUnknownVersion { .. }
                | Self::OfflineBuildNotCached { .. }
                | Self::OfflineNotCached(_)
        )
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::OfflineUnknownVersion { .. }
            | Self::OfflineBuildNotCached { .. }
            | Self::OfflineNotCached(_) => {
                Some("Run once without --offline (or RUNTASK_OFFLINE) to populate the cache")
            }
            Self::HashMismatch { .. } => {
                Some("The download did not match its published checksum; retry, or clear the namespace with: runtask cache clear")
            }
            Self::InvalidDuration { .. } => Some("Examples: 30s, 15m, 12h, 7d"),
            Self::MalformedArtifact { .. } => {
                Some("Check that the URL points directly at a .jar or .zip file")
            }
            _ => None,
        }
    }
}
