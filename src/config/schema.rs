//! Configuration schema for runtask
//!
//! Configuration is stored at `~/.config/runtask/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Cache behaviour
    pub cache: CacheConfig,

    /// Remote API base URLs
    pub endpoints: EndpointsConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache root (defaults to the platform cache directory)
    pub root: Option<PathBuf>,

    /// How long a "latest build" answer is trusted before asking again
    pub recheck_interval: String,

    /// How long a plugin file behind a mutable coordinate is reused before
    /// it is revalidated with a conditional request
    pub revalidate_interval: String,

    /// Never touch the network
    pub offline: bool,

    /// Ignore freshness bookkeeping and always ask the remote
    pub refresh: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: None,
            recheck_interval: "1h".to_string(),
            revalidate_interval: "7d".to_string(),
            offline: false,
            refresh: false,
        }
    }
}

/// Remote API base URLs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointsConfig {
    /// Build-channel downloads API (Fill v3)
    pub fill: String,

    /// Hangar instance
    pub hangar: String,

    /// Modrinth API
    pub modrinth: String,

    /// GitHub web host used for release downloads
    pub github: String,

    /// Discord REST API
    pub discord: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            fill: "https://fill.papermc.io/v3/".to_string(),
            hangar: "https://hangar.papermc.io".to_string(),
            modrinth: "https://api.modrinth.com".to_string(),
            github: "https://github.com".to_string(),
            discord: "https://discord.com/api/v10".to_string(),
        }
    }
}
