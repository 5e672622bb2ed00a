//! Configuration management for runtask

pub mod duration;
pub mod schema;

pub use duration::{parse_duration, pretty_duration};
pub use schema::{CacheConfig, Config, EndpointsConfig, GeneralConfig};

use crate::error::{RunTaskError, RunTaskResult};
use crate::freshness::FreshnessPolicy;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info};

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("runtask")
            .join("config.toml")
    }

    /// Get the default artifact cache root
    pub fn default_cache_root() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("runtask")
    }

    /// Load configuration, using defaults if the file does not exist
    pub async fn load(&self) -> RunTaskResult<Config> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> RunTaskResult<Config> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| RunTaskError::io(format!("reading config from {}", path.display()), e))?;

        toml::from_str(&content).map_err(|e| RunTaskError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Save configuration to file
    pub async fn save(&self, config: &Config) -> RunTaskResult<()> {
        self.ensure_config_dir().await?;

        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            RunTaskError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Ensure the config directory exists
    async fn ensure_config_dir(&self) -> RunTaskResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| RunTaskError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }
        Ok(())
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Values supplied by the host environment that take precedence over the file
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub cache_root: Option<PathBuf>,
    pub offline: bool,
    pub refresh: bool,
    pub recheck_interval: Option<String>,
}

/// Validated runtime configuration shared by every resolver
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub cache_root: PathBuf,
    pub offline: bool,
    pub refresh: bool,
    pub recheck_interval: Duration,
    pub revalidate_interval: Duration,
    pub endpoints: EndpointsConfig,
}

impl ResolverConfig {
    /// Default settings rooted at `cache_root`
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            cache_root: cache_root.into(),
            offline: false,
            refresh: false,
            recheck_interval: Duration::from_secs(60 * 60),
            revalidate_interval: Duration::from_secs(7 * 24 * 60 * 60),
            endpoints: EndpointsConfig::default(),
        }
    }

    /// Build from the file configuration plus host overrides.
    ///
    /// Fails fast on malformed durations or endpoint URLs.
    pub fn from_config(config: &Config, overrides: &ConfigOverrides) -> RunTaskResult<Self> {
        let cache_root = overrides
            .cache_root
            .clone()
            .or_else(|| config.cache.root.clone())
            .unwrap_or_else(ConfigManager::default_cache_root);

        let recheck = overrides
            .recheck_interval
            .as_deref()
            .unwrap_or(&config.cache.recheck_interval);

        let resolved = Self {
            cache_root,
            offline: overrides.offline || config.cache.offline,
            refresh: overrides.refresh || config.cache.refresh,
            recheck_interval: parse_duration(recheck)?,
            revalidate_interval: parse_duration(&config.cache.revalidate_interval)?,
            endpoints: config.endpoints.clone(),
        };
        resolved.validate_endpoints()?;
        Ok(resolved)
    }

    pub fn with_offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    pub fn with_refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    pub fn with_recheck_interval(mut self, interval: Duration) -> Self {
        self.recheck_interval = interval;
        self
    }

    pub fn with_revalidate_interval(mut self, interval: Duration) -> Self {
        self.revalidate_interval = interval;
        self
    }

    pub fn with_endpoints(mut self, endpoints: EndpointsConfig) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Freshness settings derived from this configuration
    pub fn freshness(&self) -> FreshnessPolicy {
        FreshnessPolicy {
            offline: self.offline,
            refresh: self.refresh,
            recheck_interval: self.recheck_interval,
            revalidate_interval: self.revalidate_interval,
        }
    }

    fn validate_endpoints(&self) -> RunTaskResult<()> {
        let endpoints = [
            ("endpoints.fill", &self.endpoints.fill),
            ("endpoints.hangar", &self.endpoints.hangar),
            ("endpoints.modrinth", &self.endpoints.modrinth),
            ("endpoints.github", &self.endpoints.github),
            ("endpoints.discord", &self.endpoints.discord),
        ];
        for (key, value) in endpoints {
            url::Url::parse(value).map_err(|e| RunTaskError::ConfigInvalid {
                path: PathBuf::from(key),
                reason: format!("'{}' is not an absolute URL: {}", value, e),
            })?;
        }
        Ok(())
    }
}
