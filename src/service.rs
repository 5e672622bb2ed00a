//! Resolution facade
//!
//! [`ArtifactService`] is the entry point used by launchers and the CLI. One
//! resolution runs at a time per service; the manifest is reloaded on every
//! call so separate processes sharing a cache stay consistent.

use crate::config::ResolverConfig;
use crate::download::{HttpClient, LogReporter, ProgressReporter};
use crate::error::{RunTaskError, RunTaskResult};
use crate::eviction;
use crate::manifest::{now_millis, ManifestStore, Namespace, MANIFEST_FILE_NAME};
use crate::provider::{self, ArtifactReference, ResolveContext};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

/// One cached artifact, as reported by [`ArtifactService::list`]
#[derive(Debug, Clone, Serialize)]
pub struct CachedArtifact {
    pub namespace: String,
    pub bucket: String,
    pub key: String,
    pub file_name: String,
    pub path: PathBuf,
    pub build: Option<u64>,
    pub pinned: bool,
    /// Size on disk, `None` when the file is missing
    pub size: Option<u64>,
    pub last_checked: i64,
}

pub struct ArtifactService {
    config: ResolverConfig,
    client: HttpClient,
    reporter: Arc<dyn ProgressReporter>,
    guard: Mutex<()>,
}

impl ArtifactService {
    /// Service that logs download progress
    pub fn new(config: ResolverConfig) -> Self {
        Self {
            config,
            client: HttpClient::new(),
            reporter: Arc::new(LogReporter::new()),
            guard: Mutex::new(()),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve a reference to the path of a verified local file
    pub async fn resolve_artifact(&self, reference: &ArtifactReference) -> RunTaskResult<PathBuf> {
        let _lock = self.guard.lock().await;
        debug!("Resolving {}", reference.key());

        let ctx = ResolveContext {
            config: &self.config,
            client: &self.client,
            reporter: self.reporter.as_ref(),
            now_ms: now_millis(),
        };
        provider::resolve(reference, &ctx).await
    }

    /// Remove one namespace, or the whole cache, pinned entries included
    pub async fn clear(&self, namespace: Option<&Namespace>) -> RunTaskResult<bool> {
        let _lock = self.guard.lock().await;
        eviction::clear(&self.config.cache_root, namespace).await
    }

    /// Every artifact recorded in every namespace under the cache root
    pub async fn list(&self) -> RunTaskResult<Vec<CachedArtifact>> {
        let _lock = self.guard.lock().await;
        let mut artifacts = Vec::new();

        for dir in find_namespaces(&self.config.cache_root).await? {
            let namespace = dir
                .strip_prefix(&self.config.cache_root)
                .map(|p| {
                    p.components()
                        .map(|c| c.as_os_str().to_string_lossy().into_owned())
                        .collect::<Vec<_>>()
                        .join("/")
                })
                .unwrap_or_else(|_| dir.display().to_string());

            let store = ManifestStore::new(&dir);
            let manifest = store.load().await?;
            for (bucket_name, bucket) in &manifest.buckets {
                for (key, entry) in &bucket.entries {
                    let path = store.entry_path(bucket_name, entry);
                    let size = fs::metadata(&path).await.ok().map(|m| m.len());
                    artifacts.push(CachedArtifact {
                        namespace: namespace.clone(),
                        bucket: bucket_name.clone(),
                        key: key.clone(),
                        file_name: entry.file_name.clone(),
                        path,
                        build: entry.build,
                        pinned: entry.pinned,
                        size,
                        last_checked: entry.last_checked,
                    });
                }
            }
        }
        Ok(artifacts)
    }
}

/// Directories under `root` that hold a manifest
async fn find_namespaces(root: &Path) -> RunTaskResult<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(RunTaskError::io(format!("reading {}", dir.display()), e)),
        };
        if fs::try_exists(dir.join(MANIFEST_FILE_NAME)).await.unwrap_or(false) {
            found.push(dir.clone());
            continue;
        }
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| RunTaskError::io(format!("reading {}", dir.display()), e))?
        {
            if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                pending.push(entry.path());
            }
        }
    }

    found.sort();
    Ok(found)
}

/// One-shot resolution with a fresh service
pub async fn resolve_artifact(
    reference: &ArtifactReference,
    config: &ResolverConfig,
) -> RunTaskResult<PathBuf> {
    ArtifactService::new(config.clone())
        .resolve_artifact(reference)
        .await
}
