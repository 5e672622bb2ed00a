//! Single-use download operation
//!
//! One blocking task performs the request and streams the body into a
//! temporary `.part` file next to the destination, hashing as it goes.
//! A timer task polls the shared byte counter for progress. The file is
//! moved into place only after the hash checks out.

use crate::config::pretty_duration;
use crate::download::http::{self, Headers, HttpClient};
use crate::download::progress::{DownloadProgress, ProgressReporter};
use crate::error::{RunTaskError, RunTaskResult};
use crate::eviction::PARTIAL_SUFFIX;
use crate::hashing::{hash_file_async, ContentHash, HashAlgorithm, StreamingHasher};
use crate::manifest::CacheEntry;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, info};
use uuid::Uuid;

const CHUNK_SIZE: usize = 64 * 1024;
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// What the previous resolution recorded about the destination file
#[derive(Debug, Clone, Default)]
pub struct Prior {
    pub content_hash: Option<ContentHash>,
    pub etag: Option<String>,
    pub last_checked: i64,
}

impl From<&CacheEntry> for Prior {
    fn from(entry: &CacheEntry) -> Self {
        Self {
            content_hash: entry.content_hash.clone(),
            etag: entry.etag.clone(),
            last_checked: entry.last_checked,
        }
    }
}

/// Result of a successful download call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// New bytes were written to the destination
    Downloaded {
        bytes: u64,
        etag: Option<String>,
        hash: ContentHash,
    },
    /// The server confirmed the existing file is current
    NotModified { etag: Option<String> },
}

struct ResponseHead {
    content_length: Option<u64>,
}

enum Transfer {
    NotModified {
        etag: Option<String>,
    },
    Complete {
        bytes: u64,
        etag: Option<String>,
        hash: ContentHash,
    },
}

/// A single download. Build it, then consume it with [`Download::run`].
pub struct Download<'a> {
    client: &'a HttpClient,
    reporter: &'a dyn ProgressReporter,
    url: String,
    destination: PathBuf,
    display_name: String,
    headers: Headers,
    expected: Option<ContentHash>,
    prior: Option<Prior>,
}

impl<'a> Download<'a> {
    pub fn new(
        client: &'a HttpClient,
        reporter: &'a dyn ProgressReporter,
        url: impl Into<String>,
        destination: impl Into<PathBuf>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            client,
            reporter,
            url: url.into(),
            destination: destination.into(),
            display_name: display_name.into(),
            headers: Vec::new(),
            expected: None,
            prior: None,
        }
    }

    /// Verify the body against a published hash before placing it
    pub fn expect_hash(mut self, hash: Option<ContentHash>) -> Self {
        self.expected = hash;
        self
    }

    /// Previous bookkeeping for the destination, enabling conditional requests
    pub fn prior(mut self, prior: Option<Prior>) -> Self {
        self.prior = prior;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub async fn run(self) -> RunTaskResult<DownloadOutcome> {
        let parent = self
            .destination
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| {
                RunTaskError::Internal(format!(
                    "download destination {} has no parent directory",
                    self.destination.display()
                ))
            })?;
        tokio::fs::create_dir_all(&parent)
            .await
            .map_err(|e| RunTaskError::io(format!("creating {}", parent.display()), e))?;

        let mut headers = self.headers.clone();
        let conditional = self.prepare_destination(&mut headers).await?;

        let file_name = self
            .destination
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "download".to_string());
        let part = parent.join(format!(".{}.{}{}", file_name, Uuid::new_v4(), PARTIAL_SUFFIX));

        // Without a published hash the body is recorded as SHA-256
        let algorithm = self
            .expected
            .as_ref()
            .map(|h| h.algorithm)
            .unwrap_or(HashAlgorithm::Sha256);

        debug!("Fetching {} into {}", self.url, self.destination.display());
        let started = Instant::now();
        let counter = Arc::new(AtomicU64::new(0));
        let (head_tx, head_rx) = oneshot::channel();

        let task = {
            let agent = self.client.agent();
            let url = self.url.clone();
            let part = part.clone();
            let counter = Arc::clone(&counter);
            tokio::task::spawn_blocking(move || {
                transfer(
                    &agent,
                    &url,
                    &headers,
                    conditional,
                    &part,
                    algorithm,
                    &counter,
                    head_tx,
                )
            })
        };

        let progress: Option<Arc<dyn DownloadProgress>> = match head_rx.await {
            Ok(head) => Some(self.reporter.start(&self.display_name, head.content_length)),
            Err(_) => None,
        };

        let ticker = progress.as_ref().map(|progress| {
            let progress = Arc::clone(progress);
            let counter = Arc::clone(&counter);
            let period = self.reporter.interval().max(MIN_POLL_INTERVAL);
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(period);
                interval.tick().await;
                loop {
                    interval.tick().await;
                    progress.update(counter.load(Ordering::Relaxed));
                }
            })
        });

        let joined = task.await;
        if let Some(ticker) = ticker {
            ticker.abort();
        }
        if let Some(progress) = &progress {
            progress.finish(counter.load(Ordering::Relaxed));
        }

        let transferred = joined
            .map_err(|e| RunTaskError::Internal(format!("download task failed: {}", e)))?;

        let (bytes, etag, hash) = match transferred? {
            Transfer::NotModified { etag } => {
                info!("{} is up to date", self.display_name);
                return Ok(DownloadOutcome::NotModified { etag });
            }
            Transfer::Complete { bytes, etag, hash } => (bytes, etag, hash),
        };

        if let Some(expected) = &self.expected {
            if !expected.matches(&hash.hex) {
                let _ = tokio::fs::remove_file(&part).await;
                return Err(RunTaskError::HashMismatch {
                    name: self.display_name.clone(),
                    algorithm: expected.algorithm,
                    expected: expected.hex.clone(),
                    actual: hash.hex,
                });
            }
            info!("Verified {} hash of {}.", expected.algorithm, self.display_name);
        }

        if let Err(e) = tokio::fs::rename(&part, &self.destination).await {
            let _ = tokio::fs::remove_file(&part).await;
            return Err(RunTaskError::io(
                format!("moving download into {}", self.destination.display()),
                e,
            ));
        }

        info!(
            "Done downloading {}, took {}.",
            self.display_name,
            pretty_duration(started.elapsed())
        );
        Ok(DownloadOutcome::Downloaded { bytes, etag, hash })
    }

    /// Keep the destination only when its hash still matches the prior
    /// record; in that case return conditional headers. Otherwise the file
    /// is deleted so nothing unverified stays in place.
    async fn prepare_destination(&self, headers: &mut Headers) -> RunTaskResult<bool> {
        let exists = tokio::fs::try_exists(&self.destination)
            .await
            .unwrap_or(false);
        if !exists {
            return Ok(false);
        }

        let recorded = self
            .prior
            .as_ref()
            .and_then(|p| p.content_hash.clone().map(|h| (p, h)));

        if let Some((prior, recorded)) = recorded {
            let actual = hash_file_async(recorded.algorithm, self.destination.clone()).await?;
            if recorded.matches(&actual.hex) {
                if let Some(etag) = &prior.etag {
                    headers.push(("If-None-Match".to_string(), etag.clone()));
                }
                if let Some(since) = http_date(prior.last_checked) {
                    headers.push(("If-Modified-Since".to_string(), since));
                }
                return Ok(true);
            }
            debug!(
                "Existing {} does not match its recorded hash, discarding",
                self.destination.display()
            );
        }

        tokio::fs::remove_file(&self.destination).await.map_err(|e| {
            RunTaskError::io(format!("removing stale {}", self.destination.display()), e)
        })?;
        Ok(false)
    }
}

/// RFC 7231 date for conditional requests
fn http_date(epoch_ms: i64) -> Option<String> {
    if epoch_ms <= 0 {
        return None;
    }
    chrono::DateTime::from_timestamp_millis(epoch_ms)
        .map(|t| t.format("%a, %d %b %Y %H:%M:%S GMT").to_string())
}

#[allow(clippy::too_many_arguments)]
fn transfer(
    agent: &ureq::Agent,
    url: &str,
    headers: &Headers,
    conditional: bool,
    part: &Path,
    algorithm: HashAlgorithm,
    counter: &AtomicU64,
    head_tx: oneshot::Sender<ResponseHead>,
) -> RunTaskResult<Transfer> {
    let response = http::get(agent, url, headers).map_err(|e| RunTaskError::network(url, e))?;

    let status = response.status().as_u16();
    let etag = response
        .headers()
        .get("etag")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    if status == 304 && conditional {
        return Ok(Transfer::NotModified { etag });
    }
    if !(200..300).contains(&status) {
        return Err(RunTaskError::HttpStatus {
            url: url.to_string(),
            status,
        });
    }

    let content_length = response
        .headers()
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    let _ = head_tx.send(ResponseHead { content_length });

    let mut reader = response.into_body().into_reader();
    let result = stream_to_file(&mut reader, part, algorithm, counter);
    match result {
        Ok((bytes, hash)) => Ok(Transfer::Complete { bytes, etag, hash }),
        Err(e) => {
            let _ = std::fs::remove_file(part);
            Err(RunTaskError::download(url, e))
        }
    }
}

fn stream_to_file(
    reader: &mut impl Read,
    part: &Path,
    algorithm: HashAlgorithm,
    counter: &AtomicU64,
) -> RunTaskResult<(u64, ContentHash)> {
    let file = File::create(part)
        .map_err(|e| RunTaskError::io(format!("creating {}", part.display()), e))?;
    let mut writer = BufWriter::new(file);
    let mut hasher = StreamingHasher::new(algorithm);
    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut total = 0u64;

    loop {
        let read = reader
            .read(&mut buffer)
            .map_err(|e| RunTaskError::io("reading response body", e))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
        writer
            .write_all(&buffer[..read])
            .map_err(|e| RunTaskError::io(format!("writing {}", part.display()), e))?;
        total += read as u64;
        counter.store(total, Ordering::Relaxed);
    }

    writer
        .flush()
        .map_err(|e| RunTaskError::io(format!("flushing {}", part.display()), e))?;
    Ok((total, hasher.finish()))
}
