//! Cache namespaces and bucket paths
//!
//! Every path segment that comes from user input goes through
//! [`sanitize_segment`] so a coordinate can never escape its namespace.

use crate::error::{RunTaskError, RunTaskResult};
use std::fmt;
use std::path::{Path, PathBuf};

/// Replace anything outside `[A-Za-z0-9._+-]` with `_`.
///
/// Empty segments and the special names `.` and `..` are rejected.
pub fn sanitize_segment(raw: &str) -> RunTaskResult<String> {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '+' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        return Err(RunTaskError::InvalidReference(format!(
            "'{}' cannot be used as a cache path segment",
            raw
        )));
    }
    Ok(cleaned)
}

/// Join sanitized segments into a bucket key such as `owner/repo/tag`
pub fn bucket_key<S: AsRef<str>>(segments: &[S]) -> RunTaskResult<String> {
    if segments.is_empty() {
        return Err(RunTaskError::Internal("bucket key has no segments".to_string()));
    }
    let cleaned = segments
        .iter()
        .map(|s| sanitize_segment(s.as_ref()))
        .collect::<RunTaskResult<Vec<_>>>()?;
    Ok(cleaned.join("/"))
}

/// Directory of a bucket inside a namespace directory
pub fn bucket_dir(namespace_dir: &Path, bucket: &str) -> PathBuf {
    bucket
        .split('/')
        .fold(namespace_dir.to_path_buf(), |dir, segment| dir.join(segment))
}

/// A provider namespace such as `paper`, `hangar/hangar.papermc.io` or `url`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    segments: Vec<String>,
}

impl Namespace {
    pub fn new<S: AsRef<str>>(segments: &[S]) -> RunTaskResult<Self> {
        if segments.is_empty() {
            return Err(RunTaskError::Internal("namespace has no segments".to_string()));
        }
        let segments = segments
            .iter()
            .map(|s| sanitize_segment(s.as_ref()))
            .collect::<RunTaskResult<Vec<_>>>()?;
        Ok(Self { segments })
    }

    /// Parse a slash-separated namespace as typed on the command line
    pub fn parse(raw: &str) -> RunTaskResult<Self> {
        let parts: Vec<&str> = raw.split('/').filter(|s| !s.is_empty()).collect();
        Self::new(&parts)
    }

    /// Namespace directory under the cache root
    pub fn dir(&self, cache_root: &Path) -> PathBuf {
        self.segments
            .iter()
            .fold(cache_root.to_path_buf(), |dir, segment| dir.join(segment))
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}
