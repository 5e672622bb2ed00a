//! Freshness decisions
//!
//! Pure functions over manifest state and the current time. Callers act on
//! the returned decision; nothing here touches the network or the disk.

use crate::manifest::{CacheEntry, VersionBucket};
use std::time::Duration;

/// Knobs shared by every freshness decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessPolicy {
    pub offline: bool,
    pub refresh: bool,
    /// How long a "latest build" answer is trusted
    pub recheck_interval: Duration,
    /// How long a file behind a mutable coordinate is reused unchecked
    pub revalidate_interval: Duration,
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self {
            offline: false,
            refresh: false,
            recheck_interval: Duration::from_secs(60 * 60),
            revalidate_interval: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

/// How to settle on a build for a "latest" reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatestDecision {
    /// Use this locally known build without asking the remote
    Local(u64),
    /// Ask the remote for the current latest build
    Remote,
    /// Offline and nothing known locally
    OfflineUnknown,
}

/// What to do with an already cached file behind a mutable coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Revalidation {
    /// Serve the cached file without any network access
    Reuse,
    /// Issue a conditional request; the server may answer "not modified"
    Revalidate,
    /// Fetch from scratch
    Download,
    /// Offline and the file is not usable
    OfflineMiss,
}

fn elapsed_within(since_ms: i64, now_ms: i64, interval: Duration) -> bool {
    let elapsed = now_ms.saturating_sub(since_ms);
    elapsed >= 0 && (elapsed as u128) <= interval.as_millis()
}

/// Decide whether a "latest" reference can be answered from the bucket
pub fn decide_latest(
    bucket: Option<&VersionBucket>,
    policy: &FreshnessPolicy,
    now_ms: i64,
) -> LatestDecision {
    decide_known(
        bucket.and_then(|b| b.latest_build()),
        bucket.map_or(0, |b| b.last_update_check),
        policy,
        now_ms,
    )
}

/// Same decision for a single alias whose last answer was `known`, asked
/// at `last_check`
pub fn decide_known(
    known: Option<u64>,
    last_check: i64,
    policy: &FreshnessPolicy,
    now_ms: i64,
) -> LatestDecision {
    if policy.offline {
        return match known {
            Some(build) => LatestDecision::Local(build),
            None => LatestDecision::OfflineUnknown,
        };
    }
    if policy.refresh {
        return LatestDecision::Remote;
    }

    match known {
        Some(build) if elapsed_within(last_check, now_ms, policy.recheck_interval) => {
            LatestDecision::Local(build)
        }
        _ => LatestDecision::Remote,
    }
}

/// Build to fall back to when the remote "latest" query fails
pub fn fallback_build(bucket: Option<&VersionBucket>) -> Option<u64> {
    bucket.and_then(|b| b.latest_build())
}

/// Decide how to treat a cached file behind a mutable coordinate.
///
/// `verified` says whether the file on disk matches the entry's hash.
pub fn revalidation(
    entry: Option<&CacheEntry>,
    verified: bool,
    policy: &FreshnessPolicy,
    now_ms: i64,
) -> Revalidation {
    let usable = entry.is_some() && verified;

    if policy.offline {
        return if usable {
            Revalidation::Reuse
        } else {
            Revalidation::OfflineMiss
        };
    }

    let Some(entry) = entry.filter(|_| usable) else {
        return Revalidation::Download;
    };

    if policy.refresh {
        return Revalidation::Revalidate;
    }
    if elapsed_within(entry.last_checked, now_ms, policy.revalidate_interval) {
        Revalidation::Reuse
    } else {
        Revalidation::Revalidate
    }
}
