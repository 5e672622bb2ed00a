//! Per-namespace cache manifest
//!
//! Records which artifacts are cached, where their files live, and the
//! bookkeeping the freshness rules need (check times, ETags, hashes).

pub mod model;
pub mod namespace;
pub mod store;

pub use model::{CacheEntry, Manifest, PermalinkState, VersionBucket, FORMAT_VERSION};
pub use namespace::{bucket_dir, bucket_key, sanitize_segment, Namespace};
pub use store::{verify_entry, EntryStatus, ManifestStore, ManifestTxn, MANIFEST_FILE_NAME};

/// Current wall-clock time in epoch milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
