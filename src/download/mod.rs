//! HTTP downloads with conditional requests, progress and verification

pub mod engine;
pub mod http;
pub mod progress;

pub use engine::{Download, DownloadOutcome, Prior};
pub use http::{HttpClient, USER_AGENT};
pub use progress::{format_size, DownloadProgress, LogReporter, ProgressReporter, SilentReporter};
