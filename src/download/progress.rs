//! Download progress reporting
//!
//! The engine polls a shared byte counter on a fixed interval and forwards
//! the value to a [`DownloadProgress`] handle obtained from a
//! [`ProgressReporter`].

use crate::config::pretty_duration;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::info;

/// Default polling interval for log-based progress
pub const LOG_INTERVAL: Duration = Duration::from_secs(10);

const SIZE_UNITS: [&str; 7] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];
const BAR_WIDTH: usize = 25;

/// Creates a progress handle per download
pub trait ProgressReporter: Send + Sync {
    /// Called once the response head is known
    fn start(&self, display_name: &str, expected: Option<u64>) -> Arc<dyn DownloadProgress>;

    /// How often the engine should poll the byte counter
    fn interval(&self) -> Duration {
        LOG_INTERVAL
    }
}

/// Receives progress for a single download
pub trait DownloadProgress: Send + Sync {
    fn update(&self, downloaded: u64);

    fn finish(&self, downloaded: u64);
}

/// Reports progress as `tracing` info lines
#[derive(Debug, Clone)]
pub struct LogReporter {
    interval: Duration,
}

impl LogReporter {
    pub fn new() -> Self {
        Self {
            interval: LOG_INTERVAL,
        }
    }

    pub fn with_interval(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Default for LogReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for LogReporter {
    fn start(&self, display_name: &str, expected: Option<u64>) -> Arc<dyn DownloadProgress> {
        let progress = LogProgress {
            prefix: format!("Downloading {}: ", display_name),
            expected: expected.filter(|e| *e > 0),
            started: Instant::now(),
            last: Mutex::new(None),
        };
        info!("{}", progress.message(0, Duration::ZERO));
        Arc::new(progress)
    }

    fn interval(&self) -> Duration {
        self.interval
    }
}

struct LogProgress {
    prefix: String,
    expected: Option<u64>,
    started: Instant,
    last: Mutex<Option<u64>>,
}

impl LogProgress {
    fn message(&self, downloaded: u64, elapsed: Duration) -> String {
        let mut message = self.prefix.clone();
        match self.expected {
            Some(expected) => {
                let fraction = downloaded as f64 / expected as f64;
                message.push_str(&format!(
                    "{}/{} <{}> {}%",
                    format_size(downloaded),
                    format_size(expected),
                    text_bar(BAR_WIDTH, fraction),
                    format_decimal(fraction * 100.0)
                ));
            }
            None => message.push_str(&format!("{}/?", format_size(downloaded))),
        }

        if elapsed > Duration::from_secs(10) {
            let remaining = match self.expected {
                Some(expected) if downloaded > 0 => {
                    let total_ms =
                        elapsed.as_millis() as f64 * expected as f64 / downloaded as f64;
                    let remaining_ms = (total_ms - elapsed.as_millis() as f64).max(0.0);
                    format!(
                        "est. {}",
                        pretty_duration(Duration::from_millis(remaining_ms as u64))
                    )
                }
                _ => "unknown time".to_string(),
            };
            message.push_str(&format!(
                ", {} elapsed, {} remaining",
                pretty_duration(elapsed),
                remaining
            ));
        }
        message
    }
}

impl DownloadProgress for LogProgress {
    fn update(&self, downloaded: u64) {
        if let Ok(mut last) = self.last.lock() {
            if *last == Some(downloaded) {
                return;
            }
            *last = Some(downloaded);
        }
        info!("{}", self.message(downloaded, self.started.elapsed()));
    }

    fn finish(&self, _downloaded: u64) {}
}

/// Discards all progress
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {
    fn start(&self, _display_name: &str, _expected: Option<u64>) -> Arc<dyn DownloadProgress> {
        Arc::new(SilentReporter)
    }
}

impl DownloadProgress for SilentReporter {
    fn update(&self, _downloaded: u64) {}

    fn finish(&self, _downloaded: u64) {}
}

/// Human-readable byte size with binary units, e.g. `12.25 MiB`
pub fn format_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{} {}", format_decimal(value), SIZE_UNITS[unit])
}

/// At most two decimals, trailing zeros dropped, thousands grouped
fn format_decimal(value: f64) -> String {
    let rounded = format!("{:.2}", value);
    let (whole, fraction) = rounded.split_once('.').unwrap_or((&rounded, ""));
    let fraction = fraction.trim_end_matches('0');

    let digits: Vec<char> = whole.chars().collect();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*c);
    }

    if fraction.is_empty() {
        grouped
    } else {
        format!("{}.{}", grouped, fraction)
    }
}

fn text_bar(width: usize, fraction: f64) -> String {
    (1..=width)
        .map(|i| {
            if (i as f64) <= width as f64 * fraction {
                '='
            } else {
                '-'
            }
        })
        .collect()
}
