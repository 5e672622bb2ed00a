//! Terminal download progress with a log-line fallback

use super::context::UiContext;
use crate::download::{DownloadProgress, LogReporter, ProgressReporter};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;

const BAR_TEMPLATE: &str =
    "  {spinner:.cyan} {prefix}  {bar:25.cyan/dim} {bytes}/{total_bytes} {bytes_per_sec:.dim}  {eta:.dim}";
const SPINNER_TEMPLATE: &str = "  {spinner:.cyan} {prefix}  {bytes} {bytes_per_sec:.dim}  {elapsed:.dim}";
const TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ";

/// Draws one indicatif bar per download on stderr
pub struct BarReporter {
    multi: MultiProgress,
}

impl BarReporter {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::with_draw_target(ProgressDrawTarget::stderr()),
        }
    }

    /// Hidden bars, for tests
    pub fn hidden() -> Self {
        Self {
            multi: MultiProgress::with_draw_target(ProgressDrawTarget::hidden()),
        }
    }
}

impl Default for BarReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for BarReporter {
    fn start(&self, display_name: &str, expected: Option<u64>) -> Arc<dyn DownloadProgress> {
        let bar = match expected.filter(|len| *len > 0) {
            Some(len) => {
                let bar = ProgressBar::new(len);
                bar.set_style(bar_style(BAR_TEMPLATE).progress_chars("━╸─"));
                bar
            }
            None => {
                let bar = ProgressBar::new_spinner();
                bar.set_style(bar_style(SPINNER_TEMPLATE));
                bar
            }
        };
        let bar = self.multi.add(bar);
        bar.set_prefix(display_name.to_string());
        bar.enable_steady_tick(Duration::from_millis(120));
        Arc::new(BarProgress { bar })
    }

    fn interval(&self) -> Duration {
        Duration::from_millis(100)
    }
}

fn bar_style(template: &str) -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .tick_chars(TICK_CHARS)
}

struct BarProgress {
    bar: ProgressBar,
}

impl DownloadProgress for BarProgress {
    fn update(&self, downloaded: u64) {
        self.bar.set_position(downloaded);
    }

    fn finish(&self, downloaded: u64) {
        self.bar.set_position(downloaded);
        self.bar.disable_steady_tick();
        self.bar.finish_and_clear();
    }
}

/// Bars in a terminal, periodic log lines everywhere else
pub fn download_reporter(ctx: &UiContext) -> Arc<dyn ProgressReporter> {
    if ctx.use_fancy_output() {
        Arc::new(BarReporter::new())
    } else {
        Arc::new(LogReporter::new())
    }
}
