//! Terminal output for the CLI
//!
//! Everything degrades to plain text when stderr is not a terminal or a CI
//! system is detected, so logs stay readable.
//!
//! # Example
//!
//! ```rust,ignore
//! use runtask::ui::{self, UiContext};
//!
//! let ctx = UiContext::detect().with_auto_yes(args.yes);
//! let service = ArtifactService::new(config).with_reporter(ui::download_reporter(&ctx));
//!
//! if ui::confirm(&ctx, "Clear the whole cache?", false).await? {
//!     service.clear(None).await?;
//!     ui::step_ok(&ctx, "Cache cleared");
//! }
//! ```

mod context;
mod output;
mod progress;
mod prompts;

pub use context::UiContext;
pub use output::{key_value, section, step_ok, step_ok_detail, step_warn};
pub use progress::{download_reporter, BarReporter};
pub use prompts::confirm;
