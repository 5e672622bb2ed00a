//! Confirmation prompt with non-interactive fallback

use super::context::UiContext;
use crate::error::{RunTaskError, RunTaskResult};
use console::{style, Term};

/// Ask a yes/no question on stderr.
///
/// Auto-yes answers `true`; without a terminal the default is returned.
pub async fn confirm(ctx: &UiContext, message: &str, default: bool) -> RunTaskResult<bool> {
    if ctx.auto_yes() {
        println!("  {} (auto-approved)", message);
        return Ok(true);
    }

    if !ctx.is_interactive() {
        return Ok(default);
    }

    let prompt = format!(
        "{} {} ",
        style(message).bold(),
        style(if default { "[Y/n]" } else { "[y/N]" }).dim()
    );
    let answer = tokio::task::spawn_blocking(move || {
        let term = Term::stderr();
        term.write_str(&prompt)?;
        term.read_line()
    })
    .await
    .map_err(|e| RunTaskError::Internal(format!("Prompt task failed: {}", e)))?
    .map_err(|e| RunTaskError::io("reading confirmation", e))?;

    Ok(parse_answer(&answer).unwrap_or(default))
}

fn parse_answer(input: &str) -> Option<bool> {
    match input.trim().to_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}
