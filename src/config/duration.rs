//! Duration strings such as `1d`, `12h`, `30m` or `45s`

use crate::error::{RunTaskError, RunTaskResult};
use std::time::Duration;

/// Parse a duration string: an integer followed by one of `d`, `h`, `m`, `s`.
pub fn parse_duration(input: &str) -> RunTaskResult<Duration> {
    let trimmed = input.trim();
    let invalid = || RunTaskError::InvalidDuration {
        input: input.to_string(),
    };

    let Some((split, unit)) = trimmed.char_indices().next_back() else {
        return Err(invalid());
    };
    let seconds_per_unit: u64 = match unit {
        'd' => 24 * 60 * 60,
        'h' => 60 * 60,
        'm' => 60,
        's' => 1,
        _ => return Err(invalid()),
    };

    let amount = &trimmed[..split];
    if amount.is_empty() || !amount.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    let amount: u64 = amount.parse().map_err(|_| invalid())?;
    let seconds = amount.checked_mul(seconds_per_unit).ok_or_else(invalid)?;

    Ok(Duration::from_secs(seconds))
}

/// Render a duration like `1h 2m 3s`, dropping zero components.
pub fn pretty_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    if total == 0 {
        return format!("{}ms", duration.as_millis());
    }

    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    let mut parts = Vec::with_capacity(3);
    if hours > 0 {
        parts.push(format!("{}h", hours));
    }
    if minutes > 0 {
        parts.push(format!("{}m", minutes));
    }
    if seconds > 0 {
        parts.push(format!("{}s", seconds));
    }
    parts.join(" ")
}
