//! `M:SS` / `H:MM:SS` time strings as shown by the player.

use once_cell::sync::Lazy;
use regex::Regex;

static TIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?\d{1,3}(:\d{1,2}){1,2}$").unwrap());

/// Whether `text` looks like a player time readout.
pub fn is_time_string(text: &str) -> bool {
    TIME_RE.is_match(text.trim())
}

/// Positional parse: two segments are `minutes:seconds`, three are
/// `hours:minutes:seconds`. A leading `-` (countdown readouts) is ignored.
pub fn to_seconds(text: &str) -> Option<u64> {
    let text = text.trim();
    let text = text.strip_prefix('-').unwrap_or(text);
    let parts = text
        .split(':')
        .map(|p| p.parse::<u64>().ok())
        .collect::<Option<Vec<_>>>()?;
    let (h, m, s) = match parts.as_slice() {
        [m, s] => (0, *m, *s),
        [h, m, s] => (*h, *m, *s),
        _ => return None,
    };
    h.checked_mul(3600)?.checked_add(m.checked_mul(60)?)?.checked_add(s)
}

/// Inverse of [`to_seconds`]; hours appear only when nonzero.
pub fn to_time_string(total: u64) -> String {
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}

/// Total duration as `current + remaining`. The page has no reliable
/// total-duration readout, so this is always derived.
pub fn derive_duration(current: &str, remaining: &str) -> Option<String> {
    Some(to_time_string(to_seconds(current)?.checked_add(to_seconds(remaining)?)?))
}
