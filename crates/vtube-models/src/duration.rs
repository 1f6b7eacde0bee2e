//! Duration string formatting.
//!
//! Durations are stored on video records as `M:SS` below one hour and
//! `H:MM:SS` from one hour up. Fractional seconds are truncated.

use thiserror::Error;

/// Errors from [`parse_duration`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationParseError {
    #[error("duration string is empty")]
    Empty,

    #[error("invalid {0} component: {1}")]
    InvalidComponent(&'static str, String),

    #[error("invalid duration format: {0}")]
    InvalidFormat(String),
}

/// Format seconds as `M:SS` or `H:MM:SS`.
///
/// # Examples
/// ```
/// use vtube_models::duration::format_duration;
/// assert_eq!(format_duration(30.0), "0:30");
/// assert_eq!(format_duration(754.9), "12:34");
/// assert_eq!(format_duration(3723.0), "1:02:03");
/// ```
pub fn format_duration(total_secs: f64) -> String {
    let whole = if total_secs.is_finite() && total_secs > 0.0 {
        total_secs as u64
    } else {
        0
    };

    let hours = whole / 3600;
    let minutes = (whole % 3600) / 60;
    let seconds = whole % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

/// Parse a `M:SS` or `H:MM:SS` string back into whole seconds.
pub fn parse_duration(s: &str) -> Result<u64, DurationParseError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(DurationParseError::Empty);
    }

    let parts: Vec<&str> = s.split(':').collect();
    let component = |name: &'static str, raw: &str| {
        raw.parse::<u64>()
            .map_err(|_| DurationParseError::InvalidComponent(name, raw.to_string()))
    };

    match parts[..] {
        [m, sec] => {
            let seconds = component("seconds", sec)?;
            if seconds >= 60 {
                return Err(DurationParseError::InvalidComponent("seconds", sec.to_string()));
            }
            Ok(component("minutes", m)? * 60 + seconds)
        }
        [h, m, sec] => {
            let minutes = component("minutes", m)?;
            let seconds = component("seconds", sec)?;
            if minutes >= 60 || seconds >= 60 {
                return Err(DurationParseError::InvalidFormat(s.to_string()));
            }
            Ok(component("hours", h)? * 3600 + minutes * 60 + seconds)
        }
        _ => Err(DurationParseError::InvalidFormat(s.to_string())),
    }
}
