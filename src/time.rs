//! Human duration parsing, e.g. `"1h 30m"`

use std::time::Duration;
use thiserror::Error;

/// Errors produced while parsing a duration
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseDurationError {
    #[error("Empty duration")]
    Empty,

    #[error("Unknown time unit in {0:?} (use s, m, h or d)")]
    UnknownUnit(String),

    #[error("Invalid amount in {0:?}")]
    InvalidAmount(String),

    #[error("Duration too large")]
    Overflow,
}

fn unit_seconds(unit: char) -> Option<u64> {
    match unit {
        's' => Some(1),
        'm' => Some(60),
        'h' => Some(60 * 60),
        'd' => Some(60 * 60 * 24),
        _ => None,
    }
}

/// Parse whitespace separated `<amount><unit>` parts and sum them.
///
/// # Errors
/// Returns a [`ParseDurationError`] for empty input, an unknown unit, or a
/// non-numeric amount.
pub fn parse_duration(input: &str) -> Result<Duration, ParseDurationError> {
    let lowered = input.to_lowercase();
    let mut total: u64 = 0;
    let mut parts = 0;

    for part in lowered.split_whitespace() {
        parts += 1;
        let unit = part.chars().last().ok_or(ParseDurationError::Empty)?;
        let seconds =
            unit_seconds(unit).ok_or_else(|| ParseDurationError::UnknownUnit(part.to_owned()))?;
        let amount: u64 = part[..part.len() - unit.len_utf8()]
            .parse()
            .map_err(|_| ParseDurationError::InvalidAmount(part.to_owned()))?;
        total = amount
            .checked_mul(seconds)
            .and_then(|s| total.checked_add(s))
            .ok_or(ParseDurationError::Overflow)?;
    }

    if parts == 0 {
        return Err(ParseDurationError::Empty);
    }
    Ok(Duration::from_secs(total))
}

/// Split leading duration parts off free text, e.g. `"1h 30m spam"` into
/// 90 minutes and `"spam"`. Parsing stops at the first word that is not a
/// duration; whatever follows is returned untouched.
#[must_use]
pub fn split_leading_duration(input: &str) -> (Option<Duration>, Option<String>) {
    let mut total: Option<Duration> = None;
    let mut rest = input.trim_start();

    while !rest.is_empty() {
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let Ok(part) = parse_duration(&rest[..end]) else {
            break;
        };
        total = Some(total.map_or(part, |t| t.saturating_add(part)));
        rest = rest[end..].trim_start();
    }

    let rest = rest.trim_end();
    (total, (!rest.is_empty()).then(|| rest.to_owned()))
}

/// Render seconds the way durations are typed, largest units first
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let mut remaining = duration.as_secs();
    if remaining == 0 {
        return "0s".to_string();
    }
    let mut parts = Vec::new();
    for (unit, size) in [('d', 86_400), ('h', 3_600), ('m', 60), ('s', 1)] {
        if remaining >= size {
            parts.push(format!("{}{unit}", remaining / size));
            remaining %= size;
        }
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("1h 30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("2D").unwrap(), Duration::from_secs(172_800));
        assert_eq!(parse_duration(" 1m  1m ").unwrap(), Duration::from_secs(120));
    }

    #[test]
    fn test_parse_duration_errors() {
        assert_eq!(parse_duration(""), Err(ParseDurationError::Empty));
        assert_eq!(
            parse_duration("5w"),
            Err(ParseDurationError::UnknownUnit("5w".to_string()))
        );
        assert_eq!(
            parse_duration("xm"),
            Err(ParseDurationError::InvalidAmount("xm".to_string()))
        );
        assert_eq!(
            parse_duration("m"),
            Err(ParseDurationError::InvalidAmount("m".to_string()))
        );
    }

    #[test]
    fn test_split_leading_duration() {
        assert_eq!(
            split_leading_duration("1h 30m spam in #general"),
            (Some(Duration::from_secs(5400)), Some("spam in #general".to_string()))
        );
        assert_eq!(
            split_leading_duration("10m"),
            (Some(Duration::from_secs(600)), None)
        );
        assert_eq!(
            split_leading_duration("10 times in a row"),
            (None, Some("10 times in a row".to_string()))
        );
        assert_eq!(
            split_leading_duration("spam 1h"),
            (None, Some("spam 1h".to_string()))
        );
        assert_eq!(split_leading_duration("   "), (None, None));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(5400)), "1h 30m");
        assert_eq!(format_duration(Duration::from_secs(86_401)), "1d 1s");
        assert_eq!(format_duration(Duration::ZERO), "0s");
    }
}
