//! Duration strings.
//!
//! Durations are written as a sequence of decimal numbers with a unit suffix:
//! `"500ms"`, `"30s"`, `"1.5m"`, `"1h30m"`. Valid units are `ns`, `us`
//! (or `µs`), `ms`, `s`, `m` and `h`. A bare `"0"` is allowed.

use std::time::Duration;
use thiserror::Error;

/// A duration string that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid duration {input:?}: {reason}")]
pub struct DurationError {
    input: String,
    reason: &'static str,
}

impl DurationError {
    fn new(input: &str, reason: &'static str) -> Self {
        Self {
            input: input.to_string(),
            reason,
        }
    }
}

const UNITS: [(&str, u128); 7] = [
    ("ns", 1),
    ("us", 1_000),
    ("µs", 1_000),
    ("ms", 1_000_000),
    ("s", 1_000_000_000),
    ("m", 60_000_000_000),
    ("h", 3_600_000_000_000),
];

// Nanoseconds for `number` (digits with an optional fraction) of `unit`.
fn scaled(input: &str, number: &str, unit: u128) -> Result<u128, DurationError> {
    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    if (whole.is_empty() && fraction.is_empty()) || fraction.contains('.') {
        return Err(DurationError::new(input, "malformed number"));
    }
    let parse = |digits: &str| -> Result<u128, DurationError> {
        if digits.is_empty() {
            return Ok(0);
        }
        digits
            .parse::<u128>()
            .map_err(|_| DurationError::new(input, "malformed number"))
    };

    let mut nanos = parse(whole)?
        .checked_mul(unit)
        .ok_or_else(|| DurationError::new(input, "out of range"))?;
    if !fraction.is_empty() {
        // Digits beyond nanosecond precision are dropped.
        let fraction = &fraction[..fraction.len().min(18)];
        let scale = 10_u128.pow(u32::try_from(fraction.len()).unwrap_or(18));
        nanos += parse(fraction)? * unit / scale;
    }
    Ok(nanos)
}

/// Parses a duration string such as `"1m30s"`.
///
/// # Errors
///
/// Returns [`DurationError`] for empty input, negative values, missing or
/// unknown units, and malformed numbers.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use trezer_config::parse_duration;
///
/// assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
/// assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
/// assert!(parse_duration("30").is_err());
/// ```
pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    let text = input.trim();
    if text.is_empty() {
        return Err(DurationError::new(input, "empty"));
    }
    if text.starts_with('-') {
        return Err(DurationError::new(input, "negative"));
    }
    let text = text.strip_prefix('+').unwrap_or(text);
    if text == "0" {
        return Ok(Duration::ZERO);
    }

    let mut rest = text;
    let mut nanos = 0_u128;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return Err(DurationError::new(input, "expected a number"));
        }
        let number = &rest[..number_len];
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        if unit_len == 0 {
            return Err(DurationError::new(input, "missing unit"));
        }
        let unit = UNITS
            .iter()
            .find(|(name, _)| *name == &rest[..unit_len])
            .map(|(_, unit)| *unit)
            .ok_or_else(|| DurationError::new(input, "unknown unit"))?;
        rest = &rest[unit_len..];

        nanos = nanos
            .checked_add(scaled(input, number, unit)?)
            .ok_or_else(|| DurationError::new(input, "out of range"))?;
    }

    let secs = u64::try_from(nanos / 1_000_000_000)
        .map_err(|_| DurationError::new(input, "out of range"))?;
    // The remainder is below one billion.
    let subsec = u32::try_from(nanos % 1_000_000_000).unwrap_or_default();
    Ok(Duration::new(secs, subsec))
}

/// Formats a duration the way [`parse_duration`] reads it (`"1h2m3s"`,
/// `"250ms"`).
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    if duration.is_zero() {
        return "0s".to_string();
    }
    if duration < Duration::from_secs(1) {
        let nanos = duration.subsec_nanos();
        return if nanos % 1_000_000 == 0 {
            format!("{}ms", nanos / 1_000_000)
        } else if nanos % 1_000 == 0 {
            format!("{}us", nanos / 1_000)
        } else {
            format!("{nanos}ns")
        };
    }

    let total = duration.as_secs();
    let (hours, minutes, secs) = (total / 3600, (total % 3600) / 60, total % 60);
    let millis = duration.subsec_millis();

    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{hours}h"));
    }
    if minutes > 0 {
        out.push_str(&format!("{minutes}m"));
    }
    if secs > 0 || millis > 0 {
        if millis > 0 {
            out.push_str(&format!("{secs}.{millis:03}s"));
        } else {
            out.push_str(&format!("{secs}s"));
        }
    }
    out
}

/// Serde adapter for `Option<Duration>` fields written as duration strings.
pub mod serde_option {
    use super::{format_duration, parse_duration};
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    /// Serializes `Some` as a duration string and `None` as nothing.
    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => serializer.serialize_str(&format_duration(*duration)),
            None => serializer.serialize_none(),
        }
    }

    /// Deserializes a duration string; an empty string reads as `None`.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(text) if !text.trim().is_empty() => parse_duration(&text)
                .map(Some)
                .map_err(serde::de::Error::custom),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("10us").unwrap(), Duration::from_micros(10));
        assert_eq!(parse_duration("10µs").unwrap(), Duration::from_micros(10));
        assert_eq!(parse_duration("7ns").unwrap(), Duration::from_nanos(7));
    }

    #[test]
    fn test_parse_compound_and_fractions() {
        assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("1h2m3s").unwrap(), Duration::from_secs(3723));
        assert_eq!(parse_duration("1.5s").unwrap(), Duration::from_millis(1500));
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
        assert_eq!(parse_duration(" 2s ").unwrap(), Duration::from_secs(2));
    }

    #[test]
    fn test_parse_rejects() {
        for input in ["", "30", "s", "-1s", "1x", "1..5s", "ms5"] {
            assert!(parse_duration(input).is_err(), "{input:?} should fail");
        }
    }

    #[test]
    fn test_error_display() {
        let err = parse_duration("1x").unwrap_err();
        assert_eq!(err.to_string(), r#"invalid duration "1x": unknown unit"#);
    }

    #[test]
    fn test_format() {
        assert_eq!(format_duration(Duration::ZERO), "0s");
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m30s");
        assert_eq!(format_duration(Duration::from_secs(3600)), "1h");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.500s");
    }

    proptest! {
        #[test]
        fn prop_format_then_parse_millis(ms in 1u64..10_000_000) {
            let duration = Duration::from_millis(ms);
            prop_assert_eq!(parse_duration(&format_duration(duration)).unwrap(), duration);
        }
    }
}
