// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Duration parsing for Go-style duration strings.
//!
//! cert-manager stores `duration` and `renewBefore` in Go's canonical form
//! (`"2160h0m0s"`) even when the request said `"2160h"`. Comparing the raw strings
//! would make every pass look like a change, so certificate specs compare the
//! parsed values instead.

use std::time::Duration;

use crate::errors::{OperatorError, Result};

const NANOS_PER_MICRO: u128 = 1_000;
const NANOS_PER_MILLI: u128 = 1_000_000;
const NANOS_PER_SECOND: u128 = 1_000_000_000;
const NANOS_PER_MINUTE: u128 = 60 * NANOS_PER_SECOND;
const NANOS_PER_HOUR: u128 = 60 * NANOS_PER_MINUTE;

/// Largest duration Go can represent (`math.MaxInt64` nanoseconds).
const MAX_NANOS: u128 = 9_223_372_036_854_775_807;

/// Fraction digits beyond this many are ignored, as Go does.
const MAX_FRACTION_DIGITS: usize = 20;

/// Parse a Go-style duration string into a Rust `Duration`.
///
/// Accepts what Go's `time.ParseDuration` accepts for non-negative values: a
/// sequence of decimal numbers, each with an optional fraction and a unit
/// (`ns`, `us`, `µs`, `ms`, `s`, `m`, `h`), such as `"1h30m"`, `"1.5h"` or
/// `"2h45m30.5s"`. A bare `"0"` is accepted as zero and a leading `+` is ignored.
///
/// # Examples
///
/// ```
/// use mysql_operator::duration::parse_go_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_go_duration("2160h").unwrap(), Duration::from_secs(7_776_000));
/// assert_eq!(parse_go_duration("2160h0m0s").unwrap(), Duration::from_secs(7_776_000));
/// assert_eq!(parse_go_duration("1.5h").unwrap(), Duration::from_secs(5400));
/// assert_eq!(parse_go_duration("500us").unwrap(), Duration::from_micros(500));
///
/// assert!(parse_go_duration("").is_err());
/// assert!(parse_go_duration("10").is_err());  // Missing unit
/// assert!(parse_go_duration("10d").is_err()); // Go has no day unit
/// ```
///
/// # Errors
///
/// Returns [`OperatorError::Configuration`] if the string is empty or negative,
/// a segment is missing its number or unit, a unit is unsupported, or the value
/// exceeds Go's maximum duration.
pub fn parse_go_duration(duration_str: &str) -> Result<Duration> {
    if duration_str.is_empty() {
        return Err(invalid(duration_str, "duration string cannot be empty"));
    }
    if duration_str.starts_with('-') {
        return Err(invalid(duration_str, "negative durations are not allowed"));
    }
    let mut rest = duration_str.strip_prefix('+').unwrap_or(duration_str);
    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() {
        return Err(invalid(duration_str, "expected a number"));
    }

    let mut total: u128 = 0;
    while !rest.is_empty() {
        let (whole, tail) = split_digits(rest);
        let (fraction, tail) = match tail.strip_prefix('.') {
            Some(after_dot) => split_digits(after_dot),
            None => ("", tail),
        };
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid(duration_str, "expected a number before each unit"));
        }

        let unit_end = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, remaining) = tail.split_at(unit_end);
        if unit.is_empty() {
            return Err(invalid(
                duration_str,
                "missing unit (ns, us, µs, ms, s, m or h)",
            ));
        }
        let unit_nanos = unit_nanos(unit).ok_or_else(|| {
            invalid(
                duration_str,
                &format!("unsupported unit '{unit}', use ns, us, µs, ms, s, m or h"),
            )
        })?;

        let segment = segment_nanos(whole, fraction, unit_nanos)
            .ok_or_else(|| invalid(duration_str, "value too large (overflow)"))?;
        total = total
            .checked_add(segment)
            .filter(|&sum| sum <= MAX_NANOS)
            .ok_or_else(|| invalid(duration_str, "value too large (overflow)"))?;
        rest = remaining;
    }

    let nanos =
        u64::try_from(total).map_err(|_| invalid(duration_str, "value too large (overflow)"))?;
    Ok(Duration::from_nanos(nanos))
}

fn split_digits(s: &str) -> (&str, &str) {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    s.split_at(end)
}

fn unit_nanos(unit: &str) -> Option<u128> {
    match unit {
        "ns" => Some(1),
        // U+00B5 micro sign and U+03BC Greek small letter mu
        "us" | "\u{b5}s" | "\u{3bc}s" => Some(NANOS_PER_MICRO),
        "ms" => Some(NANOS_PER_MILLI),
        "s" => Some(NANOS_PER_SECOND),
        "m" => Some(NANOS_PER_MINUTE),
        "h" => Some(NANOS_PER_HOUR),
        _ => None,
    }
}

/// Nanoseconds in `whole.fraction` units, truncating below one nanosecond.
fn segment_nanos(whole: &str, fraction: &str, unit_nanos: u128) -> Option<u128> {
    let whole_value: u128 = if whole.is_empty() {
        0
    } else {
        whole.parse().ok()?
    };
    let mut nanos = whole_value.checked_mul(unit_nanos)?;

    let mut numerator: u128 = 0;
    let mut scale: u128 = 1;
    for digit in fraction.bytes().take(MAX_FRACTION_DIGITS) {
        numerator = numerator * 10 + u128::from(digit - b'0');
        scale *= 10;
    }
    if numerator > 0 {
        nanos = nanos.checked_add(numerator * unit_nanos / scale)?;
    }
    Some(nanos)
}

/// Compare two optional Go-style durations by value.
///
/// Strings that fail to parse fall back to exact string comparison so a value
/// the operator does not understand never compares equal to something else.
#[must_use]
pub fn durations_equal(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => match (parse_go_duration(a), parse_go_duration(b)) {
            (Ok(a), Ok(b)) => a == b,
            _ => a == b,
        },
        _ => false,
    }
}

fn invalid(input: &str, reason: &str) -> OperatorError {
    OperatorError::Configuration(format!("invalid duration '{input}': {reason}"))
}

#[cfg(test)]
#[path = "duration_tests.rs"]
mod duration_tests;
