use chrono::Duration;

use crate::error::{Error, Result};

const MICROS_PER_SECOND: f64 = 1_000_000.0;

/// Parse a time expression like `"24h"`, `"1 day"`, or
/// `"1 days 2 hours 3 minutes 4 seconds"` into a `Duration`.
///
/// The grammar is a sequence of `<count> <unit>` tokens, optionally separated
/// by whitespace or commas; counts may be decimal. Signs are handled by the
/// boundary grammar, not here.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let mut total_micros = 0f64;
    let mut rest = input.trim();
    if rest.is_empty() {
        return Err(Error::Config("empty duration expression".to_string()));
    }

    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if digits == 0 {
            return Err(Error::Config(format!(
                "expected a number in duration expression '{}', found '{}'",
                input, rest
            )));
        }
        let count: f64 = rest[..digits].parse().map_err(|_| {
            Error::Config(format!(
                "invalid number '{}' in duration expression '{}'",
                &rest[..digits],
                input
            ))
        })?;
        rest = rest[digits..].trim_start();

        let unit_len = rest
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        let unit_seconds = match unit.to_ascii_lowercase().as_str() {
            "d" | "day" | "days" => 86_400.0,
            "h" | "hr" | "hrs" | "hour" | "hours" => 3_600.0,
            "m" | "min" | "mins" | "minute" | "minutes" => 60.0,
            "s" | "sec" | "secs" | "second" | "seconds" => 1.0,
            _ => {
                return Err(Error::Config(format!(
                    "unknown unit '{}' in duration expression '{}'",
                    unit, input
                )));
            }
        };
        total_micros += count * unit_seconds * MICROS_PER_SECOND;

        rest = rest[unit_len..].trim_start_matches([' ', ',', '\t']);
    }

    Ok(Duration::microseconds(total_micros.round() as i64))
}
