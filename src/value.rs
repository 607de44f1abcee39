//! Typed conversions of resolved values
//!
//! Accessors on [`KeyRef`](crate::KeyRef) convert the resolved string through
//! [`FromValue`]. Integer literals accept `0x`, `0o`, `0b` and leading-zero
//! octal prefixes; durations use the `1h30m` / `250ms` / `1.5s` notation.

use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};

use crate::error::ValueError;

/// Conversion between a resolved value and a typed value
pub trait FromValue: Sized {
    /// Parses the resolved string
    fn from_value(text: &str) -> Result<Self, ValueError>;

    /// Renders the value as it would be stored back into a key
    fn to_value(&self) -> String;
}

impl FromValue for String {
    fn from_value(text: &str) -> Result<Self, ValueError> {
        Ok(text.to_string())
    }

    fn to_value(&self) -> String {
        self.clone()
    }
}

impl FromValue for bool {
    fn from_value(text: &str) -> Result<Self, ValueError> {
        match text {
            "1" | "t" | "T" | "true" | "TRUE" | "True" | "YES" | "yes" | "Yes" | "y" | "ON"
            | "on" | "On" => Ok(true),
            "0" | "f" | "F" | "false" | "FALSE" | "False" | "NO" | "no" | "No" | "n" | "OFF"
            | "off" | "Off" => Ok(false),
            _ => Err(ValueError::InvalidBool {
                value: text.to_string(),
            }),
        }
    }

    fn to_value(&self) -> String {
        self.to_string()
    }
}

fn invalid_integer(text: &str, reason: &str) -> ValueError {
    ValueError::InvalidInteger {
        value: text.to_string(),
        reason: reason.to_string(),
    }
}

/// Parses an integer literal with an optional sign and radix prefix
fn parse_integer(text: &str) -> Result<i128, ValueError> {
    let (negative, unsigned) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };

    let (radix, digits) = match unsigned.as_bytes() {
        [b'0', b'x' | b'X', ..] => (16, &unsigned[2..]),
        [b'0', b'o' | b'O', ..] => (8, &unsigned[2..]),
        [b'0', b'b' | b'B', ..] => (2, &unsigned[2..]),
        [b'0', _, ..] => (8, &unsigned[1..]),
        _ => (10, unsigned),
    };

    if digits.is_empty()
        || digits.starts_with(['_', '+', '-'])
        || digits.ends_with('_')
        || digits.contains("__")
    {
        return Err(invalid_integer(text, "invalid syntax"));
    }
    let digits = digits.replace('_', "");

    let magnitude = u128::from_str_radix(&digits, radix).map_err(|e| match e.kind() {
        std::num::IntErrorKind::PosOverflow => invalid_integer(text, "value out of range"),
        _ => invalid_integer(text, "invalid syntax"),
    })?;
    let magnitude =
        i128::try_from(magnitude).map_err(|_| invalid_integer(text, "value out of range"))?;

    Ok(if negative { -magnitude } else { magnitude })
}

macro_rules! impl_from_value_integer {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FromValue for $ty {
                fn from_value(text: &str) -> Result<Self, ValueError> {
                    <$ty>::try_from(parse_integer(text)?)
                        .map_err(|_| invalid_integer(text, "value out of range"))
                }

                fn to_value(&self) -> String {
                    self.to_string()
                }
            }
        )*
    };
}

impl_from_value_integer!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

macro_rules! impl_from_value_float {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FromValue for $ty {
                fn from_value(text: &str) -> Result<Self, ValueError> {
                    text.replace('_', "").parse::<$ty>().map_err(|e| ValueError::InvalidFloat {
                        value: text.to_string(),
                        reason: e.to_string(),
                    })
                }

                fn to_value(&self) -> String {
                    self.to_string()
                }
            }
        )*
    };
}

impl_from_value_float!(f32, f64);

impl FromValue for Duration {
    fn from_value(text: &str) -> Result<Self, ValueError> {
        parse_duration(text).map_err(|reason| ValueError::InvalidDuration {
            value: text.to_string(),
            reason: reason.to_string(),
        })
    }

    fn to_value(&self) -> String {
        format_duration(*self)
    }
}

impl FromValue for DateTime<FixedOffset> {
    fn from_value(text: &str) -> Result<Self, ValueError> {
        DateTime::parse_from_rfc3339(text).map_err(|e| ValueError::InvalidTime {
            value: text.to_string(),
            reason: e.to_string(),
        })
    }

    fn to_value(&self) -> String {
        self.to_rfc3339()
    }
}

/// Nanoseconds per duration unit
fn duration_unit(unit: &str) -> Option<u128> {
    match unit {
        "ns" => Some(1),
        "us" | "µs" | "μs" => Some(1_000),
        "ms" => Some(1_000_000),
        "s" => Some(1_000_000_000),
        "m" => Some(60_000_000_000),
        "h" => Some(3_600_000_000_000),
        _ => None,
    }
}

/// Parses a sequence of decimal numbers with unit suffixes, such as `1h30m`
fn parse_duration(text: &str) -> Result<Duration, &'static str> {
    let (negative, mut rest) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() {
        return Err("invalid duration");
    }

    let mut total: u128 = 0;
    while !rest.is_empty() {
        let int_end = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        let (int_part, tail) = rest.split_at(int_end);

        let (frac_part, tail) = match tail.strip_prefix('.') {
            Some(tail) => {
                let end = tail
                    .find(|c: char| !c.is_ascii_digit())
                    .unwrap_or(tail.len());
                tail.split_at(end)
            }
            None => ("", tail),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err("invalid duration");
        }

        let unit_end = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_end);
        if unit.is_empty() {
            return Err("missing unit in duration");
        }
        let scale = duration_unit(unit).ok_or("unknown unit in duration")?;

        let whole: u128 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().map_err(|_| "invalid duration")?
        };
        let mut nanos = whole.checked_mul(scale).ok_or("invalid duration")?;

        // Digits beyond nanosecond precision cannot change the result
        let frac_part = &frac_part[..frac_part.len().min(18)];
        if !frac_part.is_empty() {
            let numerator: u128 = frac_part.parse().map_err(|_| "invalid duration")?;
            let denominator = 10u128.pow(frac_part.len() as u32);
            nanos += numerator * scale / denominator;
        }

        total = total.checked_add(nanos).ok_or("invalid duration")?;
        rest = tail;
    }

    if total > i64::MAX as u128 {
        return Err("invalid duration");
    }
    if negative && total > 0 {
        return Err("negative duration");
    }
    Ok(Duration::from_nanos(total as u64))
}

/// Renders a duration the way [`parse_duration`] reads it, e.g. `1h30m0s`
fn format_duration(duration: Duration) -> String {
    let nanos = duration.as_nanos();
    match nanos {
        0 => "0s".to_string(),
        1..1_000 => format!("{nanos}ns"),
        1_000..1_000_000 => format!("{}µs", scaled(nanos, 1_000)),
        1_000_000..1_000_000_000 => format!("{}ms", scaled(nanos, 1_000_000)),
        _ => {
            let seconds = nanos / 1_000_000_000;
            let (hours, minutes) = (seconds / 3600, seconds % 3600 / 60);

            let mut out = String::new();
            if hours > 0 {
                out.push_str(&format!("{hours}h"));
            }
            if hours > 0 || minutes > 0 {
                out.push_str(&format!("{minutes}m"));
            }
            out.push_str(&scaled(nanos % 60_000_000_000, 1_000_000_000));
            out.push('s');
            out
        }
    }
}

fn scaled(value: u128, unit: u128) -> String {
    let (whole, rem) = (value / unit, value % unit);
    if rem == 0 {
        return whole.to_string();
    }
    let width = unit.ilog10() as usize;
    let fraction = format!("{rem:0width$}");
    format!("{whole}.{}", fraction.trim_end_matches('0'))
}

/// Parses `text` with a chrono format string
///
/// Formats without a zone are read as UTC; formats without a time of day are
/// read as midnight.
pub fn parse_time_format(text: &str, format: &str) -> Result<DateTime<FixedOffset>, ValueError> {
    if let Ok(time) = DateTime::parse_from_str(text, format) {
        return Ok(time);
    }
    if let Ok(time) = NaiveDateTime::parse_from_str(text, format) {
        return Ok(time.and_utc().fixed_offset());
    }
    NaiveDate::parse_from_str(text, format)
        .map_err(|e| ValueError::InvalidTime {
            value: text.to_string(),
            reason: e.to_string(),
        })
        .map(|date| date.and_time(chrono::NaiveTime::MIN).and_utc().fixed_offset())
}

/// Splits `text` on `delim`, trimming each element
///
/// A backslash escapes the delimiter or another backslash; before any other
/// character it is kept. An empty trailing element is dropped.
pub fn split_list(text: &str, delim: &str) -> Vec<String> {
    let mut values = Vec::new();
    if text.is_empty() {
        return values;
    }
    if delim.is_empty() {
        values.push(text.trim().to_string());
        return values;
    }

    let mut buf = String::new();
    let mut escape = false;
    let mut i = 0;
    while let Some(c) = text[i..].chars().next() {
        let rest = &text[i..];
        if escape {
            escape = false;
            if c != '\\' && !rest.starts_with(delim) {
                buf.push('\\');
            }
            buf.push(c);
        } else if c == '\\' {
            escape = true;
        } else if rest.starts_with(delim) {
            values.push(buf.trim().to_string());
            buf.clear();
            i += delim.len();
            continue;
        } else {
            buf.push(c);
        }
        i += c.len_utf8();
    }
    if !buf.is_empty() {
        values.push(buf.trim().to_string());
    }
    values
}
