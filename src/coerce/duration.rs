//! Duration literals: `300ms`, `1.5h`, `2h45m`, `0`
//!
//! Valid units are `ns`, `us` (or `µs`/`μs`), `ms`, `s`, `m`, `h`.
//! Durations are unsigned here: a leading `-` is rejected.

use std::time::Duration;

const NANOS_PER_UNIT: &[(&str, u64)] = &[
    ("ns", 1),
    ("us", 1_000),
    ("µs", 1_000),
    ("μs", 1_000),
    ("ms", 1_000_000),
    ("s", 1_000_000_000),
    ("m", 60 * 1_000_000_000),
    ("h", 3_600 * 1_000_000_000),
];

/// Largest representable total, matching a signed 64-bit nanosecond count
const MAX_NANOS: u128 = i64::MAX as u128;

/// Parse a duration literal, returning a human-readable reason on failure
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let mut rest = input;
    if let Some(stripped) = rest.strip_prefix('+') {
        rest = stripped;
    } else if rest.starts_with('-') {
        if rest[1..].chars().all(|c| c == '0' || c == '.') && rest.len() > 1 {
            return Ok(Duration::ZERO);
        }
        return Err("negative durations are not supported".to_string());
    }

    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() {
        return Err("invalid duration".to_string());
    }

    let mut total: u128 = 0;
    while !rest.is_empty() {
        let (whole, frac, after) = split_number(rest).ok_or("invalid duration")?;
        let (unit, after) = split_unit(after)?;

        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| "invalid duration".to_string())?
        };
        let mut nanos = whole.checked_mul(unit as u128).ok_or("duration out of range")?;

        // Fractional digits beyond nanosecond precision are truncated
        let mut scale = unit as u128;
        for digit in frac.bytes() {
            scale /= 10;
            if scale == 0 {
                break;
            }
            nanos += (digit - b'0') as u128 * scale;
        }

        total = total.checked_add(nanos).ok_or("duration out of range")?;
        if total > MAX_NANOS {
            return Err("duration out of range".to_string());
        }
        rest = after;
    }

    Ok(Duration::from_nanos(total as u64))
}

/// Leading `digits[.digits]`; at least one digit on either side of the dot
fn split_number(s: &str) -> Option<(&str, &str, &str)> {
    let whole_end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let whole = &s[..whole_end];
    let mut rest = &s[whole_end..];
    let mut frac = "";
    if let Some(after_dot) = rest.strip_prefix('.') {
        let frac_end = after_dot
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(after_dot.len());
        frac = &after_dot[..frac_end];
        rest = &after_dot[frac_end..];
    }
    if whole.is_empty() && frac.is_empty() {
        return None;
    }
    Some((whole, frac, rest))
}

fn split_unit(s: &str) -> Result<(u64, &str), String> {
    let end = s
        .find(|c: char| c == '.' || c.is_ascii_digit())
        .unwrap_or(s.len());
    let unit = &s[..end];
    if unit.is_empty() {
        return Err("missing unit in duration".to_string());
    }
    NANOS_PER_UNIT
        .iter()
        .find(|(name, _)| *name == unit)
        .map(|(_, nanos)| (*nanos, &s[end..]))
        .ok_or_else(|| format!("unknown unit {unit:?} in duration"))
}
