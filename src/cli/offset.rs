//! Byte count grammar for `-c/--bytes`
//!
//! `[+]<digits>[unit][B]`: a leading `+` counts from the start of the file,
//! otherwise from its end. Units `b k K M G T P E Z Y` scale by powers of
//! 1024, or of 1000 with a trailing `B`.

use htail::{Whence, DEFAULT_OFFSET};

/// Unit letters, in increasing power order (`b` is power 0)
const UNITS: &str = "bkMGTPEZY";

/// Starting point parsed from a byte count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartOffset {
    pub offset: i64,
    pub whence: Whence,
}

impl Default for StartOffset {
    fn default() -> Self {
        Self {
            offset: -DEFAULT_OFFSET,
            whence: Whence::End,
        }
    }
}

/// Parse a byte count such as `+512`, `4K` or `2MB`
pub fn parse_offset(value: &str) -> Result<StartOffset, String> {
    let (from_start, rest) = match value.strip_prefix('+') {
        Some(rest) => (true, rest),
        None => (false, value),
    };

    let digits_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let (digits, suffix) = rest.split_at(digits_end);
    if digits.is_empty() {
        return Err(format!("invalid byte count '{value}': expected digits"));
    }

    let (unit, suffix) = match suffix.chars().next() {
        Some('K') => ('k', &suffix[1..]),
        Some(c) if UNITS.contains(c) => (c, &suffix[c.len_utf8()..]),
        _ => ('b', suffix),
    };
    let base: i64 = match suffix {
        "" => 1024,
        "B" => 1000,
        _ => return Err(format!("invalid byte count '{value}': unknown suffix '{suffix}'")),
    };

    let power = UNITS.find(unit).unwrap_or(0) as u32;
    let count: i64 = digits
        .parse()
        .map_err(|_| format!("invalid byte count '{value}': too large"))?;
    let bytes = base
        .checked_pow(power)
        .and_then(|multiplier| count.checked_mul(multiplier))
        .ok_or_else(|| format!("invalid byte count '{value}': too large"))?;

    Ok(if from_start {
        StartOffset {
            offset: bytes,
            whence: Whence::Start,
        }
    } else {
        StartOffset {
            offset: -bytes,
            whence: Whence::End,
        }
    })
}
