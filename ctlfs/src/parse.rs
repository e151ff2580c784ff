//! Textual token parsers for attribute stores and bulk writes
//!
//! Mirrors the classic strict-integer conventions: an optional sign, then a
//! base prefix (`0x`/`0X` hex, leading `0` octal, decimal otherwise).
//! Booleans accept the usual 1/0, y/n, t/f, true/false, on/off families.

use crate::error::{Result, VfsError};

/// Parse a boolean token, tolerating surrounding whitespace and a trailing
/// newline.
///
/// # Errors
/// `Parse` with the offending text.
pub fn parse_bool(text: &str) -> Result<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "1" | "y" | "t" | "true" | "on" => Ok(true),
        "0" | "n" | "f" | "false" | "off" => Ok(false),
        _ => Err(VfsError::Parse(text.trim().to_string())),
    }
}

/// Parse a signed integer with base inferred from the prefix.
///
/// # Errors
/// `Parse` with the offending text.
pub fn parse_int(text: &str) -> Result<i64> {
    let trimmed = text.trim();
    let parse_err = || VfsError::Parse(trimmed.to_string());

    let (negative, unsigned) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };

    let (radix, digits) = if let Some(hex) = unsigned
        .strip_prefix("0x")
        .or_else(|| unsigned.strip_prefix("0X"))
    {
        (16, hex)
    } else if unsigned.len() > 1 && unsigned.starts_with('0') {
        (8, &unsigned[1..])
    } else {
        (10, unsigned)
    };

    if digits.is_empty() {
        return Err(parse_err());
    }
    let magnitude = i64::from_str_radix(digits, radix).map_err(|_| parse_err())?;
    Ok(if negative { -magnitude } else { magnitude })
}

/// `parse_int` narrowed to `i32`.
///
/// # Errors
/// `Parse` when the token is malformed or out of range.
pub fn parse_i32(text: &str) -> Result<i32> {
    let wide = parse_int(text)?;
    i32::try_from(wide).map_err(|_| VfsError::Parse(text.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bool_families() {
        for token in ["1", "y", "Y", "t", "true", "TRUE", "on", " true\n"] {
            assert!(parse_bool(token).unwrap(), "{token:?}");
        }
        for token in ["0", "n", "N", "f", "false", "off", "off\n"] {
            assert!(!parse_bool(token).unwrap(), "{token:?}");
        }
        assert!(parse_bool("maybe").is_err());
        assert!(parse_bool("").is_err());
    }

    #[test]
    fn test_int_bases() {
        assert_eq!(parse_int("42").unwrap(), 42);
        assert_eq!(parse_int("-42").unwrap(), -42);
        assert_eq!(parse_int("+7").unwrap(), 7);
        assert_eq!(parse_int("0x10").unwrap(), 16);
        assert_eq!(parse_int("0X0a").unwrap(), 10);
        assert_eq!(parse_int("010").unwrap(), 8);
        assert_eq!(parse_int("0").unwrap(), 0);
        assert_eq!(parse_int(" 12\n").unwrap(), 12);
    }

    #[test]
    fn test_int_rejects_garbage() {
        for token in ["", "-", "0x", "12ab", "4 2", "--3"] {
            assert!(parse_int(token).is_err(), "{token:?}");
        }
    }

    #[test]
    fn test_i32_range() {
        assert_eq!(parse_i32("2147483647").unwrap(), i32::MAX);
        assert!(parse_i32("2147483648").is_err());
    }
}
