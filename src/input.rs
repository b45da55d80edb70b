//! Turning what the user typed into bytes for the wire.

use crate::decode::TextEncoding;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Line ending appended to text input.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    #[default]
    #[value(name = "crlf")]
    CrLf,
    Lf,
    Cr,
    None,
}

impl LineEnding {
    pub const ALL: [LineEnding; 4] = [Self::CrLf, Self::Lf, Self::Cr, Self::None];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CrLf => "\r\n",
            Self::Lf => "\n",
            Self::Cr => "\r",
            Self::None => "",
        }
    }

    /// The next option, for a toggle key.
    pub fn cycle(self) -> Self {
        match self {
            Self::CrLf => Self::Lf,
            Self::Lf => Self::Cr,
            Self::Cr => Self::None,
            Self::None => Self::CrLf,
        }
    }

    /// Encode `text` followed by this line ending.
    pub fn encode_text(&self, text: &str, encoding: TextEncoding) -> Vec<u8> {
        let mut line = String::with_capacity(text.len() + 2);
        line.push_str(text);
        line.push_str(self.as_str());
        encoding.encode(&line)
    }
}

impl fmt::Display for LineEnding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::CrLf => "CRLF",
            Self::Lf => "LF",
            Self::Cr => "CR",
            Self::None => "none",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid hex input '{0}': expected pairs of hex digits such as '0d 0a' or '0x0d0a'")]
pub struct HexParseError(pub String);

static HEX_INPUT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(0x)?([0-9a-fA-F]{2} ?)+$").expect("Invalid HEX_INPUT regex"));

/// Parse a hex byte string like `0d 0a`, `0D0A` or `0x0d0a`.
///
/// ```
/// use serial_console::input::parse_hex_bytes;
///
/// assert_eq!(parse_hex_bytes("0x0d0a").unwrap(), vec![0x0d, 0x0a]);
/// assert_eq!(parse_hex_bytes("41 42 43").unwrap(), b"ABC".to_vec());
/// assert!(parse_hex_bytes("4").is_err());
/// ```
pub fn parse_hex_bytes(input: &str) -> Result<Vec<u8>, HexParseError> {
    let trimmed = input.trim();
    if !HEX_INPUT.is_match(trimmed) {
        return Err(HexParseError(input.to_string()));
    }

    let digits: Vec<u8> = trimmed
        .strip_prefix("0x")
        .unwrap_or(trimmed)
        .bytes()
        .filter(|b| *b != b' ')
        .collect();

    digits
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|s| u8::from_str_radix(s, 16).ok())
                .ok_or_else(|| HexParseError(input.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_endings() {
        let utf8 = TextEncoding::utf_8();
        assert_eq!(LineEnding::CrLf.encode_text("AT", utf8), b"AT\r\n");
        assert_eq!(LineEnding::Lf.encode_text("AT", utf8), b"AT\n");
        assert_eq!(LineEnding::Cr.encode_text("AT", utf8), b"AT\r");
        assert_eq!(LineEnding::None.encode_text("AT", utf8), b"AT");
        assert_eq!(LineEnding::default(), LineEnding::CrLf);
    }

    #[test]
    fn test_cycle_visits_all() {
        let mut ending = LineEnding::CrLf;
        for expected in LineEnding::ALL.iter().skip(1).chain([LineEnding::CrLf].iter()) {
            ending = ending.cycle();
            assert_eq!(ending, *expected);
        }
    }

    #[test]
    fn test_encode_with_legacy_encoding() {
        let bytes = LineEnding::Lf.encode_text("€", TextEncoding::windows_1252());
        assert_eq!(bytes, vec![0x80, b'\n']);
    }

    #[test]
    fn test_hex_parsing() {
        assert_eq!(parse_hex_bytes("de ad BE EF").unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(parse_hex_bytes("00ff").unwrap(), vec![0x00, 0xff]);
        assert_eq!(parse_hex_bytes(" 0a ").unwrap(), vec![0x0a]);
    }

    #[test]
    fn test_hex_rejects_bad_input() {
        assert!(parse_hex_bytes("").is_err());
        assert!(parse_hex_bytes("abc").is_err());
        assert!(parse_hex_bytes("0g").is_err());
        assert!(parse_hex_bytes("0 a").is_err());
    }
}
