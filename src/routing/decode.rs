//! Strict percent-decoding of request path segments.
//!
//! # Design Decisions
//! - Decoding is per segment, so an encoded `%2F` never splits a segment
//! - A `%` not followed by two hex digits is an error, never passed through
//! - Decoded bytes must form valid UTF-8; anything else is an error
//! - `+` is a literal plus in paths (form encoding only applies to queries)

use std::borrow::Cow;

use thiserror::Error;

/// Reasons a raw path segment could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// `%` at `offset` was not followed by two hexadecimal digits.
    #[error("invalid percent escape at byte {offset}")]
    InvalidEscape { offset: usize },

    /// The decoded bytes are not valid UTF-8.
    #[error("decoded segment is not valid UTF-8")]
    InvalidUtf8,
}

/// Decode one path segment.
///
/// Segments without any `%` are returned borrowed.
pub fn decode_segment(raw: &str) -> Result<Cow<'_, str>, DecodeError> {
    if !raw.contains('%') {
        return Ok(Cow::Borrowed(raw));
    }

    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hi = bytes.get(i + 1).copied().and_then(hex_value);
            let lo = bytes.get(i + 2).copied().and_then(hex_value);
            match (hi, lo) {
                (Some(hi), Some(lo)) => {
                    out.push((hi << 4) | lo);
                    i += 3;
                }
                _ => return Err(DecodeError::InvalidEscape { offset: i }),
            }
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }

    String::from_utf8(out)
        .map(Cow::Owned)
        .map_err(|_| DecodeError::InvalidUtf8)
}

/// Split a raw path into decoded segments.
///
/// The leading `/` is dropped, so `/` yields no segments and `/a/` yields
/// `["a", ""]`. Callers decide what to do with a trailing empty segment.
pub fn decode_path(raw: &str) -> Result<Vec<String>, DecodeError> {
    let trimmed = raw.strip_prefix('/').unwrap_or(raw);
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    trimmed
        .split('/')
        .map(|segment| decode_segment(segment).map(Cow::into_owned))
        .collect()
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_segment_is_borrowed() {
        let decoded = decode_segment("users").unwrap();
        assert!(matches!(decoded, Cow::Borrowed("users")));
    }

    #[test]
    fn test_utf8_escape() {
        assert_eq!(decode_segment("%E4%BD%A0").unwrap(), "你");
        assert_eq!(decode_segment("caf%c3%a9").unwrap(), "café");
    }

    #[test]
    fn test_encoded_slash_stays_in_segment() {
        let segments = decode_path("/a%2Fb/c").unwrap();
        assert_eq!(segments, vec!["a/b".to_string(), "c".to_string()]);
    }

    #[test]
    fn test_malformed_escapes() {
        assert_eq!(
            decode_segment("%%"),
            Err(DecodeError::InvalidEscape { offset: 0 })
        );
        assert_eq!(
            decode_segment("ab%4"),
            Err(DecodeError::InvalidEscape { offset: 2 })
        );
        assert_eq!(
            decode_segment("%zz"),
            Err(DecodeError::InvalidEscape { offset: 0 })
        );
    }

    #[test]
    fn test_invalid_utf8() {
        assert_eq!(decode_segment("%FF"), Err(DecodeError::InvalidUtf8));
    }

    #[test]
    fn test_plus_is_literal() {
        assert_eq!(decode_segment("a+b").unwrap(), "a+b");
    }

    #[test]
    fn test_path_shapes() {
        assert!(decode_path("/").unwrap().is_empty());
        assert_eq!(decode_path("/a/").unwrap(), vec!["a", ""]);
        assert_eq!(decode_path("/a//b").unwrap(), vec!["a", "", "b"]);
    }
}
