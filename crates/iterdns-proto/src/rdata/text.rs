//! Character-string data (TXT).

use crate::error::{Error, Result};
use bytes::BytesMut;
use smallvec::SmallVec;
use std::fmt;

/// A sequence of `<character-string>`s, each up to 255 bytes (RFC 1035).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct CharacterStrings {
    strings: SmallVec<[Vec<u8>; 2]>,
}

impl CharacterStrings {
    /// Creates a value from the given strings.
    pub fn new(strings: impl IntoIterator<Item = impl Into<Vec<u8>>>) -> Self {
        Self {
            strings: strings.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns the strings.
    pub fn strings(&self) -> &[Vec<u8>] {
        &self.strings
    }

    /// Parses character-strings from wire format.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut strings = SmallVec::new();
        let mut pos = 0;

        while pos < data.len() {
            let len = data[pos] as usize;
            pos += 1;

            if pos + len > data.len() {
                return Err(Error::invalid_rdata(
                    "TXT",
                    format!("string length {len} exceeds remaining data"),
                ));
            }

            strings.push(data[pos..pos + len].to_vec());
            pos += len;
        }

        Ok(Self { strings })
    }

    pub(crate) fn wire_len(&self) -> usize {
        self.strings
            .iter()
            .map(|s| s.chunks(255).map(|c| 1 + c.len()).sum::<usize>().max(1))
            .sum()
    }

    pub(crate) fn write_to(&self, buf: &mut BytesMut) {
        for s in &self.strings {
            if s.is_empty() {
                buf.extend_from_slice(&[0]);
                continue;
            }
            for chunk in s.chunks(255) {
                buf.extend_from_slice(&[chunk.len() as u8]);
                buf.extend_from_slice(chunk);
            }
        }
    }
}

impl fmt::Display for CharacterStrings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, s) in self.strings.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }

            f.write_str("\"")?;
            for &byte in s {
                if byte == b'"' || byte == b'\\' {
                    write!(f, "\\{}", byte as char)?;
                } else if byte.is_ascii_graphic() || byte == b' ' {
                    write!(f, "{}", byte as char)?;
                } else {
                    write!(f, "\\{byte:03}")?;
                }
            }
            f.write_str("\"")?;
        }
        Ok(())
    }
}

/// Parses the presentation form of character-strings: quoted strings with
/// `\X` and `\DDD` escapes, or bare whitespace-separated words.
pub fn parse_character_strings(text: &str) -> Result<CharacterStrings> {
    let bytes = text.as_bytes();
    let mut strings = SmallVec::new();
    let mut i = 0;

    let invalid = |message: &str| Error::invalid_rdata("TXT", message);

    while i < bytes.len() {
        if bytes[i].is_ascii_whitespace() {
            i += 1;
            continue;
        }

        let quoted = bytes[i] == b'"';
        if quoted {
            i += 1;
        }

        let mut current = Vec::new();
        loop {
            let Some(&c) = bytes.get(i) else {
                if quoted {
                    return Err(invalid("unterminated quoted string"));
                }
                break;
            };

            if quoted && c == b'"' {
                i += 1;
                break;
            }
            if !quoted && c.is_ascii_whitespace() {
                break;
            }

            if c == b'\\' {
                let digits = bytes
                    .get(i + 1..i + 4)
                    .filter(|d| d.iter().all(u8::is_ascii_digit));
                if let Some(digits) = digits {
                    let value = digits
                        .iter()
                        .fold(0u32, |acc, d| acc * 10 + u32::from(d - b'0'));
                    current.push(u8::try_from(value).map_err(|_| invalid("escape out of range"))?);
                    i += 4;
                } else {
                    let escaped = *bytes.get(i + 1).ok_or_else(|| invalid("dangling escape"))?;
                    current.push(escaped);
                    i += 2;
                }
                continue;
            }

            current.push(c);
            i += 1;
        }

        if current.len() > 255 {
            return Err(invalid("character-string longer than 255 bytes"));
        }
        strings.push(current);
    }

    Ok(CharacterStrings { strings })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wire() {
        let data = [5, b'h', b'e', b'l', b'l', b'o', 0];
        let txt = CharacterStrings::parse(&data).unwrap();
        assert_eq!(txt.strings().len(), 2);
        assert_eq!(txt.wire_len(), data.len());

        assert!(CharacterStrings::parse(&[9, b'x']).is_err());
    }

    #[test]
    fn test_presentation_form() {
        let txt = parse_character_strings(r#""v=spf1 -all" bare "q\"uote\010""#).unwrap();
        assert_eq!(txt.strings()[0], b"v=spf1 -all");
        assert_eq!(txt.strings()[1], b"bare");
        assert_eq!(txt.strings()[2], b"q\"uote\n");
        assert_eq!(txt.to_string(), r#""v=spf1 -all" "bare" "q\"uote\010""#);
    }

    #[test]
    fn test_unterminated_quote() {
        assert!(parse_character_strings("\"open").is_err());
    }
}
