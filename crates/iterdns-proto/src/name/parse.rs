//! DNS name parsing from wire format with compression support.
//!
//! Handles compression pointers (RFC 1035 section 4.1.4) relative to the
//! enclosing message buffer.

use super::{Name, NameStorage};
use crate::error::{Error, Result};
use crate::MAX_NAME_LENGTH;
use smallvec::SmallVec;

/// Maximum number of compression pointer jumps to prevent infinite loops.
const MAX_COMPRESSION_JUMPS: usize = 128;

/// Parser for reading domain names from DNS wire format.
#[derive(Debug, Clone)]
pub struct NameParser<'a> {
    /// The complete message buffer (for compression pointer resolution).
    message: &'a [u8],
}

impl<'a> NameParser<'a> {
    /// Creates a new name parser with the given message buffer.
    #[inline]
    pub const fn new(message: &'a [u8]) -> Self {
        Self { message }
    }

    /// Parses a domain name starting at the given offset.
    ///
    /// Returns the parsed name and the number of bytes consumed from the
    /// starting position (not following compression pointers).
    pub fn parse_name(&self, offset: usize) -> Result<(Name, usize)> {
        let mut wire = SmallVec::<[u8; 64]>::new();
        let mut consumed = None;
        let mut pos = offset;
        let mut jumps = 0;
        let mut label_count = 0u8;

        loop {
            let len_byte = *self
                .message
                .get(pos)
                .ok_or(Error::unexpected_eof(pos))?;

            if len_byte >= 0xC0 {
                let low = *self
                    .message
                    .get(pos + 1)
                    .ok_or(Error::unexpected_eof(pos + 1))?;
                let target = usize::from(u16::from_be_bytes([len_byte & 0x3F, low]));

                // Pointers must go strictly backwards
                if target >= pos {
                    return Err(Error::InvalidCompressionPointer {
                        offset: pos,
                        target,
                    });
                }

                consumed.get_or_insert(pos - offset + 2);

                jumps += 1;
                if jumps > MAX_COMPRESSION_JUMPS {
                    return Err(Error::TooManyCompressionJumps {
                        max_jumps: MAX_COMPRESSION_JUMPS,
                    });
                }

                pos = target;
                continue;
            }

            if len_byte >= 0x40 {
                return Err(Error::invalid_data(
                    pos,
                    format!("invalid label type 0x{len_byte:02X}"),
                ));
            }

            let len = len_byte as usize;
            if len == 0 {
                wire.push(0);
                label_count += 1;
                consumed.get_or_insert(pos - offset + 1);
                break;
            }

            if pos + 1 + len > self.message.len() {
                return Err(Error::unexpected_eof(pos + 1 + len));
            }
            if wire.len() + 1 + len + 1 > MAX_NAME_LENGTH {
                return Err(Error::NameTooLong {
                    length: wire.len() + 1 + len + 1,
                });
            }

            wire.push(len_byte);
            wire.extend_from_slice(&self.message[pos + 1..pos + 1 + len]);
            label_count += 1;
            pos += 1 + len;
        }

        let name = Name {
            wire: NameStorage::Inline(wire),
            label_count,
        };
        Ok((name, consumed.unwrap_or_default()))
    }

    /// Parses a name and returns only the name (ignoring consumed bytes).
    #[inline]
    pub fn parse(&self, offset: usize) -> Result<Name> {
        self.parse_name(offset).map(|(name, _)| name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_name() {
        let wire = [
            3, b'w', b'w', b'w', 7, b'e', b'x', b'a', b'm', b'p', b'l', b'e', 3, b'c', b'o', b'm',
            0,
        ];

        let (name, consumed) = NameParser::new(&wire).parse_name(0).unwrap();
        assert_eq!(name.to_string(), "www.example.com.");
        assert_eq!(consumed, wire.len());
    }

    #[test]
    fn test_parse_compressed_name() {
        let wire = [
            7, b'e', b'x', b'a', b'm', b'p', b'l', b'e', 3, b'c', b'o', b'm', 0, // example.com.
            3, b'w', b'w', b'w', 0xC0, 0x00, // www.<ptr to 0>
        ];

        let parser = NameParser::new(&wire);
        let (name, consumed) = parser.parse_name(13).unwrap();
        assert_eq!(name.to_string(), "www.example.com.");
        assert_eq!(name.label_count(), 4);
        assert_eq!(consumed, 6);
    }

    #[test]
    fn test_self_pointer_rejected() {
        let wire = [0xC0, 0x00];
        assert!(matches!(
            NameParser::new(&wire).parse_name(0),
            Err(Error::InvalidCompressionPointer { .. })
        ));
    }

    #[test]
    fn test_truncated_label() {
        let wire = [5, b'a', b'b'];
        assert!(NameParser::new(&wire).parse_name(0).is_err());
    }
}
