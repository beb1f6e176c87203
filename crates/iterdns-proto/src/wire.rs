//! Wire format utilities.
//!
//! Bounds-checked cursors for reading and writing big-endian DNS data.
//! The cache persistence format is built on the same primitives.

use crate::error::{Error, Result};
use crate::name::{Name, NameParser};
use bytes::{BufMut, Bytes, BytesMut};

/// A cursor for reading DNS wire format data.
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    /// The underlying data.
    data: &'a [u8],
    /// Current position.
    pos: usize,
}

impl<'a> WireReader<'a> {
    /// Creates a new wire reader.
    #[inline]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Returns the underlying data.
    #[inline]
    pub const fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Returns the current position.
    #[inline]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Returns the remaining bytes.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Returns true if there are no remaining bytes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Advances the position by the given amount.
    #[inline]
    pub fn advance(&mut self, n: usize) -> Result<()> {
        if self.pos + n > self.data.len() {
            return Err(Error::unexpected_eof(self.pos + n));
        }
        self.pos += n;
        Ok(())
    }

    /// Reads a single byte.
    #[inline]
    pub fn read_u8(&mut self) -> Result<u8> {
        let value = *self
            .data
            .get(self.pos)
            .ok_or(Error::unexpected_eof(self.pos))?;
        self.pos += 1;
        Ok(value)
    }

    /// Reads a big-endian u16.
    #[inline]
    pub fn read_u16(&mut self) -> Result<u16> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Reads a big-endian u32.
    #[inline]
    pub fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Reads a slice of bytes.
    #[inline]
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.pos + len > self.data.len() {
            return Err(Error::unexpected_eof(self.pos + len));
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    /// Reads a domain name, following compression pointers into the
    /// underlying buffer.
    pub fn read_name(&mut self) -> Result<Name> {
        let (name, consumed) = NameParser::new(self.data).parse_name(self.pos)?;
        self.pos += consumed;
        Ok(name)
    }
}

/// A writer for DNS wire format data.
///
/// Wraps a `BytesMut`. Names are always written uncompressed.
#[derive(Debug, Default)]
pub struct WireWriter {
    /// The underlying buffer.
    buf: BytesMut,
}

impl WireWriter {
    /// Creates a new wire writer with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// Returns the current length.
    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns true if the buffer is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Writes a single byte.
    #[inline]
    pub fn write_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    /// Writes a big-endian u16.
    #[inline]
    pub fn write_u16(&mut self, value: u16) {
        self.buf.put_u16(value);
    }

    /// Writes a big-endian u32.
    #[inline]
    pub fn write_u32(&mut self, value: u32) {
        self.buf.put_u32(value);
    }

    /// Writes a slice of bytes.
    #[inline]
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Writes a domain name in uncompressed wire format.
    #[inline]
    pub fn write_name(&mut self, name: &Name) {
        name.write_wire(&mut self.buf);
    }

    /// Overwrites bytes at a position already written (for length fields).
    pub fn write_at(&mut self, offset: usize, bytes: &[u8]) {
        if offset + bytes.len() <= self.buf.len() {
            self.buf[offset..offset + bytes.len()].copy_from_slice(bytes);
        }
    }

    /// Returns a reference to the written data.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Returns the data as frozen bytes.
    #[inline]
    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_wire_reader() {
        let data = [0x12, 0x34, 0x56, 0x78, 0x9A];
        let mut reader = WireReader::new(&data);

        assert_eq!(reader.read_u8().unwrap(), 0x12);
        assert_eq!(reader.read_u16().unwrap(), 0x3456);
        assert_eq!(reader.remaining(), 2);
        assert_eq!(reader.read_bytes(2).unwrap(), &[0x78, 0x9A]);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_wire_reader_bounds() {
        let data = [0x12, 0x34];
        let mut reader = WireReader::new(&data);

        assert!(matches!(
            reader.read_u32(),
            Err(Error::UnexpectedEof { offset: 4 })
        ));
    }

    #[test]
    fn test_wire_writer() {
        let mut writer = WireWriter::new(16);

        writer.write_u8(0x12);
        writer.write_u16(0x3456);
        writer.write_u32(0x789ABCDE);

        assert_eq!(writer.len(), 7);
        assert_eq!(
            writer.as_bytes(),
            &[0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE]
        );
    }

    #[test]
    fn test_name_through_reader_and_writer() {
        let name = Name::from_str("ns1.example.org").unwrap();
        let mut writer = WireWriter::new(32);
        writer.write_name(&name);
        writer.write_u16(0xBEEF);

        let bytes = writer.freeze();
        let mut reader = WireReader::new(&bytes);
        assert_eq!(reader.read_name().unwrap(), name);
        assert_eq!(reader.read_u16().unwrap(), 0xBEEF);
    }

    #[test]
    fn test_write_at_patches_length() {
        let mut writer = WireWriter::new(8);
        writer.write_u16(0);
        writer.write_bytes(b"abc");
        writer.write_at(0, &3u16.to_be_bytes());
        assert_eq!(writer.as_bytes(), &[0, 3, b'a', b'b', b'c']);
    }
}
