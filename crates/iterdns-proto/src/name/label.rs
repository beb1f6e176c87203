//! DNS label handling.
//!
//! A label is a single component of a domain name, up to 63 bytes.

use std::cmp::Ordering;
use std::fmt;

/// A single DNS label borrowed from a name's wire representation.
///
/// In `www.example.com.` the labels are `www`, `example`, `com` and the
/// empty root label.
#[derive(Clone, Copy)]
pub struct Label<'a> {
    bytes: &'a [u8],
}

impl<'a> Label<'a> {
    /// Creates a label from a byte slice.
    #[inline]
    pub const fn from_bytes(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    /// Creates the root label (empty).
    #[inline]
    pub const fn root() -> Self {
        Self { bytes: &[] }
    }

    /// Returns the raw bytes of the label.
    #[inline]
    pub const fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Returns the length of the label in bytes.
    #[inline]
    pub const fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true if this is the root label (empty).
    #[inline]
    pub const fn is_root(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Returns true if this label is empty (same as root).
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Case-insensitive comparison with another label.
    #[inline]
    pub fn eq_ignore_ascii_case(&self, other: &Label<'_>) -> bool {
        self.bytes.eq_ignore_ascii_case(other.bytes)
    }

    /// Canonical comparison per RFC 4034 section 6.1.
    ///
    /// Labels compare as case-folded octet strings, a shorter label sorting
    /// before any longer label it is a prefix of.
    pub fn cmp_canonical(&self, other: &Label<'_>) -> Ordering {
        let lhs = self.bytes.iter().map(u8::to_ascii_lowercase);
        let rhs = other.bytes.iter().map(u8::to_ascii_lowercase);
        lhs.cmp(rhs)
    }
}

impl fmt::Display for Label<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &byte in self.bytes {
            if byte == b'.' || byte == b'\\' {
                write!(f, "\\{}", byte as char)?;
            } else if byte.is_ascii_graphic() {
                write!(f, "{}", byte as char)?;
            } else {
                // \DDD for spaces and non-printable octets
                write!(f, "\\{byte:03}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Label<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Label(\"{self}\")")
    }
}

impl PartialEq for Label<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.eq_ignore_ascii_case(other)
    }
}

impl Eq for Label<'_> {}

/// Iterator over labels in a domain name, leftmost first, ending with the
/// root label.
pub struct LabelIter<'a> {
    wire: &'a [u8],
    pos: usize,
    done: bool,
}

impl<'a> LabelIter<'a> {
    /// Creates a new label iterator from wire format bytes.
    #[inline]
    pub const fn new(wire: &'a [u8]) -> Self {
        Self {
            wire,
            pos: 0,
            done: false,
        }
    }
}

impl<'a> Iterator for LabelIter<'a> {
    type Item = Label<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let len = match self.wire.get(self.pos) {
            None | Some(0) => {
                self.done = true;
                return Some(Label::root());
            }
            Some(&len) => len as usize,
        };

        let start = self.pos + 1;
        let end = start + len;
        if end > self.wire.len() {
            self.done = true;
            return None;
        }

        self.pos = end;
        Some(Label::from_bytes(&self.wire[start..end]))
    }
}

impl std::iter::FusedIterator for LabelIter<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_basics() {
        let label = Label::from_bytes(b"example");
        assert_eq!(label.len(), 7);
        assert!(!label.is_root());
        assert_eq!(label.to_string(), "example");
        assert!(Label::root().is_root());
    }

    #[test]
    fn test_case_insensitive_comparison() {
        let lower = Label::from_bytes(b"example");
        let upper = Label::from_bytes(b"EXAMPLE");
        assert_eq!(lower, upper);
        assert_eq!(lower.cmp_canonical(&upper), Ordering::Equal);
    }

    #[test]
    fn test_canonical_ordering() {
        let a = Label::from_bytes(b"a");
        let b = Label::from_bytes(b"B");
        let aa = Label::from_bytes(b"aa");

        assert_eq!(a.cmp_canonical(&b), Ordering::Less);
        assert_eq!(a.cmp_canonical(&aa), Ordering::Less);
    }

    #[test]
    fn test_display_escapes() {
        let label = Label::from_bytes(b"a.b c");
        assert_eq!(label.to_string(), "a\\.b\\032c");
    }

    #[test]
    fn test_iter_truncated_wire() {
        let wire = [3, b'w', b'w'];
        let labels: Vec<_> = LabelIter::new(&wire).collect();
        assert!(labels.is_empty());
    }
}
