//! DNS domain name representation and operations.
//!
//! This module provides DNS domain names following RFC 1035 and RFC 2181:
//!
//! - Inline storage for typical names, shared storage for names read
//!   from a larger buffer
//! - Wire format parsing with compression pointer handling
//! - Case-insensitive comparison and hashing
//! - Hierarchical relation tests used for zone-cut and bailiwick checks
//! - Conversion to/from the presentation format, including `\DDD` escapes

mod label;
mod parse;

pub use label::{Label, LabelIter};
pub use parse::NameParser;

use crate::error::{Error, Result};
use crate::{MAX_LABEL_LENGTH, MAX_NAME_LENGTH};
use bytes::{Bytes, BytesMut};
use compact_str::CompactString;
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::fmt;
use std::fmt::Write as _;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// The hierarchical relation of one name to another.
///
/// Read as "`self` is a ... of `other`" for [`Name::relation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameRelation {
    /// The names are equal (case-insensitively).
    Equal,
    /// `self` is strictly below `other`.
    Subdomain,
    /// `self` is strictly above `other`.
    Superdomain,
    /// The names share a non-root ancestor but neither contains the other.
    CommonAncestor,
    /// The names share nothing but the root.
    Unrelated,
}

/// A DNS domain name.
///
/// # Wire Format
///
/// A name is a sequence of length-prefixed labels terminated by the
/// zero-length root label. `www.example.com.` is encoded as:
///
/// ```text
/// 03 'w' 'w' 'w' 07 'e' 'x' 'a' 'm' 'p' 'l' 'e' 03 'c' 'o' 'm' 00
/// ```
///
/// # Comparison Semantics
///
/// Names compare and hash case-insensitively per RFC 1035.
///
/// # Example
///
/// ```rust
/// use iterdns_proto::name::{Name, NameRelation};
/// use std::str::FromStr;
///
/// let name = Name::from_str("www.example.com.").unwrap();
/// let zone = Name::from_str("EXAMPLE.com").unwrap();
/// assert_eq!(name.label_count(), 4); // www, example, com, root
/// assert_eq!(name.relation(&zone), NameRelation::Subdomain);
/// ```
#[derive(Clone)]
pub struct Name {
    /// The raw wire-format representation (without compression).
    wire: NameStorage,
    /// Number of labels (including root).
    label_count: u8,
}

/// Internal storage for domain name bytes.
#[derive(Clone)]
enum NameStorage {
    /// Inline storage for small names (most common case).
    Inline(SmallVec<[u8; 64]>),
    /// Shared reference to bytes read from a larger buffer.
    Shared(Bytes),
}

impl Name {
    /// Creates the root domain name.
    #[inline]
    pub const fn root() -> Self {
        Self {
            wire: NameStorage::Inline(SmallVec::new_const()),
            label_count: 1,
        }
    }

    /// Creates a domain name from uncompressed wire format bytes.
    pub fn from_wire(wire: impl Into<Bytes>) -> Result<Self> {
        let bytes = wire.into();
        let label_count = Self::validate_wire(&bytes)?;
        Ok(Self {
            wire: NameStorage::Shared(bytes),
            label_count,
        })
    }

    /// Creates a domain name from a slice, copying the data.
    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        let label_count = Self::validate_wire(slice)?;
        Ok(Self {
            wire: NameStorage::Inline(SmallVec::from_slice(slice)),
            label_count,
        })
    }

    /// Validates uncompressed wire format and returns the label count.
    fn validate_wire(bytes: &[u8]) -> Result<u8> {
        if bytes.is_empty() {
            return Ok(1);
        }
        if bytes.len() > MAX_NAME_LENGTH {
            return Err(Error::NameTooLong {
                length: bytes.len(),
            });
        }

        let mut pos = 0;
        let mut labels = 0u8;
        loop {
            let len = *bytes.get(pos).ok_or(Error::unexpected_eof(pos))? as usize;
            labels += 1;
            if len == 0 {
                break;
            }
            if len > MAX_LABEL_LENGTH {
                return Err(Error::LabelTooLong { length: len });
            }
            pos += 1 + len;
        }

        if pos + 1 != bytes.len() {
            return Err(Error::invalid_data(pos + 1, "data after root label"));
        }
        Ok(labels)
    }

    /// Returns the wire format representation.
    ///
    /// The root name may be represented by an empty slice.
    #[inline]
    pub fn as_wire(&self) -> &[u8] {
        match &self.wire {
            NameStorage::Inline(v) => v.as_slice(),
            NameStorage::Shared(b) => b.as_ref(),
        }
    }

    /// Returns the wire format length (including terminating zero).
    #[inline]
    pub fn wire_len(&self) -> usize {
        self.as_wire().len().max(1)
    }

    /// Returns the number of labels in the name (including root).
    #[inline]
    pub const fn label_count(&self) -> usize {
        self.label_count as usize
    }

    /// Returns true if this is the root domain.
    #[inline]
    pub fn is_root(&self) -> bool {
        self.label_count == 1
    }

    /// Returns an iterator over the labels in the name, leftmost first.
    #[inline]
    pub fn labels(&self) -> LabelIter<'_> {
        LabelIter::new(self.as_wire())
    }

    /// Returns the parent domain (removes the leftmost label).
    ///
    /// Returns `None` for the root domain.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }

        let wire = self.as_wire();
        let parent_start = 1 + wire[0] as usize;
        let mut parent = SmallVec::new();
        parent.extend_from_slice(&wire[parent_start..]);
        Some(Self {
            wire: NameStorage::Inline(parent),
            label_count: self.label_count - 1,
        })
    }

    /// Returns this name followed by each of its ancestors, ending with the
    /// root.
    pub fn ancestors(&self) -> impl Iterator<Item = Name> {
        std::iter::successors(Some(self.clone()), Name::parent)
    }

    /// Returns the number of labels, counted from the root, that both names
    /// share. Always at least 1 (the root).
    pub fn common_labels(&self, other: &Name) -> usize {
        let mine: SmallVec<[Label<'_>; 16]> = self.labels().collect();
        let theirs: SmallVec<[Label<'_>; 16]> = other.labels().collect();

        mine.iter()
            .rev()
            .zip(theirs.iter().rev())
            .take_while(|(a, b)| a.eq_ignore_ascii_case(b))
            .count()
    }

    /// Returns how this name relates to `other` in the hierarchy.
    pub fn relation(&self, other: &Name) -> NameRelation {
        let common = self.common_labels(other);
        let mine = self.label_count();
        let theirs = other.label_count();

        if common == mine && common == theirs {
            NameRelation::Equal
        } else if common == theirs {
            NameRelation::Subdomain
        } else if common == mine {
            NameRelation::Superdomain
        } else if common > 1 {
            NameRelation::CommonAncestor
        } else {
            NameRelation::Unrelated
        }
    }

    /// Returns true if this name is equal to or below `other`.
    #[inline]
    pub fn is_subdomain_of(&self, other: &Name) -> bool {
        matches!(
            self.relation(other),
            NameRelation::Equal | NameRelation::Subdomain
        )
    }

    /// Converts to the presentation format, always with a trailing dot.
    pub fn to_string_representation(&self) -> CompactString {
        if self.is_root() {
            return CompactString::new(".");
        }

        let mut result = CompactString::new("");
        for label in self.labels().filter(|l| !l.is_root()) {
            // Writing into a CompactString cannot fail
            let _ = write!(result, "{label}.");
        }
        result
    }

    /// Writes the name in wire format to a buffer.
    pub fn write_wire(&self, buf: &mut BytesMut) {
        if self.is_root() {
            buf.extend_from_slice(&[0]);
        } else {
            buf.extend_from_slice(self.as_wire());
        }
    }
}

/// Splits presentation text into labels, resolving `\X` and `\DDD`
/// escapes.
fn parse_labels(s: &str) -> Result<SmallVec<[SmallVec<[u8; 64]>; 8]>> {
    let mut labels = SmallVec::new();
    let mut current: SmallVec<[u8; 64]> = SmallVec::new();
    let bytes = s.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'.' => {
                if current.is_empty() {
                    return Err(Error::EmptyLabel { position: i });
                }
                labels.push(std::mem::take(&mut current));
                i += 1;
            }
            b'\\' => {
                let digits = bytes.get(i + 1..i + 4).filter(|d| d.iter().all(u8::is_ascii_digit));
                if let Some(digits) = digits {
                    let value = digits
                        .iter()
                        .fold(0u32, |acc, d| acc * 10 + u32::from(d - b'0'));
                    let byte = u8::try_from(value).map_err(|_| Error::InvalidLabelChar {
                        character: '\\',
                        position: i,
                    })?;
                    current.push(byte);
                    i += 4;
                } else {
                    let escaped = *bytes.get(i + 1).ok_or(Error::InvalidLabelChar {
                        character: '\\',
                        position: i,
                    })?;
                    current.push(escaped);
                    i += 2;
                }
            }
            c if c.is_ascii_graphic() => {
                current.push(c);
                i += 1;
            }
            c => {
                return Err(Error::InvalidLabelChar {
                    character: char::from(c),
                    position: i,
                })
            }
        }

        if current.len() > MAX_LABEL_LENGTH {
            return Err(Error::LabelTooLong {
                length: current.len(),
            });
        }
    }

    if !current.is_empty() {
        labels.push(current);
    }
    Ok(labels)
}

impl FromStr for Name {
    type Err = Error;

    /// Parses a domain name from presentation format.
    ///
    /// A trailing dot is optional; every name is treated as absolute.
    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() || s == "." {
            return Ok(Self::root());
        }

        let labels = parse_labels(s)?;
        let mut wire = SmallVec::<[u8; 64]>::new();
        for label in &labels {
            wire.push(label.len() as u8);
            wire.extend_from_slice(label);
        }
        wire.push(0);

        if wire.len() > MAX_NAME_LENGTH {
            return Err(Error::NameTooLong { length: wire.len() });
        }

        Ok(Self {
            wire: NameStorage::Inline(wire),
            label_count: (labels.len() + 1) as u8,
        })
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_representation())
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name(\"{self}\")")
    }
}

impl PartialEq for Name {
    /// Case-insensitive comparison per DNS semantics.
    fn eq(&self, other: &Self) -> bool {
        self.label_count == other.label_count
            && self
                .labels()
                .zip(other.labels())
                .all(|(a, b)| a.eq_ignore_ascii_case(&b))
    }
}

impl Eq for Name {}

impl Hash for Name {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for label in self.labels() {
            state.write_usize(label.len());
            for byte in label.as_bytes() {
                state.write_u8(byte.to_ascii_lowercase());
            }
        }
    }
}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Name {
    /// Canonical DNS name ordering per RFC 4034, compared from the root.
    fn cmp(&self, other: &Self) -> Ordering {
        let mine: SmallVec<[Label<'_>; 16]> = self.labels().collect();
        let theirs: SmallVec<[Label<'_>; 16]> = other.labels().collect();

        for (a, b) in mine.iter().rev().zip(theirs.iter().rev()) {
            let cmp = a.cmp_canonical(b);
            if cmp != Ordering::Equal {
                return cmp;
            }
        }
        mine.len().cmp(&theirs.len())
    }
}

impl Default for Name {
    fn default() -> Self {
        Self::root()
    }
}
