//! DNS record classes.
//!
//! The class field identifies the protocol family of the resource record.
//! IN is used almost exclusively, CH shows up in `version.bind` style
//! queries found in real query logs.

use crate::error::{Error, Result};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt;
use std::str::FromStr;

/// DNS record class.
///
/// See RFC 1035 Section 3.2.4 and RFC 6895 for the registry.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    IntoPrimitive,
    TryFromPrimitive,
)]
#[repr(u16)]
pub enum RecordClass {
    /// Internet - RFC 1035
    IN = 1,
    /// CHAOS - RFC 1035
    CH = 3,
    /// Hesiod - RFC 1035
    HS = 4,
    /// Query class: NONE - RFC 2136
    NONE = 254,
    /// Query class: ANY - RFC 1035
    ANY = 255,
}

impl RecordClass {
    /// Returns the numeric value of the class.
    #[inline]
    pub const fn to_u16(self) -> u16 {
        self as u16
    }

    /// Creates a class from its numeric value.
    #[inline]
    pub fn from_u16(value: u16) -> Option<Self> {
        Self::try_from(value).ok()
    }

    /// Returns the mnemonic of the class.
    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Self::IN => "IN",
            Self::CH => "CH",
            Self::HS => "HS",
            Self::NONE => "NONE",
            Self::ANY => "ANY",
        }
    }
}

impl fmt::Display for RecordClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Default for RecordClass {
    fn default() -> Self {
        Self::IN
    }
}

/// A class value that can represent both standard classes and unknown values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Class {
    /// A known, standard class.
    Known(RecordClass),
    /// An unknown class value.
    Unknown(u16),
}

impl Class {
    /// The Internet class.
    pub const IN: Class = Class::Known(RecordClass::IN);

    /// Creates a class from a u16 value.
    #[inline]
    pub fn from_u16(value: u16) -> Self {
        RecordClass::from_u16(value)
            .map(Self::Known)
            .unwrap_or(Self::Unknown(value))
    }

    /// Returns the numeric value.
    #[inline]
    pub const fn to_u16(self) -> u16 {
        match self {
            Self::Known(c) => c.to_u16(),
            Self::Unknown(v) => v,
        }
    }

    /// Returns the standard class if known.
    #[inline]
    pub const fn as_known(self) -> Option<RecordClass> {
        match self {
            Self::Known(c) => Some(c),
            Self::Unknown(_) => None,
        }
    }

    /// Returns true if this is the Internet class.
    #[inline]
    pub const fn is_internet(self) -> bool {
        matches!(self, Self::Known(RecordClass::IN))
    }
}

impl From<RecordClass> for Class {
    fn from(c: RecordClass) -> Self {
        Self::Known(c)
    }
}

impl From<u16> for Class {
    fn from(value: u16) -> Self {
        Self::from_u16(value)
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(c) => write!(f, "{c}"),
            Self::Unknown(v) => write!(f, "CLASS{v}"),
        }
    }
}

impl FromStr for Class {
    type Err = Error;

    /// Parses a mnemonic (`IN`, `ch`) or the generic `CLASSnnn` form.
    fn from_str(s: &str) -> Result<Self> {
        let known = [
            RecordClass::IN,
            RecordClass::CH,
            RecordClass::HS,
            RecordClass::NONE,
            RecordClass::ANY,
        ];
        if let Some(c) = known.iter().find(|c| c.name().eq_ignore_ascii_case(s)) {
            return Ok(Self::Known(*c));
        }
        s.get(..5)
            .filter(|prefix| prefix.eq_ignore_ascii_case("CLASS"))
            .and_then(|_| s[5..].parse::<u16>().ok())
            .map(Self::from_u16)
            .ok_or_else(|| Error::unknown_mnemonic("class", s))
    }
}

impl Default for Class {
    fn default() -> Self {
        Self::IN
    }
}
