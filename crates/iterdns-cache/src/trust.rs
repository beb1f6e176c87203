//! Trust levels and lookup options.

use bitflags::bitflags;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt;

/// How much a cached entry is trusted, by provenance.
///
/// Lower values are more trusted. Lookups prefer the lowest value present
/// and, unless [`FindOptions::ALLOW_NOANSWER`] is given, never return
/// anything less trusted than [`Trust::Answer`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, IntoPrimitive, TryFromPrimitive,
)]
#[repr(u8)]
pub enum Trust {
    /// Locally configured data (root hints); never expires.
    Local = 0,
    /// Answer section of an authoritative response.
    Answer = 1,
    /// Authority-section NS accompanying an authoritative answer.
    AuthAuthority = 2,
    /// NS and addresses learned from a referral.
    Glue = 3,
    /// Additional-section addresses accompanying an authoritative answer.
    AuthAdditional = 4,
}

impl Trust {
    /// Returns the numeric rank.
    #[inline]
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    /// Creates a trust level from its numeric rank.
    #[inline]
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::try_from(value).ok()
    }
}

impl fmt::Display for Trust {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_u8())
    }
}

bitflags! {
    /// Options for [`RrCache::find`](crate::RrCache::find).
    ///
    /// The empty set models an end-client answer lookup: answer-level trust
    /// only, no CNAME fallback, negative entries reported as a miss.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FindOptions: u8 {
        /// Materialize negative (empty) entries instead of reporting a miss.
        const ALLOW_NEGATIVE = 0x01;
        /// Accept entries less trusted than an authoritative answer.
        const ALLOW_NOANSWER = 0x02;
        /// Fall back to a CNAME at the name when it is at least as trusted.
        const ALLOW_CNAME = 0x04;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trust_ordering() {
        assert!(Trust::Local < Trust::Answer);
        assert!(Trust::Answer < Trust::AuthAuthority);
        assert!(Trust::Glue < Trust::AuthAdditional);
        assert_eq!(Trust::from_u8(3), Some(Trust::Glue));
        assert_eq!(Trust::from_u8(5), None);
    }

    #[test]
    fn test_find_options_bits() {
        let options = FindOptions::ALLOW_CNAME | FindOptions::ALLOW_NEGATIVE;
        assert_eq!(options.bits(), 5);
        assert!(FindOptions::default().is_empty());
    }
}
