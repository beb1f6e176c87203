//! DNS response codes (RCODEs).
//!
//! Response codes indicate the status of a DNS operation.
//! Defined in RFC 1035 Section 4.1.1 and RFC 2136.

use crate::error::{Error, Result};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::str::FromStr;

/// DNS response code.
///
/// Only the 4-bit header codes are represented; the resolver never sends
/// EDNS so extended codes cannot appear.
///
/// NXRRSET doubles as the cache's marker for "name exists, no data of this
/// type" (RFC 2308 NODATA).
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
#[repr(u8)]
pub enum ResponseCode {
    /// No error condition - RFC 1035
    NoError = 0,

    /// Format error - RFC 1035
    FormErr = 1,

    /// Server failure - RFC 1035
    ///
    /// Also cached by the resolver when no server could answer.
    ServFail = 2,

    /// Name error - RFC 1035
    ///
    /// The domain name referenced in the query does not exist.
    NXDomain = 3,

    /// Not implemented - RFC 1035
    NotImp = 4,

    /// Query refused - RFC 1035
    Refused = 5,

    /// Name exists when it should not - RFC 2136
    YXDomain = 6,

    /// RR set exists when it should not - RFC 2136
    YXRRSet = 7,

    /// RR set that should exist does not - RFC 2136
    NXRRSet = 8,

    /// Server not authoritative for zone - RFC 2136
    NotAuth = 9,

    /// Name not contained in zone - RFC 2136
    NotZone = 10,
}

impl ResponseCode {
    /// Every response code, in numeric order.
    pub const ALL: [ResponseCode; 11] = [
        Self::NoError,
        Self::FormErr,
        Self::ServFail,
        Self::NXDomain,
        Self::NotImp,
        Self::Refused,
        Self::YXDomain,
        Self::YXRRSet,
        Self::NXRRSet,
        Self::NotAuth,
        Self::NotZone,
    ];

    /// Returns the numeric value of the response code.
    #[inline]
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    /// Creates a response code from its numeric value.
    #[inline]
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::try_from(value).ok()
    }

    /// Creates a response code from the 4-bit header field.
    #[inline]
    pub fn from_header(value: u8) -> Result<Self> {
        Self::try_from(value & 0x0F).map_err(|_| Error::InvalidResponseCode {
            value: u16::from(value & 0x0F),
        })
    }

    /// Returns true if this response indicates success.
    #[inline]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::NoError)
    }

    /// Returns true if this response indicates the name does not exist.
    #[inline]
    pub const fn is_nxdomain(self) -> bool {
        matches!(self, Self::NXDomain)
    }

    /// Returns true for the codes that describe an answer rather than a
    /// failure (NOERROR and NXDOMAIN).
    #[inline]
    pub const fn is_cacheable(self) -> bool {
        matches!(self, Self::NoError | Self::NXDomain)
    }

    /// Returns the mnemonic of the response code.
    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Self::NoError => "NOERROR",
            Self::FormErr => "FORMERR",
            Self::ServFail => "SERVFAIL",
            Self::NXDomain => "NXDOMAIN",
            Self::NotImp => "NOTIMP",
            Self::Refused => "REFUSED",
            Self::YXDomain => "YXDOMAIN",
            Self::YXRRSet => "YXRRSET",
            Self::NXRRSet => "NXRRSET",
            Self::NotAuth => "NOTAUTH",
            Self::NotZone => "NOTZONE",
        }
    }
}

impl std::fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ResponseCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|rcode| rcode.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::unknown_mnemonic("rcode", s))
    }
}

impl Default for ResponseCode {
    fn default() -> Self {
        Self::NoError
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rcode_values() {
        assert_eq!(ResponseCode::NoError.to_u8(), 0);
        assert_eq!(ResponseCode::ServFail.to_u8(), 2);
        assert_eq!(ResponseCode::NXDomain.to_u8(), 3);
        assert_eq!(ResponseCode::NXRRSet.to_u8(), 8);
    }

    #[test]
    fn test_rcode_from_header() {
        assert_eq!(
            ResponseCode::from_header(0x83).unwrap(),
            ResponseCode::NXDomain
        );
        assert!(matches!(
            ResponseCode::from_header(12),
            Err(Error::InvalidResponseCode { value: 12 })
        ));
    }

    #[test]
    fn test_rcode_names() {
        assert_eq!(ResponseCode::NXRRSet.to_string(), "NXRRSET");
        assert_eq!(
            "servfail".parse::<ResponseCode>().unwrap(),
            ResponseCode::ServFail
        );
        assert!("NOPE".parse::<ResponseCode>().is_err());
    }

    #[test]
    fn test_rcode_predicates() {
        assert!(ResponseCode::NoError.is_cacheable());
        assert!(ResponseCode::NXDomain.is_cacheable());
        assert!(!ResponseCode::ServFail.is_cacheable());
        assert!(ResponseCode::NXDomain.is_nxdomain());
    }
}
