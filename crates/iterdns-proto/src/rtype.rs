//! DNS record types.
//!
//! Standard types (RFC 1035), the DNSSEC family and service binding types,
//! plus the meta query types a resolver sees in query logs.

use crate::error::{Error, Result};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt;
use std::str::FromStr;

/// DNS record type.
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
#[allow(clippy::upper_case_acronyms)]
pub enum RecordType {
    // =========================================================================
    // Standard Record Types (RFC 1035)
    // =========================================================================
    /// IPv4 address - RFC 1035
    A = 1,
    /// Authoritative name server - RFC 1035
    NS = 2,
    /// Canonical name (alias) - RFC 1035
    CNAME = 5,
    /// Start of authority - RFC 1035
    SOA = 6,
    /// Mailbox domain name - RFC 1035
    MB = 7,
    /// Mail group member - RFC 1035
    MG = 8,
    /// Mail rename domain name - RFC 1035
    MR = 9,
    /// Null record - RFC 1035
    NULL = 10,
    /// Well-known services - RFC 1035
    WKS = 11,
    /// Domain name pointer - RFC 1035
    PTR = 12,
    /// Host information - RFC 1035
    HINFO = 13,
    /// Mailbox information - RFC 1035
    MINFO = 14,
    /// Mail exchange - RFC 1035
    MX = 15,
    /// Text strings - RFC 1035
    TXT = 16,

    // =========================================================================
    // Extended Record Types
    // =========================================================================
    /// Responsible person - RFC 1183
    RP = 17,
    /// AFS database location - RFC 1183
    AFSDB = 18,
    /// Signature (obsolete, see RRSIG) - RFC 2535
    SIG = 24,
    /// Key (obsolete, see DNSKEY) - RFC 2535
    KEY = 25,
    /// IPv6 address - RFC 3596
    AAAA = 28,
    /// Location - RFC 1876
    LOC = 29,
    /// Next domain (obsolete, see NSEC) - RFC 2535
    NXT = 30,
    /// Server selection - RFC 2782
    SRV = 33,
    /// Naming authority pointer - RFC 3403
    NAPTR = 35,
    /// Key exchange - RFC 2230
    KX = 36,
    /// Certificate - RFC 4398
    CERT = 37,
    /// IPv6 address with prefix chaining (historic) - RFC 2874
    A6 = 38,
    /// Delegation name - RFC 6672
    DNAME = 39,
    /// EDNS(0) option pseudo-record - RFC 6891
    OPT = 41,
    /// Address prefix list - RFC 3123
    APL = 42,

    // =========================================================================
    // DNSSEC Record Types
    // =========================================================================
    /// Delegation signer - RFC 4034
    DS = 43,
    /// SSH key fingerprint - RFC 4255
    SSHFP = 44,
    /// IPsec key - RFC 4025
    IPSECKEY = 45,
    /// DNSSEC signature - RFC 4034
    RRSIG = 46,
    /// Next secure record - RFC 4034
    NSEC = 47,
    /// DNSSEC public key - RFC 4034
    DNSKEY = 48,
    /// DHCP identifier - RFC 4701
    DHCID = 49,
    /// Next secure record v3 - RFC 5155
    NSEC3 = 50,
    /// NSEC3 parameters - RFC 5155
    NSEC3PARAM = 51,
    /// TLS certificate association - RFC 6698
    TLSA = 52,
    /// Child DS - RFC 7344
    CDS = 59,
    /// Child DNSKEY - RFC 7344
    CDNSKEY = 60,

    // =========================================================================
    // Service Binding
    // =========================================================================
    /// Service binding - RFC 9460
    SVCB = 64,
    /// HTTPS service binding - RFC 9460
    HTTPS = 65,
    /// Sender policy framework (deprecated) - RFC 7208
    SPF = 99,

    // =========================================================================
    // Query Types (QTYPEs)
    // =========================================================================
    /// Transaction key - RFC 2930
    TKEY = 249,
    /// Transaction signature - RFC 8945
    TSIG = 250,
    /// Incremental zone transfer - RFC 1995
    IXFR = 251,
    /// Full zone transfer - RFC 5936
    AXFR = 252,
    /// Mailbox-related records - RFC 1035
    MAILB = 253,
    /// All records - RFC 1035
    ANY = 255,
    /// Uniform resource identifier - RFC 7553
    URI = 256,
    /// Certification authority authorization - RFC 8659
    CAA = 257,
}

impl RecordType {
    /// Returns the numeric value of the record type.
    #[inline]
    pub const fn to_u16(self) -> u16 {
        self as u16
    }

    /// Creates a record type from its numeric value.
    #[inline]
    pub fn from_u16(value: u16) -> Option<Self> {
        Self::try_from(value).ok()
    }

    /// Returns true if this is a meta query type.
    #[inline]
    pub const fn is_query_type(self) -> bool {
        matches!(
            self,
            Self::AXFR | Self::IXFR | Self::ANY | Self::MAILB | Self::TKEY | Self::TSIG
        )
    }

    /// Returns true if records of this type may be cached.
    #[inline]
    pub const fn is_cacheable(self) -> bool {
        !self.is_query_type() && !matches!(self, Self::OPT)
    }

    /// Returns the mnemonic of the record type.
    pub const fn name(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::NS => "NS",
            Self::CNAME => "CNAME",
            Self::SOA => "SOA",
            Self::MB => "MB",
            Self::MG => "MG",
            Self::MR => "MR",
            Self::NULL => "NULL",
            Self::WKS => "WKS",
            Self::PTR => "PTR",
            Self::HINFO => "HINFO",
            Self::MINFO => "MINFO",
            Self::MX => "MX",
            Self::TXT => "TXT",
            Self::RP => "RP",
            Self::AFSDB => "AFSDB",
            Self::SIG => "SIG",
            Self::KEY => "KEY",
            Self::AAAA => "AAAA",
            Self::LOC => "LOC",
            Self::NXT => "NXT",
            Self::SRV => "SRV",
            Self::NAPTR => "NAPTR",
            Self::KX => "KX",
            Self::CERT => "CERT",
            Self::A6 => "A6",
            Self::DNAME => "DNAME",
            Self::OPT => "OPT",
            Self::APL => "APL",
            Self::DS => "DS",
            Self::SSHFP => "SSHFP",
            Self::IPSECKEY => "IPSECKEY",
            Self::RRSIG => "RRSIG",
            Self::NSEC => "NSEC",
            Self::DNSKEY => "DNSKEY",
            Self::DHCID => "DHCID",
            Self::NSEC3 => "NSEC3",
            Self::NSEC3PARAM => "NSEC3PARAM",
            Self::TLSA => "TLSA",
            Self::CDS => "CDS",
            Self::CDNSKEY => "CDNSKEY",
            Self::SVCB => "SVCB",
            Self::HTTPS => "HTTPS",
            Self::SPF => "SPF",
            Self::TKEY => "TKEY",
            Self::TSIG => "TSIG",
            Self::IXFR => "IXFR",
            Self::AXFR => "AXFR",
            Self::MAILB => "MAILB",
            Self::ANY => "ANY",
            Self::URI => "URI",
            Self::CAA => "CAA",
        }
    }

    /// Looks up a record type by mnemonic, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.name().eq_ignore_ascii_case(name))
    }

    /// Every known record type, in numeric order.
    pub const ALL: &'static [RecordType] = &[
        Self::A,
        Self::NS,
        Self::CNAME,
        Self::SOA,
        Self::MB,
        Self::MG,
        Self::MR,
        Self::NULL,
        Self::WKS,
        Self::PTR,
        Self::HINFO,
        Self::MINFO,
        Self::MX,
        Self::TXT,
        Self::RP,
        Self::AFSDB,
        Self::SIG,
        Self::KEY,
        Self::AAAA,
        Self::LOC,
        Self::NXT,
        Self::SRV,
        Self::NAPTR,
        Self::KX,
        Self::CERT,
        Self::A6,
        Self::DNAME,
        Self::OPT,
        Self::APL,
        Self::DS,
        Self::SSHFP,
        Self::IPSECKEY,
        Self::RRSIG,
        Self::NSEC,
        Self::DNSKEY,
        Self::DHCID,
        Self::NSEC3,
        Self::NSEC3PARAM,
        Self::TLSA,
        Self::CDS,
        Self::CDNSKEY,
        Self::SVCB,
        Self::HTTPS,
        Self::SPF,
        Self::TKEY,
        Self::TSIG,
        Self::IXFR,
        Self::AXFR,
        Self::MAILB,
        Self::ANY,
        Self::URI,
        Self::CAA,
    ];
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Default for RecordType {
    fn default() -> Self {
        Self::A
    }
}

/// A type value that can represent both standard types and unknown values.
///
/// Unknown types are presented as `TYPEnnn` per RFC 3597.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Type {
    /// A known, standard record type.
    Known(RecordType),
    /// An unknown type value.
    Unknown(u16),
}

impl Type {
    /// Creates a type from a u16 value.
    #[inline]
    pub fn from_u16(value: u16) -> Self {
        RecordType::from_u16(value)
            .map(Self::Known)
            .unwrap_or(Self::Unknown(value))
    }

    /// Returns the numeric value.
    #[inline]
    pub const fn to_u16(self) -> u16 {
        match self {
            Self::Known(t) => t.to_u16(),
            Self::Unknown(v) => v,
        }
    }

    /// Returns the standard type if known.
    #[inline]
    pub const fn as_known(self) -> Option<RecordType> {
        match self {
            Self::Known(t) => Some(t),
            Self::Unknown(_) => None,
        }
    }

    /// Returns true if this type is `t`.
    #[inline]
    pub fn is(self, t: RecordType) -> bool {
        self.as_known() == Some(t)
    }

    /// Returns true if this is a CNAME record type.
    #[inline]
    pub fn is_cname(self) -> bool {
        self.is(RecordType::CNAME)
    }

    /// Returns true if this is the ANY meta type.
    #[inline]
    pub fn is_any(self) -> bool {
        self.is(RecordType::ANY)
    }
}

impl From<RecordType> for Type {
    fn from(t: RecordType) -> Self {
        Self::Known(t)
    }
}

impl From<u16> for Type {
    fn from(value: u16) -> Self {
        Self::from_u16(value)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(t) => write!(f, "{t}"),
            Self::Unknown(v) => write!(f, "TYPE{v}"),
        }
    }
}

impl FromStr for Type {
    type Err = Error;

    /// Parses a mnemonic (`AAAA`, `a6`) or the generic `TYPEnnn` form.
    fn from_str(s: &str) -> Result<Self> {
        if let Some(t) = RecordType::from_name(s) {
            return Ok(Self::Known(t));
        }
        s.get(..4)
            .filter(|prefix| prefix.eq_ignore_ascii_case("TYPE"))
            .and_then(|_| s[4..].parse::<u16>().ok())
            .map(Self::from_u16)
            .ok_or_else(|| Error::unknown_mnemonic("type", s))
    }
}

impl Default for Type {
    fn default() -> Self {
        Self::Known(RecordType::A)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rtype_values() {
        assert_eq!(RecordType::A.to_u16(), 1);
        assert_eq!(RecordType::AAAA.to_u16(), 28);
        assert_eq!(RecordType::A6.to_u16(), 38);
        assert_eq!(RecordType::ANY.to_u16(), 255);
    }

    #[test]
    fn test_rtype_from_u16() {
        assert_eq!(RecordType::from_u16(25), Some(RecordType::KEY));
        assert_eq!(RecordType::from_u16(65535), None);
    }

    #[test]
    fn test_query_types() {
        assert!(RecordType::ANY.is_query_type());
        assert!(!RecordType::A.is_query_type());
        assert!(!RecordType::OPT.is_cacheable());
    }

    #[test]
    fn test_generic_type() {
        let t = Type::from_u16(65534);
        assert_eq!(t.as_known(), None);
        assert_eq!(t.to_string(), "TYPE65534");
        assert!(Type::from(RecordType::CNAME).is_cname());
    }

    #[test]
    fn test_type_from_str() {
        assert_eq!("aaaa".parse::<Type>().unwrap(), Type::Known(RecordType::AAAA));
        assert_eq!("KEY".parse::<Type>().unwrap(), Type::Known(RecordType::KEY));
        assert_eq!("A6".parse::<Type>().unwrap(), Type::Known(RecordType::A6));
        assert_eq!("TYPE1".parse::<Type>().unwrap(), Type::Known(RecordType::A));
        assert_eq!("type999".parse::<Type>().unwrap(), Type::Unknown(999));
        assert!("BOGUS".parse::<Type>().is_err());
    }
}
