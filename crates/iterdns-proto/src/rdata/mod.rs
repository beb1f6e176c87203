//! DNS record data (RDATA).
//!
//! The resolver needs structured access to a handful of types: addresses
//! for server selection, names for delegations and aliases, the SOA for
//! negative caching. Those are parsed into typed variants. Everything else
//! is kept as opaque bytes and presented in the RFC 3597 `\# len hex` form.
//!
//! Names embedded in RDATA are decompressed while parsing, so the wire form
//! produced by [`RData::write_to`] is self-contained and safe to persist.

mod soa;
mod text;

pub use soa::Soa;
pub use text::{parse_character_strings, CharacterStrings};

use crate::error::{Error, Result};
use crate::name::Name;
use crate::rtype::{RecordType, Type};
use crate::wire::WireReader;
use bytes::{Bytes, BytesMut};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// DNS record data.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RData {
    // =========================================================================
    // Address Records
    // =========================================================================
    /// IPv4 address (A record)
    A(Ipv4Addr),

    /// IPv6 address (AAAA record)
    AAAA(Ipv6Addr),

    // =========================================================================
    // Name Records
    // =========================================================================
    /// Name server (NS record)
    NS(Name),

    /// Canonical name (CNAME record)
    CNAME(Name),

    /// Pointer (PTR record)
    PTR(Name),

    /// Delegation name (DNAME record)
    DNAME(Name),

    /// Mail exchange (MX record)
    MX {
        /// Preference, lower is preferred.
        preference: u16,
        /// Host willing to act as exchange.
        exchange: Name,
    },

    // =========================================================================
    // Authority Records
    // =========================================================================
    /// Start of authority (SOA record)
    SOA(Soa),

    // =========================================================================
    // Text Records
    // =========================================================================
    /// Text (TXT record)
    TXT(CharacterStrings),

    // =========================================================================
    // Other
    // =========================================================================
    /// Any other type, preserved as raw bytes
    Unknown {
        /// The record type.
        rtype: Type,
        /// Uninterpreted RDATA.
        data: Bytes,
    },
}

impl RData {
    /// Parses RDATA from a message.
    ///
    /// `message` is the complete message so compression pointers inside the
    /// RDATA can be followed; `offset` and `rdlength` locate the RDATA.
    pub fn parse(rtype: Type, message: &[u8], offset: usize, rdlength: u16) -> Result<Self> {
        let end = offset + usize::from(rdlength);
        let slice = message
            .get(offset..end)
            .ok_or_else(|| Error::buffer_too_short(end, message.len()))?;

        let mut reader = WireReader::new(message);
        reader.advance(offset)?;

        let rdata = match rtype.as_known() {
            Some(RecordType::A) => {
                let octets: [u8; 4] = slice
                    .try_into()
                    .map_err(|_| Error::invalid_rdata("A", format!("length {}", slice.len())))?;
                return Ok(RData::A(Ipv4Addr::from(octets)));
            }
            Some(RecordType::AAAA) => {
                let octets: [u8; 16] = slice
                    .try_into()
                    .map_err(|_| Error::invalid_rdata("AAAA", format!("length {}", slice.len())))?;
                return Ok(RData::AAAA(Ipv6Addr::from(octets)));
            }
            Some(RecordType::NS) => RData::NS(reader.read_name()?),
            Some(RecordType::CNAME) => RData::CNAME(reader.read_name()?),
            Some(RecordType::PTR) => RData::PTR(reader.read_name()?),
            Some(RecordType::DNAME) => RData::DNAME(reader.read_name()?),
            Some(RecordType::MX) => RData::MX {
                preference: reader.read_u16()?,
                exchange: reader.read_name()?,
            },
            Some(RecordType::SOA) => RData::SOA(Soa::read(&mut reader)?),
            Some(RecordType::TXT) => return Ok(RData::TXT(CharacterStrings::parse(slice)?)),
            _ => {
                return Ok(RData::Unknown {
                    rtype,
                    data: Bytes::copy_from_slice(slice),
                })
            }
        };

        if reader.position() != end {
            return Err(Error::invalid_rdata(
                rtype.to_string(),
                format!(
                    "consumed {} of {} bytes",
                    reader.position().saturating_sub(offset),
                    rdlength
                ),
            ));
        }
        Ok(rdata)
    }

    /// Parses self-contained (uncompressed) RDATA.
    pub fn from_wire(rtype: Type, data: &[u8]) -> Result<Self> {
        let rdlength = u16::try_from(data.len())
            .map_err(|_| Error::invalid_rdata(rtype.to_string(), "longer than 65535 bytes"))?;
        Self::parse(rtype, data, 0, rdlength)
    }

    /// Parses RDATA from its presentation form.
    ///
    /// The generic `\# len hex` form is accepted for every type.
    pub fn from_text(rtype: Type, text: &str) -> Result<Self> {
        let text = text.trim();
        if let Some(generic) = text.strip_prefix("\\#") {
            let data = parse_generic(rtype, generic)?;
            return Self::from_wire(rtype, &data);
        }

        let invalid = |message: &str| Error::invalid_rdata(rtype.to_string(), message);
        let fields: Vec<&str> = text.split_whitespace().collect();

        match rtype.as_known() {
            Some(RecordType::A) => text
                .parse()
                .map(RData::A)
                .map_err(|_| invalid("bad IPv4 address")),
            Some(RecordType::AAAA) => text
                .parse()
                .map(RData::AAAA)
                .map_err(|_| invalid("bad IPv6 address")),
            Some(RecordType::NS) => Ok(RData::NS(Name::from_str(text)?)),
            Some(RecordType::CNAME) => Ok(RData::CNAME(Name::from_str(text)?)),
            Some(RecordType::PTR) => Ok(RData::PTR(Name::from_str(text)?)),
            Some(RecordType::DNAME) => Ok(RData::DNAME(Name::from_str(text)?)),
            Some(RecordType::MX) => match fields.as_slice() {
                [preference, exchange] => Ok(RData::MX {
                    preference: preference.parse().map_err(|_| invalid("bad preference"))?,
                    exchange: Name::from_str(exchange)?,
                }),
                _ => Err(invalid("expected preference and exchange")),
            },
            Some(RecordType::SOA) => Soa::from_fields(&fields).map(RData::SOA),
            Some(RecordType::TXT) => Ok(RData::TXT(parse_character_strings(text)?)),
            _ => Err(invalid("only the generic \\# form is supported")),
        }
    }

    /// Returns the record type for this RDATA.
    pub fn rtype(&self) -> Type {
        match self {
            RData::A(_) => RecordType::A.into(),
            RData::AAAA(_) => RecordType::AAAA.into(),
            RData::NS(_) => RecordType::NS.into(),
            RData::CNAME(_) => RecordType::CNAME.into(),
            RData::PTR(_) => RecordType::PTR.into(),
            RData::DNAME(_) => RecordType::DNAME.into(),
            RData::MX { .. } => RecordType::MX.into(),
            RData::SOA(_) => RecordType::SOA.into(),
            RData::TXT(_) => RecordType::TXT.into(),
            RData::Unknown { rtype, .. } => *rtype,
        }
    }

    /// Returns the wire format length of this RDATA.
    pub fn wire_len(&self) -> usize {
        match self {
            RData::A(_) => 4,
            RData::AAAA(_) => 16,
            RData::NS(n) | RData::CNAME(n) | RData::PTR(n) | RData::DNAME(n) => n.wire_len(),
            RData::MX { exchange, .. } => 2 + exchange.wire_len(),
            RData::SOA(soa) => soa.wire_len(),
            RData::TXT(txt) => txt.wire_len(),
            RData::Unknown { data, .. } => data.len(),
        }
    }

    /// Writes this RDATA to wire format, uncompressed.
    pub fn write_to(&self, buf: &mut BytesMut) {
        match self {
            RData::A(addr) => buf.extend_from_slice(&addr.octets()),
            RData::AAAA(addr) => buf.extend_from_slice(&addr.octets()),
            RData::NS(n) | RData::CNAME(n) | RData::PTR(n) | RData::DNAME(n) => n.write_wire(buf),
            RData::MX {
                preference,
                exchange,
            } => {
                buf.extend_from_slice(&preference.to_be_bytes());
                exchange.write_wire(buf);
            }
            RData::SOA(soa) => soa.write_to(buf),
            RData::TXT(txt) => txt.write_to(buf),
            RData::Unknown { data, .. } => buf.extend_from_slice(data),
        }
    }

    /// Returns the wire format as bytes.
    pub fn to_wire(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.wire_len());
        self.write_to(&mut buf);
        buf.freeze()
    }

    /// Returns the address for A and AAAA records.
    pub fn ip_addr(&self) -> Option<IpAddr> {
        match self {
            RData::A(addr) => Some(IpAddr::V4(*addr)),
            RData::AAAA(addr) => Some(IpAddr::V6(*addr)),
            _ => None,
        }
    }

    /// Returns the name an NS, CNAME, PTR or DNAME record points to.
    pub fn target_name(&self) -> Option<&Name> {
        match self {
            RData::NS(n) | RData::CNAME(n) | RData::PTR(n) | RData::DNAME(n) => Some(n),
            _ => None,
        }
    }

    /// Returns the SOA MINIMUM field (the negative caching TTL).
    pub fn soa_minimum(&self) -> Option<u32> {
        match self {
            RData::SOA(soa) => Some(soa.minimum()),
            _ => None,
        }
    }
}

/// Parses the body of a `\# len hex` generic RDATA.
fn parse_generic(rtype: Type, text: &str) -> Result<Vec<u8>> {
    let invalid = |message: String| Error::invalid_rdata(rtype.to_string(), message);

    let mut fields = text.split_whitespace();
    let len: usize = fields
        .next()
        .and_then(|f| f.parse().ok())
        .ok_or_else(|| invalid("missing generic length".to_string()))?;
    let hex: String = fields.collect();

    if hex.len() % 2 != 0 {
        return Err(invalid("odd number of hex digits".to_string()));
    }
    let data = (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16))
        .collect::<std::result::Result<Vec<u8>, _>>()
        .map_err(|_| invalid("bad hex digit".to_string()))?;

    if data.len() != len {
        return Err(invalid(format!(
            "length {len} does not match {} data bytes",
            data.len()
        )));
    }
    Ok(data)
}

impl fmt::Display for RData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RData::A(addr) => write!(f, "{addr}"),
            RData::AAAA(addr) => write!(f, "{addr}"),
            RData::NS(n) | RData::CNAME(n) | RData::PTR(n) | RData::DNAME(n) => write!(f, "{n}"),
            RData::MX {
                preference,
                exchange,
            } => write!(f, "{preference} {exchange}"),
            RData::SOA(soa) => write!(f, "{soa}"),
            RData::TXT(txt) => write!(f, "{txt}"),
            RData::Unknown { data, .. } => {
                write!(f, "\\# {}", data.len())?;
                if !data.is_empty() {
                    f.write_str(" ")?;
                    for byte in data.iter() {
                        write!(f, "{byte:02x}")?;
                    }
                }
                Ok(())
            }
        }
    }
}
