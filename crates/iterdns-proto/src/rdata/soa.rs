//! SOA record data.

use crate::error::{Error, Result};
use crate::name::Name;
use crate::wire::WireReader;
use bytes::BytesMut;
use std::fmt;
use std::str::FromStr;

/// SOA record - Start of Authority (RFC 1035).
///
/// # Wire Format
///
/// ```text
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// /                     MNAME                     /
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// /                     RNAME                     /
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |                    SERIAL                     |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |                    REFRESH                    |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |                     RETRY                     |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |                    EXPIRE                     |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |                    MINIMUM                    |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Soa {
    mname: Name,
    rname: Name,
    serial: u32,
    refresh: u32,
    retry: u32,
    expire: u32,
    minimum: u32,
}

impl Soa {
    /// Creates a new SOA record.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        mname: Name,
        rname: Name,
        serial: u32,
        refresh: u32,
        retry: u32,
        expire: u32,
        minimum: u32,
    ) -> Self {
        Self {
            mname,
            rname,
            serial,
            refresh,
            retry,
            expire,
            minimum,
        }
    }

    /// Returns the primary name server.
    #[inline]
    pub fn mname(&self) -> &Name {
        &self.mname
    }

    /// Returns the responsible mailbox.
    #[inline]
    pub fn rname(&self) -> &Name {
        &self.rname
    }

    /// Returns the zone serial number.
    #[inline]
    pub const fn serial(&self) -> u32 {
        self.serial
    }

    /// Returns the negative caching TTL (RFC 2308).
    #[inline]
    pub const fn minimum(&self) -> u32 {
        self.minimum
    }

    pub(crate) fn read(reader: &mut WireReader<'_>) -> Result<Self> {
        Ok(Self {
            mname: reader.read_name()?,
            rname: reader.read_name()?,
            serial: reader.read_u32()?,
            refresh: reader.read_u32()?,
            retry: reader.read_u32()?,
            expire: reader.read_u32()?,
            minimum: reader.read_u32()?,
        })
    }

    pub(crate) fn from_fields(fields: &[&str]) -> Result<Self> {
        let [mname, rname, numbers @ ..] = fields else {
            return Err(Error::invalid_rdata("SOA", "expected 7 fields"));
        };
        let numbers: Vec<u32> = numbers
            .iter()
            .map(|n| n.parse::<u32>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|_| Error::invalid_rdata("SOA", "bad numeric field"))?;
        let &[serial, refresh, retry, expire, minimum] = numbers.as_slice() else {
            return Err(Error::invalid_rdata("SOA", "expected 7 fields"));
        };

        Ok(Self::new(
            Name::from_str(mname)?,
            Name::from_str(rname)?,
            serial,
            refresh,
            retry,
            expire,
            minimum,
        ))
    }

    pub(crate) fn wire_len(&self) -> usize {
        self.mname.wire_len() + self.rname.wire_len() + 20
    }

    pub(crate) fn write_to(&self, buf: &mut BytesMut) {
        self.mname.write_wire(buf);
        self.rname.write_wire(buf);
        for value in [
            self.serial,
            self.refresh,
            self.retry,
            self.expire,
            self.minimum,
        ] {
            buf.extend_from_slice(&value.to_be_bytes());
        }
    }
}

impl fmt::Display for Soa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {} {}",
            self.mname,
            self.rname,
            self.serial,
            self.refresh,
            self.retry,
            self.expire,
            self.minimum
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_soa_fields() {
        let fields = ["ns.example.", "hostmaster.example.", "1", "2", "3", "4", "5"];
        let soa = Soa::from_fields(&fields).unwrap();
        assert_eq!(soa.serial(), 1);
        assert_eq!(soa.minimum(), 5);
        assert_eq!(soa.to_string(), "ns.example. hostmaster.example. 1 2 3 4 5");

        assert!(Soa::from_fields(&fields[..6]).is_err());
    }
}
