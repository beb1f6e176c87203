//! DNS resource records and record sets.
//!
//! A resource record (RR) is the fundamental unit of DNS data, containing a
//! name, type, class, TTL and record-specific data. The resolver and cache
//! work on [`RRset`]s: all records sharing a name, type and class.

use crate::class::Class;
use crate::error::Result;
use crate::name::Name;
use crate::rdata::RData;
use crate::rtype::Type;
use crate::wire::WireReader;
use bytes::BytesMut;
use std::fmt;

/// A DNS resource record.
///
/// # Wire Format
///
/// ```text
///                                 1  1  1  1  1  1
///   0  1  2  3  4  5  6  7  8  9  0  1  2  3  4  5
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// /                      NAME                     /
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |                      TYPE                     |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |                     CLASS                     |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |                      TTL                      |
/// |                                               |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |                   RDLENGTH                    |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// /                     RDATA                     /
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceRecord {
    name: Name,
    rtype: Type,
    rclass: Class,
    ttl: u32,
    rdata: RData,
}

impl ResourceRecord {
    /// Creates a new resource record.
    pub fn new(name: Name, rtype: Type, rclass: Class, ttl: u32, rdata: RData) -> Self {
        Self {
            name,
            rtype,
            rclass,
            ttl,
            rdata,
        }
    }

    /// Returns the record name.
    #[inline]
    pub fn name(&self) -> &Name {
        &self.name
    }

    /// Returns the record type.
    #[inline]
    pub fn rtype(&self) -> Type {
        self.rtype
    }

    /// Returns the record class.
    #[inline]
    pub fn rclass(&self) -> Class {
        self.rclass
    }

    /// Returns the TTL in seconds.
    #[inline]
    pub const fn ttl(&self) -> u32 {
        self.ttl
    }

    /// Returns the record data.
    #[inline]
    pub fn rdata(&self) -> &RData {
        &self.rdata
    }

    /// Reads a resource record at the reader's position.
    pub fn read(reader: &mut WireReader<'_>) -> Result<Self> {
        let name = reader.read_name()?;
        let rtype = Type::from_u16(reader.read_u16()?);
        let rclass = Class::from_u16(reader.read_u16()?);
        let ttl = reader.read_u32()?;
        let rdlength = reader.read_u16()?;

        let offset = reader.position();
        let rdata = RData::parse(rtype, reader.data(), offset, rdlength)?;
        reader.advance(usize::from(rdlength))?;

        Ok(Self {
            name,
            rtype,
            rclass,
            ttl,
            rdata,
        })
    }

    /// Returns the wire format length.
    pub fn wire_len(&self) -> usize {
        self.name.wire_len() + 10 + self.rdata.wire_len()
    }

    /// Writes the resource record to wire format.
    pub fn write_to(&self, buf: &mut BytesMut) {
        self.name.write_wire(buf);
        buf.extend_from_slice(&self.rtype.to_u16().to_be_bytes());
        buf.extend_from_slice(&self.rclass.to_u16().to_be_bytes());
        buf.extend_from_slice(&self.ttl.to_be_bytes());

        let rdlength = self.rdata.wire_len() as u16;
        buf.extend_from_slice(&rdlength.to_be_bytes());
        self.rdata.write_to(buf);
    }
}

impl fmt::Display for ResourceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {}",
            self.name, self.ttl, self.rclass, self.rtype, self.rdata
        )
    }
}

/// Parser for resource record sections.
#[derive(Debug)]
pub struct RecordParser<'a, 'r> {
    reader: &'r mut WireReader<'a>,
    remaining: u16,
}

impl<'a, 'r> RecordParser<'a, 'r> {
    /// Creates a parser for `count` records at the reader's position.
    #[inline]
    pub fn new(reader: &'r mut WireReader<'a>, count: u16) -> Self {
        Self {
            reader,
            remaining: count,
        }
    }

    /// Returns the number of remaining records.
    #[inline]
    pub const fn remaining(&self) -> u16 {
        self.remaining
    }

    /// Parses the next record.
    pub fn next_record(&mut self) -> Result<Option<ResourceRecord>> {
        if self.remaining == 0 {
            return Ok(None);
        }

        let record = ResourceRecord::read(self.reader)?;
        self.remaining -= 1;
        Ok(Some(record))
    }

    /// Collects all remaining records into a vector.
    pub fn collect_all(&mut self) -> Result<Vec<ResourceRecord>> {
        let mut records = Vec::with_capacity(self.remaining as usize);
        while let Some(r) = self.next_record()? {
            records.push(r);
        }
        Ok(records)
    }
}

/// An RRset: the records sharing a name, type and class.
///
/// The set carries a single TTL, the minimum of its members' TTLs
/// (RFC 2181 section 5.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RRset {
    name: Name,
    rtype: Type,
    rclass: Class,
    ttl: u32,
    rdatas: Vec<RData>,
}

impl RRset {
    /// Creates an empty RRset.
    pub fn new(name: Name, rtype: impl Into<Type>, rclass: impl Into<Class>, ttl: u32) -> Self {
        Self {
            name,
            rtype: rtype.into(),
            rclass: rclass.into(),
            ttl,
            rdatas: Vec::new(),
        }
    }

    /// Creates an RRset holding the given record data.
    pub fn with_rdatas(
        name: Name,
        rtype: impl Into<Type>,
        rclass: impl Into<Class>,
        ttl: u32,
        rdatas: Vec<RData>,
    ) -> Self {
        let mut rrset = Self::new(name, rtype, rclass, ttl);
        rrset.rdatas = rdatas;
        rrset
    }

    /// Returns the owner name.
    #[inline]
    pub fn name(&self) -> &Name {
        &self.name
    }

    /// Returns the record type.
    #[inline]
    pub fn rtype(&self) -> Type {
        self.rtype
    }

    /// Returns the record class.
    #[inline]
    pub fn rclass(&self) -> Class {
        self.rclass
    }

    /// Returns the TTL in seconds.
    #[inline]
    pub const fn ttl(&self) -> u32 {
        self.ttl
    }

    /// Sets the TTL.
    #[inline]
    pub fn set_ttl(&mut self, ttl: u32) {
        self.ttl = ttl;
    }

    /// Returns the record data.
    #[inline]
    pub fn rdatas(&self) -> &[RData] {
        &self.rdatas
    }

    /// Returns the number of records.
    #[inline]
    pub fn len(&self) -> usize {
        self.rdatas.len()
    }

    /// Returns true if the set holds no records.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rdatas.is_empty()
    }

    /// Returns true if `record` belongs to this set.
    pub fn matches(&self, record: &ResourceRecord) -> bool {
        self.rtype == record.rtype() && self.rclass == record.rclass() && self.name == *record.name()
    }

    /// Adds a record's data, lowering the set TTL if needed.
    ///
    /// Duplicate data is ignored.
    pub fn push(&mut self, record: ResourceRecord) {
        self.ttl = self.ttl.min(record.ttl);
        if !self.rdatas.contains(&record.rdata) {
            self.rdatas.push(record.rdata);
        }
    }

    /// Groups records into RRsets, keeping the order of first appearance.
    pub fn group(records: Vec<ResourceRecord>) -> Vec<RRset> {
        let mut sets: Vec<RRset> = Vec::new();
        for record in records {
            match sets.iter_mut().find(|set| set.matches(&record)) {
                Some(set) => set.push(record),
                None => {
                    let mut set = RRset::new(
                        record.name.clone(),
                        record.rtype,
                        record.rclass,
                        record.ttl,
                    );
                    set.push(record);
                    sets.push(set);
                }
            }
        }
        sets
    }

    /// Returns the individual records of the set.
    pub fn records(&self) -> impl Iterator<Item = ResourceRecord> + '_ {
        self.rdatas.iter().map(|rdata| {
            ResourceRecord::new(
                self.name.clone(),
                self.rtype,
                self.rclass,
                self.ttl,
                rdata.clone(),
            )
        })
    }
}

impl fmt::Display for RRset {
    /// One presentation line per record.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, record) in self.records().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{record}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rtype::RecordType;
    use std::net::Ipv4Addr;
    use std::str::FromStr;

    fn a_record(name: &str, ttl: u32, last_octet: u8) -> ResourceRecord {
        ResourceRecord::new(
            Name::from_str(name).unwrap(),
            RecordType::A.into(),
            Class::IN,
            ttl,
            RData::A(Ipv4Addr::new(192, 0, 2, last_octet)),
        )
    }

    #[test]
    fn test_record_wire() {
        let record = a_record("www.example.com", 300, 1);
        let mut buf = BytesMut::new();
        record.write_to(&mut buf);
        assert_eq!(buf.len(), record.wire_len());

        let mut reader = WireReader::new(&buf);
        assert_eq!(ResourceRecord::read(&mut reader).unwrap(), record);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_truncated_record() {
        let record = a_record("example.com", 300, 1);
        let mut buf = BytesMut::new();
        record.write_to(&mut buf);

        let mut reader = WireReader::new(&buf[..buf.len() - 1]);
        assert!(ResourceRecord::read(&mut reader).is_err());
    }

    #[test]
    fn test_group_into_rrsets() {
        let records = vec![
            a_record("a.example", 300, 1),
            a_record("b.example", 300, 2),
            a_record("A.example", 60, 3),
            a_record("a.example", 300, 1),
        ];

        let sets = RRset::group(records);
        assert_eq!(sets.len(), 2);
        assert_eq!(sets[0].len(), 2);
        assert_eq!(sets[0].ttl(), 60);
        assert_eq!(sets[1].name(), &Name::from_str("b.example").unwrap());
    }

    #[test]
    fn test_rrset_display() {
        let sets = RRset::group(vec![a_record("a.example", 300, 1), a_record("a.example", 300, 2)]);
        assert_eq!(
            sets[0].to_string(),
            "a.example. 300 IN A 192.0.2.1\na.example. 300 IN A 192.0.2.2"
        );
    }
}
