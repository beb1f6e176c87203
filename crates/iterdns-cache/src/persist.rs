//! Binary cache persistence.
//!
//! # Format
//!
//! ```text
//! magic "IDNS" | version u8
//! row*:
//!   name_len u8 | name (uncompressed wire) | class u16 | type_count u16
//!   type*:
//!     type u16 | entry_count u8
//!     entry*:
//!       rcode u8 | ttl u32 | msglen u16 | trust u8 | rdata_count u16
//!       rdata*: len u16 | rdata (uncompressed wire)
//! ```
//!
//! All integers are big-endian. Provenance and refresh times are not
//! stored: loaded entries are [`ResponseKind::Unknown`] and count as
//! expired until refreshed.

use crate::entry::{CacheEntry, EntryId, ResponseKind};
use crate::error::{CacheError, Result};
use crate::key::CacheKey;
use crate::trust::Trust;
use crate::RrCache;
use iterdns_proto::wire::{WireReader, WireWriter};
use iterdns_proto::{Class, Name, RData, ResponseCode, Type};
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// Magic bytes at the start of a binary dump.
pub const MAGIC: &[u8; 4] = b"IDNS";

/// Current binary format version.
pub const FORMAT_VERSION: u8 = 1;

impl RrCache {
    /// Writes the binary form of the cache.
    pub fn serialize<W: Write>(&self, writer: &mut W) -> Result<()> {
        let mut out = WireWriter::new(4096);
        out.write_bytes(MAGIC);
        out.write_u8(FORMAT_VERSION);

        for (key, buckets) in self.sorted_rows() {
            let buckets: Vec<_> = buckets
                .into_iter()
                .filter(|(_, entries)| !entries.is_empty())
                .collect();
            if buckets.is_empty() {
                continue;
            }

            out.write_u8(key.name().wire_len() as u8);
            out.write_name(key.name());
            out.write_u16(key.rclass().to_u16());
            out.write_u16(buckets.len() as u16);

            for (rtype, entries) in buckets {
                out.write_u16(rtype.to_u16());
                out.write_u8(entries.len() as u8);
                for entry in entries {
                    write_entry(&mut out, entry);
                }
            }
        }

        writer.write_all(out.as_bytes())?;
        Ok(())
    }

    /// Loads a binary dump into the cache.
    ///
    /// Loaded rows replace any rows with the same name and class. Entries
    /// get fresh ids and no refresh time.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let data = fs::read(path)?;
        let rows = self.deserialize(&data)?;
        debug!(path = %path.display(), rows, "Loaded cache");
        Ok(())
    }

    /// Loads the binary form from memory, returning the number of rows read.
    pub fn deserialize(&mut self, data: &[u8]) -> Result<usize> {
        let mut reader = WireReader::new(data);

        let magic = reader.read_bytes(MAGIC.len()).map_err(|_| bad_magic())?;
        if magic != MAGIC {
            return Err(bad_magic());
        }
        let version = reader.read_u8()?;
        if version != FORMAT_VERSION {
            return Err(CacheError::UnsupportedVersion { found: version });
        }

        let mut rows = 0;
        while !reader.is_empty() {
            self.read_row(&mut reader)?;
            rows += 1;
        }
        Ok(rows)
    }

    fn read_row(&mut self, reader: &mut WireReader<'_>) -> Result<()> {
        let offset = reader.position();
        let name_len = usize::from(reader.read_u8()?);
        let name = Name::from_slice(reader.read_bytes(name_len)?)?;
        let rclass = Class::from_u16(reader.read_u16()?);
        let type_count = reader.read_u16()?;
        if type_count == 0 {
            return Err(CacheError::deserialization(
                offset,
                format!("row {name} has no types"),
            ));
        }

        let key = CacheKey::new(name, rclass);
        self.table.remove(&key);

        for _ in 0..type_count {
            let rtype = Type::from_u16(reader.read_u16()?);
            let entry_count = reader.read_u8()?;
            for _ in 0..entry_count {
                let entry = read_entry(reader, rtype)?;
                let id = self.allocate(entry);
                self.attach(key.clone(), rtype, id);
            }
        }
        Ok(())
    }
}

fn bad_magic() -> CacheError {
    CacheError::deserialization(0, "missing IDNS magic")
}

fn write_entry(out: &mut WireWriter, entry: &CacheEntry) {
    out.write_u8(entry.rcode().to_u8());
    out.write_u32(entry.ttl());
    out.write_u16(entry.msglen());
    out.write_u8(entry.trust().to_u8());
    out.write_u16(entry.rdata().len() as u16);
    for rdata in entry.rdata() {
        let wire = rdata.to_wire();
        out.write_u16(wire.len() as u16);
        out.write_bytes(&wire);
    }
}

fn read_entry(reader: &mut WireReader<'_>, rtype: Type) -> Result<CacheEntry> {
    let offset = reader.position();
    let rcode = reader.read_u8()?;
    let rcode = ResponseCode::from_u8(rcode)
        .ok_or_else(|| CacheError::deserialization(offset, format!("bad rcode {rcode}")))?;
    let ttl = reader.read_u32()?;
    let msglen = reader.read_u16()?;

    let offset = reader.position();
    let trust = reader.read_u8()?;
    let trust = Trust::from_u8(trust)
        .ok_or_else(|| CacheError::deserialization(offset, format!("bad trust {trust}")))?;

    let count = reader.read_u16()?;
    let mut rdata = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        let len = usize::from(reader.read_u16()?);
        rdata.push(RData::from_wire(rtype, reader.read_bytes(len)?)?);
    }

    Ok(CacheEntry {
        ttl,
        rdata,
        trust,
        msglen,
        rcode,
        resp_kind: ResponseKind::Unknown,
        id: EntryId(0),
        last_updated: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hints::install_root_hints;
    use crate::{FindOptions, ResponseInfo};
    use iterdns_proto::{RRset, RecordClass, RecordType};
    use std::collections::BTreeSet;
    use std::net::Ipv4Addr;
    use std::str::FromStr;

    fn name(s: &str) -> Name {
        Name::from_str(s).unwrap()
    }

    /// Every (name, class, type) with its (trust, ttl, rcode, rdata) tuples.
    fn contents(cache: &RrCache) -> BTreeSet<(String, u16, u16, u8, u32, u8, Vec<Vec<u8>>)> {
        cache
            .sorted_rows()
            .into_iter()
            .flat_map(|(key, buckets)| {
                buckets.into_iter().flat_map(move |(rtype, entries)| {
                    entries.into_iter().map(move |e| {
                        (
                            key.name().to_string().to_ascii_lowercase(),
                            key.rclass().to_u16(),
                            rtype.to_u16(),
                            e.trust().to_u8(),
                            e.ttl(),
                            e.rcode().to_u8(),
                            e.rdata().iter().map(|r| r.to_wire().to_vec()).collect(),
                        )
                    })
                })
            })
            .collect()
    }

    fn sample_cache() -> RrCache {
        let mut cache = RrCache::new();
        install_root_hints(&mut cache).unwrap();

        let info = ResponseInfo::new(200, ResponseKind::Answer);
        let owner = name("www.example.com");
        let a = RRset::with_rdatas(
            owner.clone(),
            RecordType::A,
            RecordClass::IN,
            300,
            vec![RData::A(Ipv4Addr::new(192, 0, 2, 1))],
        );
        cache.add(&a, Trust::Answer, info, ResponseCode::NoError);
        cache.add(&a, Trust::Glue, info, ResponseCode::NoError);
        cache.add(
            &RRset::new(owner, RecordType::MX, RecordClass::IN, 3600),
            Trust::Answer,
            ResponseInfo::default(),
            ResponseCode::NXRRSet,
        );
        cache.add(
            &RRset::new(name("gone.example.com"), RecordType::A, RecordClass::IN, 900),
            Trust::Answer,
            ResponseInfo::default(),
            ResponseCode::NXDomain,
        );
        cache
    }

    #[test]
    fn test_binary_dump_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.bin");

        let cache = sample_cache();
        cache.dump(&path, true).unwrap();

        let mut loaded = RrCache::new();
        loaded.load(&path).unwrap();

        assert_eq!(loaded.len(), cache.len());
        assert_eq!(contents(&loaded), contents(&cache));

        let result = loaded.find(
            &name("gone.example.com"),
            RecordClass::IN,
            RecordType::TXT,
            FindOptions::ALLOW_NEGATIVE,
            None,
        );
        assert_eq!(result.rcode, Some(ResponseCode::NXDomain));
    }

    #[test]
    fn test_loaded_entries_need_refresh() {
        let mut bytes = Vec::new();
        sample_cache().serialize(&mut bytes).unwrap();

        let mut loaded = RrCache::new();
        loaded.deserialize(&bytes).unwrap();

        let result = loaded.find(
            &name("www.example.com"),
            RecordClass::IN,
            RecordType::A,
            FindOptions::empty(),
            None,
        );
        let id = result.id.unwrap();
        let entry = loaded.get(id).unwrap();
        assert_eq!(entry.resp_kind(), ResponseKind::Unknown);
        assert!(entry.is_expired(0.0));
        assert!(loaded.update(id, 10.0).unwrap());
    }

    #[test]
    fn test_rejects_bad_header() {
        let mut cache = RrCache::new();
        assert!(matches!(
            cache.deserialize(b"XXXX\x01"),
            Err(CacheError::Deserialization { offset: 0, .. })
        ));
        assert!(matches!(
            cache.deserialize(b"IDNS\x07"),
            Err(CacheError::UnsupportedVersion { found: 7 })
        ));
        assert_eq!(cache.deserialize(b"IDNS\x01").unwrap(), 0);
    }

    #[test]
    fn test_rejects_empty_row() {
        let mut data = b"IDNS\x01".to_vec();
        data.extend_from_slice(&[1, 0]);
        data.extend_from_slice(&1u16.to_be_bytes());
        data.extend_from_slice(&0u16.to_be_bytes());

        let mut cache = RrCache::new();
        assert!(matches!(
            cache.deserialize(&data),
            Err(CacheError::Deserialization { offset: 5, .. })
        ));
    }

    #[test]
    fn test_truncated_dump() {
        let mut bytes = Vec::new();
        sample_cache().serialize(&mut bytes).unwrap();
        bytes.truncate(bytes.len() - 3);

        let mut cache = RrCache::new();
        assert!(cache.deserialize(&bytes).is_err());
    }
}
