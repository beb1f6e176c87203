//! # iterdns Cache
//!
//! Trust-ranked resource record cache shared by every resolution context
//! of an iterative resolver.
//!
//! ## Structure
//!
//! - **Table**: `(name, class)` rows, each mapping a record type to a list
//!   of entries ordered by [`Trust`] (most trusted first)
//! - **Index**: every entry ever created, by [`EntryId`], so callers can
//!   refresh an entry without re-deriving its row
//!
//! ## Features
//!
//! - Ranked lookup with a trust ceiling, an exact trust or a trust floor
//! - CNAME fallback and negative (NXDOMAIN / NODATA / SERVFAIL) entries
//! - Expiry-aware refresh of traced entries
//! - Text dump and versioned binary persistence
//! - Root hints

#![warn(missing_docs)]
#![warn(clippy::all)]

use hashbrown::HashMap;
use iterdns_proto::{Class, Name, RRset, RecordType, ResponseCode, Type};

pub mod dump;
pub mod entry;
pub mod error;
pub mod hints;
pub mod key;
pub mod persist;
pub mod trust;

pub use entry::{unix_now, CacheEntry, EntryId, ResponseKind};
pub use error::{CacheError, Result};
pub use key::CacheKey;
pub use trust::{FindOptions, Trust};

/// Where an added RRset came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResponseInfo {
    /// Size of the response message, 0 if not message-derived.
    pub msglen: u16,
    /// Classification of the response.
    pub kind: ResponseKind,
}

impl ResponseInfo {
    /// Creates response info.
    pub const fn new(msglen: u16, kind: ResponseKind) -> Self {
        Self { msglen, kind }
    }
}

/// Result of [`RrCache::find`].
///
/// A miss has every field unset. A negative entry found without
/// [`FindOptions::ALLOW_NEGATIVE`] reports its rcode and id but no RRset.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FindResult {
    /// Response code recorded with the entry.
    pub rcode: Option<ResponseCode>,
    /// The cached RRset (empty for negative entries).
    pub rrset: Option<RRset>,
    /// Id of the selected entry.
    pub id: Option<EntryId>,
}

impl FindResult {
    /// Returns true if nothing usable was found.
    #[inline]
    pub fn is_miss(&self) -> bool {
        self.id.is_none()
    }
}

/// Result of [`RrCache::find_all`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FindAllResult {
    /// NXDOMAIN for a marker row, NOERROR when anything was found.
    pub rcode: Option<ResponseCode>,
    /// One RRset per type, with the id of the entry it came from.
    pub rrsets: Vec<(RRset, EntryId)>,
}

type Row = HashMap<Type, Vec<EntryId>>;

/// The resource record cache.
///
/// Entries are never removed from the index. Overwriting an entry at the
/// same trust level keeps its id; an NXDOMAIN add replaces the whole row
/// with a single marker entry, and any later non-NXDOMAIN add for the row
/// drops the marker.
#[derive(Debug, Default)]
pub struct RrCache {
    table: HashMap<CacheKey, Row>,
    index: HashMap<EntryId, CacheEntry>,
    next_id: u64,
}

impl RrCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of `(name, class)` rows.
    #[inline]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns true if the cache holds no rows.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Returns the number of entries ever created.
    #[inline]
    pub fn entry_count(&self) -> usize {
        self.index.len()
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Looks up the best entry for `(name, class, type)`.
    ///
    /// Without [`FindOptions::ALLOW_NOANSWER`] only entries at
    /// [`Trust::Answer`] or better qualify, or exactly `trust` when given.
    /// With it, any entry qualifies, or anything at least as trusted as
    /// `trust` when given.
    pub fn find(
        &self,
        name: &Name,
        rclass: impl Into<Class>,
        rtype: impl Into<Type>,
        options: FindOptions,
        trust: Option<Trust>,
    ) -> FindResult {
        let rclass = rclass.into();
        let rtype = rtype.into();
        let key = CacheKey::new(name.clone(), rclass);
        let Some(row) = self.table.get(&key) else {
            return FindResult::default();
        };

        if let Some(bucket) = self.marker_bucket(row) {
            return match self.select(bucket, options, trust) {
                Some(entry) => self.materialize(name, rclass, rtype, entry, options),
                None => FindResult::default(),
            };
        }

        let requested = row
            .get(&rtype)
            .and_then(|bucket| self.select(bucket, options, trust));
        let cname = if options.contains(FindOptions::ALLOW_CNAME) && !rtype.is_cname() {
            row.get(&Type::from(RecordType::CNAME))
                .and_then(|bucket| self.select(bucket, options, trust))
        } else {
            None
        };

        match (requested, cname) {
            (Some(found), Some(alias)) if alias.trust <= found.trust => {
                self.materialize(name, rclass, RecordType::CNAME.into(), alias, options)
            }
            (Some(found), _) => self.materialize(name, rclass, rtype, found, options),
            (None, Some(alias)) => {
                self.materialize(name, rclass, RecordType::CNAME.into(), alias, options)
            }
            (None, None) => FindResult::default(),
        }
    }

    /// Looks up every type cached at `(name, class)`, for type-ANY queries.
    ///
    /// An NXDOMAIN marker short-circuits the whole row.
    pub fn find_all(
        &self,
        name: &Name,
        rclass: impl Into<Class>,
        options: FindOptions,
    ) -> FindAllResult {
        let rclass = rclass.into();
        let key = CacheKey::new(name.clone(), rclass);
        let Some(row) = self.table.get(&key) else {
            return FindAllResult::default();
        };
        let allow_negative = options.contains(FindOptions::ALLOW_NEGATIVE);

        let mut types: Vec<_> = row.iter().collect();
        types.sort_by_key(|(rtype, _)| **rtype);

        let mut rrsets = Vec::new();
        for (rtype, bucket) in types {
            let Some(entry) = self.select(bucket, options, None) else {
                continue;
            };
            if entry.rcode == ResponseCode::NXDomain {
                let rrsets = if allow_negative {
                    vec![(RRset::new(name.clone(), *rtype, rclass, entry.ttl), entry.id)]
                } else {
                    Vec::new()
                };
                return FindAllResult {
                    rcode: Some(ResponseCode::NXDomain),
                    rrsets,
                };
            }
            if entry.is_negative() && !allow_negative {
                continue;
            }
            let rrset =
                RRset::with_rdatas(name.clone(), *rtype, rclass, entry.ttl, entry.rdata.clone());
            rrsets.push((rrset, entry.id));
        }

        FindAllResult {
            rcode: (!rrsets.is_empty()).then_some(ResponseCode::NoError),
            rrsets,
        }
    }

    /// Returns the entry with the given id.
    pub fn get(&self, id: EntryId) -> Result<&CacheEntry> {
        self.index.get(&id).ok_or(CacheError::NotFound(id))
    }

    /// Refreshes an expired entry.
    ///
    /// Returns true if the entry was expired at `now` and has been stamped
    /// as updated, false if it was still fresh.
    pub fn update(&mut self, id: EntryId, now: f64) -> Result<bool> {
        let entry = self.index.get_mut(&id).ok_or(CacheError::NotFound(id))?;
        if entry.is_expired(now) {
            entry.last_updated = Some(now);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    // =========================================================================
    // Insertion
    // =========================================================================

    /// Adds an RRset at the given trust level, stamped with the current time.
    ///
    /// An empty RRset records a negative answer with `rcode`; its TTL is the
    /// negative TTL.
    pub fn add(
        &mut self,
        rrset: &RRset,
        trust: Trust,
        info: ResponseInfo,
        rcode: ResponseCode,
    ) -> EntryId {
        self.add_at(rrset, trust, info, rcode, unix_now())
    }

    /// Adds an RRset as if at time `now`.
    pub fn add_at(
        &mut self,
        rrset: &RRset,
        trust: Trust,
        info: ResponseInfo,
        rcode: ResponseCode,
        now: f64,
    ) -> EntryId {
        let key = CacheKey::new(rrset.name().clone(), rrset.rclass());
        let rtype = rrset.rtype();

        if rcode == ResponseCode::NXDomain {
            self.table.remove(&key);
        } else if self
            .table
            .get(&key)
            .is_some_and(|row| self.marker_bucket(row).is_some())
        {
            self.table.remove(&key);
        }

        let existing = self
            .table
            .get(&key)
            .and_then(|row| row.get(&rtype))
            .and_then(|bucket| {
                bucket
                    .iter()
                    .copied()
                    .find(|id| self.index.get(id).is_some_and(|e| e.trust == trust))
            });

        if let Some(entry) = existing.and_then(|id| self.index.get_mut(&id)) {
            entry.ttl = rrset.ttl();
            entry.rdata = rrset.rdatas().to_vec();
            entry.msglen = info.msglen;
            entry.rcode = rcode;
            entry.resp_kind = info.kind;
            entry.last_updated = Some(now);
            return entry.id;
        }

        let id = self.allocate(CacheEntry {
            ttl: rrset.ttl(),
            rdata: rrset.rdatas().to_vec(),
            trust,
            msglen: info.msglen,
            rcode,
            resp_kind: info.kind,
            id: EntryId(0),
            last_updated: Some(now),
        });
        self.attach(key, rtype, id);
        id
    }

    /// Gives an entry the next id and records it in the index.
    pub(crate) fn allocate(&mut self, mut entry: CacheEntry) -> EntryId {
        let id = EntryId(self.next_id);
        self.next_id += 1;
        entry.id = id;
        self.index.insert(id, entry);
        id
    }

    /// Links an indexed entry into its row, keeping the bucket sorted.
    pub(crate) fn attach(&mut self, key: CacheKey, rtype: Type, id: EntryId) {
        let index = &self.index;
        let bucket = self.table.entry(key).or_default().entry(rtype).or_default();
        bucket.push(id);
        bucket.sort_by_key(|id| index.get(id).map(CacheEntry::trust));
    }

    /// Returns the rows in canonical order with their buckets by type.
    pub(crate) fn sorted_rows(&self) -> Vec<(&CacheKey, Vec<(Type, Vec<&CacheEntry>)>)> {
        let mut rows: Vec<_> = self
            .table
            .iter()
            .map(|(key, row)| {
                let mut buckets: Vec<_> = row
                    .iter()
                    .map(|(rtype, ids)| {
                        let entries = ids.iter().filter_map(|id| self.index.get(id)).collect();
                        (*rtype, entries)
                    })
                    .collect();
                buckets.sort_by_key(|(rtype, _)| *rtype);
                (key, buckets)
            })
            .collect();
        rows.sort_by(|a, b| a.0.cmp(b.0));
        rows
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Returns the bucket holding the row's NXDOMAIN marker, if any.
    fn marker_bucket<'a>(&self, row: &'a Row) -> Option<&'a [EntryId]> {
        row.values().map(Vec::as_slice).find(|bucket| {
            bucket.iter().any(|id| {
                self.index
                    .get(id)
                    .is_some_and(|e| e.rcode == ResponseCode::NXDomain)
            })
        })
    }

    /// Picks the most trusted qualifying entry of a bucket.
    fn select(
        &self,
        bucket: &[EntryId],
        options: FindOptions,
        trust: Option<Trust>,
    ) -> Option<&CacheEntry> {
        let noanswer = options.contains(FindOptions::ALLOW_NOANSWER);
        bucket
            .iter()
            .filter_map(|id| self.index.get(id))
            .find(|entry| match (noanswer, trust) {
                (false, None) => entry.trust <= Trust::Answer,
                (false, Some(t)) => entry.trust == t,
                (true, None) => true,
                (true, Some(t)) => entry.trust <= t,
            })
    }

    fn materialize(
        &self,
        name: &Name,
        rclass: Class,
        rtype: Type,
        entry: &CacheEntry,
        options: FindOptions,
    ) -> FindResult {
        let visible = !entry.is_negative() || options.contains(FindOptions::ALLOW_NEGATIVE);
        let rrset = visible.then(|| {
            RRset::with_rdatas(name.clone(), rtype, rclass, entry.ttl, entry.rdata.clone())
        });
        FindResult {
            rcode: Some(entry.rcode),
            rrset,
            id: Some(entry.id),
        }
    }
}
