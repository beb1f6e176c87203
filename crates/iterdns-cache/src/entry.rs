//! Cache entry implementation.

use crate::trust::Trust;
use iterdns_proto::{RData, ResponseCode};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Returns the current wall-clock time as Unix seconds.
pub fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

/// Identifier of a cache entry, unique for the lifetime of a cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(pub(crate) u64);

impl EntryId {
    /// Returns the raw counter value.
    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The kind of response an entry was learned from.
///
/// Entries loaded from a dump or created locally are [`ResponseKind::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResponseKind {
    /// Provenance not recorded.
    #[default]
    Unknown,
    /// An authoritative answer.
    Answer,
    /// An authoritative answer whose first record was a CNAME.
    CnameAnswer,
    /// NXDOMAIN or NODATA.
    Negative,
    /// A delegation to a child zone.
    Referral,
    /// Synthesized after every server failed.
    ServFail,
}

impl ResponseKind {
    /// Returns a short description used in statistics output.
    pub const fn description(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Answer => "answer",
            Self::CnameAnswer => "cname answer",
            Self::Negative => "negative",
            Self::Referral => "referral",
            Self::ServFail => "servfail",
        }
    }
}

/// A cached RRset for one (name, class, type) at one trust level.
///
/// An entry with no record data is negative: its `rcode` says why
/// (NXDOMAIN, NXRRSET or SERVFAIL) and its `ttl` is the negative TTL.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub(crate) ttl: u32,
    pub(crate) rdata: Vec<RData>,
    pub(crate) trust: Trust,
    pub(crate) msglen: u16,
    pub(crate) rcode: ResponseCode,
    pub(crate) resp_kind: ResponseKind,
    pub(crate) id: EntryId,
    pub(crate) last_updated: Option<f64>,
}

impl CacheEntry {
    /// Returns the TTL in seconds.
    #[inline]
    pub fn ttl(&self) -> u32 {
        self.ttl
    }

    /// Returns the cached record data.
    #[inline]
    pub fn rdata(&self) -> &[RData] {
        &self.rdata
    }

    /// Returns the trust level.
    #[inline]
    pub fn trust(&self) -> Trust {
        self.trust
    }

    /// Returns the size of the response this entry came from, or 0.
    #[inline]
    pub fn msglen(&self) -> u16 {
        self.msglen
    }

    /// Returns the response code recorded with the entry.
    #[inline]
    pub fn rcode(&self) -> ResponseCode {
        self.rcode
    }

    /// Returns the kind of response the entry came from.
    #[inline]
    pub fn resp_kind(&self) -> ResponseKind {
        self.resp_kind
    }

    /// Returns the entry id.
    #[inline]
    pub fn id(&self) -> EntryId {
        self.id
    }

    /// Returns when the entry was last refreshed, if ever.
    #[inline]
    pub fn last_updated(&self) -> Option<f64> {
        self.last_updated
    }

    /// Returns true if this is a negative entry.
    #[inline]
    pub fn is_negative(&self) -> bool {
        self.rdata.is_empty()
    }

    /// Returns true if the entry is stale at `now`.
    ///
    /// Local entries never expire. Entries that were never refreshed (as
    /// after loading a dump) count as expired.
    pub fn is_expired(&self, now: f64) -> bool {
        if self.trust == Trust::Local {
            return false;
        }
        match self.last_updated {
            Some(updated) => updated + f64::from(self.ttl) < now,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(trust: Trust, last_updated: Option<f64>) -> CacheEntry {
        CacheEntry {
            ttl: 300,
            rdata: Vec::new(),
            trust,
            msglen: 0,
            rcode: ResponseCode::NXRRSet,
            resp_kind: ResponseKind::Negative,
            id: EntryId(1),
            last_updated,
        }
    }

    #[test]
    fn test_expiry() {
        let e = entry(Trust::Answer, Some(1000.0));
        assert!(!e.is_expired(1000.0));
        assert!(!e.is_expired(1300.0));
        assert!(e.is_expired(1300.5));
    }

    #[test]
    fn test_never_refreshed_is_expired() {
        assert!(entry(Trust::Glue, None).is_expired(0.0));
    }

    #[test]
    fn test_local_never_expires() {
        let e = entry(Trust::Local, None);
        assert!(!e.is_expired(f64::MAX));
    }

    #[test]
    fn test_negative_entry() {
        let e = entry(Trust::Answer, Some(0.0));
        assert!(e.is_negative());
        assert_eq!(e.resp_kind().description(), "negative");
    }
}
