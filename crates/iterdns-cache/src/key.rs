//! Cache row key.

use iterdns_proto::{Class, Name};
use std::cmp::Ordering;
use std::fmt;

/// Identifies a cache row: one owner name in one class.
///
/// Name comparison is case-insensitive, so `Example.COM` and `example.com`
/// share a row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    name: Name,
    rclass: Class,
}

impl CacheKey {
    /// Creates a new cache key.
    pub fn new(name: Name, rclass: impl Into<Class>) -> Self {
        Self {
            name,
            rclass: rclass.into(),
        }
    }

    /// Returns the owner name.
    #[inline]
    pub fn name(&self) -> &Name {
        &self.name
    }

    /// Returns the class.
    #[inline]
    pub fn rclass(&self) -> Class {
        self.rclass
    }
}

impl PartialOrd for CacheKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CacheKey {
    /// Canonical name order, then class.
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .cmp(&other.name)
            .then_with(|| self.rclass.cmp(&other.rclass))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.rclass)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iterdns_proto::RecordClass;
    use std::collections::HashSet;
    use std::str::FromStr;

    #[test]
    fn test_cache_key_equality() {
        let key1 = CacheKey::new(Name::from_str("example.com").unwrap(), RecordClass::IN);
        let key2 = CacheKey::new(Name::from_str("EXAMPLE.COM").unwrap(), RecordClass::IN);
        let key3 = CacheKey::new(Name::from_str("example.com").unwrap(), RecordClass::CH);

        assert_eq!(key1, key2);
        assert_ne!(key1, key3);

        let set: HashSet<_> = [key1, key2, key3].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_cache_key_order() {
        let parent = CacheKey::new(Name::from_str("example.com").unwrap(), RecordClass::IN);
        let child = CacheKey::new(Name::from_str("a.example.com").unwrap(), RecordClass::IN);
        assert!(parent < child);
        assert_eq!(parent.to_string(), "example.com./IN");
    }
}
