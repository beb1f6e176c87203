//! Root server hints.

use crate::error::Result;
use crate::{ResponseInfo, RrCache, Trust};
use iterdns_proto::{Name, RData, RRset, RecordClass, RecordType, ResponseCode};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;
use tracing::debug;

/// TTL of the root NS set.
pub const ROOT_NS_TTL: u32 = 518_400;

/// TTL of root server addresses.
pub const ROOT_ADDR_TTL: u32 = 3_600_000;

const ROOT_V4: [(char, Ipv4Addr); 13] = [
    ('a', Ipv4Addr::new(198, 41, 0, 4)),
    ('b', Ipv4Addr::new(192, 228, 79, 201)),
    ('c', Ipv4Addr::new(192, 33, 4, 12)),
    ('d', Ipv4Addr::new(128, 8, 10, 90)),
    ('e', Ipv4Addr::new(192, 203, 230, 10)),
    ('f', Ipv4Addr::new(192, 5, 5, 241)),
    ('g', Ipv4Addr::new(192, 112, 36, 4)),
    ('h', Ipv4Addr::new(128, 63, 2, 53)),
    ('i', Ipv4Addr::new(192, 36, 148, 17)),
    ('j', Ipv4Addr::new(192, 58, 128, 30)),
    ('k', Ipv4Addr::new(193, 0, 14, 129)),
    ('l', Ipv4Addr::new(199, 7, 83, 42)),
    ('m', Ipv4Addr::new(202, 12, 27, 33)),
];

const ROOT_V6: [(char, Ipv6Addr); 8] = [
    ('a', Ipv6Addr::new(0x2001, 0x503, 0xba3e, 0, 0, 0, 0x2, 0x30)),
    ('d', Ipv6Addr::new(0x2001, 0x500, 0x2d, 0, 0, 0, 0, 0xd)),
    ('f', Ipv6Addr::new(0x2001, 0x500, 0x2f, 0, 0, 0, 0, 0xf)),
    ('h', Ipv6Addr::new(0x2001, 0x500, 0x1, 0, 0, 0, 0x803f, 0x235)),
    ('i', Ipv6Addr::new(0x2001, 0x7fe, 0, 0, 0, 0, 0, 0x53)),
    ('k', Ipv6Addr::new(0x2001, 0x7fd, 0, 0, 0, 0, 0, 0x1)),
    ('l', Ipv6Addr::new(0x2001, 0x500, 0x3, 0, 0, 0, 0, 0x42)),
    ('m', Ipv6Addr::new(0x2001, 0xdc3, 0, 0, 0, 0, 0, 0x35)),
];

fn server_name(letter: char) -> Result<Name> {
    Ok(Name::from_str(&format!("{letter}.root-servers.net."))?)
}

/// Installs the root NS set and the root server addresses at
/// [`Trust::Local`].
pub fn install_root_hints(cache: &mut RrCache) -> Result<()> {
    let info = ResponseInfo::default();

    let servers = ROOT_V4
        .iter()
        .map(|(letter, _)| server_name(*letter).map(RData::NS))
        .collect::<Result<Vec<_>>>()?;
    let ns = RRset::with_rdatas(
        Name::root(),
        RecordType::NS,
        RecordClass::IN,
        ROOT_NS_TTL,
        servers,
    );
    cache.add(&ns, Trust::Local, info, ResponseCode::NoError);

    for (letter, addr) in ROOT_V4 {
        let rrset = RRset::with_rdatas(
            server_name(letter)?,
            RecordType::A,
            RecordClass::IN,
            ROOT_ADDR_TTL,
            vec![RData::A(addr)],
        );
        cache.add(&rrset, Trust::Local, info, ResponseCode::NoError);
    }
    for (letter, addr) in ROOT_V6 {
        let rrset = RRset::with_rdatas(
            server_name(letter)?,
            RecordType::AAAA,
            RecordClass::IN,
            ROOT_ADDR_TTL,
            vec![RData::AAAA(addr)],
        );
        cache.add(&rrset, Trust::Local, info, ResponseCode::NoError);
    }

    debug!(
        servers = ROOT_V4.len(),
        v6 = ROOT_V6.len(),
        "Installed root hints"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FindOptions;

    #[test]
    fn test_server_name() {
        assert_eq!(
            server_name('k').unwrap(),
            Name::from_str("k.root-servers.net").unwrap()
        );
    }

    #[test]
    fn test_root_hints_installed() {
        let mut cache = RrCache::new();
        install_root_hints(&mut cache).unwrap();
        assert_eq!(cache.len(), 14);

        let ns = cache.find(
            &Name::root(),
            RecordClass::IN,
            RecordType::NS,
            FindOptions::ALLOW_NOANSWER,
            None,
        );
        assert_eq!(ns.rrset.unwrap().len(), 13);

        let v6 = cache.find(
            &Name::from_str("m.root-servers.net").unwrap(),
            RecordClass::IN,
            RecordType::AAAA,
            FindOptions::empty(),
            None,
        );
        let entry = cache.get(v6.id.unwrap()).unwrap();
        assert_eq!(entry.trust(), Trust::Local);
        assert!(!entry.is_expired(f64::MAX));
        assert!(cache
            .find(
                &Name::from_str("b.root-servers.net").unwrap(),
                RecordClass::IN,
                RecordType::AAAA,
                FindOptions::empty(),
                None,
            )
            .is_miss());
    }
}
