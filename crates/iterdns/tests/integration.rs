//! End-to-end resolution tests.
//!
//! The first group drives the resolver through a [`Dispatcher`] over a
//! scripted in-process network of root, TLD and authoritative servers.
//! The second runs the real UDP [`QueryDriver`] against a fake
//! authoritative server on the loopback interface.

use std::collections::VecDeque;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::{Duration, Instant};

use tokio::net::UdpSocket;
use tokio::time::timeout;

use iterdns::{parse_query_line, QueryFile, QueryReplay};
use iterdns_cache::hints::install_root_hints;
use iterdns_cache::{FindOptions, ResponseInfo, RrCache, Trust};
use iterdns_proto::rdata::Soa;
use iterdns_proto::{Message, Name, Question, RData, RRset, RecordClass, RecordType, ResponseCode};
use iterdns_resolver::{
    Dispatcher, QueryDriver, Resolver, ResolverConfig, Transport, SERVFAIL_TTL,
};

// ============================================================================
// Test Helpers
// ============================================================================

fn name(s: &str) -> Name {
    Name::from_str(s).unwrap()
}

fn question(qname: &str, rtype: RecordType) -> Question {
    Question::new(name(qname), rtype, RecordClass::IN)
}

fn ip(octet: u8) -> Ipv4Addr {
    Ipv4Addr::new(192, 0, 2, octet)
}

fn a_set(owner: &str, addr: Ipv4Addr) -> RRset {
    RRset::with_rdatas(name(owner), RecordType::A, RecordClass::IN, 3600, vec![RData::A(addr)])
}

fn ns_set(owner: &str, target: &str) -> RRset {
    RRset::with_rdatas(
        name(owner),
        RecordType::NS,
        RecordClass::IN,
        86400,
        vec![RData::NS(name(target))],
    )
}

fn cname_set(owner: &str, target: &str) -> RRset {
    RRset::with_rdatas(
        name(owner),
        RecordType::CNAME,
        RecordClass::IN,
        300,
        vec![RData::CNAME(name(target))],
    )
}

fn soa_set(owner: &str, minimum: u32) -> RRset {
    let soa = Soa::new(
        name(&format!("ns.{owner}")),
        name(&format!("hostmaster.{owner}")),
        2024010101,
        7200,
        3600,
        1209600,
        minimum,
    );
    RRset::with_rdatas(name(owner), RecordType::SOA, RecordClass::IN, 3600, vec![RData::SOA(soa)])
}

fn referral(query: &Message, zone: &str, ns: &str, glue: Option<Ipv4Addr>) -> Message {
    let mut msg = Message::response_from(query);
    msg.add_authority(ns_set(zone, ns));
    if let Some(addr) = glue {
        msg.add_additional(a_set(ns, addr));
    }
    msg
}

fn authoritative(query: &Message) -> Message {
    let mut msg = Message::response_from(query);
    msg.header_mut().set_authoritative(true);
    msg
}

fn v4_config() -> ResolverConfig {
    ResolverConfig {
        ipv6: false,
        query_timeout: Duration::from_secs(5),
        ..ResolverConfig::default()
    }
}

fn find(cache: &RrCache, qname: &str, rtype: RecordType, options: FindOptions) -> iterdns_cache::FindResult {
    cache.find(&name(qname), RecordClass::IN, rtype, options, None)
}

/// Collects outgoing queries instead of sending them.
#[derive(Debug, Default)]
struct ScriptedNetwork {
    sent: VecDeque<(SocketAddr, Message)>,
}

impl Transport for ScriptedNetwork {
    fn send(&mut self, wire: &[u8], server: SocketAddr) -> io::Result<()> {
        let query = Message::parse(wire).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.sent.push_back((server, query));
        Ok(())
    }
}

/// Answers every query through `authority`, firing timers for the ones it
/// leaves unanswered, until nothing is outstanding.
fn run_network<F>(dispatcher: &mut Dispatcher<ScriptedNetwork>, mut authority: F)
where
    F: FnMut(Ipv4Addr, &Message) -> Option<Message>,
{
    let mut now = Instant::now();
    for _ in 0..1000 {
        while let Some((server, query)) = dispatcher.transport_mut().sent.pop_front() {
            let SocketAddr::V4(v4) = server else {
                continue;
            };
            if let Some(response) = authority(*v4.ip(), &query) {
                dispatcher.on_datagram(&response.to_wire(), server, now);
            }
        }
        if !dispatcher.is_active() {
            return;
        }
        now += Duration::from_secs(6);
        dispatcher.on_timers(now);
    }
    panic!("resolution did not settle");
}

fn dispatcher() -> Dispatcher<ScriptedNetwork> {
    let mut cache = RrCache::new();
    install_root_hints(&mut cache).unwrap();
    Dispatcher::new(Resolver::with_seed(v4_config(), cache, 42), ScriptedNetwork::default())
}

const COM_SERVER: u8 = 10;
const NET_SERVER: u8 = 11;
/// `ns.example.net`, authoritative for both `example.net` and `example.com`.
const NS_SERVER: u8 = 20;

/// A small namespace: `com` and `net` below the root, `example.com` served
/// by a nameserver inside `example.net` that has no glue in `com`.
fn internet(server: Ipv4Addr, query: &Message) -> Option<Message> {
    let q = query.question()?;
    let qname = q.qname.clone();
    let under = |zone: &str| qname.is_subdomain_of(&name(zone));

    let octets = server.octets();
    if octets[..3] != [192, 0, 2] {
        // Any root server
        return Some(if under("com") {
            referral(query, "com", "a.gtld.com", Some(ip(COM_SERVER)))
        } else if under("net") {
            referral(query, "net", "a.gtld.net", Some(ip(NET_SERVER)))
        } else {
            let mut msg = authoritative(query);
            msg.set_rcode(ResponseCode::NXDomain);
            msg
        });
    }

    match octets[3] {
        COM_SERVER if under("example.com") => {
            Some(referral(query, "example.com", "ns.example.net", None))
        }
        NET_SERVER if under("example.net") => Some(referral(
            query,
            "example.net",
            "ns.example.net",
            Some(ip(NS_SERVER)),
        )),
        NS_SERVER if under("example.net") => {
            let mut msg = authoritative(query);
            if qname == name("ns.example.net") && q.qtype.is(RecordType::A) {
                msg.add_answer(a_set("ns.example.net", ip(NS_SERVER)));
            } else {
                msg.add_authority(soa_set("example.net", 300));
            }
            Some(msg)
        }
        NS_SERVER if under("example.com") => {
            let mut msg = authoritative(query);
            if qname == name("www.example.com") {
                msg.add_answer(a_set("www.example.com", ip(80)));
                msg.add_authority(ns_set("example.com", "ns.example.net"));
            } else if qname == name("alias.example.com") {
                msg.add_answer(cname_set("alias.example.com", "www.example.com"));
            } else if qname == name("loop1.example.com") {
                msg.add_answer(cname_set("loop1.example.com", "loop2.example.com"));
            } else if qname == name("loop2.example.com") {
                msg.add_answer(cname_set("loop2.example.com", "loop1.example.com"));
            } else {
                msg.set_rcode(ResponseCode::NXDomain);
                msg.add_authority(soa_set("example.com", 900));
            }
            Some(msg)
        }
        _ => None,
    }
}

// ============================================================================
// Scripted Resolution
// ============================================================================

#[test]
fn test_referral_chain_with_glue() {
    let mut dispatcher = dispatcher();
    dispatcher
        .admit(question("ns.example.net", RecordType::A), Instant::now())
        .unwrap();
    run_network(&mut dispatcher, internet);

    let resolver = dispatcher.resolver();
    assert_eq!(resolver.active_contexts(), 0);
    assert_eq!(resolver.stats().referrals(), 2);
    assert_eq!(resolver.stats().answers(), 1);

    let found = find(resolver.cache(), "ns.example.net", RecordType::A, FindOptions::empty());
    assert_eq!(found.rrset, Some(a_set("ns.example.net", ip(NS_SERVER))));
}

#[test]
fn test_missing_glue_is_fetched() {
    let mut dispatcher = dispatcher();
    dispatcher
        .admit(question("www.example.com", RecordType::A), Instant::now())
        .unwrap();
    run_network(&mut dispatcher, internet);

    let resolver = dispatcher.resolver();
    assert_eq!(resolver.active_contexts(), 0);

    let found = find(resolver.cache(), "www.example.com", RecordType::A, FindOptions::empty());
    assert_eq!(found.rrset, Some(a_set("www.example.com", ip(80))));

    // The fetched nameserver address is an answer in its own right
    let ns = find(resolver.cache(), "ns.example.net", RecordType::A, FindOptions::empty());
    assert!(ns.rrset.is_some());

    // The AAAA fetch learned that none exists
    let ns6 = find(
        resolver.cache(),
        "ns.example.net",
        RecordType::AAAA,
        FindOptions::ALLOW_NEGATIVE,
    );
    assert_eq!(ns6.rcode, Some(ResponseCode::NXRRSet));
    assert_eq!(ns6.rrset.unwrap().ttl(), 300);

    // The NS set that came with the answer is cached in-zone
    let auth_ns = resolver.cache().find(
        &name("example.com"),
        RecordClass::IN,
        RecordType::NS,
        FindOptions::ALLOW_NOANSWER,
        Some(Trust::AuthAuthority),
    );
    assert!(auth_ns.rrset.is_some());
}

#[test]
fn test_negative_answer_uses_soa_minimum() {
    let mut dispatcher = dispatcher();
    dispatcher
        .admit(question("missing.example.com", RecordType::A), Instant::now())
        .unwrap();
    run_network(&mut dispatcher, internet);

    let found = find(
        dispatcher.resolver().cache(),
        "missing.example.com",
        RecordType::A,
        FindOptions::ALLOW_NEGATIVE,
    );
    assert_eq!(found.rcode, Some(ResponseCode::NXDomain));
    assert_eq!(found.rrset.unwrap().ttl(), 900);
}

#[test]
fn test_cname_answer_is_chased() {
    let mut dispatcher = dispatcher();
    dispatcher
        .admit(question("alias.example.com", RecordType::A), Instant::now())
        .unwrap();
    run_network(&mut dispatcher, internet);

    let cache = dispatcher.resolver().cache();
    let alias = find(cache, "alias.example.com", RecordType::A, FindOptions::ALLOW_CNAME);
    assert!(alias.rrset.unwrap().rtype().is_cname());

    let target = find(cache, "www.example.com", RecordType::A, FindOptions::empty());
    assert_eq!(target.rrset, Some(a_set("www.example.com", ip(80))));
}

#[test]
fn test_cname_loop_terminates() {
    let mut dispatcher = dispatcher();
    dispatcher
        .admit(question("loop1.example.com", RecordType::A), Instant::now())
        .unwrap();
    run_network(&mut dispatcher, internet);

    let resolver = dispatcher.resolver();
    assert_eq!(resolver.active_contexts(), 0);

    // One authoritative answer per chain step, plus the two address fetches
    let chain_steps = iterdns_resolver::CNAME_CHAIN_MAX as u64 + 2;
    assert_eq!(resolver.stats().answers(), chain_steps + 2);

    let cache = resolver.cache();
    for hop in ["loop1.example.com", "loop2.example.com"] {
        let found = find(cache, hop, RecordType::A, FindOptions::ALLOW_CNAME);
        assert!(found.rrset.unwrap().rtype().is_cname());
    }
}

#[test]
fn test_unreachable_servers_cache_servfail() {
    let mut dispatcher = dispatcher();
    dispatcher
        .admit(question("www.example.org", RecordType::A), Instant::now())
        .unwrap();

    // Nobody answers
    run_network(&mut dispatcher, |_, _| None);

    let resolver = dispatcher.resolver();
    assert_eq!(resolver.stats().timeouts(), 13);
    let found = find(
        resolver.cache(),
        "www.example.org",
        RecordType::A,
        FindOptions::ALLOW_NEGATIVE,
    );
    assert_eq!(found.rcode, Some(ResponseCode::ServFail));
    assert_eq!(found.rrset.unwrap().ttl(), SERVFAIL_TTL);
}

#[test]
fn test_query_file_drives_admission() {
    let mut config = v4_config();
    config.max_queries = 1;
    let mut cache = RrCache::new();
    install_root_hints(&mut cache).unwrap();
    let mut dispatcher = Dispatcher::new(Resolver::with_seed(config, cache, 3), ScriptedNetwork::default());

    let input = "5/IN/A/www.example.com.\n2/IN/A/ns.example.net.\n1/IN/MX/missing.example.com.\n";
    let mut questions = QueryFile::new(io::Cursor::new(input));

    let now = Instant::now();
    loop {
        while dispatcher.has_capacity() {
            let Some(q) = questions.next() else { break };
            dispatcher.admit(q, now).unwrap();
        }
        if !dispatcher.is_active() {
            break;
        }
        assert_eq!(dispatcher.outstanding(), 1);
        run_network(&mut dispatcher, internet);
    }

    let cache = dispatcher.resolver().cache();
    assert!(find(cache, "www.example.com", RecordType::A, FindOptions::empty()).rrset.is_some());

    // Asked again directly, the nameserver's own address stays positive
    let ns = find(cache, "ns.example.net", RecordType::A, FindOptions::ALLOW_NEGATIVE);
    assert_eq!(ns.rcode, Some(ResponseCode::NoError));
    assert_eq!(ns.rrset, Some(a_set("ns.example.net", ip(NS_SERVER))));

    let mx = find(cache, "missing.example.com", RecordType::MX, FindOptions::ALLOW_NEGATIVE);
    assert_eq!(mx.rcode, Some(ResponseCode::NXDomain));
    assert_eq!(mx.rrset.unwrap().ttl(), 900);
}

#[test]
fn test_resolved_cache_survives_dump_and_replay() {
    let mut dispatcher = dispatcher();
    let now = Instant::now();
    dispatcher.admit(question("www.example.com", RecordType::A), now).unwrap();
    run_network(&mut dispatcher, internet);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.db");
    let cache = dispatcher.into_resolver().into_cache();
    cache.dump(&path, true).unwrap();

    let mut loaded = RrCache::new();
    loaded.load(&path).unwrap();
    assert_eq!(loaded.len(), cache.len());
    let found = find(&loaded, "www.example.com", RecordType::A, FindOptions::empty());
    assert_eq!(found.rrset, Some(a_set("www.example.com", ip(80))));

    let trace = "\
1700000000.0 192.0.2.100#5353 www.example.com IN A
1700000000.2 192.0.2.101#5353 www.example.com IN A
1700000001.0 192.0.2.100#5353 missing.example.com IN A
";
    let mut replay = QueryReplay::new(&mut loaded);
    replay.replay(io::Cursor::new(trace)).unwrap();
    assert_eq!(replay.total(), 3);
    assert_eq!(replay.unique(), 2);
    assert_eq!(replay.cache_hits(), 1);
    assert_eq!(replay.same_second_hits(), 1);
}

// ============================================================================
// UDP Driver
// ============================================================================

/// Serves `www.test.` A authoritatively and NXDOMAIN for everything else.
async fn spawn_authority() -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();

    tokio::spawn(async move {
        let mut buf = vec![0u8; 4096];
        loop {
            let Ok((len, peer)) = socket.recv_from(&mut buf).await else {
                return;
            };
            let Ok(query) = Message::parse(&buf[..len]) else {
                continue;
            };
            let Some(q) = query.question().cloned() else {
                continue;
            };

            let mut response = authoritative(&query);
            if q.qname == name("www.test") && q.qtype.is(RecordType::A) {
                response.add_answer(a_set("www.test", Ipv4Addr::new(127, 0, 0, 80)));
            } else {
                response.set_rcode(ResponseCode::NXDomain);
                response.add_authority(soa_set("test", 120));
            }
            let _ = socket.send_to(&response.to_wire(), peer).await;
        }
    });
    addr
}

/// A cache whose only nameserver is the local fake authority.
fn loopback_cache() -> RrCache {
    let mut cache = RrCache::new();
    let info = ResponseInfo::default();
    cache.add(&ns_set(".", "ns.test"), Trust::Local, info, ResponseCode::NoError);
    cache.add(
        &a_set("ns.test", Ipv4Addr::LOCALHOST),
        Trust::Local,
        info,
        ResponseCode::NoError,
    );
    cache
}

#[tokio::test]
async fn test_udp_driver_resolves_against_fake_authority() {
    let server = spawn_authority().await;
    let config = ResolverConfig {
        server_port: server.port(),
        ..v4_config()
    };

    let mut driver = QueryDriver::new(Resolver::new(config, loopback_cache())).unwrap();
    let questions = vec![
        parse_query_line("1/IN/A/www.test.").unwrap(),
        parse_query_line("1/IN/AAAA/nothing.test.").unwrap(),
    ];
    timeout(Duration::from_secs(10), driver.run(questions))
        .await
        .expect("driver did not finish")
        .unwrap();

    let resolver = driver.into_resolver();
    assert_eq!(resolver.active_contexts(), 0);
    assert_eq!(resolver.stats().queries_sent(), 2);
    assert_eq!(resolver.stats().contexts_completed(), 2);

    let found = find(resolver.cache(), "www.test", RecordType::A, FindOptions::empty());
    assert_eq!(found.rrset, Some(a_set("www.test", Ipv4Addr::new(127, 0, 0, 80))));

    let missing = find(resolver.cache(), "nothing.test", RecordType::AAAA, FindOptions::ALLOW_NEGATIVE);
    assert_eq!(missing.rcode, Some(ResponseCode::NXDomain));
    assert_eq!(missing.rrset.unwrap().ttl(), 120);
}

#[tokio::test]
async fn test_udp_driver_stops_on_shutdown() {
    // Bound but silent
    let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let config = ResolverConfig {
        server_port: silent.local_addr().unwrap().port(),
        query_timeout: Duration::from_secs(60),
        ..v4_config()
    };

    let mut driver = QueryDriver::new(Resolver::new(config, loopback_cache())).unwrap();
    let shutdown = driver.shutdown_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.request();
    });

    let questions = vec![question("www.test", RecordType::A)];
    timeout(Duration::from_secs(5), driver.run(questions))
        .await
        .expect("shutdown did not stop the driver")
        .unwrap();
    assert_eq!(driver.dispatcher().outstanding(), 1);
}
