//! # iterdns Resolver
//!
//! Iterative resolution core: a resolution state machine per question,
//! a timer queue and a UDP query driver multiplexing many contexts over
//! one event loop.
//!
//! ## Features
//!
//! - Resolution from root hints following referrals and glue
//! - CNAME chasing in fresh top-level contexts, bounded by chain length
//! - Nested nameserver-address fetches, bounded by fetch depth
//! - Lame-server detection with failover to the next candidate address
//! - SERVFAIL and negative caching as the terminal state of every context
//! - Admission control over concurrently outstanding queries

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::time::Duration;

pub mod classify;
pub mod context;
pub mod driver;
pub mod error;
pub mod resolver;
pub mod stats;
pub mod timer;

pub use classify::{classify, ResponseClass};
pub use context::{ContextId, ContextState, PendingQuery, QueryKey, ResolutionContext, Step};
pub use driver::{Dispatcher, QueryDriver, Shutdown, Transport, UdpTransport};
pub use error::{ResolverError, Result};
pub use resolver::Resolver;
pub use stats::ResponseStats;
pub use timer::TimerQueue;

/// Maximum CNAME chain length followed from one question.
pub const CNAME_CHAIN_MAX: usize = 15;

/// Maximum nesting of nameserver-address fetches.
pub const FETCH_DEPTH_MAX: usize = 8;

/// TTL of cached SERVFAIL results.
pub const SERVFAIL_TTL: u32 = 1800;

/// Negative TTL used when a negative response carries no SOA.
pub const DEFAULT_NEGATIVE_TTL: u32 = 10800;

/// Default cap on concurrently outstanding queries.
pub const DEFAULT_MAX_QUERIES: usize = 10;

/// Default per-query timeout.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(60);

/// Default receive buffer size.
pub const DEFAULT_RECV_BUFFER: usize = 4096;

/// Attempts at drawing an unused transaction id for a server.
pub const QID_ATTEMPTS: usize = 10;

/// Resolver configuration.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Query servers over IPv4.
    pub ipv4: bool,

    /// Query servers over IPv6.
    pub ipv6: bool,

    /// Maximum number of concurrently outstanding queries.
    pub max_queries: usize,

    /// Time to wait for each response.
    pub query_timeout: Duration,

    /// Destination port of queries.
    pub server_port: u16,

    /// Receive buffer size.
    pub recv_buffer: usize,

    /// Maximum CNAME chain length.
    pub cname_chain_max: usize,

    /// Maximum address-fetch nesting.
    pub fetch_depth_max: usize,

    /// TTL of cached SERVFAIL results.
    pub servfail_ttl: u32,

    /// Negative TTL when no SOA is supplied.
    pub default_negative_ttl: u32,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            ipv4: true,
            ipv6: true,
            max_queries: DEFAULT_MAX_QUERIES,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            server_port: iterdns_proto::DNS_PORT,
            recv_buffer: DEFAULT_RECV_BUFFER,
            cname_chain_max: CNAME_CHAIN_MAX,
            fetch_depth_max: FETCH_DEPTH_MAX,
            servfail_ttl: SERVFAIL_TTL,
            default_negative_ttl: DEFAULT_NEGATIVE_TTL,
        }
    }
}
