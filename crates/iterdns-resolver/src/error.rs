//! Resolver error types.

use iterdns_proto::Name;
use std::net::SocketAddr;
use thiserror::Error;

/// Result type for resolver operations.
pub type Result<T> = std::result::Result<T, ResolverError>;

/// Resolver error.
#[derive(Error, Debug)]
pub enum ResolverError {
    /// Not even the root zone has a usable server address.
    #[error("no available server for {qname}")]
    NoAvailableServer {
        /// The name being resolved.
        qname: Name,
    },

    /// No transaction id could be found that is unused for a server.
    #[error("failed to find a unique query id for {server}")]
    QidExhausted {
        /// The server the query was meant for.
        server: SocketAddr,
    },

    /// Both transports are disabled.
    #[error("no transport enabled")]
    NoTransport,

    /// Socket failure.
    #[error("network error: {0}")]
    Io(#[from] std::io::Error),

    /// Wire-format failure.
    #[error("protocol error: {0}")]
    Proto(#[from] iterdns_proto::Error),

    /// Cache failure.
    #[error("cache error: {0}")]
    Cache(#[from] iterdns_cache::CacheError),
}
