//! # iterdns
//!
//! Command-line front end of the iterative resolver: resolving a query
//! file into a cache, aggregating query traces and replaying traces
//! against a cache snapshot.

use iterdns_config::Config;
use iterdns_metrics::{parse_level, LogConfig, LogFormat};
use iterdns_resolver::ResolverConfig;

pub mod queryfile;
pub mod querylog;
pub mod replay;

pub use queryfile::{parse_query_line, QueryFile};
pub use querylog::{parse_log_line, LogEntry, QueryLog};
pub use replay::{QueryReplay, QueryTrace};

/// Builds the resolver configuration from the file configuration.
pub fn resolver_config(config: &iterdns_config::ResolverConfig) -> ResolverConfig {
    ResolverConfig {
        ipv4: config.ipv4,
        ipv6: config.ipv6,
        max_queries: config.max_queries,
        query_timeout: config.query_timeout(),
        server_port: config.server_port,
        recv_buffer: config.recv_buffer,
        cname_chain_max: config.cname_chain_max,
        fetch_depth_max: config.fetch_depth_max,
        servfail_ttl: config.servfail_ttl,
        default_negative_ttl: config.default_negative_ttl,
    }
}

/// Builds the logging configuration; `cli_level` wins over the file.
///
/// Unknown levels fall back to info.
pub fn log_config(config: &Config, cli_level: Option<&str>) -> LogConfig {
    let level = cli_level
        .or(Some(config.logging.level.as_str()))
        .and_then(parse_level)
        .unwrap_or(tracing::Level::INFO);
    let format = config.logging.format.parse().unwrap_or(LogFormat::Text);
    LogConfig { level, format }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tracing::Level;

    #[test]
    fn test_resolver_config_mapping() {
        let mut config = Config::default();
        config.resolver.ipv6 = false;
        config.resolver.query_timeout_secs = 5;
        config.resolver.server_port = 5300;

        let resolver = resolver_config(&config.resolver);
        assert!(resolver.ipv4);
        assert!(!resolver.ipv6);
        assert_eq!(resolver.query_timeout, Duration::from_secs(5));
        assert_eq!(resolver.server_port, 5300);
        assert_eq!(resolver.cname_chain_max, iterdns_resolver::CNAME_CHAIN_MAX);
        assert_eq!(resolver.fetch_depth_max, iterdns_resolver::FETCH_DEPTH_MAX);
    }

    #[test]
    fn test_log_config() {
        let mut config = Config::default();
        assert_eq!(log_config(&config, None).level, Level::INFO);
        assert_eq!(log_config(&config, Some("10")).level, Level::TRACE);

        config.logging.level = "debug".to_string();
        config.logging.format = "json".to_string();
        let log = log_config(&config, None);
        assert_eq!(log.level, Level::DEBUG);
        assert_eq!(log.format, LogFormat::Json);
        assert_eq!(log_config(&config, Some("bogus")).level, Level::INFO);
    }
}
