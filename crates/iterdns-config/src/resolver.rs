//! Resolver configuration.

use super::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Resolver configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Query servers over IPv4.
    pub ipv4: bool,

    /// Query servers over IPv6.
    pub ipv6: bool,

    /// Maximum number of concurrently outstanding queries.
    pub max_queries: usize,

    /// Per-query timeout (seconds).
    pub query_timeout_secs: u64,

    /// Destination port of queries.
    pub server_port: u16,

    /// Receive buffer size (bytes).
    pub recv_buffer: usize,

    /// Maximum CNAME chain length.
    pub cname_chain_max: usize,

    /// Maximum nesting of nameserver-address fetches.
    pub fetch_depth_max: usize,

    /// TTL of cached SERVFAIL results.
    pub servfail_ttl: u32,

    /// Negative TTL when a negative response carries no SOA.
    pub default_negative_ttl: u32,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            ipv4: true,
            ipv6: true,
            max_queries: 10,
            query_timeout_secs: 60,
            server_port: 53,
            recv_buffer: 4096,
            cname_chain_max: 15,
            fetch_depth_max: 8,
            servfail_ttl: 1800,
            default_negative_ttl: 10800,
        }
    }
}

impl ResolverConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.ipv4 && !self.ipv6 {
            return Err(ConfigError::Validation(
                "At least one of IPv4 and IPv6 must be enabled".to_string(),
            ));
        }

        if self.max_queries == 0 {
            return Err(ConfigError::InvalidValue {
                field: "resolver.max_queries".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        if self.query_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "resolver.query_timeout_secs".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        if self.recv_buffer < 512 {
            return Err(ConfigError::InvalidValue {
                field: "resolver.recv_buffer".to_string(),
                message: "must be at least 512".to_string(),
            });
        }

        Ok(())
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        let mut config = ResolverConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.query_timeout(), Duration::from_secs(60));

        config.ipv4 = false;
        assert!(config.validate().is_ok());
        config.ipv6 = false;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        let config = ResolverConfig {
            max_queries: 0,
            ..ResolverConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "resolver.max_queries"
        ));

        let config = ResolverConfig {
            query_timeout_secs: 0,
            ..ResolverConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
