//! # iterdns Metrics
//!
//! Observability for the iterative resolver: `metrics`-facade counters and
//! structured logging setup.
//!
//! No exporter is installed here; without a recorder the counters are
//! no-ops, and the resolver keeps its own totals for the statistics dump.

use metrics::{counter, gauge};
use once_cell::sync::OnceCell;

pub mod tracing_setup;

pub use tracing_setup::{init_tracing, parse_level, LogConfig, LogFormat};

/// Global metrics instance.
static METRICS: OnceCell<ResolverMetrics> = OnceCell::new();

/// Gets or initializes the global metrics instance.
pub fn metrics() -> &'static ResolverMetrics {
    METRICS.get_or_init(ResolverMetrics::new)
}

/// Resolver metrics.
#[derive(Debug)]
pub struct ResolverMetrics {
    _private: (),
}

impl ResolverMetrics {
    /// Creates a new metrics instance.
    pub fn new() -> Self {
        Self { _private: () }
    }

    // =========================================================================
    // Query metrics
    // =========================================================================

    /// Records a query sent to an authoritative server.
    pub fn record_query_sent(&self, family: &'static str) {
        counter!("iterdns_queries_sent_total", "family" => family).increment(1);
    }

    /// Records a classified response.
    pub fn record_response(&self, kind: &'static str) {
        counter!("iterdns_responses_total", "kind" => kind).increment(1);
    }

    /// Records a query timeout.
    pub fn record_timeout(&self) {
        counter!("iterdns_query_timeouts_total").increment(1);
    }

    /// Records a response that matched no outstanding query.
    pub fn record_unknown_response(&self) {
        counter!("iterdns_unknown_responses_total").increment(1);
    }

    /// Records a datagram that failed to parse.
    pub fn record_broken_packet(&self) {
        counter!("iterdns_broken_packets_total").increment(1);
    }

    // =========================================================================
    // Context metrics
    // =========================================================================

    /// Records a finished resolution context.
    pub fn record_context_completed(&self) {
        counter!("iterdns_contexts_completed_total").increment(1);
    }

    /// Updates the number of contexts with a query in flight.
    pub fn set_active_contexts(&self, count: usize) {
        gauge!("iterdns_active_contexts").set(count as f64);
    }

    /// Updates the number of cache rows.
    pub fn set_cache_rows(&self, rows: usize) {
        gauge!("iterdns_cache_rows").set(rows as f64);
    }
}

impl Default for ResolverMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_without_recorder() {
        let m = metrics();
        m.record_response("answer");
        m.record_timeout();
        m.set_active_contexts(3);
        assert!(std::ptr::eq(m, metrics()));
    }
}
