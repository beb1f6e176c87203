//! Response statistics.

use crate::classify::ResponseClass;
use iterdns_metrics::metrics;
use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters kept over a resolver run.
///
/// Each counter also feeds the matching `metrics` facade counter.
#[derive(Debug, Default)]
pub struct ResponseStats {
    answers: AtomicU64,
    cname_answers: AtomicU64,
    negatives: AtomicU64,
    referrals: AtomicU64,
    lame: AtomicU64,
    timeouts: AtomicU64,
    unknown_responses: AtomicU64,
    broken_packets: AtomicU64,
    queries_sent: AtomicU64,
    contexts_completed: AtomicU64,
}

impl ResponseStats {
    /// Creates zeroed statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a response by its classification.
    pub fn record_response(&self, class: ResponseClass) {
        let counter = match class {
            ResponseClass::Answer => &self.answers,
            ResponseClass::CnameAnswer => &self.cname_answers,
            ResponseClass::Negative => &self.negatives,
            ResponseClass::Referral => &self.referrals,
            ResponseClass::Unexpected(_) => &self.lame,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        metrics().record_response(class.label());
    }

    /// Records a response rejected as lame after classification.
    pub fn record_lame(&self) {
        self.lame.fetch_add(1, Ordering::Relaxed);
        metrics().record_response("lame");
    }

    /// Records a query timeout.
    pub fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
        metrics().record_timeout();
    }

    /// Records a response matching no outstanding query.
    pub fn record_unknown_response(&self) {
        self.unknown_responses.fetch_add(1, Ordering::Relaxed);
        metrics().record_unknown_response();
    }

    /// Records an unparsable datagram.
    pub fn record_broken_packet(&self) {
        self.broken_packets.fetch_add(1, Ordering::Relaxed);
        metrics().record_broken_packet();
    }

    /// Records a query sent.
    pub fn record_query_sent(&self, ipv6: bool) {
        self.queries_sent.fetch_add(1, Ordering::Relaxed);
        metrics().record_query_sent(if ipv6 { "ipv6" } else { "ipv4" });
    }

    /// Records a finished resolution context.
    pub fn record_completed(&self) {
        self.contexts_completed.fetch_add(1, Ordering::Relaxed);
        metrics().record_context_completed();
    }

    /// Returns authoritative answers seen.
    pub fn answers(&self) -> u64 {
        self.answers.load(Ordering::Relaxed)
    }

    /// Returns non-authoritative CNAME answers seen.
    pub fn cname_answers(&self) -> u64 {
        self.cname_answers.load(Ordering::Relaxed)
    }

    /// Returns negative answers seen.
    pub fn negatives(&self) -> u64 {
        self.negatives.load(Ordering::Relaxed)
    }

    /// Returns referrals seen.
    pub fn referrals(&self) -> u64 {
        self.referrals.load(Ordering::Relaxed)
    }

    /// Returns lame responses seen.
    pub fn lame(&self) -> u64 {
        self.lame.load(Ordering::Relaxed)
    }

    /// Returns query timeouts.
    pub fn timeouts(&self) -> u64 {
        self.timeouts.load(Ordering::Relaxed)
    }

    /// Returns unmatched responses.
    pub fn unknown_responses(&self) -> u64 {
        self.unknown_responses.load(Ordering::Relaxed)
    }

    /// Returns unparsable datagrams.
    pub fn broken_packets(&self) -> u64 {
        self.broken_packets.load(Ordering::Relaxed)
    }

    /// Returns queries sent.
    pub fn queries_sent(&self) -> u64 {
        self.queries_sent.load(Ordering::Relaxed)
    }

    /// Returns finished contexts.
    pub fn contexts_completed(&self) -> u64 {
        self.contexts_completed.load(Ordering::Relaxed)
    }

    /// Writes the counters, one `name: value` line each.
    pub fn dump<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let rows = [
            ("queries sent", self.queries_sent()),
            ("authoritative answers", self.answers()),
            ("CNAME answers", self.cname_answers()),
            ("negative answers", self.negatives()),
            ("referrals", self.referrals()),
            ("lame responses", self.lame()),
            ("timeouts", self.timeouts()),
            ("unknown responses", self.unknown_responses()),
            ("broken packets", self.broken_packets()),
            ("completed contexts", self.contexts_completed()),
        ];
        for (name, value) in rows {
            writeln!(writer, "{name}: {value}")?;
        }
        Ok(())
    }
}
