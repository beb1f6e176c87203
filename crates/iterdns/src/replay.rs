//! Trace replay against a cache snapshot.
//!
//! Each unique question is looked up once to build its trace: the cache
//! entries that answer it, following CNAMEs. Replaying a trace line is a
//! cache miss if any of those entries has expired by the line's timestamp,
//! in which case all of them are refreshed as if re-resolved.

use crate::querylog::{parse_log_line, write_query_line};
use anyhow::{Context, Result};
use hashbrown::{HashMap, HashSet};
use iterdns_cache::{EntryId, FindOptions, RrCache};
use iterdns_proto::{Name, Question, ResponseCode, Type};
use std::io::{BufRead, Write};
use tracing::{debug, info, trace, warn};

/// Longest CNAME chain followed when building a trace.
pub const CNAME_TRACE_MAX: usize = 16;

const FIND_OPTIONS: FindOptions = FindOptions::ALLOW_CNAME.union(FindOptions::ALLOW_NEGATIVE);

/// Cache usage of one unique question.
#[derive(Debug, Clone, Default)]
pub struct QueryTrace {
    entries: Vec<EntryId>,
    rcode: Option<ResponseCode>,
    cname_chain: usize,
    hits: usize,
    misses: usize,
    last_used: Option<f64>,
}

impl QueryTrace {
    /// Returns the cache entries the question depends on.
    pub fn entries(&self) -> &[EntryId] {
        &self.entries
    }

    /// Returns the final response code, `None` if nothing was cached.
    pub fn rcode(&self) -> Option<ResponseCode> {
        self.rcode
    }

    /// Returns the number of CNAMEs followed.
    pub fn cname_chain(&self) -> usize {
        self.cname_chain
    }

    /// Returns the number of cache hits.
    pub fn hits(&self) -> usize {
        self.hits
    }

    /// Returns the number of cache misses.
    pub fn misses(&self) -> usize {
        self.misses
    }

    /// Returns the number of times the question was asked.
    pub fn queries(&self) -> usize {
        self.hits + self.misses
    }
}

/// Replays traces against a cache.
#[derive(Debug)]
pub struct QueryReplay<'a> {
    cache: &'a mut RrCache,
    traces: HashMap<Question, QueryTrace>,
    order: Vec<Question>,
    total: usize,
    cache_hits: usize,
    same_second_hits: usize,
    rcode_stats: HashMap<ResponseCode, usize>,
    qtype_stats: HashMap<Type, usize>,
}

impl<'a> QueryReplay<'a> {
    /// Creates a replay over `cache`.
    pub fn new(cache: &'a mut RrCache) -> Self {
        Self {
            cache,
            traces: HashMap::new(),
            order: Vec::new(),
            total: 0,
            cache_hits: 0,
            same_second_hits: 0,
            rcode_stats: HashMap::new(),
            qtype_stats: HashMap::new(),
        }
    }

    /// Replays every line of a trace.
    pub fn replay<R: BufRead>(&mut self, reader: R) -> Result<()> {
        for line in reader.lines() {
            let line = line.context("failed to read query log")?;
            self.total += 1;
            match parse_log_line(&line) {
                Ok(entry) => self.replay_query(entry.question, entry.time)?,
                Err(e) => info!(error = %e, "skipping log line"),
            }
        }
        info!(
            total = self.total,
            unique = self.traces.len(),
            hits = self.cache_hits,
            "replay finished"
        );
        Ok(())
    }

    /// Replays one query asked at `now` (Unix seconds).
    pub fn replay_query(&mut self, question: Question, now: f64) -> Result<()> {
        *self.qtype_stats.entry(question.qtype).or_default() += 1;

        if !self.traces.contains_key(&question) {
            let trace = self.build_trace(&question);
            if trace.entries.is_empty() {
                warn!(question = %question, "question not found in cache");
            }
            self.order.push(question.clone());
            self.traces.insert(question.clone(), trace);
        }

        let cache = &mut *self.cache;
        let Some(trace) = self.traces.get_mut(&question) else {
            return Ok(());
        };
        if let Some(rcode) = trace.rcode {
            *self.rcode_stats.entry(rcode).or_default() += 1;
        }

        let mut expired = trace.entries.is_empty();
        for id in &trace.entries {
            if cache.get(*id)?.is_expired(now) {
                expired = true;
                break;
            }
        }

        if expired {
            trace!(question = %question, "cache miss");
            for id in &trace.entries {
                cache.update(*id, now)?;
            }
            trace.misses += 1;
        } else {
            trace!(question = %question, "cache hit");
            if trace
                .last_used
                .is_some_and(|last| last.trunc() == now.trunc())
            {
                self.same_second_hits += 1;
            }
            trace.hits += 1;
            self.cache_hits += 1;
        }
        trace.last_used = Some(now);
        Ok(())
    }

    fn build_trace(&self, question: &Question) -> QueryTrace {
        let mut trace = QueryTrace::default();

        if question.qtype.is_any() {
            let found = self
                .cache
                .find_all(&question.qname, question.qclass, FIND_OPTIONS);
            trace.entries = found.rrsets.iter().map(|(_, id)| *id).collect();
            trace.rcode = found.rcode;
            return trace;
        }

        let found = self
            .cache
            .find(&question.qname, question.qclass, question.qtype, FIND_OPTIONS, None);
        let Some(id) = found.id else {
            return trace;
        };
        trace.entries.push(id);
        trace.rcode = found.rcode;

        if question.qtype.is_cname() {
            return trace;
        }

        let mut seen: HashSet<Name> = HashSet::new();
        seen.insert(question.qname.clone());
        let mut rrset = found.rrset;
        while trace.cname_chain < CNAME_TRACE_MAX {
            let Some(target) = rrset
                .as_ref()
                .filter(|set| set.rtype().is_cname())
                .and_then(|set| set.rdatas().first())
                .and_then(|rdata| rdata.target_name())
                .cloned()
            else {
                break;
            };
            if !seen.insert(target.clone()) {
                debug!(question = %question, target = %target, "CNAME loop in cache");
                break;
            }

            let found = self
                .cache
                .find(&target, question.qclass, question.qtype, FIND_OPTIONS, None);
            trace.cname_chain += 1;
            let Some(id) = found.id else {
                trace.rcode = None;
                break;
            };
            trace.entries.push(id);
            trace.rcode = found.rcode;
            rrset = found.rrset;
        }
        trace
    }

    /// Returns the number of trace lines replayed.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Returns the number of unique questions.
    pub fn unique(&self) -> usize {
        self.traces.len()
    }

    /// Returns the total number of cache hits.
    pub fn cache_hits(&self) -> usize {
        self.cache_hits
    }

    /// Returns the hits that reused an entry within the same second.
    pub fn same_second_hits(&self) -> usize {
        self.same_second_hits
    }

    /// Returns the trace of `question`, if it was replayed.
    pub fn trace(&self, question: &Question) -> Option<&QueryTrace> {
        self.traces.get(question)
    }

    fn by_popularity(&self) -> Vec<(&Question, &QueryTrace)> {
        let mut sorted: Vec<_> = self
            .order
            .iter()
            .filter_map(|q| self.traces.get(q).map(|t| (q, t)))
            .collect();
        sorted.sort_by(|a, b| b.1.queries().cmp(&a.1.queries()));
        sorted
    }

    /// Writes the summary lines.
    pub fn write_summary<W: Write>(&self, writer: &mut W) -> Result<()> {
        writeln!(writer, "Replayed {} queries ({} unique)", self.total, self.traces.len())?;
        let rate = if self.total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / self.total as f64 * 100.0
        };
        writeln!(
            writer,
            "{} cache hits ({:.2}%), {} at same TTL",
            self.cache_hits, rate, self.same_second_hits
        )?;
        Ok(())
    }

    /// Writes per-question cumulative popularity and hit rate.
    pub fn write_popularity<W: Write>(&self, writer: &mut W) -> Result<()> {
        writeln!(writer, "position,% in total,hit rate,#CNAME")?;
        let mut queries = 0usize;
        let mut hits = 0usize;
        for (position, (_, trace)) in self.by_popularity().into_iter().enumerate() {
            queries += trace.queries();
            hits += trace.hits;
            writeln!(
                writer,
                "{},{:.2},{:.2},{}",
                position + 1,
                queries as f64 / self.total as f64 * 100.0,
                hits as f64 / queries as f64 * 100.0,
                trace.cname_chain
            )?;
        }
        Ok(())
    }

    /// Writes the unique questions as a query file.
    pub fn write_queries<W: Write>(&self, writer: &mut W) -> Result<()> {
        for (question, trace) in self.by_popularity() {
            write_query_line(writer, question, trace.queries())?;
        }
        Ok(())
    }

    /// Writes query counts per final response code.
    pub fn write_rcode_stats<W: Write>(&self, writer: &mut W) -> Result<()> {
        writeln!(writer, "\nPer RCODE statistics:")?;
        let mut stats: Vec<_> = self.rcode_stats.iter().collect();
        stats.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
        for (rcode, count) in stats {
            writeln!(writer, "{rcode}: {count}")?;
        }
        Ok(())
    }

    /// Writes query counts per query type.
    pub fn write_qtype_stats<W: Write>(&self, writer: &mut W) -> Result<()> {
        writeln!(writer, "\nPer Query Type statistics:")?;
        let mut stats: Vec<_> = self.qtype_stats.iter().collect();
        stats.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
        for (qtype, count) in stats {
            writeln!(writer, "{qtype}: {count}")?;
        }
        Ok(())
    }
}
