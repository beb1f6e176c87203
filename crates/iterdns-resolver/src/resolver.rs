//! The iterative resolution state machine.
//!
//! Every question is resolved by a [`ResolutionContext`] held in an arena
//! owned by the [`Resolver`]. Contexts never perform I/O: each step returns
//! the queries to send and the driver feeds back responses and timeouts.
//!
//! A context that needs nameserver addresses it does not have spawns child
//! contexts (one A and one AAAA fetch per nameserver) and suspends until the
//! last of them finishes. CNAMEs are chased in a fresh top-level context.
//! Whatever happens, every context ends with something in the cache: the
//! answer, a negative entry or a SERVFAIL entry.

use crate::classify::{classify, is_address, validate, Lame, ResponseClass};
use crate::context::{ContextId, PendingQuery, QueryKey, ResolutionContext, Step};
use crate::error::{ResolverError, Result};
use crate::stats::ResponseStats;
use crate::{ResolverConfig, QID_ATTEMPTS};
use hashbrown::{HashMap, HashSet};
use iterdns_cache::{FindOptions, ResponseInfo, ResponseKind, RrCache, Trust};
use iterdns_proto::{
    Class, Message, Name, NameRelation, Question, RData, RRset, RecordType, ResponseCode,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::net::SocketAddr;
use tracing::{debug, info, trace, warn};

type Candidates = (Vec<SocketAddr>, Vec<SocketAddr>);

/// Iterative resolver: the shared cache plus every live context.
#[derive(Debug)]
pub struct Resolver {
    config: ResolverConfig,
    cache: RrCache,
    contexts: HashMap<ContextId, ResolutionContext>,
    reserved: HashSet<QueryKey>,
    stats: ResponseStats,
    rng: StdRng,
    next_context: u64,
    spawned: Vec<PendingQuery>,
}

impl Resolver {
    /// Creates a resolver over `cache`, which should hold root hints.
    pub fn new(config: ResolverConfig, cache: RrCache) -> Self {
        Self::with_rng(config, cache, StdRng::from_entropy())
    }

    /// Creates a resolver with a seeded transaction id generator.
    pub fn with_seed(config: ResolverConfig, cache: RrCache, seed: u64) -> Self {
        Self::with_rng(config, cache, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: ResolverConfig, cache: RrCache, rng: StdRng) -> Self {
        Self {
            config,
            cache,
            contexts: HashMap::new(),
            reserved: HashSet::new(),
            stats: ResponseStats::new(),
            rng,
            next_context: 0,
            spawned: Vec::new(),
        }
    }

    /// Returns the configuration.
    #[inline]
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Returns the cache.
    #[inline]
    pub fn cache(&self) -> &RrCache {
        &self.cache
    }

    /// Returns the cache mutably.
    #[inline]
    pub fn cache_mut(&mut self) -> &mut RrCache {
        &mut self.cache
    }

    /// Consumes the resolver, returning its cache.
    pub fn into_cache(self) -> RrCache {
        self.cache
    }

    /// Returns the response statistics.
    #[inline]
    pub fn stats(&self) -> &ResponseStats {
        &self.stats
    }

    /// Returns the number of live contexts.
    #[inline]
    pub fn active_contexts(&self) -> usize {
        self.contexts.len()
    }

    /// Returns a live context.
    pub fn context(&self, id: ContextId) -> Option<&ResolutionContext> {
        self.contexts.get(&id)
    }

    /// Returns true if `key` is reserved by an issued query.
    pub fn is_reserved(&self, key: &QueryKey) -> bool {
        self.reserved.contains(key)
    }

    /// Releases a query key once its response or timeout was handled.
    pub fn release(&mut self, key: &QueryKey) {
        self.reserved.remove(key);
    }

    // =========================================================================
    // Driver entry points
    // =========================================================================

    /// Starts resolving `question` in a new top-level context.
    pub fn start_query(&mut self, question: Question) -> Result<PendingQuery> {
        let id = self.create_context(question, 0, None);
        match self.start(id) {
            Ok(query) => Ok(query),
            Err(e) => {
                self.contexts.remove(&id);
                Err(e)
            }
        }
    }

    /// Feeds the response to a context's outstanding query.
    ///
    /// `msglen` is the size of the datagram. Panics if `id` is not a live
    /// context awaiting a response.
    pub fn handle_response(&mut self, id: ContextId, response: &Message, msglen: usize) -> Step {
        let Some(key) = self.ctx_mut(id).current.take() else {
            panic!("response for {id}, which has no outstanding query");
        };
        let msglen = u16::try_from(msglen).unwrap_or(u16::MAX);

        let next = match self.process_response(id, key, response, msglen) {
            Ok(next) => next,
            Err(lame) => {
                let ctx = self.ctx(id);
                info!(
                    qname = %ctx.question.qname,
                    qtype = %ctx.question.qtype,
                    zone = %ctx.zone,
                    server = %key.server,
                    reason = %lame,
                    "lame server"
                );
                self.next_server_or_fail(id)
            }
        };
        let next = match next {
            Some(query) => Some(query),
            None => self.resume_parents(id),
        };
        self.finish_step(id, next)
    }

    /// Handles expiry of a context's outstanding query to `server`.
    pub fn query_timeout(&mut self, id: ContextId, server: SocketAddr) -> Step {
        let ctx = self.ctx_mut(id);
        ctx.current = None;
        trace!(qname = %ctx.question.qname, server = %server, "query timeout");
        self.stats.record_timeout();

        let next = match self.try_next_server(id) {
            Some(query) => Some(query),
            None => {
                debug!(qname = %self.ctx(id).question.qname, "no reachable server");
                self.cache_servfail(id);
                self.resume_parents(id)
            }
        };
        self.finish_step(id, next)
    }

    // =========================================================================
    // Context lifecycle
    // =========================================================================

    fn create_context(
        &mut self,
        question: Question,
        nest: usize,
        parent: Option<ContextId>,
    ) -> ContextId {
        let id = ContextId(self.next_context);
        self.next_context += 1;
        trace!(ctx = %id, question = %question, nest, "created context");
        self.contexts
            .insert(id, ResolutionContext::new(id, question, nest, parent));
        id
    }

    fn ctx(&self, id: ContextId) -> &ResolutionContext {
        match self.contexts.get(&id) {
            Some(ctx) => ctx,
            None => panic!("unknown resolution context {id}"),
        }
    }

    fn ctx_mut(&mut self, id: ContextId) -> &mut ResolutionContext {
        match self.contexts.get_mut(&id) {
            Some(ctx) => ctx,
            None => panic!("unknown resolution context {id}"),
        }
    }

    /// Locates the deepest known zone cut and sends the first query.
    ///
    /// Missing addresses are never fetched here; the root is the fallback.
    fn start(&mut self, id: ContextId) -> Result<PendingQuery> {
        let question = self.ctx(id).question.clone();

        for name in [question.qname.clone(), Name::root()] {
            let Some((zone, nameservers)) = self.find_deepest(&name, &question) else {
                continue;
            };
            trace!(qname = %question.qname, zone = %zone, "located deepest zone cut");

            let (v4, v6) = self.find_ns_addrs(id, &nameservers, false);
            self.set_candidates(id, v4, v6);
            self.ctx_mut(id).zone = zone;

            if let Some(query) = self.try_next_server(id) {
                return Ok(query);
            }
        }

        Err(ResolverError::NoAvailableServer {
            qname: question.qname,
        })
    }

    /// Completes a step: collects spawned child queries and drops finished
    /// contexts.
    fn finish_step(&mut self, id: ContextId, next: Option<PendingQuery>) -> Step {
        let step = Step {
            next,
            aux: std::mem::take(&mut self.spawned),
        };
        self.reap(id);
        step
    }

    /// Removes `id` and its ancestors while they have nothing outstanding.
    fn reap(&mut self, id: ContextId) {
        let mut cursor = Some(id);
        while let Some(id) = cursor {
            let Some(ctx) = self.contexts.get(&id) else {
                return;
            };
            if ctx.current.is_some() || !ctx.children.is_empty() {
                return;
            }
            cursor = ctx.parent;
            if let Some(ctx) = self.contexts.remove(&id) {
                debug!(
                    qname = %ctx.question.qname,
                    qtype = %ctx.question.qtype,
                    remaining = self.contexts.len(),
                    "resolution completed"
                );
            }
            self.stats.record_completed();
        }
    }

    // =========================================================================
    // Response handling
    // =========================================================================

    fn process_response(
        &mut self,
        id: ContextId,
        key: QueryKey,
        response: &Message,
        msglen: u16,
    ) -> std::result::Result<Option<PendingQuery>, Lame> {
        if let Err(lame) = validate(response, &self.ctx(id).question, key.qid) {
            self.stats.record_lame();
            return Err(lame);
        }

        let class = classify(response);
        self.stats.record_response(class);

        match class {
            ResponseClass::Answer | ResponseClass::CnameAnswer => {
                let kind = if class == ResponseClass::Answer {
                    ResponseKind::Answer
                } else {
                    ResponseKind::CnameAnswer
                };
                let next = self.handle_auth_answer(id, response, msglen, kind)?;
                self.handle_auth_other_sections(id, response);
                Ok(next)
            }
            ResponseClass::Negative => {
                self.handle_negative_answer(id, response, msglen);
                Ok(None)
            }
            ResponseClass::Referral => self.handle_referral(id, response, msglen),
            ResponseClass::Unexpected(rcode) => Err(Lame::Rcode(rcode)),
        }
    }

    fn handle_auth_answer(
        &mut self,
        id: ContextId,
        response: &Message,
        msglen: u16,
        kind: ResponseKind,
    ) -> std::result::Result<Option<PendingQuery>, Lame> {
        let rcode = response.rcode();
        let question = self.ctx(id).question.clone();
        let answers = response.answers();

        if matches!(rcode, ResponseCode::NoError | ResponseCode::NXDomain) && !answers.is_empty() {
            let any = question.qtype.is_any();
            let info = ResponseInfo::new(msglen, kind);
            let mut found = false;

            for rrset in answers {
                if *rrset.name() != question.qname || rrset.rclass() != question.qclass {
                    continue;
                }
                self.cache
                    .add(rrset, Trust::Answer, info, ResponseCode::NoError);

                if any || rrset.rtype() == question.qtype {
                    found = true;
                    trace!(qname = %question.qname, rtype = %rrset.rtype(), "got an answer");
                    if !any {
                        return Ok(None);
                    }
                } else if rrset.rtype().is_cname() {
                    trace!(qname = %question.qname, "got an alias");
                    return Ok(self.chase_cname(id, rrset));
                }
            }

            if found {
                Ok(None)
            } else {
                Err(Lame::NoAnswer)
            }
        } else if rcode == ResponseCode::NXDomain
            || (rcode == ResponseCode::NoError && answers.is_empty())
        {
            self.handle_negative_answer(id, response, msglen);
            Ok(None)
        } else {
            Err(Lame::AnswerRcode(rcode))
        }
    }

    /// Follows a CNAME in a new top-level context.
    fn chase_cname(&mut self, id: ContextId, alias: &RRset) -> Option<PendingQuery> {
        let ctx = self.ctx(id);
        if ctx.nest > self.config.cname_chain_max {
            info!(qname = %ctx.question.qname, nest = ctx.nest, "possible CNAME loop");
            return None;
        }
        if ctx.parent.is_some() {
            info!(qname = %ctx.question.qname, "CNAME in internal fetch");
            return None;
        }
        let target = alias.rdatas().first().and_then(RData::target_name)?.clone();

        let question = Question::new(target, ctx.question.qtype, ctx.question.qclass);
        let nest = ctx.nest + 1;
        let chase = self.create_context(question, nest, None);
        match self.start(chase) {
            Ok(query) => Some(query),
            Err(e) => {
                warn!(error = %e, "failed to start CNAME resolution");
                self.contexts.remove(&chase);
                None
            }
        }
    }

    /// Caches in-zone NS records and their addresses from an authoritative
    /// answer.
    fn handle_auth_other_sections(&mut self, id: ContextId, response: &Message) {
        let zone = self.ctx(id).zone.clone();
        let mut targets: Vec<Name> = Vec::new();

        for rrset in response.authority() {
            if !rrset.rtype().is(RecordType::NS) || !rrset.name().is_subdomain_of(&zone) {
                continue;
            }
            self.cache.add(
                rrset,
                Trust::AuthAuthority,
                ResponseInfo::default(),
                ResponseCode::NoError,
            );
            targets.extend(
                rrset
                    .rdatas()
                    .iter()
                    .filter_map(RData::target_name)
                    .filter(|target| target.is_subdomain_of(&zone))
                    .cloned(),
            );
        }

        for rrset in response.additional() {
            if is_address(rrset.rtype()) && targets.contains(rrset.name()) {
                self.cache.add(
                    rrset,
                    Trust::AuthAdditional,
                    ResponseInfo::default(),
                    ResponseCode::NoError,
                );
            }
        }
    }

    fn handle_negative_answer(&mut self, id: ContextId, response: &Message, msglen: u16) {
        let question = self.ctx(id).question.clone();
        let rcode = match response.rcode() {
            ResponseCode::NoError => ResponseCode::NXRRSet,
            other => other,
        };

        let mut negative_ttl = None;
        for rrset in response.authority() {
            if rrset.rclass() != question.qclass || !rrset.rtype().is(RecordType::SOA) {
                continue;
            }
            if !matches!(
                rrset.name().relation(&question.qname),
                NameRelation::Equal | NameRelation::Superdomain
            ) {
                info!(qname = %question.qname, soa = %rrset.name(), "bogus SOA name for negative answer");
                continue;
            }
            self.cache.add(
                rrset,
                Trust::Answer,
                ResponseInfo::new(msglen, ResponseKind::Negative),
                ResponseCode::NoError,
            );
            negative_ttl = rrset.rdatas().first().and_then(RData::soa_minimum);
            trace!(qname = %question.qname, rcode = %rcode, ttl = ?negative_ttl, "got a negative response");
            break;
        }

        let ttl = match negative_ttl {
            Some(ttl) => ttl,
            None => {
                debug!(qname = %question.qname, rcode = %rcode, "negative answer without SOA");
                self.config.default_negative_ttl
            }
        };
        let negative = RRset::new(question.qname, question.qtype, question.qclass, ttl);
        self.cache.add(
            &negative,
            Trust::Answer,
            ResponseInfo::new(0, ResponseKind::Negative),
            rcode,
        );
    }

    fn handle_referral(
        &mut self,
        id: ContextId,
        response: &Message,
        msglen: u16,
    ) -> std::result::Result<Option<PendingQuery>, Lame> {
        let zone = self.ctx(id).zone.clone();
        let Some(ns) = response.find_authority(RecordType::NS) else {
            return Err(Lame::NoDelegation);
        };
        if ns.name().relation(&zone) != NameRelation::Subdomain {
            return Err(Lame::NotSubdomain {
                owner: ns.name().clone(),
                zone,
            });
        }

        trace!(zone = %zone, child = %ns.name(), "got a referral");
        self.cache.add(
            ns,
            Trust::Glue,
            ResponseInfo::new(msglen, ResponseKind::Referral),
            ResponseCode::NoError,
        );
        for rrset in response.additional() {
            if !matches!(
                zone.relation(rrset.name()),
                NameRelation::Equal | NameRelation::Superdomain
            ) {
                trace!(owner = %rrset.name(), "ignoring out-of-zone additional");
                continue;
            }
            if is_address(rrset.rtype()) {
                self.cache.add(
                    rrset,
                    Trust::Glue,
                    ResponseInfo::new(0, ResponseKind::Referral),
                    ResponseCode::NoError,
                );
            }
        }

        self.ctx_mut(id).zone = ns.name().clone();
        let (v4, v6) = self.find_ns_addrs(id, ns, true);
        self.set_candidates(id, v4, v6);

        match self.try_next_server(id) {
            Some(query) => Ok(Some(query)),
            None if self.ctx(id).children.is_empty() => Err(Lame::NoFurtherRecursion),
            None => Ok(None),
        }
    }

    // =========================================================================
    // Server selection
    // =========================================================================

    /// Finds the NS set of the deepest cached zone at or above `name`.
    fn find_deepest(&self, name: &Name, question: &Question) -> Option<(Name, RRset)> {
        name.ancestors().find_map(|zone| {
            let found = self.cache.find(
                &zone,
                question.qclass,
                RecordType::NS,
                FindOptions::ALLOW_NOANSWER,
                None,
            );
            found.rrset.map(|nameservers| (zone, nameservers))
        })
    }

    /// Collects cached addresses of a nameserver set.
    ///
    /// With `fetch`, when no address is known and no negative result is
    /// cached for any of them either, child contexts are spawned to fetch
    /// them (depth permitting).
    fn find_ns_addrs(&mut self, id: ContextId, nameservers: &RRset, fetch: bool) -> Candidates {
        let port = self.config.server_port;
        let class = nameservers.rclass();
        let targets: Vec<Name> = nameservers
            .rdatas()
            .iter()
            .filter_map(RData::target_name)
            .cloned()
            .collect();

        let mut v4 = Vec::new();
        let mut v6 = Vec::new();
        let mut rcode4 = None;
        let mut rcode6 = None;
        let families = [
            (self.config.ipv4, RecordType::A),
            (self.config.ipv6, RecordType::AAAA),
        ];

        for target in &targets {
            for (enabled, rtype) in families {
                if !enabled {
                    continue;
                }
                let found =
                    self.cache
                        .find(target, class, rtype, FindOptions::ALLOW_NOANSWER, None);
                let addrs = found
                    .rrset
                    .iter()
                    .flat_map(RRset::rdatas)
                    .filter_map(RData::ip_addr)
                    .map(|ip| SocketAddr::new(ip, port));
                if rtype == RecordType::A {
                    rcode4 = found.rcode;
                    v4.extend(addrs);
                } else {
                    rcode6 = found.rcode;
                    v6.extend(addrs);
                }
            }
        }

        if fetch && v4.is_empty() && v6.is_empty() && rcode4.is_none() && rcode6.is_none() {
            let ctx = self.ctx(id);
            trace!(qname = %ctx.question.qname, "no address found for any nameserver");
            if ctx.nest > self.config.fetch_depth_max {
                info!(qname = %ctx.question.qname, nest = ctx.nest, "reached fetch depth limit");
            } else {
                self.ctx_mut(id).nameservers = Some(nameservers.clone());
                for target in targets {
                    self.fetch_ns_addrs(id, target, class);
                }
            }
        }

        (v4, v6)
    }

    /// Spawns A and AAAA fetch contexts for one nameserver.
    fn fetch_ns_addrs(&mut self, parent: ContextId, target: Name, class: Class) {
        let nest = self.ctx(parent).nest + 1;
        for rtype in [RecordType::A, RecordType::AAAA] {
            let question = Question::new(target.clone(), rtype, class);
            let child = self.create_context(question, nest, Some(parent));
            match self.start(child) {
                Ok(query) => {
                    self.ctx_mut(parent).children.insert(child);
                    self.spawned.push(query);
                }
                Err(e) => {
                    warn!(error = %e, "failed to start address fetch");
                    self.contexts.remove(&child);
                }
            }
        }
    }

    fn set_candidates(&mut self, id: ContextId, v4: Vec<SocketAddr>, v6: Vec<SocketAddr>) {
        let ctx = self.ctx_mut(id);
        ctx.candidates4 = VecDeque::from(v4);
        ctx.candidates6 = VecDeque::from(v6);
    }

    /// Issues the query to the next candidate, IPv4 before IPv6.
    fn try_next_server(&mut self, id: ContextId) -> Option<PendingQuery> {
        loop {
            let ctx = self.ctx_mut(id);
            ctx.current = None;
            let server = ctx
                .candidates4
                .pop_front()
                .or_else(|| ctx.candidates6.pop_front())?;

            let qid = match self.reserve_qid(server) {
                Ok(qid) => qid,
                Err(e) => {
                    warn!(error = %e, "skipping server");
                    continue;
                }
            };

            let key = QueryKey::new(qid, server);
            let ctx = self.ctx_mut(id);
            ctx.current = Some(key);
            let wire = Message::query(qid, ctx.question.clone()).to_wire();
            trace!(qname = %ctx.question.qname, zone = %ctx.zone, server = %server, qid, "sending query");
            return Some(PendingQuery { ctx: id, key, wire });
        }
    }

    fn reserve_qid(&mut self, server: SocketAddr) -> Result<u16> {
        for _ in 0..QID_ATTEMPTS {
            let qid: u16 = self.rng.gen();
            if self.reserved.insert(QueryKey::new(qid, server)) {
                return Ok(qid);
            }
        }
        Err(ResolverError::QidExhausted { server })
    }

    /// Tries the next server, caching SERVFAIL when none is left.
    fn next_server_or_fail(&mut self, id: ContextId) -> Option<PendingQuery> {
        let next = self.try_next_server(id);
        if next.is_none() {
            debug!(qname = %self.ctx(id).question.qname, "no usable server");
            self.cache_servfail(id);
        }
        next
    }

    fn cache_servfail(&mut self, id: ContextId) {
        let question = &self.ctx(id).question;
        let failure = RRset::new(
            question.qname.clone(),
            question.qtype,
            question.qclass,
            self.config.servfail_ttl,
        );
        self.cache.add(
            &failure,
            Trust::Answer,
            ResponseInfo::new(0, ResponseKind::ServFail),
            ResponseCode::ServFail,
        );
    }

    // =========================================================================
    // Parent resumption
    // =========================================================================

    /// Propagates completion of `id` up its fetch-parent chain.
    ///
    /// Returns the query of the first ancestor that could continue.
    fn resume_parents(&mut self, id: ContextId) -> Option<PendingQuery> {
        let mut cursor = id;
        loop {
            let ctx = self.ctx(cursor);
            if !ctx.children.is_empty() {
                return None;
            }
            let parent = ctx.parent?;

            let (resumed, next) = self.resume(parent, cursor);
            if next.is_some() {
                return next;
            }
            if !resumed {
                return None;
            }

            debug!(qname = %self.ctx(parent).question.qname, "resumed context failed");
            self.cache_servfail(parent);
            cursor = parent;
        }
    }

    /// Drops finished `child` from `parent`; once the last child is gone the
    /// parent retries server selection.
    ///
    /// Returns whether the parent was resumed and its next query.
    fn resume(&mut self, parent: ContextId, child: ContextId) -> (bool, Option<PendingQuery>) {
        let ctx = self.ctx_mut(parent);
        if !ctx.children.remove(&child) {
            panic!("fetch context {child} is not a child of {parent}");
        }
        if !ctx.children.is_empty() {
            return (false, None);
        }

        trace!(qname = %ctx.question.qname, "resumed");
        let (v4, v6) = match ctx.nameservers.clone() {
            Some(nameservers) => self.find_ns_addrs(parent, &nameservers, false),
            None => (Vec::new(), Vec::new()),
        };
        self.set_candidates(parent, v4, v6);
        (true, self.try_next_server(parent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextState;
    use crate::{DEFAULT_NEGATIVE_TTL, SERVFAIL_TTL};
    use iterdns_cache::hints::install_root_hints;
    use iterdns_proto::rdata::Soa;
    use iterdns_proto::RecordClass;
    use std::net::{IpAddr, Ipv4Addr};
    use std::str::FromStr;

    fn name(s: &str) -> Name {
        Name::from_str(s).unwrap()
    }

    fn v4_only() -> ResolverConfig {
        ResolverConfig {
            ipv6: false,
            ..ResolverConfig::default()
        }
    }

    fn resolver() -> Resolver {
        let mut cache = RrCache::new();
        install_root_hints(&mut cache).unwrap();
        Resolver::with_seed(v4_only(), cache, 7)
    }

    fn question(qname: &str, rtype: RecordType) -> Question {
        Question::new(name(qname), rtype, RecordClass::IN)
    }

    fn reply(query: &PendingQuery) -> Message {
        Message::response_from(&Message::parse(&query.wire).unwrap())
    }

    fn a_set(owner: &str, octet: u8) -> RRset {
        RRset::with_rdatas(
            name(owner),
            RecordType::A,
            RecordClass::IN,
            300,
            vec![RData::A(Ipv4Addr::new(192, 0, 2, octet))],
        )
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

    fn referral(query: &PendingQuery, zone: &str, ns: &str, glue: Option<u8>) -> Message {
        let mut msg = reply(query);
        msg.add_authority(ns_set(zone, ns));
        if let Some(octet) = glue {
            msg.add_additional(a_set(ns, octet));
        }
        msg
    }

    fn server(octet: u8) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(192, 0, 2, octet)), 53)
    }

    fn respond(resolver: &mut Resolver, query: &PendingQuery, msg: &Message) -> Step {
        resolver.release(&query.key);
        resolver.handle_response(query.ctx, msg, msg.wire_len())
    }

    #[test]
    fn test_start_uses_root_hints() {
        let mut resolver = resolver();
        let query = resolver.start_query(question("example.com", RecordType::A)).unwrap();

        assert_eq!(query.key.server, SocketAddr::from(([198, 41, 0, 4], 53)));
        assert!(resolver.is_reserved(&query.key));

        let ctx = resolver.context(query.ctx).unwrap();
        assert!(ctx.zone().is_root());
        assert_eq!(ctx.state(), ContextState::AwaitingResponse);
        assert_eq!(ctx.remaining_servers(), 12);

        let sent = Message::parse(&query.wire).unwrap();
        assert_eq!(sent.id(), query.key.qid);
        assert!(!sent.header().recursion_desired());
    }

    #[test]
    fn test_start_without_hints_fails() {
        let mut resolver = Resolver::new(v4_only(), RrCache::new());
        let err = resolver
            .start_query(question("example.com", RecordType::A))
            .unwrap_err();
        assert!(matches!(err, ResolverError::NoAvailableServer { .. }));
        assert_eq!(resolver.active_contexts(), 0);
    }

    #[test]
    fn test_referral_chain_to_answer() {
        let mut resolver = resolver();
        let first = resolver.start_query(question("www.example.com", RecordType::A)).unwrap();

        let step = respond(&mut resolver, &first, &referral(&first, "com", "a.gtld.com", Some(10)));
        let second = step.next.unwrap();
        assert_eq!(second.key.server, server(10));
        assert_eq!(resolver.context(second.ctx).unwrap().zone(), &name("com"));

        let msg = referral(&second, "example.com", "ns1.example.com", Some(20));
        let third = respond(&mut resolver, &second, &msg).next.unwrap();
        assert_eq!(third.key.server, server(20));

        let mut answer = reply(&third);
        answer.header_mut().set_authoritative(true);
        answer.add_answer(a_set("www.example.com", 1));
        let step = respond(&mut resolver, &third, &answer);
        assert!(step.is_empty());
        assert_eq!(resolver.active_contexts(), 0);

        let found = resolver.cache().find(
            &name("www.example.com"),
            RecordClass::IN,
            RecordType::A,
            FindOptions::empty(),
            None,
        );
        assert_eq!(found.rrset, Some(a_set("www.example.com", 1)));

        // Referral data stays below answer trust
        let glue = resolver.cache().find(
            &name("ns1.example.com"),
            RecordClass::IN,
            RecordType::A,
            FindOptions::empty(),
            None,
        );
        assert!(glue.is_miss());
        assert_eq!(resolver.stats().referrals(), 2);
        assert_eq!(resolver.stats().answers(), 1);
        assert_eq!(resolver.stats().contexts_completed(), 1);
    }

    #[test]
    fn test_timeouts_cache_servfail() {
        let mut cache = RrCache::new();
        let info = ResponseInfo::default();
        let servers = ["a.ns.test", "b.ns.test", "c.ns.test"];
        let root = RRset::with_rdatas(
            Name::root(),
            RecordType::NS,
            RecordClass::IN,
            3600,
            servers.iter().map(|ns| RData::NS(name(ns))).collect(),
        );
        cache.add(&root, Trust::Local, info, ResponseCode::NoError);
        for (octet, ns) in (1..).zip(servers) {
            cache.add(&a_set(ns, octet), Trust::Local, info, ResponseCode::NoError);
        }

        let mut resolver = Resolver::with_seed(v4_only(), cache, 1);
        let mut query = resolver.start_query(question("example.com", RecordType::A)).unwrap();
        for octet in [1, 2] {
            assert_eq!(query.key.server, server(octet));
            resolver.release(&query.key);
            query = resolver.query_timeout(query.ctx, query.key.server).next.unwrap();
        }
        assert_eq!(query.key.server, server(3));
        resolver.release(&query.key);
        let step = resolver.query_timeout(query.ctx, query.key.server);
        assert!(step.is_empty());
        assert_eq!(resolver.active_contexts(), 0);
        assert_eq!(resolver.stats().timeouts(), 3);

        let found = resolver.cache().find(
            &name("example.com"),
            RecordClass::IN,
            RecordType::A,
            FindOptions::ALLOW_NEGATIVE,
            None,
        );
        assert_eq!(found.rcode, Some(ResponseCode::ServFail));
        assert_eq!(found.rrset.unwrap().ttl(), SERVFAIL_TTL);
    }

    #[test]
    fn test_negative_ttl_from_soa() {
        let mut resolver = resolver();
        let query = resolver.start_query(question("nope.example", RecordType::A)).unwrap();

        let mut msg = reply(&query);
        msg.set_rcode(ResponseCode::NXDomain);
        msg.header_mut().set_authoritative(true);
        let soa = Soa::new(name("ns.example"), name("admin.example"), 42, 7200, 600, 86400, 900);
        msg.add_authority(RRset::with_rdatas(
            name("example"),
            RecordType::SOA,
            RecordClass::IN,
            3600,
            vec![RData::SOA(soa)],
        ));
        assert!(respond(&mut resolver, &query, &msg).is_empty());

        let found = resolver.cache().find(
            &name("nope.example"),
            RecordClass::IN,
            RecordType::MX,
            FindOptions::ALLOW_NEGATIVE,
            None,
        );
        assert_eq!(found.rcode, Some(ResponseCode::NXDomain));
        assert_eq!(found.rrset.unwrap().ttl(), 900);
    }

    #[test]
    fn test_nodata_without_soa_uses_default_ttl() {
        let mut resolver = resolver();
        let query = resolver.start_query(question("example.org", RecordType::TXT)).unwrap();

        let msg = reply(&query);
        assert!(respond(&mut resolver, &query, &msg).is_empty());
        assert_eq!(resolver.stats().negatives(), 1);

        let found = resolver.cache().find(
            &name("example.org"),
            RecordClass::IN,
            RecordType::TXT,
            FindOptions::ALLOW_NEGATIVE,
            None,
        );
        assert_eq!(found.rcode, Some(ResponseCode::NXRRSet));
        assert_eq!(found.rrset.unwrap().ttl(), DEFAULT_NEGATIVE_TTL);
    }

    #[test]
    fn test_lame_response_moves_to_next_server() {
        let mut resolver = resolver();
        let query = resolver.start_query(question("example.com", RecordType::A)).unwrap();

        let mut refused = reply(&query);
        refused.set_rcode(ResponseCode::Refused);
        let next = respond(&mut resolver, &query, &refused).next.unwrap();
        assert_eq!(next.ctx, query.ctx);
        assert_ne!(next.key.server, query.key.server);
        assert_eq!(resolver.stats().lame(), 1);
    }

    #[test]
    fn test_out_of_bailiwick_referral_is_lame() {
        let mut resolver = resolver();
        let query = resolver.start_query(question("www.example.com", RecordType::A)).unwrap();
        let step = respond(&mut resolver, &query, &referral(&query, "com", "a.gtld.com", Some(10)));
        let query = step.next.unwrap();

        // com may not delegate org; with no other com server the question fails
        let step = respond(&mut resolver, &query, &referral(&query, "org", "ns.org", Some(9)));
        assert!(step.is_empty());
        assert_eq!(resolver.active_contexts(), 0);

        let delegation = resolver.cache().find(
            &name("org"),
            RecordClass::IN,
            RecordType::NS,
            FindOptions::ALLOW_NOANSWER,
            None,
        );
        assert!(delegation.is_miss());

        let found = resolver.cache().find(
            &name("www.example.com"),
            RecordClass::IN,
            RecordType::A,
            FindOptions::ALLOW_NEGATIVE,
            None,
        );
        assert_eq!(found.rcode, Some(ResponseCode::ServFail));
    }

    #[test]
    fn test_cname_chase_starts_new_context() {
        let mut resolver = resolver();
        let query = resolver.start_query(question("www.example.com", RecordType::A)).unwrap();

        let mut msg = reply(&query);
        msg.add_answer(cname_set("www.example.com", "web.example.net"));
        let step = respond(&mut resolver, &query, &msg);

        let chased = step.next.unwrap();
        assert_ne!(chased.ctx, query.ctx);
        let ctx = resolver.context(chased.ctx).unwrap();
        assert_eq!(ctx.question().qname, name("web.example.net"));
        assert_eq!(ctx.nest(), 1);
        assert_eq!(ctx.parent(), None);
        assert!(resolver.context(query.ctx).is_none());
        assert_eq!(resolver.stats().cname_answers(), 1);
    }

    #[test]
    fn test_cname_loop_is_bounded() {
        let mut cache = RrCache::new();
        install_root_hints(&mut cache).unwrap();
        let config = ResolverConfig {
            cname_chain_max: 1,
            ..v4_only()
        };
        let mut resolver = Resolver::with_seed(config, cache, 3);

        let mut query = resolver.start_query(question("a.example", RecordType::A)).unwrap();
        let mut sent = 1;
        loop {
            let asked = Message::parse(&query.wire).unwrap().question().unwrap().qname.clone();
            let target = if asked == name("a.example") { "b.example" } else { "a.example" };
            let mut msg = reply(&query);
            msg.header_mut().set_authoritative(true);
            msg.add_answer(cname_set(&asked.to_string(), target));
            match respond(&mut resolver, &query, &msg).next {
                Some(next) => {
                    query = next;
                    sent += 1;
                }
                None => break,
            }
        }
        assert_eq!(sent, 3);
        assert_eq!(resolver.active_contexts(), 0);
    }

    #[test]
    fn test_address_fetch_resumes_parent() {
        let mut resolver = resolver();
        let query = resolver.start_query(question("www.example.com", RecordType::A)).unwrap();
        let parent = query.ctx;

        let step = respond(&mut resolver, &query, &referral(&query, "com", "ns.example.net", None));
        assert!(step.next.is_none());
        assert_eq!(step.aux.len(), 2);
        let ctx = resolver.context(parent).unwrap();
        assert_eq!(ctx.state(), ContextState::WaitingForChildren);
        assert_eq!(ctx.pending_children(), 2);

        let (fetch_a, fetch_aaaa) = (&step.aux[0], &step.aux[1]);
        for fetch in [fetch_a, fetch_aaaa] {
            let child = resolver.context(fetch.ctx).unwrap();
            assert_eq!(child.parent(), Some(parent));
            assert_eq!(child.nest(), 1);
        }

        let mut answer = reply(fetch_a);
        answer.header_mut().set_authoritative(true);
        answer.add_answer(a_set("ns.example.net", 53));
        assert!(respond(&mut resolver, fetch_a, &answer).is_empty());
        assert_eq!(resolver.context(parent).unwrap().pending_children(), 1);

        let mut nodata = reply(fetch_aaaa);
        nodata.header_mut().set_authoritative(true);
        let step = respond(&mut resolver, fetch_aaaa, &nodata);
        let resumed = step.next.unwrap();
        assert_eq!(resumed.ctx, parent);
        assert_eq!(resumed.key.server, server(53));
        assert_eq!(resolver.active_contexts(), 1);
    }

    #[test]
    fn test_failed_fetches_fail_parent() {
        let mut resolver = resolver();
        let query = resolver.start_query(question("www.example.com", RecordType::A)).unwrap();
        let parent = query.ctx;
        let step = respond(&mut resolver, &query, &referral(&query, "com", "ns.example.net", None));

        // Both fetches end in NXDOMAIN, so the parent has nowhere to go
        for fetch in &step.aux {
            let mut nx = reply(fetch);
            nx.set_rcode(ResponseCode::NXDomain);
            respond(&mut resolver, fetch, &nx);
        }
        assert!(resolver.context(parent).is_none());
        assert_eq!(resolver.active_contexts(), 0);

        let found = resolver.cache().find(
            &name("www.example.com"),
            RecordClass::IN,
            RecordType::A,
            FindOptions::ALLOW_NEGATIVE,
            None,
        );
        assert_eq!(found.rcode, Some(ResponseCode::ServFail));
    }

    #[test]
    #[should_panic(expected = "unknown resolution context")]
    fn test_unknown_context_panics() {
        let mut resolver = resolver();
        resolver.query_timeout(ContextId(99), server(1));
    }
}
