//! Resolution contexts and the queries they emit.

use bytes::Bytes;
use hashbrown::HashSet;
use iterdns_proto::{Name, Question, RRset};
use std::collections::VecDeque;
use std::fmt;
use std::net::SocketAddr;

/// Handle of a context in the resolver's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(pub(crate) u64);

impl ContextId {
    /// Returns the raw id.
    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx#{}", self.0)
    }
}

/// Identifies an outstanding query: transaction id plus server address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryKey {
    /// Transaction id.
    pub qid: u16,
    /// Server the query was sent to.
    pub server: SocketAddr,
}

impl QueryKey {
    /// Creates a query key.
    #[inline]
    pub const fn new(qid: u16, server: SocketAddr) -> Self {
        Self { qid, server }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} qid={}", self.server, self.qid)
    }
}

/// A query ready to be sent on behalf of a context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingQuery {
    /// The context waiting for the response.
    pub ctx: ContextId,
    /// Transaction id and destination.
    pub key: QueryKey,
    /// Encoded query message.
    pub wire: Bytes,
}

/// Queries produced by one resolver step.
///
/// `next` continues the context that was stepped (or the context that
/// replaced it when chasing a CNAME, or a resumed ancestor); `aux` holds
/// the first queries of child contexts spawned to fetch nameserver
/// addresses.
#[derive(Debug, Default)]
pub struct Step {
    /// Direct continuation.
    pub next: Option<PendingQuery>,
    /// Queries of newly spawned child contexts.
    pub aux: Vec<PendingQuery>,
}

impl Step {
    /// Returns true if the step produced no query at all.
    pub fn is_empty(&self) -> bool {
        self.next.is_none() && self.aux.is_empty()
    }

    /// Returns every query of the step, continuation first.
    pub fn into_queries(self) -> impl Iterator<Item = PendingQuery> {
        self.next.into_iter().chain(self.aux)
    }
}

/// Where a context is in its resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// A query is outstanding.
    AwaitingResponse,
    /// Suspended until its address-fetch children finish.
    WaitingForChildren,
    /// Nothing outstanding; the outcome is in the cache.
    Completed,
}

/// Per-question resolution state.
#[derive(Debug)]
pub struct ResolutionContext {
    pub(crate) id: ContextId,
    pub(crate) question: Question,
    /// CNAME chain length or address-fetch depth.
    pub(crate) nest: usize,
    pub(crate) parent: Option<ContextId>,
    pub(crate) children: HashSet<ContextId>,
    pub(crate) zone: Name,
    /// NS set whose addresses are being fetched; used on resume.
    pub(crate) nameservers: Option<RRset>,
    pub(crate) candidates4: VecDeque<SocketAddr>,
    pub(crate) candidates6: VecDeque<SocketAddr>,
    pub(crate) current: Option<QueryKey>,
}

impl ResolutionContext {
    pub(crate) fn new(
        id: ContextId,
        question: Question,
        nest: usize,
        parent: Option<ContextId>,
    ) -> Self {
        Self {
            id,
            question,
            nest,
            parent,
            children: HashSet::new(),
            zone: Name::root(),
            nameservers: None,
            candidates4: VecDeque::new(),
            candidates6: VecDeque::new(),
            current: None,
        }
    }

    /// Returns the context id.
    #[inline]
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Returns the question being resolved.
    #[inline]
    pub fn question(&self) -> &Question {
        &self.question
    }

    /// Returns the nesting level.
    #[inline]
    pub fn nest(&self) -> usize {
        self.nest
    }

    /// Returns the parent of an address-fetch context.
    #[inline]
    pub fn parent(&self) -> Option<ContextId> {
        self.parent
    }

    /// Returns the zone currently being queried.
    #[inline]
    pub fn zone(&self) -> &Name {
        &self.zone
    }

    /// Returns the outstanding query, if any.
    #[inline]
    pub fn current_query(&self) -> Option<QueryKey> {
        self.current
    }

    /// Returns the number of unfinished children.
    #[inline]
    pub fn pending_children(&self) -> usize {
        self.children.len()
    }

    /// Returns the number of untried candidate addresses.
    pub fn remaining_servers(&self) -> usize {
        self.candidates4.len() + self.candidates6.len()
    }

    /// Returns the current state.
    pub fn state(&self) -> ContextState {
        if self.current.is_some() {
            ContextState::AwaitingResponse
        } else if !self.children.is_empty() {
            ContextState::WaitingForChildren
        } else {
            ContextState::Completed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iterdns_proto::{RecordClass, RecordType};
    use std::str::FromStr;

    #[test]
    fn test_context_state() {
        let question = Question::new(
            Name::from_str("example.com").unwrap(),
            RecordType::A,
            RecordClass::IN,
        );
        let mut ctx = ResolutionContext::new(ContextId(1), question, 0, None);
        assert_eq!(ctx.state(), ContextState::Completed);
        assert!(ctx.zone().is_root());

        ctx.children.insert(ContextId(2));
        assert_eq!(ctx.state(), ContextState::WaitingForChildren);

        ctx.current = Some(QueryKey::new(1, "192.0.2.1:53".parse().unwrap()));
        assert_eq!(ctx.state(), ContextState::AwaitingResponse);
    }

    #[test]
    fn test_step_queries_order() {
        let query = |id, qid| PendingQuery {
            ctx: ContextId(id),
            key: QueryKey::new(qid, "192.0.2.1:53".parse().unwrap()),
            wire: Bytes::new(),
        };
        let step = Step {
            next: Some(query(1, 10)),
            aux: vec![query(2, 20), query(3, 30)],
        };
        assert!(!step.is_empty());

        let ids: Vec<u64> = step.into_queries().map(|q| q.ctx.get()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(Step::default().is_empty());
    }
}
