//! Query driver: sockets, outstanding queries and timers.
//!
//! [`Dispatcher`] holds the synchronous bookkeeping (outstanding-query table,
//! timer queue, admission cap) over any [`Transport`]. [`QueryDriver`] runs
//! it as a single tokio event loop over one IPv4 and/or one IPv6 UDP socket.

use crate::context::{ContextId, PendingQuery, QueryKey, Step};
use crate::error::{ResolverError, Result};
use crate::resolver::Resolver;
use crate::timer::TimerQueue;
use crate::ResolverConfig;
use hashbrown::HashMap;
use iterdns_metrics::metrics;
use iterdns_proto::{Message, Question};
use socket2::{Domain, Protocol, Socket, Type};
use std::collections::VecDeque;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::UdpSocket;
use tokio::sync::Notify;
use tracing::{debug, info, trace, warn};

/// Sends encoded queries to servers.
pub trait Transport {
    /// Sends `wire` to `server`.
    fn send(&mut self, wire: &[u8], server: SocketAddr) -> io::Result<()>;
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Routes responses and timeouts to resolution contexts.
#[derive(Debug)]
pub struct Dispatcher<T> {
    resolver: Resolver,
    transport: T,
    outstanding: HashMap<QueryKey, ContextId>,
    timers: TimerQueue<QueryKey>,
}

impl<T: Transport> Dispatcher<T> {
    /// Creates a dispatcher.
    pub fn new(resolver: Resolver, transport: T) -> Self {
        Self {
            resolver,
            transport,
            outstanding: HashMap::new(),
            timers: TimerQueue::new(),
        }
    }

    /// Returns the resolver.
    #[inline]
    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Returns the resolver mutably.
    #[inline]
    pub fn resolver_mut(&mut self) -> &mut Resolver {
        &mut self.resolver
    }

    /// Consumes the dispatcher, returning its resolver.
    pub fn into_resolver(self) -> Resolver {
        self.resolver
    }

    /// Returns the transport.
    #[inline]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns the transport mutably.
    #[inline]
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Returns the number of outstanding queries.
    #[inline]
    pub fn outstanding(&self) -> usize {
        self.outstanding.len()
    }

    /// Returns true while another question may be admitted.
    pub fn has_capacity(&self) -> bool {
        self.outstanding.len() < self.resolver.config().max_queries
    }

    /// Returns true while any query is outstanding.
    pub fn is_active(&self) -> bool {
        !self.outstanding.is_empty()
    }

    /// Returns the earliest pending timer expiry.
    pub fn next_deadline(&mut self) -> Option<Instant> {
        self.timers.current_expiration()
    }

    /// Starts resolving `question` and sends its first query.
    pub fn admit(&mut self, question: Question, now: Instant) -> Result<()> {
        let query = self.resolver.start_query(question)?;
        self.register(query, now);
        self.update_gauges();
        Ok(())
    }

    /// Handles a datagram received from `from`.
    pub fn on_datagram(&mut self, data: &[u8], from: SocketAddr, now: Instant) {
        let response = match Message::parse(data) {
            Ok(msg) => msg,
            Err(e) => {
                info!(server = %from, error = %e, "broken packet");
                self.resolver.stats().record_broken_packet();
                return;
            }
        };

        let key = QueryKey::new(response.id(), from);
        let Some(ctx) = self.outstanding.remove(&key) else {
            info!(server = %from, qid = response.id(), "unknown response");
            self.resolver.stats().record_unknown_response();
            return;
        };
        trace!(server = %from, qid = key.qid, len = data.len(), "received response");

        self.timers.remove(&key);
        self.resolver.release(&key);
        let step = self.resolver.handle_response(ctx, &response, data.len());
        self.register_step(step, now);
    }

    /// Fires every timer expired at `now`.
    pub fn on_timers(&mut self, now: Instant) {
        for key in self.timers.get_expired(now) {
            let Some(ctx) = self.outstanding.remove(&key) else {
                continue;
            };
            self.resolver.release(&key);
            let step = self.resolver.query_timeout(ctx, key.server);
            self.register_step(step, now);
        }
    }

    fn register_step(&mut self, step: Step, now: Instant) {
        for query in step.into_queries() {
            self.register(query, now);
        }
        self.update_gauges();
    }

    /// Sends a query and arms its timer.
    fn register(&mut self, query: PendingQuery, now: Instant) {
        if self.resolver.context(query.ctx).is_none() {
            panic!("query {} registered for dead context {}", query.key, query.ctx);
        }

        let server = query.key.server;
        if let Err(e) = self.transport.send(&query.wire, server) {
            warn!(server = %server, error = %e, "failed to send query");
        }
        self.resolver.stats().record_query_sent(server.is_ipv6());

        let expire = now + self.resolver.config().query_timeout;
        self.timers.add(expire, query.key);
        self.outstanding.insert(query.key, query.ctx);
    }

    fn update_gauges(&self) {
        metrics().set_active_contexts(self.outstanding.len());
        metrics().set_cache_rows(self.resolver.cache().len());
    }
}

// =============================================================================
// UDP transport
// =============================================================================

/// One UDP socket per enabled address family.
///
/// [`Transport::send`] only queues the datagram; [`UdpTransport::flush`]
/// writes the queue out once the socket is writable.
#[derive(Debug)]
pub struct UdpTransport {
    v4: Option<Arc<UdpSocket>>,
    v6: Option<Arc<UdpSocket>>,
    queue: VecDeque<(Vec<u8>, SocketAddr)>,
}

impl UdpTransport {
    /// Binds ephemeral sockets for the families enabled in `config`.
    ///
    /// Must be called within a tokio runtime.
    pub fn bind(config: &ResolverConfig) -> Result<Self> {
        if !config.ipv4 && !config.ipv6 {
            return Err(ResolverError::NoTransport);
        }

        let v4 = if config.ipv4 {
            Some(Arc::new(bind_socket(SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)))?))
        } else {
            None
        };
        let v6 = if config.ipv6 {
            Some(Arc::new(bind_socket(SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)))?))
        } else {
            None
        };
        Ok(Self {
            v4,
            v6,
            queue: VecDeque::new(),
        })
    }

    /// Returns the local IPv4 address, if bound.
    pub fn local_v4(&self) -> Option<SocketAddr> {
        self.v4.as_ref().and_then(|s| s.local_addr().ok())
    }

    /// Returns the local IPv6 address, if bound.
    pub fn local_v6(&self) -> Option<SocketAddr> {
        self.v6.as_ref().and_then(|s| s.local_addr().ok())
    }

    /// Returns the number of datagrams waiting for [`flush`](Self::flush).
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Sends every queued datagram, waiting for the sockets to be writable.
    pub async fn flush(&mut self) {
        while let Some((wire, server)) = self.queue.pop_front() {
            let Some(socket) = self.socket_for(server) else {
                continue;
            };
            if let Err(e) = socket.send_to(&wire, server).await {
                warn!(server = %server, error = %e, "failed to send query");
            }
        }
    }

    fn socket_for(&self, server: SocketAddr) -> Option<&UdpSocket> {
        let socket = if server.is_ipv4() { &self.v4 } else { &self.v6 };
        socket.as_deref()
    }

    fn sockets(&self) -> (Option<Arc<UdpSocket>>, Option<Arc<UdpSocket>>) {
        (self.v4.clone(), self.v6.clone())
    }
}

impl Transport for UdpTransport {
    fn send(&mut self, wire: &[u8], server: SocketAddr) -> io::Result<()> {
        if self.socket_for(server).is_none() {
            return Err(io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                "address family disabled",
            ));
        }
        self.queue.push_back((wire.to_vec(), server));
        Ok(())
    }
}

fn bind_socket(addr: SocketAddr) -> io::Result<UdpSocket> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
    if addr.is_ipv6() {
        socket.set_only_v6(true)?;
    }
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;

    let std_socket: std::net::UdpSocket = socket.into();
    let socket = UdpSocket::from_std(std_socket)?;
    debug!(addr = ?socket.local_addr().ok(), "query socket bound");
    Ok(socket)
}

// =============================================================================
// Shutdown
// =============================================================================

#[derive(Debug, Default)]
struct ShutdownState {
    requested: AtomicBool,
    notify: Notify,
}

/// Cooperative shutdown flag shared with signal handlers.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    state: Arc<ShutdownState>,
}

impl Shutdown {
    /// Creates an unset flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests shutdown and wakes the driver.
    pub fn request(&self) {
        self.state.requested.store(true, Ordering::SeqCst);
        self.state.notify.notify_one();
    }

    /// Returns true once shutdown was requested.
    pub fn is_requested(&self) -> bool {
        self.state.requested.load(Ordering::SeqCst)
    }

    /// Completes once shutdown is requested.
    pub async fn requested(&self) {
        if self.is_requested() {
            return;
        }
        self.state.notify.notified().await;
    }
}

// =============================================================================
// Event loop
// =============================================================================

enum Event {
    Shutdown,
    Datagram {
        received: io::Result<(usize, SocketAddr)>,
        ipv6: bool,
    },
    Timer,
}

/// The UDP event loop driving a [`Resolver`].
#[derive(Debug)]
pub struct QueryDriver {
    dispatcher: Dispatcher<UdpTransport>,
    shutdown: Shutdown,
    buf4: Vec<u8>,
    buf6: Vec<u8>,
}

impl QueryDriver {
    /// Binds the query sockets for `resolver`.
    ///
    /// Must be called within a tokio runtime.
    pub fn new(resolver: Resolver) -> Result<Self> {
        let transport = UdpTransport::bind(resolver.config())?;
        let size = resolver.config().recv_buffer;
        Ok(Self {
            dispatcher: Dispatcher::new(resolver, transport),
            shutdown: Shutdown::new(),
            buf4: vec![0u8; size],
            buf6: vec![0u8; size],
        })
    }

    /// Returns a handle that stops the loop.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Returns the dispatcher.
    pub fn dispatcher(&self) -> &Dispatcher<UdpTransport> {
        &self.dispatcher
    }

    /// Consumes the driver, returning its resolver.
    pub fn into_resolver(self) -> Resolver {
        self.dispatcher.into_resolver()
    }

    /// Resolves `questions`, keeping at most `max_queries` outstanding.
    ///
    /// Returns once every question has been resolved or shutdown was
    /// requested; in-flight contexts are abandoned on shutdown.
    pub async fn run<I>(&mut self, questions: I) -> Result<()>
    where
        I: IntoIterator<Item = Question>,
    {
        let mut questions = questions.into_iter();
        let mut exhausted = false;
        let mut admitted = 0usize;

        loop {
            if self.shutdown.is_requested() {
                info!(
                    outstanding = self.dispatcher.outstanding(),
                    "resolver shutting down"
                );
                break;
            }

            while !exhausted && self.dispatcher.has_capacity() {
                let Some(question) = questions.next() else {
                    exhausted = true;
                    break;
                };
                match self.dispatcher.admit(question.clone(), Instant::now()) {
                    Ok(()) => admitted += 1,
                    Err(e) => warn!(question = %question, error = %e, "failed to start resolution"),
                }
            }

            self.dispatcher.transport_mut().flush().await;
            if !self.dispatcher.is_active() {
                break;
            }

            let deadline = self.dispatcher.next_deadline();
            let (v4, v6) = self.dispatcher.transport().sockets();
            let event = tokio::select! {
                _ = self.shutdown.requested() => Event::Shutdown,
                received = recv_from(v4.as_deref(), &mut self.buf4) => Event::Datagram {
                    received,
                    ipv6: false,
                },
                received = recv_from(v6.as_deref(), &mut self.buf6) => Event::Datagram {
                    received,
                    ipv6: true,
                },
                _ = sleep_until(deadline) => Event::Timer,
            };

            match event {
                Event::Shutdown => continue,
                Event::Datagram { received, ipv6 } => match received {
                    Ok((len, from)) => {
                        let buf = if ipv6 { &self.buf6 } else { &self.buf4 };
                        self.dispatcher.on_datagram(&buf[..len], from, Instant::now());
                    }
                    Err(e) => debug!(error = %e, "receive failure"),
                },
                Event::Timer => self.dispatcher.on_timers(Instant::now()),
            }
        }

        info!(
            questions = admitted,
            cache_rows = self.dispatcher.resolver().cache().len(),
            "resolution finished"
        );
        Ok(())
    }
}

async fn recv_from(socket: Option<&UdpSocket>, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
    match socket {
        Some(socket) => socket.recv_from(buf).await,
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline.into()).await,
        None => std::future::pending().await,
    }
}
