//! Single-threaded readiness reactor.
//!
//! The [`Reactor`] owns the listening endpoint and every accepted connection.
//! Each registered socket has exactly one entry in the registry map, keyed by
//! its mio [`Token`], holding a [`Handler`] that decides what a readiness
//! event on that socket means.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use mio::{Events, Interest, Poll, Token, Waker};
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::http::connection::{Connection, ConnectionLimits, Readiness};
use crate::server::listener::{self, Endpoint};

const WAKER: Token = Token(0);
const FIRST_TOKEN: usize = 1;
const EVENTS_CAPACITY: usize = 1024;
/// Longest wait while an endpoint has a deferred accept outstanding.
const ACCEPT_RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// What a readiness event on a registered socket triggers.
pub enum Handler {
    /// Listening endpoint: accept pending peers
    Accept(Endpoint),
    /// Peer connection: read, answer, write
    Serve(Connection),
}

/// Stops a running [`Reactor`] from another thread.
#[derive(Clone)]
pub struct ShutdownHandle {
    stop: Arc<AtomicBool>,
    waker: Arc<Waker>,
}

impl ShutdownHandle {
    /// Requests a stop; the loop exits after finishing its current batch.
    pub fn shutdown(&self) {
        self.stop.store(true, Ordering::Release);
        if let Err(e) = self.waker.wake() {
            warn!(error = %e, "failed to wake reactor");
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }
}

pub struct Reactor {
    poll: Poll,
    registry: HashMap<Token, Handler>,
    next_token: usize,
    local_addr: Option<SocketAddr>,
    limits: ConnectionLimits,
    max_connections: usize,
    connections: usize,
    /// Endpoints whose accept queue may still hold peers after a failed accept
    accept_retry: Vec<Token>,
    stop: Arc<AtomicBool>,
    waker: Arc<Waker>,
}

impl Reactor {
    pub fn new(limits: ConnectionLimits, max_connections: usize) -> io::Result<Self> {
        let poll = Poll::new()?;
        let waker = Arc::new(Waker::new(poll.registry(), WAKER)?);

        Ok(Self {
            poll,
            registry: HashMap::new(),
            next_token: FIRST_TOKEN,
            local_addr: None,
            limits,
            max_connections,
            connections: 0,
            accept_retry: Vec::new(),
            stop: Arc::new(AtomicBool::new(false)),
            waker,
        })
    }

    /// Builds a reactor from configuration and binds its endpoint.
    pub fn bind(config: &ServerConfig) -> anyhow::Result<Self> {
        use anyhow::Context;

        let addr = config.socket_addr()?;
        let mut reactor = Self::new(config.limits(), config.max_connections)
            .context("failed to create poll instance")?;
        reactor
            .listen(addr, config.backlog)
            .with_context(|| format!("failed to listen on {addr}"))?;
        Ok(reactor)
    }

    /// Creates the endpoint and registers it for read readiness.
    pub fn listen(&mut self, addr: SocketAddr, backlog: i32) -> io::Result<SocketAddr> {
        let mut endpoint = listener::bind(addr, backlog)?;
        let local = endpoint.local_addr();
        let token = self.allocate_token();

        self.poll
            .registry()
            .register(endpoint.listener_mut(), token, Interest::READABLE)?;
        info!(addr = %local, backlog = endpoint.backlog(), ?token, "Endpoint registered");
        self.registry.insert(token, Handler::Accept(endpoint));
        self.local_addr.get_or_insert(local);

        Ok(local)
    }

    /// Address of the first endpoint, once listening.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            stop: Arc::clone(&self.stop),
            waker: Arc::clone(&self.waker),
        }
    }

    /// Number of live peer connections.
    pub fn connection_count(&self) -> usize {
        self.connections
    }

    /// Runs the event loop until a [`ShutdownHandle`] stops it.
    ///
    /// Only a failure of the readiness wait itself ends the loop with an
    /// error; per-connection failures close that connection and carry on.
    pub fn run(&mut self) -> io::Result<()> {
        let mut events = Events::with_capacity(EVENTS_CAPACITY);
        info!(addr = ?self.local_addr, "Reactor running");

        while !self.stop.load(Ordering::Acquire) {
            self.turn(&mut events, None)?;
        }

        info!(connections = self.connections, "Reactor stopped");
        self.registry.clear();
        self.connections = 0;
        Ok(())
    }

    /// Waits up to `timeout` for one batch of events and dispatches it.
    ///
    /// Returns the number of socket events handled.
    pub fn poll_once(&mut self, timeout: Option<Duration>) -> io::Result<usize> {
        let mut events = Events::with_capacity(EVENTS_CAPACITY);
        self.turn(&mut events, timeout)
    }

    fn turn(&mut self, events: &mut Events, timeout: Option<Duration>) -> io::Result<usize> {
        // Edge-triggered listeners get no new event for peers already queued.
        let timeout = if self.accept_retry.is_empty() {
            timeout
        } else {
            Some(timeout.map_or(ACCEPT_RETRY_INTERVAL, |t| t.min(ACCEPT_RETRY_INTERVAL)))
        };

        if let Err(e) = self.poll.poll(events, timeout) {
            if e.kind() == io::ErrorKind::Interrupted {
                return Ok(0);
            }
            return Err(e);
        }

        let mut handled = 0;
        for event in events.iter() {
            if event.token() == WAKER {
                continue;
            }
            self.dispatch(event.token(), Readiness::from_event(event));
            handled += 1;
        }

        for token in std::mem::take(&mut self.accept_retry) {
            debug!(?token, "retrying deferred accept");
            self.dispatch(token, Readiness { readable: true, writable: false });
        }
        Ok(handled)
    }

    /// Routes one readiness event to the handler registered for `token`.
    pub fn dispatch(&mut self, token: Token, readiness: Readiness) {
        match self.registry.get(&token) {
            Some(Handler::Accept(_)) => {
                // Edge-triggered: keep accepting until the queue is empty.
                while self.accept(token) {}
            }
            Some(Handler::Serve(_)) => self.serve(token, readiness),
            None => warn!(?token, "event for unregistered token ignored"),
        }
    }

    /// Accepts a single pending connection on the endpoint behind `token`.
    ///
    /// Returns whether another accept should be attempted.
    pub fn accept(&mut self, token: Token) -> bool {
        let accepted = match self.registry.get(&token) {
            Some(Handler::Accept(endpoint)) => endpoint.accept(),
            _ => {
                warn!(?token, "accept on a token that is not an endpoint");
                return false;
            }
        };

        let (mut stream, peer) = match accepted {
            Ok(Some(pair)) => pair,
            Ok(None) => return false,
            Err(e) if matches!(
                e.kind(),
                io::ErrorKind::ConnectionAborted | io::ErrorKind::Interrupted
            ) =>
            {
                debug!(error = %e, "transient accept failure");
                return true;
            }
            Err(e) => {
                // Typically EMFILE/ENFILE; the queue is left as is until the
                // next batch.
                warn!(error = %e, "accept failed, retrying next batch");
                if !self.accept_retry.contains(&token) {
                    self.accept_retry.push(token);
                }
                return false;
            }
        };

        if self.connections >= self.max_connections {
            warn!(%peer, max = self.max_connections, "connection limit reached, dropping peer");
            return true;
        }

        let conn_token = self.allocate_token();
        if let Err(e) = self
            .poll
            .registry()
            .register(&mut stream, conn_token, Interest::READABLE)
        {
            warn!(%peer, error = %e, "failed to register connection");
            return true;
        }

        info!(%peer, token = ?conn_token, "Accepted connection");
        self.registry.insert(
            conn_token,
            Handler::Serve(Connection::new(stream, peer, self.limits)),
        );
        self.connections += 1;
        true
    }

    /// Lets the connection behind `token` react to readiness, then applies
    /// the resulting registration change.
    pub fn serve(&mut self, token: Token, readiness: Readiness) {
        let conn = match self.registry.get_mut(&token) {
            Some(Handler::Serve(conn)) => conn,
            _ => {
                warn!(?token, "serve on a token that is not a connection");
                return;
            }
        };

        let before = conn.interest();
        conn.handle(readiness);

        if conn.is_closed() {
            self.close(token);
            return;
        }

        let after = conn.interest();
        if after != before {
            let peer = conn.peer();
            let result = self
                .poll
                .registry()
                .reregister(conn.stream_mut(), token, after);
            if let Err(e) = result {
                warn!(%peer, error = %e, "failed to update interest, closing");
                self.close(token);
            }
        }
    }

    /// Deregisters and drops the socket behind `token`.
    ///
    /// Closing a token that is not registered is logged and ignored.
    pub fn close(&mut self, token: Token) {
        let registry = self.poll.registry();
        match self.registry.remove(&token) {
            Some(Handler::Serve(mut conn)) => {
                conn.close();
                if let Err(e) = registry.deregister(conn.stream_mut()) {
                    debug!(peer = %conn.peer(), error = %e, "deregister failed");
                }
                self.connections = self.connections.saturating_sub(1);
                info!(peer = %conn.peer(), ?token, "Closed connection");
            }
            Some(Handler::Accept(mut endpoint)) => {
                self.accept_retry.retain(|t| *t != token);
                if let Err(e) = registry.deregister(endpoint.listener_mut()) {
                    debug!(error = %e, "deregister failed");
                }
                info!(addr = %endpoint.local_addr(), "Endpoint closed");
            }
            None => debug!(?token, "close on unregistered token ignored"),
        }
    }

    fn allocate_token(&mut self) -> Token {
        let token = Token(self.next_token);
        self.next_token = self.next_token.wrapping_add(1).max(FIRST_TOKEN);
        token
    }
}
