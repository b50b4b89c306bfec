//! Connection handling: one accepted socket, one request, one response.
//!
//! # Responsibilities
//! - Drive the per-connection state machine
//! - Buffer request bytes, decode, route, await the handler, write, close
//! - Generate unique connection IDs for tracing
//! - Track live connections so the server can drain on stop
//!
//! # States
//! ```text
//! Accepted → Buffering → Parsed → Routed → Responding → Closed
//!                │          │        └──→ NotFoundResponding → Closed
//!                └──────────┴──→ ErrorResponding → Closed
//! ```
//! Any state may jump straight to `Closed` on a socket fault or deadline.

use std::any::Any;
use std::future::Future;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Notify;
use tracing::Instrument;

use crate::config::ConnectionConfig;
use crate::error::{ErrorSink, ServerError};
use crate::http::codec::{self, CodecError, BAD_REQUEST_RESPONSE, NOT_FOUND_RESPONSE};
use crate::http::{Request, Response};
use crate::net::buffer::RequestBuffer;
use crate::net::gate::WriteGate;
use crate::net::listener::ConnectionPermit;
use crate::observability::metrics;
use crate::routing::{Route, Router};

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Where a connection is in its single request/response exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Accepted,
    Buffering,
    Parsed,
    Routed,
    Responding,
    NotFoundResponding,
    ErrorResponding,
    Closed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Accepted => "accepted",
            ConnectionState::Buffering => "buffering",
            ConnectionState::Parsed => "parsed",
            ConnectionState::Routed => "routed",
            ConnectionState::Responding => "responding",
            ConnectionState::NotFoundResponding => "not_found_responding",
            ConnectionState::ErrorResponding => "error_responding",
            ConnectionState::Closed => "closed",
        }
    }

    /// Legal edges of the state machine.
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;

        match (self, next) {
            (Closed, _) => false,
            (_, Closed) => true,
            (Accepted, Buffering) => true,
            (Buffering, Parsed) | (Buffering, ErrorResponding) => true,
            (Parsed, Routed) | (Parsed, ErrorResponding) => true,
            (Routed, Responding) | (Routed, NotFoundResponding) => true,
            _ => false,
        }
    }
}

/// How an exchange ended, used as the metrics outcome label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A handler response was written.
    Served,
    /// No route matched; the fixed 404 was written.
    NotFound,
    /// The request could not be decoded.
    Rejected,
    /// The peer closed without sending anything.
    Empty,
    /// The handler panicked; an empty response was written.
    HandlerFailed,
    /// Socket fault or deadline.
    Failed,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Served => "served",
            Outcome::NotFound => "not_found",
            Outcome::Rejected => "rejected",
            Outcome::Empty => "empty",
            Outcome::HandlerFailed => "handler_failed",
            Outcome::Failed => "failed",
        }
    }
}

/// Tracks active connections for graceful shutdown.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    /// Current count of active connections.
    active_count: Arc<AtomicU64>,
    /// Woken whenever the count drops to zero.
    drained: Arc<Notify>,
}

impl ConnectionTracker {
    /// Create a new connection tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new active connection. Returns a guard that decrements on drop.
    pub fn track(&self) -> ConnectionGuard {
        self.active_count.fetch_add(1, Ordering::SeqCst);
        metrics::record_connection_opened();
        ConnectionGuard {
            active_count: Arc::clone(&self.active_count),
            drained: Arc::clone(&self.drained),
            id: ConnectionId::new(),
        }
    }

    /// Get current active connection count.
    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }

    /// Wait until every tracked connection has closed.
    pub async fn wait_for_drain(&self) {
        loop {
            let notified = self.drained.notified();
            if self.active_count() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Guard that tracks a connection's lifetime.
/// Decrements active count when dropped.
#[derive(Debug)]
pub struct ConnectionGuard {
    active_count: Arc<AtomicU64>,
    drained: Arc<Notify>,
    id: ConnectionId,
}

impl ConnectionGuard {
    /// Get this connection's ID.
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        metrics::record_connection_closed();
        if self.active_count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.drained.notify_waiters();
        }
        tracing::trace!(connection_id = %self.id, "Connection released");
    }
}

/// Everything a connection task needs from its server.
#[derive(Debug)]
pub struct ConnectionContext {
    pub router: Arc<Router>,
    pub config: ConnectionConfig,
    pub gate: WriteGate,
    pub errors: ErrorSink,
}

impl ConnectionContext {
    pub fn new(router: Arc<Router>, config: ConnectionConfig, errors: ErrorSink) -> Self {
        Self {
            router,
            gate: WriteGate::new(config.write_gate),
            config,
            errors,
        }
    }
}

/// Owns one accepted socket for one request/response exchange.
pub struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    state: ConnectionState,
    guard: ConnectionGuard,
    _permit: ConnectionPermit,
    ctx: Arc<ConnectionContext>,
}

impl Connection {
    pub fn new(
        stream: TcpStream,
        peer: SocketAddr,
        guard: ConnectionGuard,
        permit: ConnectionPermit,
        ctx: Arc<ConnectionContext>,
    ) -> Self {
        Self {
            stream,
            peer,
            state: ConnectionState::Accepted,
            guard,
            _permit: permit,
            ctx,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.guard.id()
    }

    /// Run the exchange to completion and close the socket.
    pub async fn run(self) {
        let span = tracing::debug_span!(
            "connection",
            connection_id = %self.id(),
            peer_addr = %self.peer
        );
        self.serve().instrument(span).await
    }

    async fn serve(mut self) {
        let started = Instant::now();

        let (method, outcome) = match self.exchange().await {
            Ok(result) => result,
            Err(error) => {
                self.ctx.errors.report(error);
                ("-", Outcome::Failed)
            }
        };

        self.transition(ConnectionState::Closed);
        let _ = self.stream.shutdown().await;

        metrics::record_request(method, outcome.as_str(), started);
        tracing::debug!(
            outcome = outcome.as_str(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Connection closed"
        );
    }

    async fn exchange(&mut self) -> Result<(&'static str, Outcome), ServerError> {
        self.transition(ConnectionState::Buffering);
        let buffer = match self.buffer_request().await? {
            Buffered::Complete(buffer) => buffer,
            Buffered::Oversized { limit } => {
                self.transition(ConnectionState::ErrorResponding);
                return self.reject(CodecError::RequestTooLarge { limit }).await;
            }
        };
        let received = buffer.len();
        let spool = buffer.into_spool()?;

        self.transition(ConnectionState::Parsed);
        let request = match codec::decode(spool) {
            Ok(request) => request,
            Err(source) => {
                self.transition(ConnectionState::ErrorResponding);
                if received == 0 {
                    tracing::debug!("Peer closed before sending a request");
                    return Ok(("-", Outcome::Empty));
                }
                return self.reject(source).await;
            }
        };

        let method = request.method.as_str();
        tracing::debug!(method, uri = %request.uri, "Request decoded");

        self.transition(ConnectionState::Routed);
        let router = Arc::clone(&self.ctx.router);
        let Some(route) = router.match_uri(&request.uri) else {
            self.transition(ConnectionState::NotFoundResponding);
            tracing::debug!(uri = %request.uri, "No route matched");
            self.write_raw(NOT_FOUND_RESPONSE).await?;
            return Ok((method, Outcome::NotFound));
        };

        self.transition(ConnectionState::Responding);
        let (response, outcome) = match invoke(route, request).await {
            Ok(response) => (response, Outcome::Served),
            Err(message) => {
                self.ctx.errors.report(ServerError::Handler {
                    route: route.pattern(),
                    message,
                });
                (Response::new(), Outcome::HandlerFailed)
            }
        };

        self.write_response(&response).await?;
        Ok((method, outcome))
    }

    /// Report an undecodable request, answering 400 first in strict mode.
    async fn reject(&mut self, source: CodecError) -> Result<(&'static str, Outcome), ServerError> {
        if self.ctx.config.strict {
            self.write_raw(BAD_REQUEST_RESPONSE).await?;
        }
        self.ctx.errors.report(ServerError::BadRequest {
            peer: self.peer,
            source,
        });
        Ok(("-", Outcome::Rejected))
    }

    /// Read until a short read or end of stream.
    ///
    /// There is no `Content-Length` framing: a read that does not fill the chunk
    /// is taken to mean the client has sent everything it is going to send.
    /// The read deadline covers the whole request, and reading stops early once
    /// the request cap would be exceeded.
    async fn buffer_request(&mut self) -> Result<Buffered, ServerError> {
        let chunk_size = self.ctx.config.read_chunk_size.max(1);
        let deadline = self.ctx.config.read_timeout();
        let limit = self.ctx.config.max_request_bytes();
        let mut buffer = RequestBuffer::new(self.ctx.config.spill_threshold);
        let stream = &mut self.stream;

        let filled = with_deadline("read", deadline, async move {
            let mut chunk = vec![0u8; chunk_size];
            loop {
                let n = stream.read(&mut chunk).await?;
                if n == 0 {
                    break;
                }
                if let Some(limit) = limit {
                    if buffer.len() + n as u64 > limit {
                        return Ok(Buffered::Oversized { limit });
                    }
                }
                buffer.append(&chunk[..n])?;
                if n < chunk_size {
                    break;
                }
            }
            tracing::trace!(bytes = buffer.len(), spilled = buffer.is_spilled(), "Request buffered");
            Ok::<_, std::io::Error>(Buffered::Complete(buffer))
        })
        .await?;

        Ok(filled)
    }

    /// Write head, then the body under the write gate.
    async fn write_response(&mut self, response: &Response) -> Result<(), ServerError> {
        let deadline = self.ctx.config.write_timeout();
        let chunk_size = self.ctx.config.write_chunk_size;
        let gate = &self.ctx.gate;
        let stream = &mut self.stream;

        with_deadline("write", deadline, async move {
            stream.write_all(&codec::encode_head(response)).await?;
            if response.content.is_some() {
                let _permit = gate.acquire().await;
                for chunk in codec::body_chunks(response, chunk_size) {
                    stream.write_all(&chunk).await?;
                }
            }
            stream.flush().await
        })
        .await
    }

    async fn write_raw(&mut self, bytes: &'static [u8]) -> Result<(), ServerError> {
        let deadline = self.ctx.config.write_timeout();
        let stream = &mut self.stream;

        with_deadline("write", deadline, async move {
            stream.write_all(bytes).await?;
            stream.flush().await
        })
        .await
    }

    fn transition(&mut self, next: ConnectionState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {:?} -> {:?}",
            self.state,
            next
        );
        tracing::trace!(from = self.state.as_str(), to = next.as_str(), "State change");
        self.state = next;
    }
}

/// Result of the buffering phase.
enum Buffered {
    Complete(RequestBuffer),
    Oversized { limit: u64 },
}

/// Run the handler inside a panic boundary.
async fn invoke(route: &Route, request: Request) -> Result<Response, String> {
    let handler = Arc::clone(route.handler());
    AssertUnwindSafe(async move { handler(request).await })
        .catch_unwind()
        .await
        .map_err(|panic| panic_message(panic.as_ref()))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}

async fn with_deadline<T>(
    operation: &'static str,
    deadline: Option<Duration>,
    fut: impl Future<Output = std::io::Result<T>>,
) -> Result<T, ServerError> {
    match deadline {
        Some(after) => tokio::time::timeout(after, fut)
            .await
            .map_err(|_| ServerError::Timeout { operation, after })?
            .map_err(ServerError::Io),
        None => fut.await.map_err(ServerError::Io),
    }
}
