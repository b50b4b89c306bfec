//! Server start/stop and the accept loop.
//!
//! # Responsibilities
//! - Bind the listener in a background task and report the outcome
//! - Accept connections and hand each one to its own connection task
//! - Expose the error stream, listening flag and bound address to the host
//! - Stop accepting on request and let in-flight connections drain
//!
//! The accept loop never reads, parses or routes. Everything after `accept`
//! happens in [`Connection::run`].

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::config::{ListenerConfig, ServerConfig};
use crate::error::{ErrorSink, ServerError, DEFAULT_ERROR_CHANNEL_CAPACITY};
use crate::lifecycle::Shutdown;
use crate::net::connection::{Connection, ConnectionContext, ConnectionTracker};
use crate::net::listener::Listener;
use crate::routing::{Route, Router};

/// Pause after a failed accept before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Outcome of the background bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BindState {
    Pending,
    Bound(SocketAddr),
    Failed,
}

/// An unstarted server: configuration plus an immutable routing table.
#[derive(Debug)]
pub struct Server {
    config: ServerConfig,
    router: Arc<Router>,
}

impl Server {
    pub fn new(config: ServerConfig, router: Router) -> Self {
        Self {
            config,
            router: Arc::new(router),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Spawn the accept loop and return immediately.
    ///
    /// Binding happens inside the spawned task; a failure arrives on the error
    /// stream with code `-1` and the server never listens. Must be called from
    /// within a Tokio runtime.
    pub fn start(self) -> ServerHandle {
        let (errors, error_rx) = ErrorSink::channel(self.config.observability.error_channel_capacity);
        let shutdown = Shutdown::new();
        let tracker = ConnectionTracker::new();
        let listening = Arc::new(AtomicBool::new(false));
        let (bound_tx, bound_rx) = watch::channel(BindState::Pending);

        let ctx = Arc::new(ConnectionContext::new(
            self.router,
            self.config.connection,
            errors,
        ));

        let task = tokio::spawn(accept_loop(
            self.config.listener,
            ctx,
            shutdown.subscribe(),
            tracker.clone(),
            Arc::clone(&listening),
            bound_tx,
        ));

        ServerHandle {
            errors: error_rx,
            listening,
            bound: bound_rx,
            shutdown,
            tracker,
            task: Some(task),
        }
    }
}

/// Start a server with default settings on `bind_address:bind_port`.
///
/// The port is given as text; one that does not parse is reported as a bind
/// failure on the returned handle's error stream.
pub fn start(bind_address: &str, bind_port: &str, routes: Vec<Route>) -> ServerHandle {
    let port = match bind_port.trim().parse::<u16>() {
        Ok(port) => port,
        Err(e) => {
            return ServerHandle::failed(ServerError::Bind {
                address: format!("{}:{}", bind_address, bind_port),
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, e),
            });
        }
    };

    let mut config = ServerConfig::default();
    config.listener.bind_address = bind_address.to_string();
    config.listener.port = port;

    Server::new(config, Router::new(routes)).start()
}

async fn accept_loop(
    listener_config: ListenerConfig,
    ctx: Arc<ConnectionContext>,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
    tracker: ConnectionTracker,
    listening: Arc<AtomicBool>,
    bound: watch::Sender<BindState>,
) {
    let listener = match Listener::bind(&listener_config).await {
        Ok(listener) => listener,
        Err(error) => {
            bound.send_replace(BindState::Failed);
            ctx.errors.report(error);
            return;
        }
    };

    let local_addr = match listener.local_addr() {
        Ok(addr) => addr,
        Err(source) => {
            bound.send_replace(BindState::Failed);
            ctx.errors.report(ServerError::Bind {
                address: listener_config.endpoint(),
                source,
            });
            return;
        }
    };

    listening.store(true, Ordering::SeqCst);
    bound.send_replace(BindState::Bound(local_addr));
    tracing::info!(
        address = %local_addr,
        routes = ctx.router.len(),
        write_gate = ?ctx.gate.mode(),
        strict = ctx.config.strict,
        "Server listening"
    );

    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer, permit)) => {
                    let guard = tracker.track();
                    let connection = Connection::new(stream, peer, guard, permit, Arc::clone(&ctx));
                    tokio::spawn(connection.run());
                }
                Err(error) => {
                    ctx.errors.report(error);
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            },
        }
    }

    listening.store(false, Ordering::SeqCst);
    tracing::info!(
        address = %local_addr,
        in_flight = tracker.active_count(),
        "Server stopped accepting"
    );
}

/// Host-side handle to a running server.
///
/// Dropping the handle stops the accept loop; connections already accepted
/// still run to completion.
#[derive(Debug)]
pub struct ServerHandle {
    errors: mpsc::Receiver<ServerError>,
    listening: Arc<AtomicBool>,
    bound: watch::Receiver<BindState>,
    shutdown: Shutdown,
    tracker: ConnectionTracker,
    task: Option<JoinHandle<()>>,
}

impl ServerHandle {
    /// A handle for a server that could not even be configured.
    fn failed(error: ServerError) -> Self {
        let (sink, errors) = ErrorSink::channel(DEFAULT_ERROR_CHANNEL_CAPACITY);
        sink.report(error);
        let (_, bound) = watch::channel(BindState::Failed);

        Self {
            errors,
            listening: Arc::new(AtomicBool::new(false)),
            bound,
            shutdown: Shutdown::new(),
            tracker: ConnectionTracker::new(),
            task: None,
        }
    }

    /// True between a successful bind and `stop`.
    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    /// Wait for the bind to finish; `None` if it failed.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        let mut bound = self.bound.clone();
        let waited = bound
            .wait_for(|state| *state != BindState::Pending)
            .await
            .map(|state| *state);
        let state = match waited {
            Ok(state) => state,
            Err(_) => *bound.borrow(),
        };
        match state {
            BindState::Bound(addr) => Some(addr),
            BindState::Pending | BindState::Failed => None,
        }
    }

    /// The error stream. Never blocks the server; errors that arrive while it
    /// is full are dropped.
    pub fn errors(&mut self) -> &mut mpsc::Receiver<ServerError> {
        &mut self.errors
    }

    /// Wait for the next reported error.
    pub async fn next_error(&mut self) -> Option<ServerError> {
        self.errors.recv().await
    }

    pub fn try_next_error(&mut self) -> Option<ServerError> {
        self.errors.try_recv().ok()
    }

    pub fn active_connections(&self) -> u64 {
        self.tracker.active_count()
    }

    /// Close the listener. In-flight connections are left to finish.
    pub async fn stop(&mut self) {
        self.shutdown.trigger();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Accept loop task failed");
            }
        }
        self.listening.store(false, Ordering::SeqCst);
    }

    /// Wait up to `timeout` for in-flight connections. True if all finished.
    pub async fn drain(&self, timeout: Duration) -> bool {
        let drained = tokio::time::timeout(timeout, self.tracker.wait_for_drain())
            .await
            .is_ok();
        if !drained {
            tracing::warn!(
                remaining = self.tracker.active_count(),
                "Drain timed out with connections still open"
            );
        }
        drained
    }
}
