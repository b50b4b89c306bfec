//! Server error types and the error-notification channel.
//!
//! Every fault the server wants its host to know about travels through an
//! [`ErrorSink`] as a [`ServerError`]. The sink never blocks: the channel is
//! bounded, and an event that finds it full or closed is dropped after being logged.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::http::codec::CodecError;
use crate::observability::metrics;

/// Errors held for the host before new ones are dropped.
pub const DEFAULT_ERROR_CHANNEL_CAPACITY: usize = 1024;

/// Errors reported by the server and its connections.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listener could not bind. Fatal to the server instance.
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// Accepting a connection failed. The accept loop keeps running.
    #[error("Failed to accept: {0}")]
    Accept(#[source] std::io::Error),

    /// The request bytes could not be decoded.
    #[error("Rejected request from {peer}: {source}")]
    BadRequest {
        peer: SocketAddr,
        #[source]
        source: CodecError,
    },

    /// A route handler panicked.
    #[error("Handler for route {route} failed: {message}")]
    Handler { route: String, message: String },

    /// Socket or scratch-buffer I/O failed mid-connection.
    #[error("Connection I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A socket read or write exceeded its deadline.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
}

impl ServerError {
    /// Numeric code delivered to the host alongside the message.
    ///
    /// Bind failures are always `-1`.
    pub fn code(&self) -> i32 {
        match self {
            ServerError::Bind { .. } => -1,
            ServerError::Accept(_) => -2,
            ServerError::BadRequest { .. } => -3,
            ServerError::Handler { .. } => -4,
            ServerError::Io(_) | ServerError::Timeout { .. } => -5,
        }
    }

    /// Short label used for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerError::Bind { .. } => "bind",
            ServerError::Accept(_) => "accept",
            ServerError::BadRequest { .. } => "bad_request",
            ServerError::Handler { .. } => "handler",
            ServerError::Io(_) => "io",
            ServerError::Timeout { .. } => "timeout",
        }
    }

    /// True when this error ends the server instance.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ServerError::Bind { .. })
    }
}

/// Sending half of the error-notification channel.
#[derive(Debug, Clone)]
pub struct ErrorSink {
    tx: mpsc::Sender<ServerError>,
}

impl ErrorSink {
    /// Create a sink and the receiver the host consumes.
    ///
    /// At most `capacity` undelivered errors are held (minimum 1).
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ServerError>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Log, count and forward an error. Never blocks.
    pub fn report(&self, error: ServerError) {
        metrics::record_server_error(error.kind());

        if error.is_fatal() {
            tracing::error!(code = error.code(), kind = error.kind(), error = %error, "Server error");
        } else {
            tracing::warn!(code = error.code(), kind = error.kind(), error = %error, "Server error");
        }

        if let Err(mpsc::error::TrySendError::Full(dropped)) = self.tx.try_send(error) {
            metrics::record_dropped_error(dropped.kind());
            tracing::debug!(kind = dropped.kind(), "Error channel full, dropping error");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_failure_uses_code_minus_one() {
        let err = ServerError::Bind {
            address: "127.0.0.1:1".into(),
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use"),
        };
        assert_eq!(err.code(), -1);
        assert!(err.is_fatal());
        assert!(err.to_string().contains("127.0.0.1:1"));
    }

    #[test]
    fn report_without_receiver_does_not_panic() {
        let (sink, rx) = ErrorSink::channel(DEFAULT_ERROR_CHANNEL_CAPACITY);
        drop(rx);
        sink.report(ServerError::Accept(std::io::Error::other("boom")));
    }

    #[test]
    fn reported_errors_reach_the_receiver() {
        let (sink, mut rx) = ErrorSink::channel(DEFAULT_ERROR_CHANNEL_CAPACITY);
        sink.report(ServerError::Handler {
            route: "^/$".into(),
            message: "panicked".into(),
        });

        let received = rx.try_recv().unwrap();
        assert_eq!(received.code(), -4);
        assert_eq!(received.kind(), "handler");
    }

    #[test]
    fn full_channel_drops_newest_errors() {
        let (sink, mut rx) = ErrorSink::channel(3);
        for i in 0..10 {
            sink.report(ServerError::Handler {
                route: format!("^/{}$", i),
                message: "panicked".into(),
            });
        }

        let mut kept = Vec::new();
        while let Ok(error) = rx.try_recv() {
            kept.push(error.to_string());
        }
        assert_eq!(kept.len(), 3);
        assert!(kept[0].contains("^/0$"));
        assert!(kept[2].contains("^/2$"));
    }
}
