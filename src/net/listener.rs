//! TCP listener with optional backpressure.
//!
//! # Responsibilities
//! - Bind to the configured address and port
//! - Accept incoming TCP connections
//! - Enforce `max_connections` via semaphore when configured
//!
//! # Design Decisions
//! - Unbounded by default: one task per connection, no pool
//! - The permit travels with the connection and frees its slot on drop

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

use crate::config::ListenerConfig;
use crate::error::ServerError;

/// TCP listener that can cap concurrent connections.
#[derive(Debug)]
pub struct Listener {
    /// The underlying TCP listener.
    inner: TcpListener,
    /// Present only when `max_connections > 0`.
    connection_limit: Option<Arc<Semaphore>>,
}

impl Listener {
    /// Bind to the configured address and port.
    ///
    /// Host names are resolved; IPv6 literals are accepted without brackets.
    pub async fn bind(config: &ListenerConfig) -> Result<Self, ServerError> {
        let inner = TcpListener::bind((config.bind_address.as_str(), config.port))
            .await
            .map_err(|source| ServerError::Bind {
                address: config.endpoint(),
                source,
            })?;

        let local_addr = inner.local_addr().map_err(|source| ServerError::Bind {
            address: config.endpoint(),
            source,
        })?;

        let connection_limit =
            (config.max_connections > 0).then(|| Arc::new(Semaphore::new(config.max_connections)));

        tracing::info!(
            address = %local_addr,
            max_connections = config.max_connections,
            "Listener bound"
        );

        Ok(Self {
            inner,
            connection_limit,
        })
    }

    /// Accept a new connection, waiting for a free slot first when capped.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr, ConnectionPermit), ServerError> {
        let permit = match &self.connection_limit {
            Some(limit) => Some(Arc::clone(limit).acquire_owned().await.map_err(|_| {
                ServerError::Accept(std::io::Error::other("connection limiter closed"))
            })?),
            None => None,
        };

        let (stream, addr) = self.inner.accept().await.map_err(ServerError::Accept)?;

        tracing::debug!(
            peer_addr = %addr,
            available_permits = self.available_permits(),
            "Connection accepted"
        );

        Ok((stream, addr, ConnectionPermit { _permit: permit }))
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }

    /// Free connection slots, `None` when unbounded.
    pub fn available_permits(&self) -> Option<usize> {
        self.connection_limit.as_ref().map(|s| s.available_permits())
    }
}

/// A permit representing a connection slot.
///
/// When dropped, the slot is released back to the listener. This keeps
/// backpressure intact even if the connection task panics.
#[derive(Debug)]
pub struct ConnectionPermit {
    _permit: Option<tokio::sync::OwnedSemaphorePermit>,
}

impl ConnectionPermit {
    /// A permit that holds no slot (unbounded listener, tests).
    pub fn unbounded() -> Self {
        Self { _permit: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(max_connections: usize) -> ListenerConfig {
        ListenerConfig {
            bind_address: "127.0.0.1".into(),
            port: 0,
            max_connections,
        }
    }

    #[tokio::test]
    async fn binds_ephemeral_port() {
        let listener = Listener::bind(&local(0)).await.unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
        assert_eq!(listener.available_permits(), None);
    }

    #[tokio::test]
    async fn bind_conflict_is_reported() {
        let first = Listener::bind(&local(0)).await.unwrap();
        let taken = ListenerConfig {
            port: first.local_addr().unwrap().port(),
            ..local(0)
        };

        let err = Listener::bind(&taken).await.unwrap_err();
        assert_eq!(err.code(), -1);
    }

    #[tokio::test]
    async fn permits_are_released_on_drop() {
        let listener = Listener::bind(&local(1)).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let _client = TcpStream::connect(addr).await.unwrap();
        let (_stream, _, permit) = listener.accept().await.unwrap();
        assert_eq!(listener.available_permits(), Some(0));

        drop(permit);
        assert_eq!(listener.available_permits(), Some(1));
    }
}
