//! Response-write gate.
//!
//! Held while a response body is streamed to the socket. In `Global` mode every
//! connection shares one lock, so body transmission is serialized server-wide.
//! In `PerConnection` mode each connection owns its socket exclusively already, so
//! the gate never blocks.
//!
//! The permit is an RAII guard: it is released on every exit path, including
//! write errors and timeouts.

use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

use crate::config::WriteGateMode;

#[derive(Debug, Clone)]
pub enum WriteGate {
    Global(Arc<Mutex<()>>),
    PerConnection,
}

/// Proof that the holder may write a response body.
#[derive(Debug)]
pub struct GatePermit<'a> {
    _guard: Option<MutexGuard<'a, ()>>,
}

impl WriteGate {
    pub fn new(mode: WriteGateMode) -> Self {
        match mode {
            WriteGateMode::Global => WriteGate::Global(Arc::new(Mutex::new(()))),
            WriteGateMode::PerConnection => WriteGate::PerConnection,
        }
    }

    pub fn mode(&self) -> WriteGateMode {
        match self {
            WriteGate::Global(_) => WriteGateMode::Global,
            WriteGate::PerConnection => WriteGateMode::PerConnection,
        }
    }

    /// Wait for the right to write a body.
    pub async fn acquire(&self) -> GatePermit<'_> {
        match self {
            WriteGate::Global(lock) => GatePermit {
                _guard: Some(lock.lock().await),
            },
            WriteGate::PerConnection => GatePermit { _guard: None },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn global_gate_is_exclusive() {
        let gate = WriteGate::new(WriteGateMode::Global);
        let held = gate.acquire().await;

        let contender = tokio::time::timeout(Duration::from_millis(50), gate.acquire()).await;
        assert!(contender.is_err(), "second writer must wait");

        drop(held);
        let after = tokio::time::timeout(Duration::from_millis(50), gate.acquire()).await;
        assert!(after.is_ok(), "released permit lets the next writer in");
    }

    #[tokio::test]
    async fn clones_share_the_global_lock() {
        let gate = WriteGate::new(WriteGateMode::Global);
        let other = gate.clone();
        let _held = gate.acquire().await;

        let contender = tokio::time::timeout(Duration::from_millis(50), other.acquire()).await;
        assert!(contender.is_err());
    }

    #[tokio::test]
    async fn per_connection_gate_never_blocks() {
        let gate = WriteGate::new(WriteGateMode::PerConnection);
        let _first = gate.acquire().await;
        let second = tokio::time::timeout(Duration::from_millis(50), gate.acquire()).await;
        assert!(second.is_ok());
        assert_eq!(gate.mode(), WriteGateMode::PerConnection);
    }
}
