//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Start (http::server):
//!     Server::start → spawn accept task → bind → listening
//!
//! Stop (shutdown.rs):
//!     ServerHandle::stop → Shutdown::trigger → accept loop exits → listener closed
//!     → in-flight connections drain on their own
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → binary calls stop + drain
//! ```
//!
//! # Design Decisions
//! - Stop closes the listening socket first, then waits; nothing is cancelled
//! - Drain has a timeout chosen by the caller

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::{wait_for_stop_signal, StopSignal};
