//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept, optional connection cap)
//!     → connection.rs (state machine, tracking, deadlines)
//!         → buffer.rs (request bytes, spilled to a temp file when large)
//!         → gate.rs (serializes body writes when configured global)
//!     → socket shut down
//!
//! Connection States:
//!     Accepted → Buffering → Parsed → Routed → Responding → Closed
//! ```
//!
//! # Design Decisions
//! - One tokio task per connection, unbounded unless `max_connections` is set
//! - Each connection tracked so the server can drain on stop

pub mod buffer;
pub mod connection;
pub mod gate;
pub mod listener;
