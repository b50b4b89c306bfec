//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Decoded request uri (path + query, raw)
//!     → router.rs (ordered scan)
//!     → matcher.rs (regex test)
//!     → Return: matched Route or no match (→ 404)
//!
//! Route table (at startup):
//!     Vec<(pattern, handler)> from the host
//!     → Compile patterns
//!     → Freeze as immutable Router behind Arc
//! ```
//!
//! # Design Decisions
//! - Routes fixed once the server starts; no registration while listening
//! - Deterministic: same uri always matches the same route
//! - First match wins (registration order)

pub mod matcher;
pub mod router;

pub use matcher::{Matcher, RegexMatcher};
pub use router::{handler_fn, Handler, HandlerFuture, Route, RouteError, Router};
