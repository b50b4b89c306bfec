//! HTTP/1.1 handling subsystem.
//!
//! # Data Flow
//! ```text
//! accepted socket (net::connection)
//!     → codec.rs (decode request line, headers, body offset)
//!     → request.rs (Request handed to the matched handler)
//!     → response.rs (handler result)
//!     → codec.rs (status line, framing headers, chunked body writes)
//!     → socket closed
//! ```
//!
//! `server.rs` owns the accept loop and the host-facing [`ServerHandle`].
//!
//! # Design Decisions
//! - One request per connection; `Connection: close` on every response
//! - Only `GET` and `POST`; anything else is dropped without a reply
//! - Headers are an ordered list, not a map, and names keep their case

pub mod codec;
pub mod headers;
pub mod request;
pub mod response;
pub mod server;

pub use codec::CodecError;
pub use headers::Headers;
pub use request::{Body, Method, Request};
pub use response::Response;
pub use server::{start, Server, ServerHandle};
