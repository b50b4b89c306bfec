//! Disco Light: a minimal embedded HTTP/1.1 server and the light API it serves.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client                ┌──────────────────────────────────────────────────┐
//!     ──────────────────────┼─▶ net::listener ──▶ net::connection              │
//!                           │                        │  buffer → http::codec    │
//!                           │                        ▼                          │
//!                           │                    routing::Router (first match)  │
//!                           │                        │                          │
//!                           │                        ▼                          │
//!                           │                    handler (light::LightApi)      │
//!                           │                        │                          │
//!     ◀─────────────────────┼── http::codec ◀── net::gate ◀┘                    │
//!                           │                                                   │
//!                           │  config · observability · lifecycle · error       │
//!                           └──────────────────────────────────────────────────┘
//! ```
//!
//! One request per connection, `GET` and `POST` only, `Connection: close` always.
//! Faults are delivered to the host through [`ServerHandle`]'s error stream.

// Core subsystems
pub mod config;
pub mod error;
pub mod http;
pub mod net;
pub mod routing;

// Application
pub mod light;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::ServerConfig;
pub use error::ServerError;
pub use http::{start, Request, Response, Server, ServerHandle};
pub use routing::{handler_fn, Route, Router};
