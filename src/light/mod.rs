//! The light API served by the `disco-light` binary.
//!
//! # Data Flow
//! ```text
//! GET /               → handlers::LightApi::home_page  → usage hint (JSON)
//! GET /?color=RRGGBB  → handlers::LightApi::color_page → LightState::set → watchers
//! ```

pub mod color;
pub mod handlers;

pub use color::{Color, ColorError, LightState};
pub use handlers::{LightApi, COLOR_PATTERN, HOME_PATTERN};
