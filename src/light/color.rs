//! Light colour and the shared light state.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ColorError {
    #[error("Colour {0:?} needs at least six hex digits")]
    TooShort(String),

    #[error("Colour {0:?} is not hexadecimal")]
    NotHex(String),
}

/// An ARGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub a: u8,
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(0xFF, 0xFF, 0xFF);

    /// Fully opaque colour.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { a: 0xFF, r, g, b }
    }

    /// Parse the first six hex digits of `value` as `RRGGBB`.
    ///
    /// Anything after the sixth digit is ignored.
    pub fn from_hex(value: &str) -> Result<Self, ColorError> {
        let digits = value
            .get(..6)
            .ok_or_else(|| ColorError::TooShort(value.to_string()))?;
        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ColorError::NotHex(value.to_string()));
        }

        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16).map_err(|_| ColorError::NotHex(value.to_string()))
        };
        Ok(Self::rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}{:02X}", self.a, self.r, self.g, self.b)
    }
}

/// The current light colour, shared between handlers and observers.
///
/// Starts white. Observers get every change through [`LightState::subscribe`].
#[derive(Debug, Clone)]
pub struct LightState {
    tx: Arc<watch::Sender<Color>>,
}

impl LightState {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Color::WHITE);
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> Color {
        *self.tx.borrow()
    }

    /// Set the colour, returning the previous one.
    pub fn set(&self, color: Color) -> Color {
        self.tx.send_replace(color)
    }

    pub fn subscribe(&self) -> watch::Receiver<Color> {
        self.tx.subscribe()
    }
}

impl Default for LightState {
    fn default() -> Self {
        Self::new()
    }
}
