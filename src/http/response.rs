//! Response record produced by route handlers.
//!
//! Handlers only choose headers and content. The status line and the framing
//! headers (`Content-Length`, `Connection`) are decided by the codec.

use bytes::Bytes;

use crate::http::headers::Headers;

/// Header whose presence turns the response into a `302`.
pub const LOCATION: &str = "Location";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    pub headers: Headers,
    /// `None` means no body at all.
    pub content: Option<Bytes>,
}

impl Response {
    pub fn new() -> Self {
        Self::default()
    }

    /// A `302` pointing at `location`.
    pub fn redirect(location: impl Into<String>) -> Self {
        Self::new().with_header(LOCATION, location)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_content(mut self, content: impl Into<Bytes>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn is_redirect(&self) -> bool {
        self.headers.contains(LOCATION)
    }

    /// Exact byte length advertised in `Content-Length`.
    pub fn content_length(&self) -> usize {
        self.content.as_ref().map_or(0, Bytes::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nil_content_has_zero_length() {
        let response = Response::new();
        assert_eq!(response.content_length(), 0);
        assert!(!response.is_redirect());
    }

    #[test]
    fn redirect_sets_location() {
        let response = Response::redirect("/elsewhere");
        assert!(response.is_redirect());
        assert_eq!(response.headers.get(LOCATION), Some("/elsewhere"));
    }
}
