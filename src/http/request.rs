//! Parsed request record handed to route handlers.

use std::fmt;
use std::io::{self, Read, Seek, SeekFrom};

use crate::http::headers::Headers;
use crate::net::buffer::Spool;

/// Supported request methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request body: the bytes that followed the header block.
///
/// Reads start at the body, never at the request line. [`Body::rewind`] returns
/// to the first body byte.
pub struct Body {
    spool: Spool,
    start: u64,
    len: u64,
}

impl Body {
    /// Wrap `spool`, treating everything from `start` onward as the body.
    pub fn new(mut spool: Spool, start: u64) -> io::Result<Self> {
        let total = spool.len()?;
        let start = start.min(total);
        spool.seek(SeekFrom::Start(start))?;
        Ok(Self {
            spool,
            start,
            len: total - start,
        })
    }

    pub fn empty() -> Self {
        Self {
            spool: Spool::from(Vec::new()),
            start: 0,
            len: 0,
        }
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True when the request was large enough to be buffered on disk.
    pub fn is_spilled(&self) -> bool {
        self.spool.is_spilled()
    }

    pub fn rewind(&mut self) -> io::Result<()> {
        self.spool.seek(SeekFrom::Start(self.start))?;
        Ok(())
    }

    /// Read the whole body from its first byte.
    pub fn read_all(&mut self) -> io::Result<Vec<u8>> {
        self.rewind()?;
        let mut bytes = Vec::with_capacity(self.len as usize);
        self.spool.read_to_end(&mut bytes)?;
        Ok(bytes)
    }
}

impl Read for Body {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.spool.read(buf)
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Body")
            .field("len", &self.len)
            .field("spilled", &self.spool.is_spilled())
            .finish()
    }
}

/// A decoded request.
#[derive(Debug)]
pub struct Request {
    pub method: Method,
    /// Path plus optional `?query`, with the HTTP version removed.
    pub uri: String,
    pub headers: Headers,
    pub body: Body,
}

impl Request {
    /// Path component of the uri (everything before `?`).
    pub fn path(&self) -> &str {
        match self.uri.split_once('?') {
            Some((path, _)) => path,
            None => &self.uri,
        }
    }

    /// Raw query string without the leading `?`.
    pub fn query(&self) -> Option<&str> {
        self.uri.split_once('?').map(|(_, query)| query)
    }
}
