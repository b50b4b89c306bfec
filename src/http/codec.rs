//! HTTP/1.1 wire codec.
//!
//! # Responsibilities
//! - Decode buffered request bytes into a [`Request`]
//! - Encode a [`Response`] into the exact bytes written to the socket
//!
//! # Design Decisions
//! - No socket I/O here; the connection owns reads, writes and the write gate
//! - Header names are kept verbatim, later duplicates overwrite earlier ones
//! - Status line and framing headers are derived from the response, never supplied by handlers

use std::fmt::Write as _;
use std::io::{self, BufRead, BufReader};

use bytes::Bytes;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::http::headers::Headers;
use crate::http::request::{Body, Method, Request};
use crate::http::response::Response;
use crate::net::buffer::Spool;

/// Default size of each body chunk written to the socket.
pub const WRITE_CHUNK_SIZE: usize = 1024;

/// Fixed reply for a request no route matched.
pub const NOT_FOUND_RESPONSE: &[u8] = b"HTTP/1.1 404 Not Found\r\n\
Content-Type: text/html\r\n\
Content-Length: 9\r\n\
Pragma: no-cache\r\n\
Connection: close\r\n\
\r\n\
Not found";

/// Fixed reply for an undecodable request when strict mode is on.
pub const BAD_REQUEST_RESPONSE: &[u8] = b"HTTP/1.1 400 Bad Request\r\n\
Content-Type: text/html\r\n\
Content-Length: 11\r\n\
Pragma: no-cache\r\n\
Connection: close\r\n\
\r\n\
Bad request";

static VERSION_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(" HTTP.*$").expect("version suffix pattern is valid"));

/// Reasons a request could not be decoded.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The request line was missing or empty.
    #[error("Malformed request: empty request line")]
    MalformedRequest,

    /// The request line did not start with `GET ` or `POST `.
    #[error("Unsupported method in request line {0:?}")]
    UnsupportedMethod(String),

    /// The client sent more than the configured request cap.
    #[error("Request exceeds {limit} bytes")]
    RequestTooLarge { limit: u64 },

    #[error("I/O error while decoding: {0}")]
    Io(#[from] io::Error),
}

/// Decode a buffered request.
///
/// The spool is read from its current position. On success the request body is
/// positioned at the first byte after the blank line that ends the headers.
pub fn decode(mut spool: Spool) -> Result<Request, CodecError> {
    let mut consumed = 0u64;
    let mut reader = BufReader::new(&mut spool);

    let request_line = match read_line(&mut reader, &mut consumed)? {
        Some(line) if !line.is_empty() => line,
        _ => return Err(CodecError::MalformedRequest),
    };

    let (method, prefix_len) = if request_line.starts_with("GET ") {
        (Method::Get, 4)
    } else if request_line.starts_with("POST ") {
        (Method::Post, 5)
    } else {
        return Err(CodecError::UnsupportedMethod(request_line));
    };
    let uri = VERSION_SUFFIX
        .replace(&request_line[prefix_len..], "")
        .into_owned();

    let mut headers = Headers::new();
    while let Some(line) = read_line(&mut reader, &mut consumed)? {
        if line.is_empty() {
            break;
        }
        match split_header(&line) {
            Some((name, value)) => {
                headers.insert(name, value);
            }
            None => tracing::trace!(line = %line, "Dropping header line without a value"),
        }
    }

    drop(reader);
    let body = Body::new(spool, consumed)?;

    Ok(Request {
        method,
        uri,
        headers,
        body,
    })
}

/// Convenience wrapper over [`decode`] for an in-memory request.
pub fn decode_bytes(bytes: &[u8]) -> Result<Request, CodecError> {
    decode(Spool::from(bytes))
}

/// Read one line, stripping the `\n` or `\r\n` terminator.
///
/// Returns `None` at end of input. `consumed` tracks the raw bytes taken
/// from the source, terminator included.
fn read_line<R: BufRead>(reader: &mut R, consumed: &mut u64) -> io::Result<Option<String>> {
    let mut raw = Vec::new();
    let n = reader.read_until(b'\n', &mut raw)?;
    if n == 0 {
        return Ok(None);
    }
    *consumed += n as u64;

    if raw.last() == Some(&b'\n') {
        raw.pop();
        if raw.last() == Some(&b'\r') {
            raw.pop();
        }
    }
    Ok(Some(String::from_utf8_lossy(&raw).into_owned()))
}

/// Split `name: value` on the first colon. Either side empty drops the line.
fn split_header(line: &str) -> Option<(&str, &str)> {
    let (name, value) = line.split_once(':')?;
    if name.is_empty() || value.is_empty() {
        return None;
    }
    Some((name, value.trim_start_matches([' ', '\t'])))
}

/// Headers the codec always writes itself.
fn is_framing_header(name: &str) -> bool {
    name.eq_ignore_ascii_case("Content-Length") || name.eq_ignore_ascii_case("Connection")
}

/// Encode the status line and header block, blank line included.
pub fn encode_head(response: &Response) -> Vec<u8> {
    let mut head = String::with_capacity(128);

    if response.is_redirect() {
        head.push_str("HTTP/1.1 302\r\n");
    } else {
        head.push_str("HTTP/1.1 200 OK\r\n");
    }
    let _ = write!(head, "Content-Length: {}\r\n", response.content_length());

    for (name, value) in response.headers.iter() {
        if is_framing_header(name) {
            continue;
        }
        let _ = write!(head, "{}: {}\r\n", name, value);
    }

    head.push_str("Connection: close\r\n\r\n");
    head.into_bytes()
}

/// Split the response content into write-sized chunks, starting at byte 0.
pub fn body_chunks(response: &Response, chunk_size: usize) -> impl Iterator<Item = Bytes> + '_ {
    let chunk_size = chunk_size.max(1);
    let content = response.content.clone().unwrap_or_default();
    (0..content.len())
        .step_by(chunk_size)
        .map(move |start| content.slice(start..(start + chunk_size).min(content.len())))
}

/// Encode the full response into one buffer.
pub fn encode(response: &Response) -> Vec<u8> {
    let mut bytes = encode_head(response);
    if let Some(content) = &response.content {
        bytes.extend_from_slice(content);
    }
    bytes
}
