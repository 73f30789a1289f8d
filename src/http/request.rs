//! Request reading on top of the timeout-bounded reader.
//!
//! # Responsibilities
//! - Accumulate bytes into LF-terminated lines (a trailing CR is dropped)
//! - Parse the request line and header lines
//! - Read a `Content-Length` body
//! - Enforce line, header-count and body limits
//!
//! # Design Decisions
//! - The wait for the first byte of a request uses the idle timeout; every
//!   later byte uses the read timeout
//! - End-of-stream before a request starts is a clean close, not an error
//! - CR/LF bytes before a request line are skipped, up to
//!   `MAX_LEADING_BLANK_BYTES`

use std::time::Duration;

use http::header::{HeaderName, HeaderValue, CONTENT_LENGTH, TRANSFER_ENCODING};
use http::{HeaderMap, Method, StatusCode, Version};
use thiserror::Error;

use crate::config::LimitsConfig;
use crate::reader::{ReadError, TimeoutReader};

/// CR/LF bytes tolerated between requests.
const MAX_LEADING_BLANK_BYTES: usize = 64;

/// A fully read request.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    /// Request target as sent, e.g. `/about?x=1`.
    pub target: String,
    pub version: Version,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Request {
    /// Path component of the target.
    pub fn path(&self) -> &str {
        self.target.split('?').next().unwrap_or("")
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Malformed or unacceptable request.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid request line: {0:?}")]
    RequestLine(String),

    #[error("unsupported HTTP version: {0}")]
    Version(String),

    #[error("invalid header line: {0:?}")]
    Header(String),

    #[error("line exceeds {0} bytes")]
    LineTooLong(usize),

    #[error("more than {0} headers")]
    TooManyHeaders(usize),

    #[error("invalid content-length: {0:?}")]
    ContentLength(String),

    #[error("body of {size} bytes exceeds limit of {limit}")]
    BodyTooLarge { size: usize, limit: usize },

    #[error("transfer-encoding {0:?} not supported")]
    UnsupportedEncoding(String),

    #[error("more than {0} blank-line bytes before a request")]
    BlankLines(usize),

    #[error("connection closed mid-request")]
    Truncated,
}

impl ParseError {
    /// Status code of the error response sent before closing.
    pub fn status(&self) -> StatusCode {
        match self {
            ParseError::LineTooLong(_) | ParseError::TooManyHeaders(_) => {
                StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE
            }
            ParseError::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ParseError::UnsupportedEncoding(_) => StatusCode::NOT_IMPLEMENTED,
            ParseError::Version(_) => StatusCode::HTTP_VERSION_NOT_SUPPORTED,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

/// Failure while reading a request.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error(transparent)]
    Read(#[from] ReadError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Per-byte bounds used while reading one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadTimeouts {
    /// Waiting for the first byte of a request.
    pub idle: Duration,
    /// Every byte after the first.
    pub read: Duration,
}

/// Read the next request from `reader`.
///
/// Returns `Ok(None)` if the stream ends before a request starts.
pub async fn read_request(
    reader: &mut TimeoutReader,
    limits: &LimitsConfig,
    timeouts: ReadTimeouts,
) -> Result<Option<Request>, RequestError> {
    reader.set_timeout(timeouts.idle);
    let mut skipped = 0;
    let first = loop {
        match reader.read().await? {
            None => return Ok(None),
            Some(b'\r' | b'\n') if skipped < MAX_LEADING_BLANK_BYTES => skipped += 1,
            Some(b'\r' | b'\n') => {
                return Err(ParseError::BlankLines(MAX_LEADING_BLANK_BYTES).into());
            }
            Some(b) => break b,
        }
    };
    reader.set_timeout(timeouts.read);

    let line = read_line(reader, Some(first), limits.max_line_bytes).await?;
    let (method, target, version) = parse_request_line(&line)?;

    let mut headers = HeaderMap::new();
    loop {
        let line = read_line(reader, None, limits.max_line_bytes).await?;
        if line.is_empty() {
            break;
        }
        if headers.len() >= limits.max_headers {
            return Err(ParseError::TooManyHeaders(limits.max_headers).into());
        }
        let (name, value) = parse_header(&line)?;
        headers.append(name, value);
    }

    if let Some(encoding) = headers.get(TRANSFER_ENCODING) {
        let encoding = String::from_utf8_lossy(encoding.as_bytes()).into_owned();
        return Err(ParseError::UnsupportedEncoding(encoding).into());
    }

    let length = content_length(&headers)?;
    if length > limits.max_body_bytes {
        return Err(ParseError::BodyTooLarge {
            size: length,
            limit: limits.max_body_bytes,
        }
        .into());
    }

    let mut body = Vec::with_capacity(length);
    while body.len() < length {
        match reader.read().await? {
            Some(b) => body.push(b),
            None => return Err(ParseError::Truncated.into()),
        }
    }

    Ok(Some(Request {
        method,
        target,
        version,
        headers,
        body,
    }))
}

/// Read bytes up to LF, returning the line without its terminator.
async fn read_line(
    reader: &mut TimeoutReader,
    first: Option<u8>,
    max_len: usize,
) -> Result<Vec<u8>, RequestError> {
    let mut line = Vec::new();
    let mut next = first;
    loop {
        let byte = match next.take() {
            Some(b) => b,
            None => reader.read().await?.ok_or(ParseError::Truncated)?,
        };
        if byte == b'\n' {
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            return Ok(line);
        }
        // The CR ending a full-length line is not counted.
        let room = if byte == b'\r' { max_len + 1 } else { max_len };
        if line.len() >= room {
            return Err(ParseError::LineTooLong(max_len).into());
        }
        line.push(byte);
    }
}

fn parse_request_line(line: &[u8]) -> Result<(Method, String, Version), ParseError> {
    let text = std::str::from_utf8(line)
        .map_err(|_| ParseError::RequestLine(String::from_utf8_lossy(line).into_owned()))?;
    let invalid = || ParseError::RequestLine(text.to_string());

    let mut parts = text.split(' ');
    let (Some(method), Some(target), Some(version), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(invalid());
    };
    if target.is_empty() {
        return Err(invalid());
    }

    let method = Method::from_bytes(method.as_bytes()).map_err(|_| invalid())?;
    let version = match version {
        "HTTP/1.1" => Version::HTTP_11,
        "HTTP/1.0" => Version::HTTP_10,
        other if other.starts_with("HTTP/") => return Err(ParseError::Version(other.to_string())),
        _ => return Err(invalid()),
    };

    Ok((method, target.to_string(), version))
}

fn parse_header(line: &[u8]) -> Result<(HeaderName, HeaderValue), ParseError> {
    let invalid = || ParseError::Header(String::from_utf8_lossy(line).into_owned());

    let colon = line.iter().position(|b| *b == b':').ok_or_else(invalid)?;
    let name = HeaderName::from_bytes(&line[..colon]).map_err(|_| invalid())?;
    let value = line[colon + 1..].trim_ascii();
    let value = HeaderValue::from_bytes(value).map_err(|_| invalid())?;
    Ok((name, value))
}

fn content_length(headers: &HeaderMap) -> Result<usize, ParseError> {
    let mut length = None;
    for value in headers.get_all(CONTENT_LENGTH) {
        let raw = String::from_utf8_lossy(value.as_bytes()).into_owned();
        let digits = raw.trim();
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseError::ContentLength(raw));
        }
        let parsed: usize = digits.parse().map_err(|_| ParseError::ContentLength(raw.clone()))?;
        match length {
            Some(previous) if previous != parsed => return Err(ParseError::ContentLength(raw)),
            _ => length = Some(parsed),
        }
    }
    Ok(length.unwrap_or(0))
}
