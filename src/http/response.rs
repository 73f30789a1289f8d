//! Response representation and wire encoding.

use http::header::{HeaderName, HeaderValue, CONNECTION, CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderMap, StatusCode};

/// A response produced by a [`Handler`](crate::http::Handler).
///
/// `Content-Length` and `Connection` are always set by the session when the
/// response is encoded.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    /// `200 OK` with a plain-text body.
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self::new(StatusCode::OK)
            .header(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"))
            .body(body)
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Short plain-text error response for `status`.
    pub fn error(status: StatusCode) -> Self {
        let reason = status.canonical_reason().unwrap_or("Error");
        Self::new(status)
            .header(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"))
            .body(format!("{} {}\n", status.as_u16(), reason))
    }

    /// Serialize as an HTTP/1.1 response.
    pub fn encode(&self, keep_alive: bool) -> Vec<u8> {
        let reason = self.status.canonical_reason().unwrap_or("");
        let mut out = Vec::with_capacity(128 + self.body.len());
        let status_line = format!("HTTP/1.1 {} {}\r\n", self.status.as_u16(), reason);
        out.extend_from_slice(status_line.as_bytes());

        for (name, value) in &self.headers {
            if *name == CONTENT_LENGTH || *name == CONNECTION {
                continue;
            }
            out.extend_from_slice(name.as_str().as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value.as_bytes());
            out.extend_from_slice(b"\r\n");
        }

        out.extend_from_slice(format!("Content-Length: {}\r\n", self.body.len()).as_bytes());
        let connection: &[u8] = if keep_alive { b"keep-alive" } else { b"close" };
        out.extend_from_slice(b"Connection: ");
        out.extend_from_slice(connection);
        out.extend_from_slice(b"\r\n\r\n");
        out.extend_from_slice(&self.body);
        out
    }
}
