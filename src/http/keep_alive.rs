//! `Connection` header semantics.
//!
//! - HTTP/1.1 defaults to keep-alive unless a `close` token is present
//! - HTTP/1.0 defaults to close unless a `keep-alive` token is present
//! - An explicit `close` wins over `keep-alive`

use http::header::CONNECTION;
use http::Version;

use crate::http::request::Request;

/// Tokens found across all `Connection` header values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionTokens {
    pub close: bool,
    pub keep_alive: bool,
}

impl ConnectionTokens {
    pub fn from_request(request: &Request) -> Self {
        let mut tokens = Self::default();
        for value in request.headers.get_all(CONNECTION) {
            let Ok(value) = value.to_str() else { continue };
            for token in value.split(',') {
                let token = token.trim();
                if token.eq_ignore_ascii_case("close") {
                    tokens.close = true;
                } else if token.eq_ignore_ascii_case("keep-alive") {
                    tokens.keep_alive = true;
                }
            }
        }
        tokens
    }
}

/// Whether the client allows the connection to stay open after this request.
pub fn should_keep_alive(request: &Request) -> bool {
    let tokens = ConnectionTokens::from_request(request);
    if tokens.close {
        return false;
    }
    tokens.keep_alive || request.version == Version::HTTP_11
}
