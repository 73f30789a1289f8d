//! Request handler boundary.

use crate::http::request::Request;
use crate::http::response::Response;

/// Turns a fully read request into a response.
///
/// Handlers run on the session task and should not block.
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, request: &Request) -> Response;
}

impl<F> Handler for F
where
    F: Fn(&Request) -> Response + Send + Sync + 'static,
{
    fn handle(&self, request: &Request) -> Response {
        self(request)
    }
}
