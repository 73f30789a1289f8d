//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TimeoutReader (one per connection)
//!     → request.rs (lines, request line, headers, body)
//!     → handler.rs (application boundary)
//!     → keep_alive.rs (Connection header semantics)
//!     → response.rs (encode with Content-Length and Connection)
//!     → written back on the same transport
//!
//! server.rs accepts connections and runs one session per connection.
//! ```

pub mod handler;
pub mod keep_alive;
pub mod request;
pub mod response;
pub mod server;

pub use handler::Handler;
pub use keep_alive::should_keep_alive;
pub use request::{read_request, ParseError, ReadTimeouts, Request, RequestError};
pub use response::Response;
pub use server::HttpServer;
