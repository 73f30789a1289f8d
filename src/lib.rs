//! Keep-alive HTTP/1.1 server core built around a timeout-bounded reader.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod reader;
pub mod session;

pub use config::ServerConfig;
pub use http::{Handler, HttpServer, Request, Response};
pub use lifecycle::Shutdown;
pub use reader::{ByteSource, ReadError, TimeoutReader};
pub use session::{Session, SessionError, SessionOptions, SessionReport, SessionState};
