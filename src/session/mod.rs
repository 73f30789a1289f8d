//! Persistent-connection sessions.
//!
//! # Connection State Machine
//! ```text
//!        ┌──────────────┐
//!        │   Waiting    │ ← idle timeout per byte, EOF here = peer close
//!        └──────┬───────┘
//!               │ first byte
//!               ▼
//!        ┌──────────────┐
//!        │   Reading    │ ← read timeout per byte, line by line
//!        └──────┬───────┘
//!               │ headers (+ body) complete
//!               ▼
//!        ┌──────────────┐
//!        │   Writing    │ ← handler response, flushed
//!        └──────┬───────┘
//!               ├─ keep-alive → Waiting (same reader, same transport)
//!               └─ close      → Closed
//!
//! Timeout / I/O error / malformed request / shutdown → Closed
//! ```
//!
//! Closed always means the transport's closer ran exactly once.

pub mod serve;
pub mod state;

pub use serve::{Session, SessionOptions, SessionReport};
pub use state::{SessionError, SessionState};
