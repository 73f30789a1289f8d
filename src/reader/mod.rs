//! Timeout-bounded reading subsystem.
//!
//! # Data Flow
//! ```text
//! Transport read half
//!     → source.rs (ByteSource capability, blocking, no native timeout)
//!     → timeout.rs (worker thread owns the source, async caller waits
//!       on a result channel with a deadline)
//!     → Line-oriented request reader (http layer)
//! ```
//!
//! # Design Decisions
//! - One long-lived worker per reader, never one per byte
//! - At most one demand in flight; a timed-out demand is resumed by the
//!   next read, so bytes are never lost, duplicated or reordered
//! - The reader never closes its source; closing belongs to the transport

pub mod source;
pub mod timeout;

pub use source::{ByteSource, StreamSource};
pub use timeout::{ReadError, TimeoutReader};
