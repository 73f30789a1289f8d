//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → listener stops accepting
//!             → every session reader returns Interrupted
//!             → sessions close their transports
//!             → server waits for the connection tracker to drain
//! ```
//!
//! # Design Decisions
//! - Shutdown is level-triggered (watch channel), late subscribers see it
//! - Draining has a grace period: the server stops waiting after it

pub mod shutdown;
pub mod signals;

pub use shutdown::{shutdown_requested, Shutdown, ShutdownSignal};
