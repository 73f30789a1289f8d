//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Sessions, listener, server produce:
//!     → logging.rs (structured tracing events, connection_id field)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Prometheus scrape endpoint (optional)
//! ```

pub mod logging;
pub mod metrics;
