//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Invocation handler, supervisor, proxy, transformer produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, histograms)
//!     → usage.rs (anonymous usage reports, fire-and-forget)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//!     → Usage collector (HTTP POST)
//! ```
//!
//! # Design Decisions
//! - Structured fields rather than formatted messages
//! - Usage reporting can never block or fail an invocation

pub mod logging;
pub mod metrics;
pub mod usage;
