//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Engine and components produce:
//!     → logging.rs (structured log events, one span per component)
//!     → metrics.rs (registration gauge, failure counters, phase durations)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Component name flows through every event via its span
//! - Metrics are cheap (atomic increments) and no-ops without an exporter

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use metrics::init_metrics;
