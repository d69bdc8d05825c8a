//! Push-based observability
//!
//! Metrics live in a prometheus registry and are pushed out as periodic JSON
//! log lines. No HTTP server, no incoming requests.

pub mod metrics;
pub mod reporter;

pub use metrics::Metrics;
pub use reporter::MetricsReporter;
