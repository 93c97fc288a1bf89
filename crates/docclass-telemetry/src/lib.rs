//! docclass Telemetry
//!
//! Telemetry, metrics, and audit trail functionality for docclass.
//!
//! Provides:
//! - Hash-chained audit trail of rule mutations
//! - Classification metrics (in-process counters plus the `metrics` facade)
//! - Aggregate classification statistics

pub mod audit;
pub mod metrics;
pub mod stats;

pub use audit::{AuditEvent, AuditTrail, RuleOperation};
pub use metrics::{MetricsCollector, MetricsSnapshot};
pub use stats::{ClassificationStats, StatsCollector};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::audit::{AuditEvent, AuditTrail, RuleOperation};
    pub use crate::metrics::MetricsCollector;
    pub use crate::stats::{ClassificationStats, StatsCollector};
}
