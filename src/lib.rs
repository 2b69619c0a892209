//! Page experience metrics: layout instability, paint timing,
//! responsiveness and server timing, with optional attribution.
//!
//! The host feeds timing entries and lifecycle events into a
//! [`WebVitals`] engine; registered callbacks receive [`Metric`]
//! snapshots when a value is ready to be reported.

pub mod error;
pub mod host;
pub mod entry;
pub mod metric;
pub mod dom;
pub mod page;
pub mod report;

// Aggregation and per-metric state machines
pub mod aggregate;
pub mod attribution;
pub mod metrics;

pub mod engine;

#[cfg(test)]
mod testing;

pub use attribution::{Attribution, TargetGenerator};
pub use engine::WebVitals;
pub use entry::PerformanceEntry;
pub use error::{Result, VitalsError};
pub use host::{EntryCategory, PerformanceHost, ReadyState, VisibilityState};
pub use metric::{Metric, MetricName, NavigationType, Rating};
pub use metrics::{CalcState, MetricCalculator, ReportOpts};
pub use page::{InputKind, PageEvent};
