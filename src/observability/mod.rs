//! Observability for the engine
//!
//! - Structured, typed events routed through the `log` facade
//! - Monotonic counters
//!
//! Observability is read-only: nothing here influences classification,
//! decomposition, or evaluation results.

mod events;
mod logger;
mod metrics;

pub use events::Event;
pub use logger::{Logger, TARGET};
pub use metrics::{EngineMetrics, MetricsSnapshot};
