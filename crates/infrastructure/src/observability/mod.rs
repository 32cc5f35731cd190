//! Observability module
//!
//! Structured logging setup, the Prometheus exporter, span helpers for
//! requests/notifications/outbox redelivery and the metric counters.

pub mod metrics_collector;
pub mod request_tracer;
pub mod telemetry_setup;

pub use metrics_collector::MetricsCollector;
pub use request_tracer::RequestTracer;
pub use telemetry_setup::{init_logging, init_metrics};
