//! Switchyard Telemetry - Observability Infrastructure
//!
//! Structured logging through `tracing` and Prometheus metrics for the
//! service replica.

pub mod metrics;
pub mod middleware;
pub mod tracer;

pub use metrics::{metrics_handler, RuntimeGauges, SwitchyardMetrics, METRICS};
pub use middleware::{observability_middleware, timeout_middleware};
pub use tracer::{init_tracer, TelemetryConfig};
