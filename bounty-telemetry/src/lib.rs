//! Ambient observability stack: structured logging, a Prometheus registry,
//! and a hand-rolled health endpoint, shared by every binary in the
//! workspace.

pub mod health;
pub mod logging;
pub mod metrics;

pub use health::{HealthChecker, HealthState};
pub use metrics::Metrics;
