//! API layer
//!
//! HTTP handlers outside the login flow:
//! - Health (`/health`)
//! - Metrics (Prometheus)

mod health;
mod metrics;

pub use health::health_router;
pub use metrics::metrics_router;
