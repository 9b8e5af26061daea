//! Router-wide middleware
//!
//! Author: hephaex@gmail.com

pub mod metrics;

pub use metrics::{metrics_middleware, AuthMetrics, MetricsSnapshot};
