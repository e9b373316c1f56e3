//! Metrics and monitoring for the dropzone matchmaking service
//!
//! This module provides Prometheus metrics collection plus the HTTP server
//! exposing health probes, metrics and lobby statistics.

pub mod collector;
pub mod health;

pub use collector::{
    FanoutMetrics, MatchMetrics, MetricsCollector, MetricsTimer, PerformanceMetrics,
    QueueMetrics, ServiceMetrics,
};
pub use health::{HealthServer, HealthServerConfig};
