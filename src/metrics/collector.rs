//! Metrics collection using Prometheus
//!
//! Counters and histograms for the matchmaking core: queue traffic, match
//! assembly, live fanout and scheduler timing.

use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the matchmaking service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    service_metrics: ServiceMetrics,

    queue_metrics: QueueMetrics,

    match_metrics: MatchMetrics,

    fanout_metrics: FanoutMetrics,

    performance_metrics: PerformanceMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Component health status
    pub component_health: IntGaugeVec,
}

/// Waiting queue metrics
#[derive(Clone)]
pub struct QueueMetrics {
    /// Sessions enqueued per mode
    pub sessions_enqueued_total: IntCounterVec,

    /// Sessions cancelled per mode
    pub sessions_cancelled_total: IntCounterVec,

    /// Sessions currently waiting per mode
    pub sessions_waiting: IntGaugeVec,

    /// Time spent waiting before a match was assembled
    pub queue_wait_time_seconds: HistogramVec,
}

/// Match assembly metrics
#[derive(Clone)]
pub struct MatchMetrics {
    /// Matches created per mode and trigger
    pub matches_created_total: IntCounterVec,

    /// Participants placed into matches, split by human/bot
    pub participants_matched_total: IntCounterVec,

    /// Matches acknowledged by a participant for the first time
    pub matches_started_total: IntCounter,
}

/// Live notification metrics
#[derive(Clone)]
pub struct FanoutMetrics {
    /// Payload sends by outcome
    pub deliveries_total: IntCounterVec,

    /// Live connections currently subscribed
    pub live_subscribers: IntGauge,
}

/// Performance metrics
#[derive(Clone)]
pub struct PerformanceMetrics {
    /// Duration of one scheduler tick, excluding fanout
    pub tick_duration: Histogram,

    /// Duration of a single match assembly
    pub assembly_duration: HistogramVec,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let queue_metrics = QueueMetrics::new(&registry)?;
        let match_metrics = MatchMetrics::new(&registry)?;
        let fanout_metrics = FanoutMetrics::new(&registry)?;
        let performance_metrics = PerformanceMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            queue_metrics,
            match_metrics,
            fanout_metrics,
            performance_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    pub fn queue(&self) -> &QueueMetrics {
        &self.queue_metrics
    }

    pub fn matches(&self) -> &MatchMetrics {
        &self.match_metrics
    }

    pub fn fanout(&self) -> &FanoutMetrics {
        &self.fanout_metrics
    }

    pub fn performance(&self) -> &PerformanceMetrics {
        &self.performance_metrics
    }

    pub fn record_enqueued(&self, mode: &str) {
        self.queue_metrics
            .sessions_enqueued_total
            .with_label_values(&[mode])
            .inc();
    }

    pub fn record_cancelled(&self, mode: &str) {
        self.queue_metrics
            .sessions_cancelled_total
            .with_label_values(&[mode])
            .inc();
    }

    pub fn set_waiting(&self, mode: &str, waiting: usize) {
        self.queue_metrics
            .sessions_waiting
            .with_label_values(&[mode])
            .set(waiting as i64);
    }

    /// Record an assembled match and the wait of each human in it
    pub fn record_match_created(
        &self,
        mode: &str,
        trigger: &str,
        human_count: usize,
        bot_count: usize,
        waits: &[Duration],
    ) {
        self.match_metrics
            .matches_created_total
            .with_label_values(&[mode, trigger])
            .inc();

        self.match_metrics
            .participants_matched_total
            .with_label_values(&[mode, "human"])
            .inc_by(human_count as u64);

        self.match_metrics
            .participants_matched_total
            .with_label_values(&[mode, "bot"])
            .inc_by(bot_count as u64);

        let histogram = self
            .queue_metrics
            .queue_wait_time_seconds
            .with_label_values(&[mode, trigger]);
        for wait in waits {
            histogram.observe(wait.as_secs_f64());
        }
    }

    pub fn record_match_started(&self) {
        self.match_metrics.matches_started_total.inc();
    }

    pub fn record_fanout(&self, delivered: usize, failed: usize) {
        self.fanout_metrics
            .deliveries_total
            .with_label_values(&["delivered"])
            .inc_by(delivered as u64);
        self.fanout_metrics
            .deliveries_total
            .with_label_values(&["failed"])
            .inc_by(failed as u64);
    }

    pub fn set_live_subscribers(&self, count: usize) {
        self.fanout_metrics.live_subscribers.set(count as i64);
    }

    pub fn record_tick(&self, duration: Duration) {
        self.performance_metrics
            .tick_duration
            .observe(duration.as_secs_f64());
    }

    pub fn record_assembly(&self, mode: &str, duration: Duration) {
        self.performance_metrics
            .assembly_duration
            .with_label_values(&[mode])
            .observe(duration.as_secs_f64());
    }

    pub fn update_uptime(&self, uptime: Duration) {
        self.service_metrics
            .uptime_seconds
            .set(uptime.as_secs() as i64);
    }

    /// Update health status
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    /// Update component health
    pub fn update_component_health(&self, component: &str, healthy: bool) {
        let status = if healthy { 1 } else { 0 };
        self.service_metrics
            .component_health
            .with_label_values(&[component])
            .set(status);
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds =
            IntGauge::new("dropzone_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let health_status = IntGauge::new(
            "dropzone_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let component_health = IntGaugeVec::new(
            Opts::new("dropzone_component_health", "Component health status"),
            &["component"],
        )?;
        registry.register(Box::new(component_health.clone()))?;

        Ok(Self {
            uptime_seconds,
            health_status,
            component_health,
        })
    }
}

impl QueueMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let sessions_enqueued_total = IntCounterVec::new(
            Opts::new("dropzone_sessions_enqueued_total", "Total sessions enqueued"),
            &["mode"],
        )?;
        registry.register(Box::new(sessions_enqueued_total.clone()))?;

        let sessions_cancelled_total = IntCounterVec::new(
            Opts::new("dropzone_sessions_cancelled_total", "Total sessions cancelled"),
            &["mode"],
        )?;
        registry.register(Box::new(sessions_cancelled_total.clone()))?;

        let sessions_waiting = IntGaugeVec::new(
            Opts::new("dropzone_sessions_waiting", "Sessions currently waiting"),
            &["mode"],
        )?;
        registry.register(Box::new(sessions_waiting.clone()))?;

        let queue_wait_time_seconds = HistogramVec::new(
            HistogramOpts::new(
                "dropzone_queue_wait_time_seconds",
                "Time waited before being matched",
            )
            .buckets(vec![0.5, 1.0, 2.0, 3.0, 5.0, 10.0, 15.0, 20.0, 30.0, 60.0]),
            &["mode", "trigger"],
        )?;
        registry.register(Box::new(queue_wait_time_seconds.clone()))?;

        Ok(Self {
            sessions_enqueued_total,
            sessions_cancelled_total,
            sessions_waiting,
            queue_wait_time_seconds,
        })
    }
}

impl MatchMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let matches_created_total = IntCounterVec::new(
            Opts::new("dropzone_matches_created_total", "Total matches assembled"),
            &["mode", "trigger"],
        )?;
        registry.register(Box::new(matches_created_total.clone()))?;

        let participants_matched_total = IntCounterVec::new(
            Opts::new(
                "dropzone_participants_matched_total",
                "Participants placed into matches",
            ),
            &["mode", "kind"],
        )?;
        registry.register(Box::new(participants_matched_total.clone()))?;

        let matches_started_total = IntCounter::new(
            "dropzone_matches_started_total",
            "Matches acknowledged by a participant",
        )?;
        registry.register(Box::new(matches_started_total.clone()))?;

        Ok(Self {
            matches_created_total,
            participants_matched_total,
            matches_started_total,
        })
    }
}

impl FanoutMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let deliveries_total = IntCounterVec::new(
            Opts::new("dropzone_fanout_deliveries_total", "Live payload sends"),
            &["outcome"],
        )?;
        registry.register(Box::new(deliveries_total.clone()))?;

        let live_subscribers = IntGauge::new(
            "dropzone_live_subscribers",
            "Live connections currently subscribed",
        )?;
        registry.register(Box::new(live_subscribers.clone()))?;

        Ok(Self {
            deliveries_total,
            live_subscribers,
        })
    }
}

impl PerformanceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let tick_duration = Histogram::with_opts(
            HistogramOpts::new(
                "dropzone_scheduler_tick_duration_seconds",
                "Scheduler tick duration",
            )
            .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1]),
        )?;
        registry.register(Box::new(tick_duration.clone()))?;

        let assembly_duration = HistogramVec::new(
            HistogramOpts::new(
                "dropzone_match_assembly_duration_seconds",
                "Match assembly duration",
            )
            .buckets(vec![0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01]),
            &["mode"],
        )?;
        registry.register(Box::new(assembly_duration.clone()))?;

        Ok(Self {
            tick_duration,
            assembly_duration,
        })
    }
}
