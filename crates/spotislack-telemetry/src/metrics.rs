//! Prometheus metrics registry for Spotislack
//!
//! Per-user outcomes are labeled by outcome and kind, so persistent auth
//! failures (`kind="auth_invalid"` / `"refresh_failed"`) can be alerted on
//! separately from transient noise.

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

/// Central metrics registry holding all Prometheus metrics.
pub struct MetricsRegistry {
    registry: Registry,
    /// Counter: per-user pipeline outcomes by (outcome, kind)
    pub user_outcomes_total: IntCounterVec,
    /// Counter: ticks by result (completed, failed)
    pub ticks_total: IntCounterVec,
    /// Gauge: users processed by the most recent completed tick
    pub last_tick_users: IntGauge,
    /// Histogram: wall-clock duration of completed ticks
    pub tick_duration_seconds: Histogram,
}

impl MetricsRegistry {
    /// Creates a new `MetricsRegistry` with all metrics registered.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new_custom(Some("spotislack".to_string()), None)?;

        let user_outcomes_total = IntCounterVec::new(
            Opts::new("user_outcomes_total", "Per-user sync outcomes"),
            &["outcome", "kind"],
        )?;
        registry.register(Box::new(user_outcomes_total.clone()))?;

        let ticks_total = IntCounterVec::new(
            Opts::new("ticks_total", "Sync ticks by result"),
            &["result"],
        )?;
        registry.register(Box::new(ticks_total.clone()))?;

        let last_tick_users = IntGauge::new(
            "last_tick_users",
            "Number of users processed by the last completed tick",
        )?;
        registry.register(Box::new(last_tick_users.clone()))?;

        let tick_duration_seconds = Histogram::with_opts(
            HistogramOpts::new("tick_duration_seconds", "Sync tick duration in seconds")
                .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
        )?;
        registry.register(Box::new(tick_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            user_outcomes_total,
            ticks_total,
            last_tick_users,
            tick_duration_seconds,
        })
    }

    // ========================================================================
    // Recording helpers
    // ========================================================================

    /// Record one user's pipeline outcome.
    pub fn record_user_outcome(&self, outcome: &str, kind: &str) {
        self.user_outcomes_total
            .with_label_values(&[outcome, kind])
            .inc();
    }

    /// Record a completed tick.
    pub fn record_tick_completed(&self, users: usize, duration_secs: f64) {
        self.ticks_total.with_label_values(&["completed"]).inc();
        self.last_tick_users.set(users as i64);
        self.tick_duration_seconds.observe(duration_secs);
    }

    /// Record a tick aborted before processing users.
    pub fn record_tick_failed(&self) {
        self.ticks_total.with_label_values(&["failed"]).inc();
    }

    // ========================================================================
    // Encoding
    // ========================================================================

    /// Encode all metrics in Prometheus text exposition format.
    pub fn encode(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
