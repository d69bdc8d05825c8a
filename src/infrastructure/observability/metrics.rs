//! Prometheus metrics definitions for propcast
//!
//! All metrics use the `propcast_` prefix and are read-only.

use prometheus::{
    CounterVec, Gauge, GaugeVec, HistogramOpts, HistogramVec, IntCounter, Opts, Registry,
    TextEncoder,
    core::{AtomicF64, GenericGauge, GenericGaugeVec},
};
use std::sync::Arc;

/// Prometheus metrics for the prediction service
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,
    /// Predictions served, by league, type and source (model|cache)
    pub predictions_total: CounterVec,
    /// Failed requests by error kind
    pub prediction_errors_total: CounterVec,
    /// End-to-end request latency by prediction type
    pub prediction_latency_seconds: HistogramVec,
    /// Cache lookups by tier and outcome (hit|miss)
    pub cache_lookups_total: CounterVec,
    /// Circuit breaker state per dependency (0=closed, 1=half-open, 2=open)
    pub circuit_breaker_state: GenericGaugeVec<AtomicF64>,
    /// Training runs by league and outcome
    pub model_trainings_total: CounterVec,
    /// Latest holdout accuracy per league
    pub model_accuracy: GenericGaugeVec<AtomicF64>,
    /// Items waiting in the streaming queue per league
    pub stream_queue_depth: GenericGaugeVec<AtomicF64>,
    /// Resident set size of the process
    pub memory_rss_bytes: GenericGauge<AtomicF64>,
    /// Housekeeping passes forced by the memory monitor
    pub housekeeping_runs_total: IntCounter,
    /// Uptime in seconds
    pub uptime_seconds: GenericGauge<AtomicF64>,
}

impl Metrics {
    /// Create a new Metrics instance with all gauges and counters registered
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let predictions_total = CounterVec::new(
            Opts::new(
                "propcast_predictions_total",
                "Predictions served by league, type and source",
            ),
            &["league", "prediction_type", "source"],
        )?;
        registry.register(Box::new(predictions_total.clone()))?;

        let prediction_errors_total = CounterVec::new(
            Opts::new("propcast_prediction_errors_total", "Failed requests by error kind"),
            &["kind"],
        )?;
        registry.register(Box::new(prediction_errors_total.clone()))?;

        let prediction_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "propcast_prediction_latency_seconds",
                "Request latency in seconds",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
            ]),
            &["prediction_type"],
        )?;
        registry.register(Box::new(prediction_latency_seconds.clone()))?;

        let cache_lookups_total = CounterVec::new(
            Opts::new("propcast_cache_lookups_total", "Cache lookups by tier and outcome"),
            &["tier", "outcome"],
        )?;
        registry.register(Box::new(cache_lookups_total.clone()))?;

        let circuit_breaker_state = GaugeVec::new(
            Opts::new(
                "propcast_circuit_breaker_state",
                "Circuit breaker state (0=closed, 1=half-open, 2=open)",
            ),
            &["name"],
        )?;
        registry.register(Box::new(circuit_breaker_state.clone()))?;

        let model_trainings_total = CounterVec::new(
            Opts::new("propcast_model_trainings_total", "Training runs by league and outcome"),
            &["league", "outcome"],
        )?;
        registry.register(Box::new(model_trainings_total.clone()))?;

        let model_accuracy = GaugeVec::new(
            Opts::new("propcast_model_accuracy", "Latest holdout accuracy (0-1)"),
            &["league"],
        )?;
        registry.register(Box::new(model_accuracy.clone()))?;

        let stream_queue_depth = GaugeVec::new(
            Opts::new("propcast_stream_queue_depth", "Queued streaming items"),
            &["league"],
        )?;
        registry.register(Box::new(stream_queue_depth.clone()))?;

        let memory_rss_bytes = Gauge::with_opts(Opts::new(
            "propcast_memory_rss_bytes",
            "Resident set size in bytes",
        ))?;
        registry.register(Box::new(memory_rss_bytes.clone()))?;

        let housekeeping_runs_total = IntCounter::with_opts(Opts::new(
            "propcast_housekeeping_runs_total",
            "Housekeeping passes triggered by memory pressure",
        ))?;
        registry.register(Box::new(housekeeping_runs_total.clone()))?;

        let uptime_seconds = Gauge::with_opts(Opts::new(
            "propcast_uptime_seconds",
            "Process uptime in seconds",
        ))?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            predictions_total,
            prediction_errors_total,
            prediction_latency_seconds,
            cache_lookups_total,
            circuit_breaker_state,
            model_trainings_total,
            model_accuracy,
            stream_queue_depth,
            memory_rss_bytes,
            housekeeping_runs_total,
            uptime_seconds,
        })
    }

    /// Render all metrics in Prometheus text format
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder
            .encode_to_string(&metric_families)
            .unwrap_or_default()
    }

    pub fn inc_predictions(&self, league: &str, prediction_type: &str, source: &str) {
        self.predictions_total
            .with_label_values(&[league, prediction_type, source])
            .inc();
    }

    pub fn inc_errors(&self, kind: &str) {
        self.prediction_errors_total.with_label_values(&[kind]).inc();
    }

    pub fn observe_latency(&self, prediction_type: &str, seconds: f64) {
        self.prediction_latency_seconds
            .with_label_values(&[prediction_type])
            .observe(seconds);
    }

    pub fn inc_cache(&self, tier: &str, outcome: &str) {
        self.cache_lookups_total
            .with_label_values(&[tier, outcome])
            .inc();
    }

    pub fn set_circuit_state(&self, name: &str, value: f64) {
        self.circuit_breaker_state
            .with_label_values(&[name])
            .set(value);
    }

    pub fn inc_trainings(&self, league: &str, outcome: &str) {
        self.model_trainings_total
            .with_label_values(&[league, outcome])
            .inc();
    }

    pub fn set_model_accuracy(&self, league: &str, accuracy: f64) {
        self.model_accuracy.with_label_values(&[league]).set(accuracy);
    }

    pub fn set_stream_queue_depth(&self, league: &str, depth: usize) {
        self.stream_queue_depth
            .with_label_values(&[league])
            .set(depth as f64);
    }
}
