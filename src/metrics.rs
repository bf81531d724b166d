//! Plugin Metrics
//!
//! Prometheus counters and gauges for chassis operations, event processing,
//! transaction retries and the subscription state. The registry is owned by
//! the plugin instance rather than the process-global default registry so
//! several plugins (or tests) can coexist in one process.

use crate::error::{Error, Result};
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Metric handles shared by every component of one plugin instance
#[derive(Clone)]
pub struct PluginMetrics {
    registry: Registry,
    chassis_operations: IntCounterVec,
    events_processed: IntCounterVec,
    transaction_retries: IntCounter,
    subscription_state: IntGauge,
}

impl PluginMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let chassis_operations = IntCounterVec::new(
            Opts::new(
                "urp_chassis_operations_total",
                "Chassis operations by operation and outcome",
            ),
            &["operation", "outcome"],
        )
        .map_err(metrics_error)?;
        let events_processed = IntCounterVec::new(
            Opts::new(
                "urp_events_processed_total",
                "Inbound event records by processing outcome",
            ),
            &["outcome"],
        )
        .map_err(metrics_error)?;
        let transaction_retries = IntCounter::new(
            "urp_transaction_retries_total",
            "Optimistic transactions retried after a transient failure",
        )
        .map_err(metrics_error)?;
        let subscription_state = IntGauge::new(
            "urp_subscription_state",
            "Upstream event subscription state (0 idle, 1 subscribing, 2 monitoring, 3 subscribed, 4 rejected)",
        )
        .map_err(metrics_error)?;

        registry
            .register(Box::new(chassis_operations.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(events_processed.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(transaction_retries.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(subscription_state.clone()))
            .map_err(metrics_error)?;

        Ok(Self {
            registry,
            chassis_operations,
            events_processed,
            transaction_retries,
            subscription_state,
        })
    }

    /// Record the outcome of a chassis request
    pub fn record_operation(&self, operation: &str, outcome: &str) {
        self.chassis_operations
            .with_label_values(&[operation, outcome])
            .inc();
    }

    pub fn operation_count(&self, operation: &str, outcome: &str) -> u64 {
        self.chassis_operations
            .with_label_values(&[operation, outcome])
            .get()
    }

    /// Record the outcome of one event record
    pub fn record_event(&self, outcome: &str) {
        self.events_processed.with_label_values(&[outcome]).inc();
    }

    pub fn event_count(&self, outcome: &str) -> u64 {
        self.events_processed.with_label_values(&[outcome]).get()
    }

    pub fn record_retry(&self) {
        self.transaction_retries.inc();
    }

    pub fn retry_count(&self) -> u64 {
        self.transaction_retries.get()
    }

    pub fn set_subscription_state(&self, state: i64) {
        self.subscription_state.set(state);
    }

    /// Render all metrics in the Prometheus text format
    pub fn encode(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(metrics_error)?;
        String::from_utf8(buffer).map_err(|e| Error::Internal(e.to_string()))
    }
}

fn metrics_error(err: prometheus::Error) -> Error {
    Error::Internal(format!("Metrics error: {}", err))
}
