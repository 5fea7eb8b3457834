// Private module declaration
mod server;

use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};
use std::time::Duration;

// Re-export for public API
pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Provides metrics for:
// - Order lifecycle operations (outcome by error kind, latency)
// - Inventory movement (reserved, restocked, written off)
// - Notification delivery outcomes
// - Authentication attempts
//
// All metrics are registered with Prometheus and can be scraped via /metrics
// ============================================================================

pub struct Metrics {
    registry: Registry,

    // Lifecycle Metrics
    pub order_operations: IntCounterVec,
    pub order_operation_duration: HistogramVec,

    // Inventory Metrics
    pub stock_reserved_units: IntCounter,
    pub stock_restocked_units: IntCounter,
    pub units_written_off: IntCounter,

    // Notification Metrics
    pub notifications: IntCounterVec,

    // Auth Metrics
    pub auth_attempts: IntCounterVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let order_operations = IntCounterVec::new(
            Opts::new("order_operations_total", "Order lifecycle operations by outcome"),
            &["operation", "outcome"],
        )?;
        registry.register(Box::new(order_operations.clone()))?;

        let order_operation_duration = HistogramVec::new(
            HistogramOpts::new("order_operation_duration_seconds", "Order lifecycle operation duration")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["operation"],
        )?;
        registry.register(Box::new(order_operation_duration.clone()))?;

        let stock_reserved_units = IntCounter::new(
            "stock_reserved_units_total",
            "Units deducted from stock by order placement",
        )?;
        registry.register(Box::new(stock_reserved_units.clone()))?;

        let stock_restocked_units = IntCounter::new(
            "stock_restocked_units_total",
            "Units returned to stock by full cancellation",
        )?;
        registry.register(Box::new(stock_restocked_units.clone()))?;

        let units_written_off = IntCounter::new(
            "stock_written_off_units_total",
            "Units of cancelled order items written off as warehouse loss without restocking",
        )?;
        registry.register(Box::new(units_written_off.clone()))?;

        let notifications = IntCounterVec::new(
            Opts::new("notifications_total", "Customer notifications by delivery outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(notifications.clone()))?;

        let auth_attempts = IntCounterVec::new(
            Opts::new("auth_attempts_total", "Login attempts by method and outcome"),
            &["method", "outcome"],
        )?;
        registry.register(Box::new(auth_attempts.clone()))?;

        Ok(Self {
            registry,
            order_operations,
            order_operation_duration,
            stock_reserved_units,
            stock_restocked_units,
            units_written_off,
            notifications,
            auth_attempts,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Helper to record a lifecycle operation; `outcome` is "ok" or an error kind
    pub fn record_order_operation(&self, operation: &str, outcome: &str, elapsed: Duration) {
        self.order_operations.with_label_values(&[operation, outcome]).inc();
        self.order_operation_duration
            .with_label_values(&[operation])
            .observe(elapsed.as_secs_f64());
    }

    pub fn record_reserved(&self, units: i64) {
        self.stock_reserved_units.inc_by(u64::try_from(units).unwrap_or(0));
    }

    pub fn record_restocked(&self, units: i64) {
        self.stock_restocked_units.inc_by(u64::try_from(units).unwrap_or(0));
    }

    pub fn record_written_off(&self, units: i64) {
        self.units_written_off.inc_by(u64::try_from(units).unwrap_or(0));
    }

    pub fn record_notification(&self, delivered: bool) {
        let outcome = if delivered { "delivered" } else { "failed" };
        self.notifications.with_label_values(&[outcome]).inc();
    }

    pub fn record_auth_attempt(&self, method: &str, outcome: &str) {
        self.auth_attempts.with_label_values(&[method, outcome]).inc();
    }
}
