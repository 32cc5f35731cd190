//! Metrics collector for the message hub
//!
//! Counters and histograms are recorded through the `metrics` facade; when no
//! recorder is installed every call is a no-op.

use metrics::{counter, histogram, Counter, Histogram};
use tracing::{debug, info, warn};

/// Metrics collector shared by the hub, the outbox pipeline and the stores
#[derive(Clone)]
pub struct MetricsCollector {
    requests_total: Counter,
    request_duration: Histogram,
    notifications_published_total: Counter,
    dead_letters_total: Counter,
    outbox_saved_total: Counter,
    outbox_processed_total: Counter,
    outbox_failed_total: Counter,
    outbox_cleanup_deleted_total: Counter,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            requests_total: counter!("messagehub_requests_total"),
            request_duration: histogram!("messagehub_request_duration_seconds"),
            notifications_published_total: counter!("messagehub_notifications_published_total"),
            dead_letters_total: counter!("messagehub_dead_letters_total"),
            outbox_saved_total: counter!("messagehub_outbox_saved_total"),
            outbox_processed_total: counter!("messagehub_outbox_processed_total"),
            outbox_failed_total: counter!("messagehub_outbox_failed_total"),
            outbox_cleanup_deleted_total: counter!("messagehub_outbox_cleanup_deleted_total"),
        }
    }

    // Request metrics

    /// Record a completed request, successful or not
    pub fn record_request(&self, request_type: &str, success: bool, duration_seconds: f64) {
        self.requests_total.increment(1);
        self.request_duration.record(duration_seconds);
        histogram!(
            "messagehub_request_type_duration_seconds",
            "request_type" => request_type.to_string(),
            "success" => success.to_string()
        )
        .record(duration_seconds);
    }

    /// Record a request that left the pipeline with an error
    pub fn record_request_failure(&self, request_type: &str, error_kind: &str) {
        counter!(
            "messagehub_request_failures_total",
            "request_type" => request_type.to_string(),
            "error_kind" => error_kind.to_string()
        )
        .increment(1);
    }

    pub fn record_retry(&self, request_type: &str, attempt: u32) {
        counter!(
            "messagehub_request_retries_total",
            "request_type" => request_type.to_string()
        )
        .increment(1);

        debug!(request_type = request_type, attempt = attempt, "Request retry scheduled");
    }

    pub fn record_cache_lookup(&self, request_type: &str, hit: bool) {
        let name = if hit {
            "messagehub_cache_hits_total"
        } else {
            "messagehub_cache_misses_total"
        };
        counter!(name, "request_type" => request_type.to_string()).increment(1);
    }

    // Notification metrics

    pub fn record_publish(&self, notification_type: &str, handler_count: usize) {
        self.notifications_published_total.increment(1);

        debug!(
            notification_type = notification_type,
            handler_count = handler_count,
            "Notification published"
        );
    }

    pub fn record_handler_failure(&self, notification_type: &str, handler_type: &str) {
        counter!(
            "messagehub_notification_handler_failures_total",
            "notification_type" => notification_type.to_string()
        )
        .increment(1);

        warn!(
            notification_type = notification_type,
            handler_type = handler_type,
            "Notification handler failed"
        );
    }

    pub fn record_dead_letter(&self, notification_type: &str) {
        self.dead_letters_total.increment(1);
        counter!(
            "messagehub_dead_letters_by_type_total",
            "notification_type" => notification_type.to_string()
        )
        .increment(1);
    }

    // Outbox metrics

    pub fn record_outbox_saved(&self, notification_type: &str) {
        self.outbox_saved_total.increment(1);
        debug!(notification_type = notification_type, "Outbox message saved");
    }

    pub fn record_outbox_processed(&self, count: u64) {
        self.outbox_processed_total.increment(count);
    }

    pub fn record_outbox_failed(&self, count: u64) {
        self.outbox_failed_total.increment(count);
    }

    pub fn record_outbox_cleanup(&self, deleted: u64) {
        self.outbox_cleanup_deleted_total.increment(deleted);

        if deleted > 0 {
            info!(deleted = deleted, "Outbox cleanup removed processed messages");
        }
    }
}
