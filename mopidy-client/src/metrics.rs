//! Client metrics
//!
//! OpenTelemetry instruments recorded by a [`Session`](crate::Session) when
//! observability is enabled through the builder. Export happens through
//! whatever meter provider `mopidy_core::init_observability` installed; without
//! one, recording is a no-op.
//!
//! # Metrics Collected
//!
//! - **mopidy.client.connection.state**: current [`ConnectionState`] (gauge)
//! - **mopidy.client.requests.total**: calls completed, by method and status (counter)
//! - **mopidy.client.request.duration**: call latency in seconds (histogram)
//! - **mopidy.client.errors.total**: errors by kind (counter)
//! - **mopidy.client.reconnection.attempts** / **.success** (counters)
//! - **mopidy.client.events.received**: server events, by local name (counter)
//! - **mopidy.client.api.methods**: leaves in the last generated API (gauge)

use crate::connection_state::ConnectionState;
use opentelemetry::{
    global,
    metrics::{Counter, Gauge, Histogram, Meter},
    KeyValue,
};

pub struct ClientMetrics {
    pub connection_state: Gauge<i64>,
    pub requests_total: Counter<u64>,
    pub request_duration: Histogram<f64>,
    pub errors_total: Counter<u64>,
    pub reconnection_attempts: Counter<u64>,
    pub reconnection_success: Counter<u64>,
    pub events_received: Counter<u64>,
    pub api_methods: Gauge<u64>,
}

impl ClientMetrics {
    pub fn new(service_name: impl Into<String>) -> Self {
        // The global meter API wants a 'static scope name; one leak per session.
        let name: &'static str = Box::leak(service_name.into().into_boxed_str());
        let meter = global::meter(name);
        Self::new_with_meter(&meter)
    }

    pub fn new_with_meter(meter: &Meter) -> Self {
        Self {
            connection_state: meter
                .i64_gauge("mopidy.client.connection.state")
                .with_description(
                    "Connection state (0=disconnected, 1=connecting, 2=open, 3=introspecting, 4=ready, 5=closed)",
                )
                .build(),
            requests_total: meter
                .u64_counter("mopidy.client.requests.total")
                .with_description("Total number of calls completed")
                .build(),
            request_duration: meter
                .f64_histogram("mopidy.client.request.duration")
                .with_description("Call duration in seconds")
                .build(),
            errors_total: meter
                .u64_counter("mopidy.client.errors.total")
                .with_description("Total number of errors encountered")
                .build(),
            reconnection_attempts: meter
                .u64_counter("mopidy.client.reconnection.attempts")
                .with_description("Total number of reconnection attempts")
                .build(),
            reconnection_success: meter
                .u64_counter("mopidy.client.reconnection.success")
                .with_description("Total number of successful reconnections")
                .build(),
            events_received: meter
                .u64_counter("mopidy.client.events.received")
                .with_description("Total number of server events received")
                .build(),
            api_methods: meter
                .u64_gauge("mopidy.client.api.methods")
                .with_description("Number of callable methods in the generated API")
                .build(),
        }
    }

    pub fn update_connection_state(&self, state: ConnectionState) {
        self.connection_state.record(state.as_metric_value(), &[]);
    }

    pub fn record_request(&self, method: &str, status: &str, duration_secs: f64) {
        let attributes = &[
            KeyValue::new("method", method.to_string()),
            KeyValue::new("status", status.to_string()),
        ];
        self.requests_total.add(1, attributes);
        self.request_duration.record(duration_secs, attributes);
    }

    pub fn record_error(&self, error_type: &str) {
        let attributes = &[KeyValue::new("error_type", error_type.to_string())];
        self.errors_total.add(1, attributes);
    }

    pub fn record_reconnection_attempt(&self) {
        self.reconnection_attempts.add(1, &[]);
    }

    pub fn record_reconnection_success(&self) {
        self.reconnection_success.add(1, &[]);
    }

    pub fn record_event(&self, event: &str) {
        let attributes = &[KeyValue::new("event", event.to_string())];
        self.events_received.add(1, attributes);
    }

    pub fn record_api_installed(&self, methods: usize) {
        self.api_methods.record(methods as u64, &[]);
    }
}
