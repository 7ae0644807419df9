//! Metrics instrumentation for the broker.
//!
//! Uses the `metrics` facade only; installing an exporter is up to the
//! embedding application.

use metrics::{counter, gauge};

/// Metric names.
pub mod names {
    pub const MESSAGES_PUBLISHED: &str = "pulse_broker_messages_published_total";
    pub const DELIVERIES_TOTAL: &str = "pulse_broker_deliveries_total";
    pub const SUBSCRIPTIONS_TOTAL: &str = "pulse_broker_subscriptions_total";
    pub const SUBSCRIBERS_ACTIVE: &str = "pulse_broker_subscribers_active";
    pub const IN_FLIGHT: &str = "pulse_broker_in_flight";
}

/// Register metric descriptions with the installed recorder.
pub fn describe_metrics() {
    metrics::describe_counter!(
        names::MESSAGES_PUBLISHED,
        "Total number of messages published"
    );
    metrics::describe_counter!(
        names::DELIVERIES_TOTAL,
        "Total number of handler invocations completed"
    );
    metrics::describe_counter!(
        names::SUBSCRIPTIONS_TOTAL,
        "Total number of subscriptions created"
    );
    metrics::describe_gauge!(
        names::SUBSCRIBERS_ACTIVE,
        "Current number of registered subscribers"
    );
    metrics::describe_gauge!(
        names::IN_FLIGHT,
        "Deliveries enqueued but not yet handled"
    );
}

pub(crate) fn record_publish(recipients: usize) {
    counter!(names::MESSAGES_PUBLISHED, "fanout" => fanout_label(recipients)).increment(1);
}

pub(crate) fn record_delivery() {
    counter!(names::DELIVERIES_TOTAL).increment(1);
}

pub(crate) fn record_subscription() {
    counter!(names::SUBSCRIPTIONS_TOTAL).increment(1);
    gauge!(names::SUBSCRIBERS_ACTIVE).increment(1.0);
}

pub(crate) fn record_unsubscription(count: usize) {
    gauge!(names::SUBSCRIBERS_ACTIVE).decrement(count as f64);
}

pub(crate) fn record_in_flight(delta: f64) {
    gauge!(names::IN_FLIGHT).increment(delta);
}

fn fanout_label(recipients: usize) -> &'static str {
    match recipients {
        0 => "none",
        1 => "single",
        _ => "multi",
    }
}
