use once_cell::sync::Lazy;
use prometheus::{register_int_counter, register_int_counter_vec, Encoder, IntCounter, IntCounterVec, TextEncoder};

pub static NOTIFICATIONS_SENT_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "powermix_notifications_sent_total",
        "Total number of region notifications handed to the broker",
        &["topic"]
    )
    .expect("register powermix_notifications_sent_total")
});

pub static DELIVERIES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "powermix_deliveries_total",
        "Delivery outcomes reported by the broker",
        &["topic", "outcome"]
    )
    .expect("register powermix_deliveries_total")
});

pub static REGIONS_SKIPPED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "powermix_regions_skipped_total",
        "Regions left out of a run because their summary could not be computed"
    )
    .expect("register powermix_regions_skipped_total")
});

pub static MESSAGES_RENDERED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "powermix_messages_rendered_total",
        "Notifications decoded and shown to the operator",
        &["status"]
    )
    .expect("register powermix_messages_rendered_total")
});

pub static DECODE_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "powermix_decode_failures_total",
        "Notifications discarded because the payload could not be decoded",
        &["topic"]
    )
    .expect("register powermix_decode_failures_total")
});

pub fn gather_metrics() -> String {
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if TextEncoder::new().encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
