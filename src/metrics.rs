#[cfg(feature = "metrics")]
mod registry {
    use lazy_static::lazy_static;
    use prometheus::{register_int_counter, register_int_gauge, IntCounter, IntGauge};

    lazy_static! {
        pub(super) static ref PARTS_EXTRACTED: IntCounter = register_int_counter!(
            "json_parts_extracted_total",
            "Total number of top-level JSON objects extracted"
        ).expect("json_parts_extracted_total is registered once");
        pub(super) static ref RECORDS_DELIVERED: IntCounter = register_int_counter!(
            "json_parts_records_delivered_total",
            "Total number of decoded records delivered downstream"
        ).expect("json_parts_records_delivered_total is registered once");
        pub(super) static ref RECORDS_PENDING: IntGauge = register_int_gauge!(
            "json_parts_records_pending",
            "Decoded records buffered while waiting for demand"
        ).expect("json_parts_records_pending is registered once");
        pub(super) static ref DECODE_FAILURES: IntCounter = register_int_counter!(
            "json_parts_decode_failures_total",
            "Total number of JSON objects that failed to decode"
        ).expect("json_parts_decode_failures_total is registered once");
    }
}

#[cfg(feature = "metrics")]
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    use prometheus::{Encoder, TextEncoder};

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    let metric_families = prometheus::gather();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

pub(crate) fn record_parts_extracted(count: usize) {
    #[cfg(feature = "metrics")]
    registry::PARTS_EXTRACTED.inc_by(count as u64);
    #[cfg(not(feature = "metrics"))]
    let _ = count;
}

pub(crate) fn record_delivered() {
    #[cfg(feature = "metrics")]
    registry::RECORDS_DELIVERED.inc();
}

pub(crate) fn pending_changed(delta: i64) {
    #[cfg(feature = "metrics")]
    registry::RECORDS_PENDING.add(delta);
    #[cfg(not(feature = "metrics"))]
    let _ = delta;
}

pub(crate) fn record_decode_failure() {
    #[cfg(feature = "metrics")]
    registry::DECODE_FAILURES.inc();
}
