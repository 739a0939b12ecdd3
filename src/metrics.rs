//! Prometheus metrics for the matching engine. Trimmed to what the
//! dispatcher and transport layer actually emit — no HTTP, cache, or
//! database metrics, since this binary has none of those subsystems.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};

pub mod names {
    pub const COMMANDS_RECEIVED_TOTAL: &str = "commands_received_total";
    pub const COMMAND_DISPATCH_DURATION_SECONDS: &str = "command_dispatch_duration_seconds";
    pub const COMMANDS_REJECTED_TOTAL: &str = "commands_rejected_total";

    pub const ORDERS_SUBMITTED_TOTAL: &str = "orders_submitted_total";
    pub const ORDERS_MATCHED_TOTAL: &str = "orders_matched_total";
    pub const ORDERS_REVERTED_TOTAL: &str = "orders_reverted_total";
    pub const ORDERS_CANCELLED_TOTAL: &str = "orders_cancelled_total";
    pub const SWAP_FILLS_TOTAL: &str = "swap_fills_total";
    pub const MINT_FILLS_TOTAL: &str = "mint_fills_total";

    pub const ACTIVE_MARKETS: &str = "active_markets";
    pub const MARKETS_SETTLED_TOTAL: &str = "markets_settled_total";

    pub const PUBLISH_DROPPED_TOTAL: &str = "publish_dropped_total";
}

pub mod labels {
    pub const COMMAND: &str = "command";
    pub const SINK: &str = "sink";
}

/// Installs the process-wide Prometheus recorder and starts its own
/// scrape listener on `port` — this binary has no other HTTP server to
/// mount `/metrics` on.
pub fn init_metrics(port: u16) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(names::COMMAND_DISPATCH_DURATION_SECONDS.to_string()),
            &[0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.5],
        )?
        .with_http_listener(([0, 0, 0, 0], port))
        .install()?;
    Ok(())
}

pub fn record_command_received(command: &str) {
    counter!(names::COMMANDS_RECEIVED_TOTAL, labels::COMMAND => command.to_string()).increment(1);
}

pub fn record_command_dispatch_duration(command: &str, duration_secs: f64) {
    histogram!(names::COMMAND_DISPATCH_DURATION_SECONDS, labels::COMMAND => command.to_string())
        .record(duration_secs);
}

pub fn record_command_rejected(command: &str) {
    counter!(names::COMMANDS_REJECTED_TOTAL, labels::COMMAND => command.to_string()).increment(1);
}

pub fn record_order_submitted() {
    counter!(names::ORDERS_SUBMITTED_TOTAL).increment(1);
}

pub fn record_order_matched() {
    counter!(names::ORDERS_MATCHED_TOTAL).increment(1);
}

pub fn record_order_reverted() {
    counter!(names::ORDERS_REVERTED_TOTAL).increment(1);
}

pub fn record_order_cancelled() {
    counter!(names::ORDERS_CANCELLED_TOTAL).increment(1);
}

pub fn record_swap_fill() {
    counter!(names::SWAP_FILLS_TOTAL).increment(1);
}

pub fn record_mint_fill() {
    counter!(names::MINT_FILLS_TOTAL).increment(1);
}

pub fn set_active_markets(count: i64) {
    gauge!(names::ACTIVE_MARKETS).set(count as f64);
}

pub fn record_market_settled() {
    counter!(names::MARKETS_SETTLED_TOTAL).increment(1);
}

/// Incremented whenever a best-effort publish (action log, response, or
/// snapshot) is dropped rather than retried — the dispatcher itself
/// never blocks or aborts on a publish failure.
pub fn record_publish_dropped(sink: &str) {
    counter!(names::PUBLISH_DROPPED_TOTAL, labels::SINK => sink.to_string()).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_names_are_stable() {
        assert_eq!(names::ORDERS_SUBMITTED_TOTAL, "orders_submitted_total");
        assert_eq!(names::PUBLISH_DROPPED_TOTAL, "publish_dropped_total");
    }
}
