//! Business metrics for the ticketing service.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `gatepass_reconcile_total{outcome}` - Reconciliation attempts by outcome
//! - `gatepass_tickets_issued_total{provider}` - Tickets issued (free or gateway)
//! - `gatepass_wallet_credited_minor_total` - Organizer credits in minor units
//! - `gatepass_inventory_anomalies_total` - Sales captured beyond inventory
//! - `gatepass_scans_total{result}` - Door scans by result
//! - `gatepass_webhooks_total{result}` - Gateway webhooks by result
//! - `gatepass_gateway_calls_total{op,result}` - Outbound gateway calls
//!
//! ## Histograms
//! - `gatepass_gateway_latency_seconds{op}` - Outbound gateway call latency

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize and register all business metrics descriptions.
///
/// This should be called once at application startup, before any metrics are recorded.
pub fn register_metrics() {
    describe_counter!(
        "gatepass_reconcile_total",
        "Reconciliation attempts by outcome (success, failed, pending, already_final)"
    );
    describe_counter!(
        "gatepass_tickets_issued_total",
        "Tickets issued by payment provider"
    );
    describe_counter!(
        "gatepass_wallet_credited_minor_total",
        "Amount credited to organizer wallets in minor units"
    );
    describe_counter!(
        "gatepass_inventory_anomalies_total",
        "Captured payments that could not be matched to inventory"
    );
    describe_counter!("gatepass_scans_total", "Door scans by result");
    describe_counter!("gatepass_webhooks_total", "Gateway webhooks by result");
    describe_counter!(
        "gatepass_gateway_calls_total",
        "Outbound gateway calls by operation and result"
    );
    describe_histogram!(
        "gatepass_gateway_latency_seconds",
        "Latency of outbound gateway calls"
    );

    tracing::info!("Business metrics registered");
}

/// Install the Prometheus recorder and register metric descriptions.
///
/// Returns `None` when a recorder is already installed (tests create several
/// applications in one process) or the exporter cannot be built; metrics
/// then go nowhere and `/metrics` renders empty.
#[must_use]
pub fn install_recorder() -> Option<PrometheusHandle> {
    let builder = match PrometheusBuilder::new().set_buckets_for_metric(
        Matcher::Suffix("latency_seconds".to_string()),
        &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0],
    ) {
        Ok(builder) => builder,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to configure metrics exporter");
            return None;
        }
    };

    match builder.install_recorder() {
        Ok(handle) => {
            register_metrics();
            Some(handle)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Metrics recorder already initialized, skipping");
            None
        }
    }
}

// ============================================================================
// Metric Recording Functions
// ============================================================================

/// Record the result of one `reconcile` call.
///
/// # Arguments
///
/// * `outcome` - `success`, `failed`, `pending`, `already_final` or `error`
pub fn record_reconcile(outcome: &'static str) {
    metrics::counter!("gatepass_reconcile_total", "outcome" => outcome).increment(1);
    tracing::debug!(outcome, "Recorded reconcile metric");
}

/// Record an issued ticket.
pub fn record_ticket_issued(provider: &'static str) {
    metrics::counter!("gatepass_tickets_issued_total", "provider" => provider).increment(1);
    tracing::debug!(provider, "Recorded ticket_issued metric");
}

/// Record a wallet credit.
pub fn record_wallet_credit(amount_minor: u64) {
    metrics::counter!("gatepass_wallet_credited_minor_total").increment(amount_minor);
    tracing::debug!(amount_minor, "Recorded wallet_credit metric");
}

/// Record a sale captured beyond inventory.
pub fn record_inventory_anomaly() {
    metrics::counter!("gatepass_inventory_anomalies_total").increment(1);
}

/// Record a door scan.
///
/// # Arguments
///
/// * `result` - `admitted`, `already_used`, `not_found`, `not_authorized` or `not_live`
pub fn record_scan(result: &'static str) {
    metrics::counter!("gatepass_scans_total", "result" => result).increment(1);
    tracing::debug!(result, "Recorded scan metric");
}

/// Record a received webhook.
///
/// # Arguments
///
/// * `result` - `accepted`, `bad_signature`, `unknown_reference`, `malformed` or `error`
pub fn record_webhook(result: &'static str) {
    metrics::counter!("gatepass_webhooks_total", "result" => result).increment(1);
    tracing::debug!(result, "Recorded webhook metric");
}

/// Record an outbound gateway call and its latency.
pub fn record_gateway_call(op: &'static str, result: &'static str, elapsed: Duration) {
    metrics::counter!("gatepass_gateway_calls_total", "op" => op, "result" => result)
        .increment(1);
    metrics::histogram!("gatepass_gateway_latency_seconds", "op" => op)
        .record(elapsed.as_secs_f64());
    tracing::debug!(op, result, elapsed_ms = elapsed.as_millis(), "Recorded gateway_call metric");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_a_noop() {
        register_metrics();
        record_reconcile("success");
        record_ticket_issued("FREE");
        record_wallet_credit(5000);
        record_inventory_anomaly();
        record_scan("admitted");
        record_webhook("accepted");
        record_gateway_call("verify", "ok", Duration::from_millis(120));
    }
}
