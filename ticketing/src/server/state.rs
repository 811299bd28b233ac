//! Application state for the ticketing HTTP server.
//!
//! Holds the domain services every handler needs, wired once at startup
//! from the store, gateway, QR renderer and clock.

use crate::aggregates::{
    EventCatalog, InventoryLedger, PurchaseService, ReconciliationEngine, ScanEngine, TicketMinter,
    TicketOffice, WalletLedger,
};
use crate::config::Config;
use crate::payment_gateway::WebhookVerifier;
use gatepass_core::environment::Clock;
use gatepass_core::gateway::PaymentGateway;
use gatepass_core::qr::QrRenderer;
use gatepass_core::store::Store;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// Application state shared across all HTTP handlers.
///
/// Cloned per request; every field is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Storage, for readiness probes and admin reads
    pub store: Arc<dyn Store>,

    /// Application configuration
    pub config: Arc<Config>,

    /// Event creation, publishing and listings
    pub events: Arc<EventCatalog>,

    /// Purchase initiation
    pub purchases: Arc<PurchaseService>,

    /// Payment reconciliation, shared by webhook, callback, poll and sweeper
    pub reconciler: Arc<ReconciliationEngine>,

    /// Door scans
    pub scans: Arc<ScanEngine>,

    /// Ticket lookups and sales summaries
    pub tickets: Arc<TicketOffice>,

    /// Wallets and withdrawals
    pub wallets: Arc<WalletLedger>,

    /// Webhook signature check
    pub webhook: Arc<WebhookVerifier>,

    /// Prometheus renderer, when a recorder is installed
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Wire every service from its collaborators.
    #[must_use]
    pub fn build(
        store: Arc<dyn Store>,
        gateway: Arc<dyn PaymentGateway>,
        qr: Arc<dyn QrRenderer>,
        clock: Arc<dyn Clock>,
        config: &Config,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        let minter = TicketMinter::new(qr);
        let ledger = Arc::new(InventoryLedger::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            config.sales.purchase_cutoff,
        ));

        let reconciler = Arc::new(ReconciliationEngine::new(
            Arc::clone(&store),
            Arc::clone(&gateway),
            minter.clone(),
            Arc::clone(&clock),
            config.fees,
        ));
        let purchases = Arc::new(PurchaseService::new(
            Arc::clone(&store),
            gateway,
            Arc::clone(&ledger),
            minter,
            Arc::clone(&clock),
            config.fees,
            config.server.public_url.clone(),
        ));
        let events = Arc::new(EventCatalog::new(
            Arc::clone(&store),
            Arc::clone(&ledger),
            Arc::clone(&clock),
            config.sales.listing_cutoff,
            config.sales.purchase_cutoff,
        ));
        let scans = Arc::new(ScanEngine::new(Arc::clone(&store), ledger, Arc::clone(&clock)));

        Self {
            events,
            purchases,
            reconciler,
            scans,
            tickets: Arc::new(TicketOffice::new(Arc::clone(&store))),
            wallets: Arc::new(WalletLedger::new(Arc::clone(&store), clock)),
            webhook: Arc::new(WebhookVerifier::new(config.webhook.secret.clone())),
            config: Arc::new(config.clone()),
            metrics,
            store,
        }
    }
}
