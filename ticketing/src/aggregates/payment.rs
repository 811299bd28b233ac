//! Reconciliation engine.
//!
//! Webhooks, redirect callbacks, client polls and the sweeper all funnel into
//! [`ReconciliationEngine::reconcile`]. A payment leaves PENDING exactly once:
//! the settlement transaction starts with a compare-and-swap on the payment
//! status, and only the caller that wins it performs the side effects
//! (inventory, ticket, wallet). Everything after the swap happens in the same
//! transaction, so a failure anywhere leaves the payment PENDING and
//! reconcilable.
//!
//! The gateway is always called before a transaction is opened, never while
//! one is held.

use crate::aggregates::inventory::InventoryLedger;
use crate::aggregates::ticket::{IssueError, TicketMinter};
use crate::aggregates::wallet::WalletLedger;
use crate::metrics;
use gatepass_core::environment::Clock;
use gatepass_core::error::StoreError;
use gatepass_core::fees::FeePolicy;
use gatepass_core::gateway::{PaymentGateway, Verification, VerificationOutcome};
use gatepass_core::payment::{NewPayment, Payment, PaymentProvider, ReconciliationAnomaly};
use gatepass_core::state::PaymentStatus;
use gatepass_core::store::{SaleOutcome, Store, StoreTx, TransitionOutcome};
use gatepass_core::types::{AnomalyId, PaymentReference};
use std::sync::Arc;
use thiserror::Error;

/// Reconciliation failures. Gateway trouble is not among them: an
/// unreachable gateway leaves the payment PENDING.
#[derive(Debug, Clone, Error)]
pub enum ReconcileError {
    /// No payment with this reference
    #[error("unknown payment reference: {0}")]
    UnknownReference(PaymentReference),
    /// Storage failure; the transaction was rolled back
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Ticket issuance failed; the transaction was rolled back
    #[error(transparent)]
    Issue(#[from] IssueError),
}

/// Converges PENDING payments to their terminal status.
pub struct ReconciliationEngine {
    store: Arc<dyn Store>,
    gateway: Arc<dyn PaymentGateway>,
    minter: TicketMinter,
    clock: Arc<dyn Clock>,
    fees: FeePolicy,
}

impl ReconciliationEngine {
    /// Create a reconciliation engine. `fees` is only used to price payments
    /// adopted from unknown webhook references.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        gateway: Arc<dyn PaymentGateway>,
        minter: TicketMinter,
        clock: Arc<dyn Clock>,
        fees: FeePolicy,
    ) -> Self {
        Self {
            store,
            gateway,
            minter,
            clock,
            fees,
        }
    }

    /// Bring a payment to its terminal status if the gateway allows.
    ///
    /// Returns the status after this call: terminal statuses are returned
    /// unchanged, PENDING means "ask again later".
    ///
    /// # Errors
    ///
    /// [`ReconcileError::UnknownReference`] if no payment exists; storage
    /// and issuance failures roll back and leave the payment PENDING.
    pub async fn reconcile(&self, reference: &PaymentReference) -> Result<PaymentStatus, ReconcileError> {
        let result = self.try_reconcile(reference).await;
        if let Err(e) = &result {
            metrics::record_reconcile("error");
            tracing::warn!(%reference, error = %e, "Reconciliation failed");
        }
        result
    }

    async fn try_reconcile(&self, reference: &PaymentReference) -> Result<PaymentStatus, ReconcileError> {
        let payment = self
            .store
            .find_payment(reference)
            .await?
            .ok_or_else(|| ReconcileError::UnknownReference(reference.clone()))?;

        if payment.status != PaymentStatus::Pending {
            metrics::record_reconcile("already_final");
            tracing::debug!(%reference, status = %payment.status, "Payment already final");
            return Ok(payment.status);
        }

        match self.gateway.verify(reference).await {
            Ok(verification) => self.apply(&payment, &verification).await,
            Err(e) => {
                metrics::record_reconcile("pending");
                tracing::warn!(%reference, error = %e, transient = e.is_transient(), "Verification unavailable, payment stays pending");
                Ok(PaymentStatus::Pending)
            }
        }
    }

    /// Act on a gateway verdict for a PENDING payment.
    async fn apply(&self, payment: &Payment, verification: &Verification) -> Result<PaymentStatus, ReconcileError> {
        let reference = &payment.reference;
        match verification.outcome {
            VerificationOutcome::Pending | VerificationOutcome::Unknown => {
                metrics::record_reconcile("pending");
                tracing::debug!(%reference, outcome = ?verification.outcome, "Payment not settled yet");
                Ok(PaymentStatus::Pending)
            }
            VerificationOutcome::Failed => {
                let now = self.clock.now();
                match self.store.finalize_payment(reference, PaymentStatus::Failed, now).await? {
                    TransitionOutcome::Applied(_) => {
                        metrics::record_reconcile("failed");
                        tracing::info!(%reference, "Payment failed");
                        Ok(PaymentStatus::Failed)
                    }
                    TransitionOutcome::AlreadyFinalized(status) => {
                        metrics::record_reconcile("already_final");
                        Ok(status)
                    }
                }
            }
            VerificationOutcome::Successful => {
                if let Some(reported) = verification.amount {
                    if reported != payment.amount {
                        tracing::warn!(
                            %reference,
                            expected = %payment.amount,
                            %reported,
                            "Gateway reports a different amount"
                        );
                    }
                }
                self.settle(reference).await
            }
        }
    }

    /// The success transaction.
    async fn settle(&self, reference: &PaymentReference) -> Result<PaymentStatus, ReconcileError> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;

        let payment = match tx.finalize_payment(reference, PaymentStatus::Success, now).await? {
            TransitionOutcome::Applied(payment) => payment,
            TransitionOutcome::AlreadyFinalized(status) => {
                metrics::record_reconcile("already_final");
                tracing::debug!(%reference, %status, "Lost settlement race");
                return Ok(status);
            }
        };

        let issued = self.fulfil(&mut *tx, &payment).await?;
        tx.commit().await?;

        metrics::record_reconcile("success");
        if issued {
            metrics::record_ticket_issued(payment.provider.as_str());
        }
        tracing::info!(
            %reference,
            event_id = %payment.event_id,
            organizer_id = %payment.organizer_id,
            organizer_amount = %payment.organizer_amount,
            "Payment settled"
        );
        Ok(PaymentStatus::Success)
    }

    /// Side effects of a won settlement. Returns whether a ticket was issued.
    async fn fulfil(&self, tx: &mut dyn StoreTx, payment: &Payment) -> Result<bool, ReconcileError> {
        let now = payment.finalized_at.unwrap_or_else(|| self.clock.now());
        let reference = &payment.reference;

        let issued = if tx.ticket_for_payment(reference).await?.is_some() {
            tracing::warn!(%reference, "Ticket already exists, skipping issuance");
            false
        } else {
            let rejection = match InventoryLedger::commit_sale(tx, payment.event_id, &payment.ticket_type).await {
                Ok(SaleOutcome::Committed { .. }) => None,
                Ok(SaleOutcome::Rejected(reason)) => Some(reason.to_string()),
                Err(StoreError::NotFound { .. }) => Some("event no longer exists".to_string()),
                Err(e) => return Err(e.into()),
            };
            if let Some(reason) = rejection {
                let anomaly = ReconciliationAnomaly {
                    id: AnomalyId::new(),
                    reference: reference.clone(),
                    event_id: payment.event_id,
                    ticket_type: payment.ticket_type.clone(),
                    reason,
                    recorded_at: now,
                };
                tx.record_anomaly(&anomaly).await?;
                metrics::record_inventory_anomaly();
                tracing::warn!(
                    %reference,
                    event_id = %payment.event_id,
                    ticket_type = %payment.ticket_type,
                    reason = %anomaly.reason,
                    "Captured payment exceeds inventory, issuing ticket anyway"
                );
            }
            self.minter.issue(tx, payment, now).await?;
            true
        };

        WalletLedger::credit(tx, payment.organizer_id, payment.organizer_amount, reference.as_str(), now)
            .await?;
        Ok(issued)
    }

    /// Rebuild a payment we have no record of from the metadata the gateway
    /// echoes back, then reconcile it.
    ///
    /// Returns `None` when the gateway cannot vouch for the reference or
    /// its metadata does not name a known event and tier.
    ///
    /// # Errors
    ///
    /// Storage and issuance failures, as for [`Self::reconcile`].
    pub async fn adopt_unknown(
        &self,
        reference: &PaymentReference,
    ) -> Result<Option<PaymentStatus>, ReconcileError> {
        if self.store.find_payment(reference).await?.is_some() {
            return self.reconcile(reference).await.map(Some);
        }

        let verification = match self.gateway.verify(reference).await {
            Ok(verification) => verification,
            Err(e) => {
                tracing::warn!(%reference, error = %e, "Cannot verify unknown reference");
                return Ok(None);
            }
        };
        let Some(metadata) = verification.metadata.clone() else {
            tracing::warn!(%reference, "Unknown reference carries no metadata");
            return Ok(None);
        };
        let Some(event) = self.store.find_event(metadata.event_id).await? else {
            tracing::warn!(%reference, event_id = %metadata.event_id, "Unknown reference names a missing event");
            return Ok(None);
        };
        let Some(tier) = event.ticket_type(&metadata.ticket_type) else {
            tracing::warn!(%reference, ticket_type = %metadata.ticket_type, "Unknown reference names a missing ticket type");
            return Ok(None);
        };

        let breakdown = self.fees.breakdown(tier.price);
        let buyer_email = metadata.buyer_email.trim().to_lowercase();
        let new = NewPayment {
            reference: reference.clone(),
            event_id: event.id,
            organizer_id: event.organizer_id,
            ticket_type: tier.name.clone(),
            buyer_name: verification
                .buyer_name
                .as_deref()
                .map_or_else(|| buyer_email.clone(), |name| name.trim().to_string()),
            buyer_email,
            amount: breakdown.amount,
            platform_fee: breakdown.platform_fee,
            organizer_amount: breakdown.organizer_amount,
            provider: PaymentProvider::Gateway,
        };

        let payment = match self.store.create_pending(new, self.clock.now()).await {
            Ok(payment) => payment,
            Err(StoreError::DuplicateReference(_)) => {
                return self.reconcile(reference).await.map(Some);
            }
            Err(e) => return Err(e.into()),
        };
        tracing::info!(%reference, event_id = %payment.event_id, "Adopted unknown payment reference");
        self.apply(&payment, &verification).await.map(Some)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use gatepass_core::gateway::{CheckoutMetadata, GatewayError};
    use gatepass_core::qr::QrRenderer;
    use gatepass_core::store::{AnomalyRepository, PaymentRepository, WalletRepository};
    use gatepass_core::types::Money;
    use gatepass_testing::fixtures::{EventBuilder, new_payment};
    use gatepass_testing::{FailingQrRenderer, InMemoryStore, ScriptedGateway, StubQrRenderer, test_clock};

    struct Harness {
        store: InMemoryStore,
        gateway: Arc<ScriptedGateway>,
        engine: ReconciliationEngine,
    }

    fn harness(gateway: ScriptedGateway, qr: Arc<dyn QrRenderer>) -> Harness {
        let store = InMemoryStore::new();
        let gateway = Arc::new(gateway);
        let engine = ReconciliationEngine::new(
            Arc::new(store.clone()),
            Arc::clone(&gateway) as Arc<dyn PaymentGateway>,
            TicketMinter::new(qr),
            Arc::new(test_clock()),
            FeePolicy::default(),
        );
        Harness { store, gateway, engine }
    }

    async fn pending(h: &Harness, capacity: u32) -> Payment {
        let event = EventBuilder::live(test_clock().now())
            .capacity(capacity)
            .ticket_type("Regular", 5000, 10)
            .build();
        h.store.seed_event(event.clone()).await;
        h.store
            .create_pending(new_payment(&event, "Regular", &FeePolicy::default()), test_clock().now())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_success_settles_everything() {
        let h = harness(ScriptedGateway::succeeding(), Arc::new(StubQrRenderer));
        let payment = pending(&h, 100).await;

        let status = h.engine.reconcile(&payment.reference).await.unwrap();
        assert_eq!(status, PaymentStatus::Success);

        let tickets = h.store.tickets().await;
        assert_eq!(tickets.len(), 1);
        assert_eq!(tickets[0].amount_paid, Money::from_minor(5000));
        let wallet = h.store.find_wallet(payment.organizer_id).await.unwrap().unwrap();
        assert_eq!(wallet.balance, Money::from_minor(5000));
        assert_eq!(payment.amount, Money::from_minor(5230));

        // Already final: no second verification
        let status = h.engine.reconcile(&payment.reference).await.unwrap();
        assert_eq!(status, PaymentStatus::Success);
        assert_eq!(h.gateway.verify_calls(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_and_unknown_leave_pending() {
        let h = harness(ScriptedGateway::unavailable(), Arc::new(StubQrRenderer));
        let payment = pending(&h, 100).await;
        assert_eq!(h.engine.reconcile(&payment.reference).await.unwrap(), PaymentStatus::Pending);

        h.gateway.push(&payment.reference, Ok(Verification::outcome(VerificationOutcome::Unknown)));
        assert_eq!(h.engine.reconcile(&payment.reference).await.unwrap(), PaymentStatus::Pending);

        h.gateway.push(&payment.reference, Err(GatewayError::Timeout));
        assert_eq!(h.engine.reconcile(&payment.reference).await.unwrap(), PaymentStatus::Pending);

        let stored = h.store.find_payment(&payment.reference).await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Pending);
        assert!(h.store.tickets().await.is_empty());
    }

    #[tokio::test]
    async fn test_decline_is_terminal() {
        let h = harness(ScriptedGateway::declining(), Arc::new(StubQrRenderer));
        let payment = pending(&h, 100).await;
        assert_eq!(h.engine.reconcile(&payment.reference).await.unwrap(), PaymentStatus::Failed);

        h.gateway.set_default(Ok(Verification::outcome(VerificationOutcome::Successful)));
        assert_eq!(h.engine.reconcile(&payment.reference).await.unwrap(), PaymentStatus::Failed);
        assert!(h.store.tickets().await.is_empty());
        assert!(h.store.find_wallet(payment.organizer_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_render_failure_rolls_back() {
        let h = harness(ScriptedGateway::succeeding(), Arc::new(FailingQrRenderer));
        let payment = pending(&h, 100).await;

        let err = h.engine.reconcile(&payment.reference).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Issue(IssueError::Qr(_))));

        let stored = h.store.find_payment(&payment.reference).await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Pending);
        assert!(h.store.find_wallet(payment.organizer_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_overflow_records_anomaly_and_still_issues() {
        let h = harness(ScriptedGateway::succeeding(), Arc::new(StubQrRenderer));
        let payment = pending(&h, 0).await;

        assert_eq!(h.engine.reconcile(&payment.reference).await.unwrap(), PaymentStatus::Success);
        assert_eq!(h.store.tickets().await.len(), 1);
        let anomalies = h.store.anomalies(10).await.unwrap();
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].reference, payment.reference);
    }

    #[tokio::test]
    async fn test_unknown_reference() {
        let h = harness(ScriptedGateway::succeeding(), Arc::new(StubQrRenderer));
        let reference = PaymentReference::generate();
        assert!(matches!(
            h.engine.reconcile(&reference).await,
            Err(ReconcileError::UnknownReference(r)) if r == reference
        ));
        // Gateway has no metadata for it either
        assert_eq!(h.engine.adopt_unknown(&reference).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_adopt_unknown_from_metadata() {
        let h = harness(ScriptedGateway::succeeding(), Arc::new(StubQrRenderer));
        let event = EventBuilder::live(test_clock().now()).ticket_type("VIP", 20000, 5).build();
        h.store.seed_event(event.clone()).await;

        let reference = PaymentReference::generate();
        h.gateway.push(
            &reference,
            Ok(Verification {
                outcome: VerificationOutcome::Successful,
                amount: None,
                metadata: Some(CheckoutMetadata {
                    event_id: event.id,
                    ticket_type: "VIP".to_string(),
                    buyer_email: "late@example.com".to_string(),
                }),
                buyer_name: None,
            }),
        );

        let status = h.engine.adopt_unknown(&reference).await.unwrap();
        assert_eq!(status, Some(PaymentStatus::Success));
        let payment = h.store.find_payment(&reference).await.unwrap().unwrap();
        assert_eq!(payment.organizer_amount, Money::from_minor(20000));
        assert_eq!(payment.buyer_name, "late@example.com");
        assert_eq!(h.store.tickets().await[0].buyer_email, "late@example.com");
    }

    #[tokio::test]
    async fn test_adopted_buyer_email_is_normalized_like_checkout() {
        let h = harness(ScriptedGateway::succeeding(), Arc::new(StubQrRenderer));
        let event = EventBuilder::live(test_clock().now()).ticket_type("VIP", 20000, 5).build();
        h.store.seed_event(event.clone()).await;

        let reference = PaymentReference::generate();
        h.gateway.push(
            &reference,
            Ok(Verification {
                outcome: VerificationOutcome::Successful,
                amount: None,
                metadata: Some(CheckoutMetadata {
                    event_id: event.id,
                    ticket_type: "VIP".to_string(),
                    buyer_email: "  Late.Buyer@Example.COM ".to_string(),
                }),
                buyer_name: Some(" Late Buyer ".to_string()),
            }),
        );

        h.engine.adopt_unknown(&reference).await.unwrap();
        let payment = h.store.find_payment(&reference).await.unwrap().unwrap();
        assert_eq!(payment.buyer_email, "late.buyer@example.com");
        assert_eq!(payment.buyer_name, "Late Buyer");
        assert_eq!(h.store.tickets().await[0].buyer_email, "late.buyer@example.com");
    }
}
