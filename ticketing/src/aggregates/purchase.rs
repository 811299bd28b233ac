//! Purchase initiation.
//!
//! Paid tiers: check inventory, open a gateway checkout, then record the
//! payment PENDING. The gateway call comes first so no record exists for a
//! checkout that never opened. Free tiers never touch the gateway: the
//! payment is written SUCCESS and the ticket issued in one transaction.

use crate::aggregates::inventory::{InventoryLedger, Reservation};
use crate::aggregates::ticket::{IssueError, TicketMinter};
use crate::metrics;
use gatepass_core::environment::Clock;
use gatepass_core::error::StoreError;
use gatepass_core::event::InventoryError;
use gatepass_core::fees::FeePolicy;
use gatepass_core::gateway::{CheckoutMetadata, CheckoutRequest, GatewayError, PaymentGateway};
use gatepass_core::payment::{NewPayment, PaymentProvider};
use gatepass_core::state::PaymentStatus;
use gatepass_core::store::{SaleOutcome, Store};
use gatepass_core::ticket::Ticket;
use gatepass_core::types::{EventId, PaymentReference};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// A buyer's request for one ticket.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRequest {
    /// Event
    pub event_id: EventId,
    /// Tier name
    pub ticket_type: String,
    /// Where the ticket goes
    pub buyer_email: String,
    /// Shown on the gateway checkout
    pub buyer_name: String,
}

impl PurchaseRequest {
    fn validate(&self) -> Result<(), PurchaseError> {
        if self.ticket_type.trim().is_empty() {
            return Err(PurchaseError::Validation("ticketType is required".to_string()));
        }
        let email = self.buyer_email.trim();
        match email.split_once('@') {
            Some((user, domain)) if !user.is_empty() && domain.contains('.') => {}
            _ => return Err(PurchaseError::Validation("buyerEmail is invalid".to_string())),
        }
        if self.buyer_name.trim().is_empty() {
            return Err(PurchaseError::Validation("buyerName is required".to_string()));
        }
        Ok(())
    }
}

/// What the buyer does next.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PurchaseOutcome {
    /// Send the buyer to the gateway
    Checkout {
        /// Payment reference
        reference: PaymentReference,
        /// Gateway checkout page
        checkout_url: String,
    },
    /// Free ticket, already issued
    Issued {
        /// Payment reference
        reference: PaymentReference,
        /// The ticket
        ticket: Box<Ticket>,
    },
}

impl PurchaseOutcome {
    /// Reference of the payment this purchase created.
    #[must_use]
    pub const fn reference(&self) -> &PaymentReference {
        match self {
            Self::Checkout { reference, .. } | Self::Issued { reference, .. } => reference,
        }
    }
}

/// Purchase rejected before any payment was recorded.
#[derive(Debug, Clone, Error)]
pub enum PurchaseError {
    /// Malformed request
    #[error("{0}")]
    Validation(String),
    /// No such event
    #[error("event not found: {0}")]
    EventNotFound(EventId),
    /// Inventory or sales-window check failed
    #[error(transparent)]
    Inventory(#[from] InventoryError),
    /// The gateway could not open a checkout
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    /// Storage failure
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Free ticket could not be issued
    #[error(transparent)]
    Issue(#[from] IssueError),
}

/// Entry point for buyers.
pub struct PurchaseService {
    store: Arc<dyn Store>,
    gateway: Arc<dyn PaymentGateway>,
    ledger: Arc<InventoryLedger>,
    minter: TicketMinter,
    clock: Arc<dyn Clock>,
    fees: FeePolicy,
    public_url: String,
}

impl PurchaseService {
    /// Create a purchase service. `public_url` is this server's externally
    /// reachable base, used to build the gateway redirect URL.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        gateway: Arc<dyn PaymentGateway>,
        ledger: Arc<InventoryLedger>,
        minter: TicketMinter,
        clock: Arc<dyn Clock>,
        fees: FeePolicy,
        public_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            gateway,
            ledger,
            minter,
            clock,
            fees,
            public_url: public_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Start a purchase.
    ///
    /// # Errors
    ///
    /// [`PurchaseError`]; no payment is recorded on any error.
    pub async fn initiate(&self, request: PurchaseRequest) -> Result<PurchaseOutcome, PurchaseError> {
        request.validate()?;
        let event = self
            .ledger
            .load(request.event_id)
            .await?
            .ok_or(PurchaseError::EventNotFound(request.event_id))?;
        let reservation = self.ledger.check_and_reserve(&event, request.ticket_type.trim())?;

        if reservation.ticket_type.is_free() {
            self.issue_free(&request, &reservation).await
        } else {
            self.open_checkout(&request, &reservation).await
        }
    }

    fn new_payment(
        &self,
        reference: PaymentReference,
        request: &PurchaseRequest,
        reservation: &Reservation,
        provider: PaymentProvider,
    ) -> NewPayment {
        let breakdown = self.fees.breakdown(reservation.ticket_type.price);
        NewPayment {
            reference,
            event_id: reservation.event_id,
            organizer_id: reservation.organizer_id,
            ticket_type: reservation.ticket_type.name.clone(),
            buyer_email: request.buyer_email.trim().to_lowercase(),
            buyer_name: request.buyer_name.trim().to_string(),
            amount: breakdown.amount,
            platform_fee: breakdown.platform_fee,
            organizer_amount: breakdown.organizer_amount,
            provider,
        }
    }

    async fn open_checkout(
        &self,
        request: &PurchaseRequest,
        reservation: &Reservation,
    ) -> Result<PurchaseOutcome, PurchaseError> {
        let new = self.new_payment(
            PaymentReference::generate(),
            request,
            reservation,
            PaymentProvider::Gateway,
        );
        let checkout = CheckoutRequest {
            reference: new.reference.clone(),
            amount: new.amount,
            buyer_email: new.buyer_email.clone(),
            buyer_name: new.buyer_name.clone(),
            redirect_url: format!("{}/api/callback/redirect?ref={}", self.public_url, new.reference),
            metadata: CheckoutMetadata {
                event_id: new.event_id,
                ticket_type: new.ticket_type.clone(),
                buyer_email: new.buyer_email.clone(),
            },
        };

        let session = self.gateway.initiate(&checkout).await.map_err(|e| {
            tracing::warn!(reference = %checkout.reference, error = %e, "Checkout initiation failed");
            e
        })?;

        let payment = self.store.create_pending(new, self.clock.now()).await?;
        tracing::info!(
            reference = %payment.reference,
            event_id = %payment.event_id,
            ticket_type = %payment.ticket_type,
            amount = %payment.amount,
            organizer_amount = %payment.organizer_amount,
            "Checkout opened"
        );
        Ok(PurchaseOutcome::Checkout {
            reference: payment.reference,
            checkout_url: session.checkout_url,
        })
    }

    async fn issue_free(
        &self,
        request: &PurchaseRequest,
        reservation: &Reservation,
    ) -> Result<PurchaseOutcome, PurchaseError> {
        let now = self.clock.now();
        let payment = self
            .new_payment(
                PaymentReference::generate_free(),
                request,
                reservation,
                PaymentProvider::Free,
            )
            .into_payment(PaymentStatus::Success, now);

        let mut tx = self.store.begin().await?;
        tx.insert_payment(&payment).await?;
        match InventoryLedger::commit_sale(&mut *tx, payment.event_id, &payment.ticket_type).await? {
            SaleOutcome::Committed { .. } => {}
            SaleOutcome::Rejected(reason) => return Err(reason.into()),
        }
        let ticket = self.minter.issue(&mut *tx, &payment, now).await?;
        tx.commit().await?;

        metrics::record_ticket_issued(payment.provider.as_str());
        tracing::info!(reference = %payment.reference, event_id = %payment.event_id, "Free ticket issued");
        Ok(PurchaseOutcome::Issued {
            reference: payment.reference,
            ticket: Box::new(ticket),
        })
    }
}
