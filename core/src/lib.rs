//! # Gatepass Core
//!
//! Domain model and seams for the Gatepass event-ticketing platform.
//!
//! This crate has no I/O. It defines:
//!
//! - **Types**: identifiers, [`Money`](types::Money) in integer minor units,
//!   payment references and QR tokens
//! - **State machines**: one enumerated status type per entity with a central
//!   table of legal transitions ([`state`])
//! - **Entities**: events and ticket types, payments, tickets, wallets,
//!   withdrawals and reconciliation anomalies
//! - **Policies**: platform fee arithmetic and sales cut-offs
//! - **Seams**: the transactional store ([`store`]), the payment gateway
//!   ([`gateway`]), QR rendering ([`qr`]) and the clock ([`environment`])
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐      ┌──────────────────────┐
//! │  Reconciliation /    │ ───▶ │  PaymentGateway      │  (black box, HTTP)
//! │  Inventory / Scan    │      └──────────────────────┘
//! │  engines (ticketing) │      ┌──────────────────────┐
//! │                      │ ───▶ │  Store / StoreTx     │  (Postgres, in-memory)
//! └──────────────────────┘      └──────────────────────┘
//! ```
//!
//! Every contended mutation (payment status, ticket-type `sold`, wallet
//! balance, scanned flag) is expressed on [`store::StoreTx`] as a conditional
//! update, so implementations can never fall back to read-modify-write.

pub mod environment;
pub mod error;
pub mod event;
pub mod fees;
pub mod gateway;
pub mod payment;
pub mod qr;
pub mod state;
pub mod store;
pub mod ticket;
pub mod types;
pub mod wallet;

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use environment::{Clock, SystemClock};
pub use error::StoreError;
pub use types::{
    AnomalyId, EventId, Money, OrganizerId, PaymentId, PaymentReference, QrToken, TicketId,
    WalletEntryId, WithdrawalId,
};
