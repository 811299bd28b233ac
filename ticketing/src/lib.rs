//! Gatepass ticketing service.
//!
//! Sells tickets for organizer events, reconciles payments with an external
//! gateway, admits ticket holders at the door and pays organizers out of
//! per-organizer wallets.
//!
//! # Architecture
//!
//! ```text
//!   buyer ──► /purchase/initiate ──► PurchaseService ──► gateway checkout
//!                                         │
//!   gateway ─► webhook / callback / poll / sweeper
//!                                         │
//!                                         ▼
//!                              ReconciliationEngine
//!                     finalize ─► commit sale ─► mint ticket ─► credit wallet
//!                                 (one store transaction)
//! ```
//!
//! Every path that learns about a payment outcome funnels into
//! [`aggregates::ReconciliationEngine`], so a reference settles at most once
//! no matter how many notifications arrive or in which order.
//!
//! # Modules
//!
//! - [`aggregates`]: domain services (events, inventory, purchases,
//!   reconciliation, tickets, wallets)
//! - [`api`]: HTTP handlers
//! - [`payment_gateway`]: gateway adapters and webhook verification
//! - [`runtime`]: background sweeper and process lifecycle
//! - [`server`]: router, shared state, health endpoints

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod aggregates;
pub mod api;
pub mod config;
pub mod metrics;
pub mod payment_gateway;
pub mod qr;
pub mod runtime;
pub mod server;

pub use config::Config;
