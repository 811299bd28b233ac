//! HTTP API handlers, organized by domain:
//! - Purchase: starting a purchase
//! - Payments: status polls and manual verification
//! - Callback / Webhook: gateway signals
//! - Tickets: buyer lookup, door scans, sales summary
//! - Events: event management and listings
//! - Wallet: wallets and withdrawals
//! - Admin: anomaly log

pub mod admin;
pub mod callback;
pub mod errors;
pub mod events;
pub mod payments;
pub mod purchase;
pub mod tickets;
pub mod wallet;
pub mod webhook;
