//! # Gatepass Testing
//!
//! Test doubles and fixtures for the Gatepass ticketing platform.
//!
//! This crate provides:
//! - [`FixedClock`]: deterministic, manually advanced time
//! - [`InMemoryStore`]: a transactional in-memory [`Store`](gatepass_core::store::Store)
//! - [`ScriptedGateway`]: a payment gateway with scripted verification verdicts
//! - [`StubQrRenderer`] / [`FailingQrRenderer`]
//! - [`fixtures`]: builders for events and tickets
//!
//! ## Example
//!
//! ```ignore
//! use gatepass_testing::{fixtures::EventBuilder, test_clock, InMemoryStore, ScriptedGateway};
//!
//! #[tokio::test]
//! async fn test_purchase_flow() {
//!     let clock = test_clock();
//!     let store = InMemoryStore::new();
//!     let event = EventBuilder::live(clock.now()).ticket_type("Regular", 5000, 10).build();
//!     store.seed_event(event).await;
//!     // ...
//! }
//! ```

pub mod fixtures;
pub mod memory;
pub mod mocks;

/// Property-based testing utilities using proptest.
pub mod properties {
    use gatepass_core::Money;
    use proptest::prelude::*;

    /// Amounts between 1 and 1,000,000 minor units.
    pub fn arb_amount() -> impl Strategy<Value = Money> {
        (1_u64..1_000_000).prop_map(Money::from_minor)
    }

    /// A wallet operation for ledger property tests.
    #[derive(Clone, Debug)]
    pub enum LedgerOp {
        /// Credit this amount
        Credit(Money),
        /// Try to debit this amount
        Debit(Money),
    }

    /// Random interleaving of credits and debits.
    pub fn arb_ledger_ops(max_len: usize) -> impl Strategy<Value = Vec<LedgerOp>> {
        prop::collection::vec(
            prop_oneof![
                arb_amount().prop_map(LedgerOp::Credit),
                arb_amount().prop_map(LedgerOp::Debit),
            ],
            0..max_len,
        )
    }
}

/// Install a test subscriber that honours `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use memory::InMemoryStore;
pub use mocks::{FailingQrRenderer, FixedClock, ScriptedGateway, StubQrRenderer, test_clock};
