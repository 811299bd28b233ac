//! Domain services of the ticketing platform.
//!
//! - [`event`]: event creation, publishing and listings
//! - [`inventory`]: reservation checks and sale commits
//! - [`purchase`]: purchase initiation (gateway checkout or free ticket)
//! - [`payment`]: reconciliation of PENDING payments
//! - [`ticket`]: ticket issuance, door scans and sales summaries
//! - [`wallet`]: organizer wallets and withdrawals

pub mod event;
pub mod inventory;
pub mod payment;
pub mod purchase;
pub mod ticket;
pub mod wallet;

pub use event::{EventCatalog, EventError, EventView};
pub use inventory::{InventoryLedger, Reservation};
pub use payment::{ReconcileError, ReconciliationEngine};
pub use purchase::{PurchaseError, PurchaseOutcome, PurchaseRequest, PurchaseService};
pub use ticket::{ScanEngine, ScanError, TicketMinter, TicketOffice};
pub use wallet::{WalletError, WalletLedger};
