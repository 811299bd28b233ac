//! Runtime components: the background sweeper and the application
//! lifecycle (serve, then shut down gracefully).

pub mod lifecycle;
pub mod sweeper;

pub use lifecycle::Application;
pub use sweeper::{SweepReport, Sweeper};
