//! Axum integration for Gatepass.
//!
//! - [`AppError`]: maps domain failures onto HTTP status codes with a stable
//!   JSON body `{ "code": ..., "message": ... }`
//! - [`Identity`], [`OrganizerIdentity`], [`AdminIdentity`]: the caller's
//!   identity as established by the upstream auth layer
//! - [`middleware::with_request_tracing`]: request IDs and per-request spans
//!
//! # Example
//!
//! ```ignore
//! use gatepass_web::{AppError, OrganizerIdentity};
//!
//! async fn handler(
//!     State(state): State<AppState>,
//!     organizer: OrganizerIdentity,
//! ) -> Result<Json<Response>, AppError> {
//!     let wallet = state.wallets.wallet(organizer.id()).await?;
//!     Ok(Json(wallet.into()))
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod middleware;

// Re-export key types for convenience
pub use error::AppError;
pub use extractors::{AdminIdentity, Identity, OrganizerIdentity, Role};
pub use middleware::{REQUEST_ID_HEADER, with_request_tracing};

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
