//! QR rendering seam.

use crate::types::QrToken;
use thiserror::Error;

/// Rendering failed; the enclosing success transaction must abort.
#[derive(Debug, Clone, Error)]
#[error("qr rendering failed: {0}")]
pub struct QrError(pub String);

/// Pure function from token to displayable image.
pub trait QrRenderer: Send + Sync {
    /// Render `token` as a data URI.
    ///
    /// # Errors
    ///
    /// Returns [`QrError`] when the token cannot be encoded.
    fn render(&self, token: &QrToken) -> Result<String, QrError>;
}
