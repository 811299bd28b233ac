//! QR code rendering.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use gatepass_core::qr::{QrError, QrRenderer};
use gatepass_core::types::QrToken;
use qrcode::QrCode;
use qrcode::render::svg;

/// Renders tokens as SVG QR codes wrapped in a base64 data URI.
#[derive(Debug, Clone, Copy)]
pub struct SvgQrRenderer {
    size: u32,
}

impl SvgQrRenderer {
    /// Renderer producing images at least `size` pixels square.
    #[must_use]
    pub const fn new(size: u32) -> Self {
        Self { size }
    }
}

impl Default for SvgQrRenderer {
    fn default() -> Self {
        Self::new(240)
    }
}

impl QrRenderer for SvgQrRenderer {
    fn render(&self, token: &QrToken) -> Result<String, QrError> {
        let code = QrCode::new(token.as_str().as_bytes()).map_err(|e| QrError(e.to_string()))?;
        let image = code
            .render::<svg::Color<'_>>()
            .min_dimensions(self.size, self.size)
            .quiet_zone(true)
            .build();
        Ok(format!(
            "data:image/svg+xml;base64,{}",
            STANDARD.encode(image.as_bytes())
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_renders_svg_data_uri() {
        let uri = SvgQrRenderer::default().render(&QrToken::generate()).unwrap();
        let encoded = uri.strip_prefix("data:image/svg+xml;base64,").unwrap();
        let svg = String::from_utf8(STANDARD.decode(encoded).unwrap()).unwrap();
        assert!(svg.contains("<svg"));
    }

    #[test]
    fn test_oversized_token_fails() {
        let token = QrToken::new("X".repeat(8000));
        assert!(SvgQrRenderer::default().render(&token).is_err());
    }
}
