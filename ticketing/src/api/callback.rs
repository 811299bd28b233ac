//! Gateway redirect callback.
//!
//! - GET /api/callback/redirect?ref=... - Buyer's browser returning from checkout
//!
//! The callback is advisory: it kicks off reconciliation in the background
//! and always redirects to the processing page, which polls the status
//! endpoint. The response never waits on the gateway and never fails.

use crate::server::state::AppState;
use axum::{
    extract::{Query, State},
    response::Redirect,
};
use gatepass_core::types::PaymentReference;
use reqwest::Url;
use serde::Deserialize;
use std::sync::Arc;

/// Query string of the redirect.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    /// Our payment reference
    #[serde(rename = "ref", alias = "reference")]
    pub reference: Option<String>,
}

/// Handle the buyer's return from checkout with a 303 to the frontend.
pub async fn redirect(State(state): State<AppState>, Query(query): Query<CallbackQuery>) -> Redirect {
    let reference = query
        .reference
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .map(PaymentReference::new);

    if let Some(reference) = reference.clone() {
        let reconciler = Arc::clone(&state.reconciler);
        tokio::spawn(async move {
            if let Err(e) = reconciler.reconcile(&reference).await {
                tracing::warn!(%reference, error = %e, "Callback reconciliation failed");
            }
        });
    } else {
        tracing::warn!("Redirect callback without a reference");
    }

    Redirect::to(&processing_url(&state.config.server.frontend_url, reference.as_ref()))
}

fn processing_url(frontend: &str, reference: Option<&PaymentReference>) -> String {
    let base = format!("{}/payment/processing", frontend.trim_end_matches('/'));
    match reference {
        Some(reference) => Url::parse_with_params(&base, &[("ref", reference.as_str())])
            .map_or_else(|_| base.clone(), String::from),
        None => base,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processing_url_encodes_reference() {
        let url = processing_url(
            "https://tickets.example.com/",
            Some(&PaymentReference::new("GP-1 2&3")),
        );
        assert_eq!(url, "https://tickets.example.com/payment/processing?ref=GP-1+2%263");
        assert_eq!(
            processing_url("https://tickets.example.com", None),
            "https://tickets.example.com/payment/processing"
        );
    }
}
