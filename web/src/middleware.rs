//! Request tracking and observability.
//!
//! Every request gets an `X-Request-Id` (taken from the caller or generated),
//! a tracing span carrying it, and the same ID echoed on the response.
//!
//! # Example
//!
//! ```ignore
//! use gatepass_web::middleware::with_request_tracing;
//!
//! let app = with_request_tracing(Router::new().route("/health", get(health)));
//! ```

use axum::{Router, extract::Request, http::HeaderName};
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

/// Header name for request IDs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Wrap a router with request-ID propagation and a per-request span.
pub fn with_request_tracing<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let header = HeaderName::from_static(REQUEST_ID_HEADER);

    router.layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::new(header.clone(), MakeRequestUuid))
            .layer(
                TraceLayer::new_for_http().make_span_with(|req: &Request| {
                    let request_id = req
                        .headers()
                        .get(REQUEST_ID_HEADER)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("-");
                    tracing::info_span!(
                        "http_request",
                        request_id = %request_id,
                        method = %req.method(),
                        uri = %req.uri(),
                    )
                }),
            )
            .layer(PropagateRequestIdLayer::new(header)),
    )
}
