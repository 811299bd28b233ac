//! Normalization of gateway payloads.
//!
//! The provider reports the same facts under different keys depending on the
//! API version and on whether the payload is a verify response or a webhook
//! push. Every lookup here walks a fixed list of candidate paths, first match
//! wins, and the result is reduced to [`VerificationOutcome`].

use gatepass_core::gateway::{CheckoutMetadata, Verification, VerificationOutcome};
use gatepass_core::types::{EventId, Money, PaymentReference};
use serde_json::Value;
use uuid::Uuid;

const STATUS_PATHS: &[&str] = &["status", "responseBody.status", "data.status", "paymentStatus"];

const REFERENCE_PATHS: &[&str] = &[
    "paymentReference",
    "tx_reference",
    "responseBody.tx_reference",
    "responseBody.paymentReference",
    "data.reference",
    "reference",
];

const CHECKOUT_URL_PATHS: &[&str] = &[
    "responseBody.checkoutUrl",
    "data.checkoutUrl",
    "checkoutUrl",
];

const AMOUNT_PATHS: &[&str] = &["responseBody.amount", "data.amount", "amount"];

const METADATA_PATHS: &[&str] = &["responseBody.metadata", "data.metadata", "metadata"];

const NAME_PATHS: &[&str] = &[
    "responseBody.customer.name",
    "responseBody.customerName",
    "data.customer.name",
    "customerName",
];

/// Follow a dotted path through nested objects.
fn lookup<'a>(body: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(body, |node, key| node.get(key))
}

/// First non-empty string found under any of `paths`.
fn first_str<'a>(body: &'a Value, paths: &[&str]) -> Option<&'a str> {
    paths
        .iter()
        .filter_map(|path| lookup(body, path))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
}

/// Map a provider status string onto the four-valued verdict.
#[must_use]
pub fn classify_status(status: &str) -> VerificationOutcome {
    match status.trim().to_ascii_uppercase().as_str() {
        "SUCCESSFUL" | "SUCCESS" | "PAID" | "COMPLETED" => VerificationOutcome::Successful,
        "PENDING" | "PROCESSING" | "INITIATED" => VerificationOutcome::Pending,
        "FAILED" | "DECLINED" | "CANCELLED" | "CANCELED" | "ABANDONED" | "EXPIRED" => {
            VerificationOutcome::Failed
        }
        _ => VerificationOutcome::Unknown,
    }
}

/// Whether the envelope reports that the provider handled the request.
/// Payloads without the flag (webhooks) are taken at face value.
#[must_use]
pub fn request_successful(body: &Value) -> bool {
    body.get("requestSuccessful")
        .and_then(Value::as_bool)
        .unwrap_or(true)
}

/// The provider's human-readable message, if any.
#[must_use]
pub fn response_message(body: &Value) -> Option<String> {
    first_str(body, &["responseMessage", "message", "error"]).map(ToString::to_string)
}

/// Amounts travel in major units, as a number or a numeric string.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn major_to_money(value: &Value) -> Option<Money> {
    let major = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !major.is_finite() || major < 0.0 {
        return None;
    }
    Some(Money::from_minor((major * 100.0).round() as u64))
}

/// Metadata is sometimes echoed as an object and sometimes as a JSON string.
fn metadata(body: &Value) -> Option<CheckoutMetadata> {
    let raw = METADATA_PATHS.iter().find_map(|path| lookup(body, path))?;
    let parsed;
    let object = match raw {
        Value::String(s) => {
            parsed = serde_json::from_str::<Value>(s).ok()?;
            &parsed
        }
        other => other,
    };

    let event_id = first_str(object, &["eventId", "event_id"])
        .and_then(|s| Uuid::parse_str(s).ok())
        .map(EventId::from_uuid)?;
    let ticket_type = first_str(object, &["ticketType", "ticket_type"])?;
    let buyer_email = first_str(object, &["email", "buyerEmail", "buyer_email"])?;

    Some(CheckoutMetadata {
        event_id,
        ticket_type: ticket_type.to_string(),
        buyer_email: buyer_email.to_string(),
    })
}

/// Reduce a verify response (or webhook payload) to a [`Verification`].
#[must_use]
pub fn verification_from_json(body: &Value) -> Verification {
    let outcome = first_str(body, STATUS_PATHS).map_or(VerificationOutcome::Unknown, classify_status);

    Verification {
        outcome,
        amount: AMOUNT_PATHS
            .iter()
            .filter_map(|path| lookup(body, path))
            .find_map(major_to_money),
        metadata: metadata(body),
        buyer_name: first_str(body, NAME_PATHS).map(ToString::to_string),
    }
}

/// Checkout URL from an initiate response.
#[must_use]
pub fn checkout_url(body: &Value) -> Option<String> {
    first_str(body, CHECKOUT_URL_PATHS).map(ToString::to_string)
}

/// Our payment reference from a webhook payload.
#[must_use]
pub fn webhook_reference(body: &Value) -> Option<PaymentReference> {
    first_str(body, REFERENCE_PATHS).map(PaymentReference::new)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_under_every_observed_key() {
        let shapes = [
            json!({"status": "SUCCESSFUL"}),
            json!({"requestSuccessful": true, "responseBody": {"status": "successful"}}),
            json!({"data": {"status": "PAID"}}),
            json!({"paymentStatus": "Completed"}),
        ];
        for body in shapes {
            assert_eq!(
                verification_from_json(&body).outcome,
                VerificationOutcome::Successful,
                "{body}"
            );
        }
    }

    #[test]
    fn test_classification() {
        assert_eq!(classify_status("processing"), VerificationOutcome::Pending);
        assert_eq!(classify_status("INITIATED"), VerificationOutcome::Pending);
        assert_eq!(classify_status("DECLINED"), VerificationOutcome::Failed);
        assert_eq!(classify_status("abandoned"), VerificationOutcome::Failed);
        assert_eq!(classify_status("REVERSED"), VerificationOutcome::Unknown);
        assert_eq!(
            verification_from_json(&json!({"requestSuccessful": true})).outcome,
            VerificationOutcome::Unknown
        );
    }

    #[test]
    fn test_verify_response_with_metadata() {
        let event_id = Uuid::new_v4();
        let body = json!({
            "requestSuccessful": true,
            "responseMessage": "success",
            "responseBody": {
                "status": "SUCCESSFUL",
                "amount": 52.3,
                "customer": {"name": "Ada Buyer"},
                "metadata": {"eventId": event_id.to_string(), "ticketType": "VIP", "email": "ada@example.com"}
            }
        });

        let verification = verification_from_json(&body);
        assert_eq!(verification.amount, Some(Money::from_minor(5230)));
        assert_eq!(verification.buyer_name.as_deref(), Some("Ada Buyer"));
        let metadata = verification.metadata.unwrap();
        assert_eq!(metadata.event_id, EventId::from_uuid(event_id));
        assert_eq!(metadata.ticket_type, "VIP");
        assert_eq!(metadata.buyer_email, "ada@example.com");
    }

    #[test]
    fn test_stringified_metadata_and_string_amount() {
        let event_id = Uuid::new_v4();
        let metadata = json!({"eventId": event_id.to_string(), "ticketType": "Regular", "email": "b@example.com"});
        let body = json!({
            "data": {"status": "SUCCESS", "amount": "5000", "metadata": metadata.to_string()}
        });

        let verification = verification_from_json(&body);
        assert_eq!(verification.amount, Some(Money::from_minor(500_000)));
        assert_eq!(verification.metadata.unwrap().ticket_type, "Regular");
    }

    #[test]
    fn test_incomplete_metadata_is_dropped() {
        let body = json!({"status": "SUCCESSFUL", "metadata": {"eventId": "not-a-uuid", "ticketType": "VIP", "email": "x@example.com"}});
        assert!(verification_from_json(&body).metadata.is_none());
    }

    #[test]
    fn test_envelope_helpers() {
        let rejected = json!({"requestSuccessful": false, "responseMessage": "Invalid reference"});
        assert!(!request_successful(&rejected));
        assert_eq!(response_message(&rejected).as_deref(), Some("Invalid reference"));
        assert!(request_successful(&json!({"status": "SUCCESSFUL"})));

        assert_eq!(
            checkout_url(&json!({"responseBody": {"checkoutUrl": "https://pay.example/abc"}})).as_deref(),
            Some("https://pay.example/abc")
        );
        assert_eq!(
            checkout_url(&json!({"data": {"checkoutUrl": "https://pay.example/def"}})).as_deref(),
            Some("https://pay.example/def")
        );
        assert!(checkout_url(&json!({"responseBody": {"checkoutUrl": ""}})).is_none());
    }

    #[test]
    fn test_webhook_reference_keys() {
        for body in [
            json!({"paymentReference": "EVT-1"}),
            json!({"tx_reference": "EVT-1"}),
            json!({"responseBody": {"tx_reference": "EVT-1"}}),
            json!({"reference": "EVT-1"}),
        ] {
            assert_eq!(webhook_reference(&body), Some(PaymentReference::new("EVT-1")), "{body}");
        }
        assert!(webhook_reference(&json!({"status": "SUCCESSFUL"})).is_none());
    }
}
