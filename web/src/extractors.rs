//! Identity extractors.
//!
//! Authentication happens upstream (gateway / auth proxy). By the time a
//! request reaches this service the caller's identity has been verified and
//! forwarded in two headers, which are trusted as-is:
//!
//! - `X-Auth-User-Id`: the user's UUID
//! - `X-Auth-Role`: `organizer` or `admin`
//!
//! # Examples
//!
//! ```ignore
//! use gatepass_web::extractors::{AdminIdentity, OrganizerIdentity};
//!
//! async fn scan(organizer: OrganizerIdentity) -> Result<Json<Admitted>, AppError> {
//!     tracing::info!(organizer_id = %organizer.id(), "Scanning ticket");
//!     // ...
//! }
//!
//! async fn approve(admin: AdminIdentity) -> Result<Json<Withdrawal>, AppError> {
//!     // ...
//! }
//! ```

use crate::error::AppError;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{HeaderMap, request::Parts},
};
use gatepass_core::types::OrganizerId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Header carrying the authenticated user's UUID.
pub const USER_ID_HEADER: &str = "X-Auth-User-Id";

/// Header carrying the authenticated user's role.
pub const ROLE_HEADER: &str = "X-Auth-Role";

/// Caller role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Creates events, scans tickets, withdraws earnings
    Organizer,
    /// Processes withdrawals, reviews anomalies
    Admin,
}

/// Any authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    /// User ID (an organizer's ID when `role` is organizer)
    pub user_id: OrganizerId,
    /// Role
    pub role: Role,
}

fn identity_from_headers(headers: &HeaderMap) -> Result<Identity, AppError> {
    let user_id = headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s.trim()).ok())
        .ok_or_else(|| AppError::unauthorized("Missing or invalid authenticated user"))?;

    let role = match headers.get(ROLE_HEADER).and_then(|v| v.to_str().ok()) {
        Some(r) if r.eq_ignore_ascii_case("admin") => Role::Admin,
        Some(r) if r.eq_ignore_ascii_case("organizer") => Role::Organizer,
        _ => return Err(AppError::unauthorized("Missing or invalid role")),
    };

    Ok(Identity {
        user_id: OrganizerId::from_uuid(user_id),
        role,
    })
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        identity_from_headers(&parts.headers)
    }
}

/// Caller with the organizer role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrganizerIdentity(pub OrganizerId);

impl OrganizerIdentity {
    /// The organizer's ID.
    #[must_use]
    pub const fn id(&self) -> OrganizerId {
        self.0
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for OrganizerIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = identity_from_headers(&parts.headers)?;
        match identity.role {
            Role::Organizer => Ok(Self(identity.user_id)),
            Role::Admin => Err(AppError::forbidden("Organizer role required")),
        }
    }
}

/// Caller with the admin role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdminIdentity(pub OrganizerId);

impl AdminIdentity {
    /// The admin's user ID.
    #[must_use]
    pub const fn id(&self) -> OrganizerId {
        self.0
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AdminIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = identity_from_headers(&parts.headers)?;
        match identity.role {
            Role::Admin => Ok(Self(identity.user_id)),
            Role::Organizer => Err(AppError::forbidden("Admin role required")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder();
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).expect("Valid request").into_parts().0
    }

    #[tokio::test]
    async fn test_organizer_identity_from_headers() {
        let id = Uuid::new_v4();
        let mut parts = parts(&[(USER_ID_HEADER, &id.to_string()), (ROLE_HEADER, "organizer")]);
        let organizer = OrganizerIdentity::from_request_parts(&mut parts, &())
            .await
            .expect("Should extract");
        assert_eq!(organizer.id(), OrganizerId::from_uuid(id));
    }

    #[tokio::test]
    async fn test_missing_user_is_unauthorized() {
        let mut parts = parts(&[(ROLE_HEADER, "organizer")]);
        let err = Identity::from_request_parts(&mut parts, &())
            .await
            .expect_err("Should reject");
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_wrong_role_is_forbidden() {
        let id = Uuid::new_v4().to_string();
        let mut organizer = parts(&[(USER_ID_HEADER, &id), (ROLE_HEADER, "organizer")]);
        let err = AdminIdentity::from_request_parts(&mut organizer, &())
            .await
            .expect_err("Should reject");
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        let mut admin = parts(&[(USER_ID_HEADER, &id), (ROLE_HEADER, "ADMIN")]);
        assert!(AdminIdentity::from_request_parts(&mut admin, &()).await.is_ok());
    }
}
