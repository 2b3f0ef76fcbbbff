// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractor resolving the caller into a [`Principal`].
//!
//! ```rust,ignore
//! async fn my_handler(Auth(principal): Auth) -> impl IntoResponse {
//!     // principal.owner_id, principal.permissions
//! }
//! ```
//!
//! An `x-api-key` header takes precedence over `Authorization: Bearer`.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use jsonwebtoken::{decode, Algorithm, Validation};

use super::claims::UserClaims;
use super::AuthError;
use crate::engine::{LedgerError, Principal};
use crate::state::{AppState, AuthConfig};

/// Clock skew tolerance (60 seconds).
const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Header carrying a service API key.
pub const API_KEY_HEADER: &str = "x-api-key";

pub struct Auth(pub Principal);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(api_key) = parts.headers.get(API_KEY_HEADER) {
            let api_key = api_key.to_str().map_err(|_| AuthError::InvalidApiKey)?;
            let principal = state.keys().validate(api_key).map_err(|e| match e {
                LedgerError::InvalidKey | LedgerError::KeyExpired => AuthError::InvalidApiKey,
                other => AuthError::InternalError(other.to_string()),
            })?;
            return Ok(Auth(principal));
        }

        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingCredentials)?
            .to_str()
            .map_err(|_| AuthError::InvalidAuthHeader)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::InvalidAuthHeader)?;

        let principal = verify_jwt(token, &state.auth_config)?;
        Ok(Auth(principal))
    }
}

/// Verify an HS256 user token and build a user principal.
fn verify_jwt(token: &str, auth_config: &AuthConfig) -> Result<Principal, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = CLOCK_SKEW_LEEWAY;
    validation.validate_aud = false;

    let token_data = decode::<UserClaims>(token, &auth_config.decoding_key, &validation)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            jsonwebtoken::errors::ErrorKind::InvalidSignature => AuthError::InvalidSignature,
            _ => AuthError::MalformedToken,
        })?;

    let claims = token_data.claims;
    let owner_id = claims.owner_id().ok_or(AuthError::MalformedToken)?.to_string();
    Ok(Principal::user(owner_id, claims.email))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::claims::sign_test_token;
    use crate::engine::{Permission, PermissionSet, PrincipalSource};
    use crate::test_support::{test_state, TEST_JWT_SECRET};
    use axum::http::Request;

    fn parts_with(header: Option<(&str, String)>) -> Parts {
        let mut builder = Request::builder().uri("/test");
        if let Some((name, value)) = header {
            builder = builder.header(name, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn requires_credentials() {
        let (state, _dir, _gateway) = test_state();
        let mut parts = parts_with(None);
        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::MissingCredentials)));
    }

    #[tokio::test]
    async fn bearer_token_yields_user_principal() {
        let (state, _dir, _gateway) = test_state();
        let token = sign_test_token(TEST_JWT_SECRET, "user_123", Some("u@example.com"));
        let mut parts = parts_with(Some(("Authorization", format!("Bearer {token}"))));

        let Auth(principal) = Auth::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(principal.owner_id, "user_123");
        assert_eq!(principal.source, PrincipalSource::User);
        assert_eq!(principal.email.as_deref(), Some("u@example.com"));
        assert_eq!(principal.permissions, PermissionSet::all());
    }

    #[tokio::test]
    async fn token_signed_with_other_secret_is_rejected() {
        let (state, _dir, _gateway) = test_state();
        let token = sign_test_token("not-the-secret", "user_123", None);
        let mut parts = parts_with(Some(("Authorization", format!("Bearer {token}"))));
        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::InvalidSignature)));

        let mut parts = parts_with(Some(("Authorization", "Basic abc".to_string())));
        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::InvalidAuthHeader)));
    }

    #[tokio::test]
    async fn api_key_yields_key_principal() {
        let (state, _dir, _gateway) = test_state();
        let user = Principal::user("alice", None);
        let issued = state
            .keys()
            .issue(&user, "svc", PermissionSet::from_iter([Permission::Read]), "1D")
            .unwrap();

        let mut parts = parts_with(Some((API_KEY_HEADER, issued.api_key.clone())));
        let Auth(principal) = Auth::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(principal.owner_id, "alice");
        assert_eq!(
            principal.source,
            PrincipalSource::ApiKey {
                key_id: issued.key_id
            }
        );
        assert!(principal.require(Permission::Transfer).is_err());

        let mut parts = parts_with(Some((API_KEY_HEADER, "sk_bogus".to_string())));
        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::InvalidApiKey)));
    }
}
