// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWT claims of a user bearer token.

use serde::{Deserialize, Serialize};

/// Claims read from an HS256 user token.
///
/// The user id is taken from `sub`, falling back to a `user_id` claim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Expiration timestamp (required)
    pub exp: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

impl UserClaims {
    pub fn owner_id(&self) -> Option<&str> {
        self.sub
            .as_deref()
            .or(self.user_id.as_deref())
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

/// Sign a user token for tests.
#[cfg(test)]
pub(crate) fn sign_test_token(secret: &str, user_id: &str, email: Option<&str>) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};

    let claims = UserClaims {
        sub: Some(user_id.to_string()),
        user_id: None,
        email: email.map(str::to_string),
        exp: chrono::Utc::now().timestamp() + 3600,
        iat: None,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}
