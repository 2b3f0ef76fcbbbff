// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Resolves every request into an explicit [`crate::engine::Principal`].
//!
//! ## Credentials
//!
//! - `Authorization: Bearer <JWT>`: HS256 user token signed with
//!   `JWT_SECRET`. `sub` (or `user_id`) is the owner id; the optional `email`
//!   claim is handed to the payment gateway. Users hold every permission.
//! - `x-api-key: sk_...`: service key issued through `/v1/keys/create`,
//!   holding only the permissions it was granted.
//!
//! ## Security
//!
//! - Unknown, expired and revoked keys are indistinguishable to the caller
//! - Clock skew tolerance is 60 seconds

pub mod claims;
pub mod error;
pub mod extractor;

pub use claims::UserClaims;
pub use error::AuthError;
pub use extractor::{Auth, API_KEY_HEADER};
