// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! API key management. Every route here is restricted to user tokens.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::{
    auth::Auth,
    engine::{ApiKeySummary, IssuedKey, Permission, PermissionSet},
    error::ApiError,
    state::AppState,
};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateKeyRequest {
    pub name: String,
    /// Non-empty subset of `deposit`, `transfer`, `read`
    pub permissions: Vec<Permission>,
    /// Lifetime such as `1H`, `1D`, `1M`, `1Y`
    pub expiry: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RolloverKeyRequest {
    pub expired_key_id: u64,
    pub expiry: String,
}

#[utoipa::path(
    post,
    path = "/v1/keys/create",
    request_body = CreateKeyRequest,
    tag = "Keys",
    responses(
        (status = 201, body = IssuedKey),
        (status = 400, description = "Invalid expiry, name or permissions"),
        (status = 403, description = "Not a user token"),
        (status = 409, description = "Maximum of 5 active keys reached")
    )
)]
pub async fn create_key(
    State(state): State<AppState>,
    Auth(principal): Auth,
    Json(request): Json<CreateKeyRequest>,
) -> Result<(StatusCode, Json<IssuedKey>), ApiError> {
    let permissions = PermissionSet::from_iter(request.permissions);
    let issued = state
        .keys()
        .issue(&principal, &request.name, permissions, &request.expiry)?;
    Ok((StatusCode::CREATED, Json(issued)))
}

#[utoipa::path(
    post,
    path = "/v1/keys/rollover",
    request_body = RolloverKeyRequest,
    tag = "Keys",
    responses(
        (status = 201, body = IssuedKey),
        (status = 404, description = "No such key for this user"),
        (status = 409, description = "Key has not expired or was already rolled over")
    )
)]
pub async fn rollover_key(
    State(state): State<AppState>,
    Auth(principal): Auth,
    Json(request): Json<RolloverKeyRequest>,
) -> Result<(StatusCode, Json<IssuedKey>), ApiError> {
    let issued = state
        .keys()
        .rollover(&principal, request.expired_key_id, &request.expiry)?;
    Ok((StatusCode::CREATED, Json(issued)))
}

#[utoipa::path(
    post,
    path = "/v1/keys/{key_id}/revoke",
    params(("key_id" = u64, Path, description = "Key to revoke")),
    tag = "Keys",
    responses(
        (status = 200, body = ApiKeySummary),
        (status = 404, description = "No such key for this user")
    )
)]
pub async fn revoke_key(
    State(state): State<AppState>,
    Auth(principal): Auth,
    Path(key_id): Path<u64>,
) -> Result<Json<ApiKeySummary>, ApiError> {
    Ok(Json(state.keys().revoke(&principal, key_id)?))
}

#[utoipa::path(
    get,
    path = "/v1/keys",
    tag = "Keys",
    responses((status = 200, body = [ApiKeySummary]))
)]
pub async fn list_keys(
    State(state): State<AppState>,
    Auth(principal): Auth,
) -> Result<Json<Vec<ApiKeySummary>>, ApiError> {
    Ok(Json(state.keys().list(&principal)?))
}
