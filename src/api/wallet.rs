// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet routes: provisioning, deposits, balance, transfers and history.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    auth::Auth,
    engine::{DepositSession, DepositStatus, LedgerError, TransferOutcome},
    error::ApiError,
    providers::paystack::SIGNATURE_HEADER,
    state::AppState,
    storage::{LedgerEntry, Wallet},
};

// =============================================================================
// Request / response bodies
// =============================================================================

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct DepositRequest {
    /// Minor currency units, strictly positive
    pub amount: i64,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct TransferRequest {
    /// Recipient wallet number
    pub wallet_number: String,
    /// Minor currency units, strictly positive
    pub amount: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BalanceResponse {
    pub balance: u64,
}

/// Acknowledgement returned to the gateway.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WebhookAck {
    pub status: bool,
}

// =============================================================================
// Handlers
// =============================================================================

#[utoipa::path(
    post,
    path = "/v1/wallet",
    tag = "Wallet",
    responses(
        (status = 200, description = "The caller's wallet (created on first call)", body = Wallet),
        (status = 403, description = "Not a user token")
    )
)]
pub async fn open_wallet(
    State(state): State<AppState>,
    Auth(principal): Auth,
) -> Result<Json<Wallet>, ApiError> {
    Ok(Json(state.accounts().open_wallet(&principal)?))
}

#[utoipa::path(
    post,
    path = "/v1/wallet/deposit",
    request_body = DepositRequest,
    tag = "Wallet",
    responses(
        (status = 201, body = DepositSession),
        (status = 400, description = "Invalid amount"),
        (status = 404, description = "Wallet not found"),
        (status = 502, description = "Payment gateway unavailable")
    )
)]
pub async fn initiate_deposit(
    State(state): State<AppState>,
    Auth(principal): Auth,
    Json(request): Json<DepositRequest>,
) -> Result<(StatusCode, Json<DepositSession>), ApiError> {
    let session = state.deposits().initiate(&principal, request.amount).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// Gateway webhook. Anything past signature verification is acknowledged.
#[utoipa::path(
    post,
    path = "/v1/wallet/paystack/webhook",
    request_body(content = String, description = "Raw signed event payload"),
    params(("x-paystack-signature" = String, Header, description = "Hex HMAC-SHA512 of the body")),
    tag = "Wallet",
    responses(
        (status = 200, body = WebhookAck),
        (status = 400, description = "Invalid signature")
    )
)]
pub async fn paystack_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    match state.deposits().handle_webhook(&body, signature) {
        Ok(_) => Ok(Json(WebhookAck { status: true })),
        Err(LedgerError::InvalidSignature) => Err(LedgerError::InvalidSignature.into()),
        Err(e) => {
            tracing::error!(error = %e, "webhook handling failed");
            Ok(Json(WebhookAck { status: true }))
        }
    }
}

#[utoipa::path(
    get,
    path = "/v1/wallet/deposit/{reference}/status",
    params(("reference" = String, Path, description = "Deposit reference")),
    tag = "Wallet",
    responses(
        (status = 200, body = DepositStatus),
        (status = 404, description = "No such deposit for this wallet")
    )
)]
pub async fn deposit_status(
    State(state): State<AppState>,
    Auth(principal): Auth,
    Path(reference): Path<String>,
) -> Result<Json<DepositStatus>, ApiError> {
    Ok(Json(state.deposits().status(&principal, &reference)?))
}

#[utoipa::path(
    get,
    path = "/v1/wallet/balance",
    tag = "Wallet",
    responses(
        (status = 200, body = BalanceResponse),
        (status = 404, description = "Wallet not found")
    )
)]
pub async fn get_balance(
    State(state): State<AppState>,
    Auth(principal): Auth,
) -> Result<Json<BalanceResponse>, ApiError> {
    let balance = state.accounts().balance(&principal)?;
    Ok(Json(BalanceResponse { balance }))
}

#[utoipa::path(
    post,
    path = "/v1/wallet/transfer",
    request_body = TransferRequest,
    tag = "Wallet",
    responses(
        (status = 200, body = TransferOutcome),
        (status = 400, description = "Invalid amount"),
        (status = 404, description = "Sender or recipient wallet not found"),
        (status = 409, description = "Insufficient funds or self-transfer")
    )
)]
pub async fn transfer(
    State(state): State<AppState>,
    Auth(principal): Auth,
    Json(request): Json<TransferRequest>,
) -> Result<Json<TransferOutcome>, ApiError> {
    let outcome = state
        .transfers()
        .transfer(&principal, &request.wallet_number, request.amount)?;
    Ok(Json(outcome))
}

#[utoipa::path(
    get,
    path = "/v1/wallet/transactions",
    tag = "Wallet",
    responses(
        (status = 200, description = "Newest first", body = [LedgerEntry]),
        (status = 404, description = "Wallet not found")
    )
)]
pub async fn list_transactions(
    State(state): State<AppState>,
    Auth(principal): Auth,
) -> Result<Json<Vec<LedgerEntry>>, ApiError> {
    Ok(Json(state.accounts().history(&principal)?))
}
