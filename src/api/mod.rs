// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    engine::{ApiKeySummary, DepositSession, DepositStatus, IssuedKey, Permission, TransferOutcome},
    state::AppState,
    storage::{KeyStatus, LedgerEntry, TxStatus, TxType, Wallet},
};

pub mod health;
pub mod keys;
pub mod wallet;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/wallet", post(wallet::open_wallet))
        .route("/wallet/deposit", post(wallet::initiate_deposit))
        .route("/wallet/paystack/webhook", post(wallet::paystack_webhook))
        .route(
            "/wallet/deposit/{reference}/status",
            get(wallet::deposit_status),
        )
        .route("/wallet/balance", get(wallet::get_balance))
        .route("/wallet/transfer", post(wallet::transfer))
        .route("/wallet/transactions", get(wallet::list_transactions))
        .route("/keys", get(keys::list_keys))
        .route("/keys/create", post(keys::create_key))
        .route("/keys/rollover", post(keys::rollover_key))
        .route("/keys/{key_id}/revoke", post(keys::revoke_key));

    Router::new()
        .route("/health", get(health::health))
        .nest("/v1", v1_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        wallet::open_wallet,
        wallet::initiate_deposit,
        wallet::paystack_webhook,
        wallet::deposit_status,
        wallet::get_balance,
        wallet::transfer,
        wallet::list_transactions,
        keys::create_key,
        keys::rollover_key,
        keys::revoke_key,
        keys::list_keys
    ),
    components(
        schemas(
            health::HealthResponse,
            health::HealthChecks,
            Wallet,
            LedgerEntry,
            TxType,
            TxStatus,
            Permission,
            KeyStatus,
            IssuedKey,
            ApiKeySummary,
            DepositSession,
            DepositStatus,
            TransferOutcome,
            wallet::DepositRequest,
            wallet::TransferRequest,
            wallet::BalanceResponse,
            wallet::WebhookAck,
            keys::CreateKeyRequest,
            keys::RolloverKeyRequest
        )
    ),
    tags(
        (name = "Health", description = "Liveness and database readability"),
        (name = "Wallet", description = "Balances, deposits, transfers and history"),
        (name = "Keys", description = "Service API key lifecycle")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{claims::sign_test_token, API_KEY_HEADER};
    use crate::test_support::{test_state, TEST_JWT_SECRET};
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn bearer(owner: &str) -> String {
        format!(
            "Bearer {}",
            sign_test_token(TEST_JWT_SECRET, owner, Some("owner@example.com"))
        )
    }

    #[tokio::test]
    async fn router_builds_with_all_routes() {
        let (state, _dir, _gateway) = test_state();
        let app = router(state);
        let _ = app.into_make_service();
    }

    #[tokio::test]
    async fn health_reports_database() {
        let (state, _dir, _gateway) = test_state();
        let app = router(state);
        let (status, body) = send(
            &app,
            Request::get("/health").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["checks"]["database"], "ok");
    }

    #[tokio::test]
    async fn wallet_routes_require_credentials() {
        let (state, _dir, _gateway) = test_state();
        let app = router(state);
        let (status, body) = send(
            &app,
            Request::get("/v1/wallet/balance").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error_code"], "missing_credentials");
    }

    #[tokio::test]
    async fn api_key_round_trip_through_router() {
        let (state, _dir, _gateway) = test_state();
        let app = router(state);

        let (status, wallet) = send(
            &app,
            Request::post("/v1/wallet")
                .header("Authorization", bearer("alice"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(wallet["balance"], 0);

        let (status, issued) = send(
            &app,
            Request::post("/v1/keys/create")
                .header("Authorization", bearer("alice"))
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({ "name": "reporting", "permissions": ["read"], "expiry": "1D" })
                        .to_string(),
                ))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let api_key = issued["api_key"].as_str().unwrap().to_string();
        let key_id = issued["key_id"].as_u64().unwrap();

        let (status, balance) = send(
            &app,
            Request::get("/v1/wallet/balance")
                .header(API_KEY_HEADER, api_key.as_str())
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(balance["balance"], 0);

        // Keys cannot manage keys.
        let (status, _) = send(
            &app,
            Request::get("/v1/keys")
                .header(API_KEY_HEADER, api_key.as_str())
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, revoked) = send(
            &app,
            Request::post(format!("/v1/keys/{key_id}/revoke"))
                .header("Authorization", bearer("alice"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(revoked["status"], "revoked");

        let (status, body) = send(
            &app,
            Request::get("/v1/wallet/balance")
                .header(API_KEY_HEADER, api_key.as_str())
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid or expired API key");
    }

    #[tokio::test]
    async fn webhook_with_bad_signature_is_rejected() {
        let (state, _dir, _gateway) = test_state();
        let app = router(state);
        let (status, body) = send(
            &app,
            Request::post("/v1/wallet/paystack/webhook")
                .header("x-paystack-signature", "deadbeef")
                .body(Body::from(r#"{"event":"charge.success","data":{"reference":"ps_1"}}"#))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }
}
