// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Paystack integration for card deposits.
//!
//! - `POST /transaction/initialize` creates a hosted checkout
//! - Webhooks carry `x-paystack-signature`: hex HMAC-SHA512 of the raw body
//!   keyed with the secret key

use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::Sha512;
use tracing::info;
use uuid::Uuid;

use super::{ChargeRequest, ChargeSession, GatewayError, PaymentGateway};
use crate::config::PaystackConfig;

type HmacSha512 = Hmac<Sha512>;

/// Header carrying the webhook signature.
pub const SIGNATURE_HEADER: &str = "x-paystack-signature";

const INITIALIZE_PATH: &str = "/transaction/initialize";
const REFERENCE_PREFIX: &str = "ps_";

#[derive(Debug, Clone)]
pub struct PaystackClient {
    base_url: String,
    secret_key: String,
    callback_url: Option<String>,
    http: Client,
}

#[derive(Debug, Deserialize)]
struct InitializeResponse {
    status: bool,
    #[serde(default)]
    message: Option<String>,
    data: Option<InitializeData>,
}

#[derive(Debug, Deserialize)]
struct InitializeData {
    authorization_url: String,
    #[serde(default)]
    reference: Option<String>,
}

impl PaystackClient {
    pub fn new(config: &PaystackConfig) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| GatewayError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            secret_key: config.secret_key.clone(),
            callback_url: config.callback_url.clone(),
            http,
        })
    }

    fn new_reference() -> String {
        format!("{REFERENCE_PREFIX}{}", Uuid::new_v4().simple())
    }
}

#[async_trait]
impl PaymentGateway for PaystackClient {
    async fn init_charge(&self, request: ChargeRequest) -> Result<ChargeSession, GatewayError> {
        let email = request
            .email
            .ok_or_else(|| GatewayError::Rejected("customer email is required".to_string()))?;
        let reference = Self::new_reference();

        let mut payload = json!({
            "amount": request.amount.minor_units(),
            "email": email,
            "reference": reference,
            "metadata": request.metadata,
        });
        if let Some(callback_url) = &self.callback_url {
            payload["callback_url"] = Value::String(callback_url.clone());
        }

        let response = self
            .http
            .post(format!("{}{INITIALIZE_PATH}", self.base_url))
            .bearer_auth(&self.secret_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| GatewayError::Request(format!("POST {INITIALIZE_PATH} failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected(format!(
                "POST {INITIALIZE_PATH} returned {status}: {body}"
            )));
        }

        let parsed: InitializeResponse = response.json().await.map_err(|e| {
            GatewayError::InvalidResponse(format!("POST {INITIALIZE_PATH} invalid JSON: {e}"))
        })?;

        let data = match (parsed.status, parsed.data) {
            (true, Some(data)) => data,
            (_, _) => {
                return Err(GatewayError::Rejected(
                    parsed
                        .message
                        .unwrap_or_else(|| "initialize returned status=false".to_string()),
                ))
            }
        };

        // Paystack echoes the reference we sent; trust ours if it is omitted
        let reference = data.reference.unwrap_or(reference);
        info!(reference = %reference, amount = %request.amount, "paystack charge initialized");

        Ok(ChargeSession {
            reference,
            redirect_url: data.authorization_url,
        })
    }

    fn verify_signature(&self, payload: &[u8], signature: &str) -> bool {
        signature_matches(&self.secret_key, payload, signature)
    }
}

/// Hex HMAC-SHA512 of `payload` under `secret`.
pub fn compute_signature(secret: &str, payload: &[u8]) -> String {
    HmacSha512::new_from_slice(secret.as_bytes())
        .map(|mut mac| {
            mac.update(payload);
            hex::encode(mac.finalize().into_bytes())
        })
        .unwrap_or_default()
}

/// Constant-time check of a hex signature header.
pub fn signature_matches(secret: &str, payload: &[u8], signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha512::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}
