// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! External payment gateway integrations.
//!
//! The engine only sees the [`PaymentGateway`] trait: create a charge, and
//! verify that a webhook body was signed by the gateway.

pub mod paystack;

use async_trait::async_trait;

use crate::money::Amount;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway request rejected: {0}")]
    Rejected(String),

    #[error("gateway request failed: {0}")]
    Request(String),

    #[error("gateway response was invalid: {0}")]
    InvalidResponse(String),
}

/// A charge the gateway should collect.
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub amount: Amount,
    /// Customer email, required by most card gateways
    pub email: Option<String>,
    /// Opaque key/value data echoed back on the webhook
    pub metadata: serde_json::Value,
}

/// A created charge: where to send the payer, and how to recognize it later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeSession {
    pub reference: String,
    pub redirect_url: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a charge. Never retried by the caller.
    async fn init_charge(&self, request: ChargeRequest) -> Result<ChargeSession, GatewayError>;

    /// Check a webhook signature against the raw request body.
    fn verify_signature(&self, payload: &[u8], signature: &str) -> bool;
}

#[cfg(test)]
pub(crate) mod fake {
    //! In-process gateway for tests. Signs with the same HMAC as Paystack.

    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::Mutex;

    use super::*;
    use crate::providers::paystack::{compute_signature, signature_matches};

    pub(crate) struct FakeGateway {
        secret: String,
        counter: AtomicU64,
        failing: AtomicBool,
        pub(crate) requests: Mutex<Vec<ChargeRequest>>,
    }

    impl FakeGateway {
        pub(crate) fn new(secret: &str) -> Self {
            Self {
                secret: secret.to_string(),
                counter: AtomicU64::new(0),
                failing: AtomicBool::new(false),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        pub(crate) fn sign(&self, payload: &[u8]) -> String {
            compute_signature(&self.secret, payload)
        }
    }

    #[async_trait]
    impl PaymentGateway for FakeGateway {
        async fn init_charge(&self, request: ChargeRequest) -> Result<ChargeSession, GatewayError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(GatewayError::Request("connection refused".to_string()));
            }
            self.requests.lock().unwrap().push(request);
            let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(ChargeSession {
                reference: format!("ps_{n}"),
                redirect_url: format!("https://checkout.test/ps_{n}"),
            })
        }

        fn verify_signature(&self, payload: &[u8], signature: &str) -> bool {
            signature_matches(&self.secret, payload, signature)
        }
    }
}
