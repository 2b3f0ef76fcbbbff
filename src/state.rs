// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use jsonwebtoken::DecodingKey;

use crate::engine::{Accounts, ApiKeyAuthority, DepositReconciler, KeyHasher, TransferEngine};
use crate::providers::PaymentGateway;
use crate::storage::LedgerDatabase;

/// Bearer token verification settings.
#[derive(Clone)]
pub struct AuthConfig {
    pub decoding_key: DecodingKey,
}

impl AuthConfig {
    /// HS256 tokens signed with a shared secret.
    pub fn hs256(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<LedgerDatabase>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub hasher: Arc<KeyHasher>,
    pub auth_config: Arc<AuthConfig>,
}

impl AppState {
    pub fn new(
        db: Arc<LedgerDatabase>,
        gateway: Arc<dyn PaymentGateway>,
        hasher: KeyHasher,
        auth_config: AuthConfig,
    ) -> Self {
        Self {
            db,
            gateway,
            hasher: Arc::new(hasher),
            auth_config: Arc::new(auth_config),
        }
    }

    pub fn accounts(&self) -> Accounts<'_> {
        Accounts::new(&self.db)
    }

    pub fn transfers(&self) -> TransferEngine<'_> {
        TransferEngine::new(&self.db)
    }

    pub fn deposits(&self) -> DepositReconciler<'_> {
        DepositReconciler::new(&self.db, self.gateway.as_ref())
    }

    pub fn keys(&self) -> ApiKeyAuthority<'_> {
        ApiKeyAuthority::new(&self.db, &self.hasher)
    }
}
