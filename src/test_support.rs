// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared fixtures for handler and extractor tests.

use std::sync::Arc;

use crate::engine::KeyHasher;
use crate::providers::fake::FakeGateway;
use crate::state::{AppState, AuthConfig};
use crate::storage::LedgerDatabase;

pub(crate) const TEST_JWT_SECRET: &str = "test-jwt-secret";
pub(crate) const TEST_WEBHOOK_SECRET: &str = "sk_test_webhook";

/// App state backed by a fresh on-disk database and a fake gateway.
pub(crate) fn test_state() -> (AppState, tempfile::TempDir, Arc<FakeGateway>) {
    let dir = tempfile::tempdir().unwrap();
    let db = LedgerDatabase::open(&dir.path().join("ledger.redb")).unwrap();
    let gateway = Arc::new(FakeGateway::new(TEST_WEBHOOK_SECRET));
    let state = AppState::new(
        Arc::new(db),
        gateway.clone(),
        KeyHasher::new("test-pepper"),
        AuthConfig::hs256(TEST_JWT_SECRET),
    );
    (state, dir, gateway)
}
