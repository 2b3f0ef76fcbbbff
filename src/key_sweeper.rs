// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Key Sweeper
//!
//! Background task that periodically marks lapsed API keys as `expired`.
//!
//! Validation already rejects a key once its `expires_at` has passed, so the
//! sweep only keeps the stored status honest for listings and rollover.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken` for graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::engine::{ApiKeyAuthority, KeyHasher};
use crate::storage::LedgerDatabase;

pub struct KeySweeper {
    db: Arc<LedgerDatabase>,
    hasher: Arc<KeyHasher>,
    interval: Duration,
}

impl KeySweeper {
    pub fn new(db: Arc<LedgerDatabase>, hasher: Arc<KeyHasher>, interval: Duration) -> Self {
        Self {
            db,
            hasher,
            interval,
        }
    }

    /// Run the sweep loop until the cancellation token is triggered.
    ///
    /// ```rust,ignore
    /// tokio::spawn(sweeper.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "API key sweeper starting");

        loop {
            if shutdown.is_cancelled() {
                info!("API key sweeper shutting down");
                return;
            }

            self.sweep_step();

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => {
                    info!("API key sweeper shutting down");
                    return;
                }
            }
        }
    }

    fn sweep_step(&self) -> usize {
        match ApiKeyAuthority::new(&self.db, &self.hasher).sweep_expired(Utc::now()) {
            Ok(0) => 0,
            Ok(swept) => {
                info!(swept, "API key sweeper: marked keys expired");
                swept
            }
            Err(e) => {
                warn!(error = %e, "API key sweeper: sweep failed");
                0
            }
        }
    }
}
