// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use custodial_ledger::{
    api::router,
    config::AppConfig,
    engine::KeyHasher,
    key_sweeper::KeySweeper,
    providers::paystack::PaystackClient,
    state::{AppState, AuthConfig},
    storage::LedgerDatabase,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    init_tracing(config.json_logs);

    let db_path = config.database_path();
    let db = Arc::new(
        LedgerDatabase::open_with_cache(&db_path, config.history_cache_capacity)
            .expect("Failed to open ledger database"),
    );
    info!(path = %db_path.display(), "Ledger database opened");

    let gateway = Arc::new(
        PaystackClient::new(&config.paystack).expect("Failed to build Paystack client"),
    );
    let state = AppState::new(
        db.clone(),
        gateway,
        KeyHasher::new(&config.api_key_pepper),
        AuthConfig::hs256(&config.jwt_secret),
    );

    let shutdown = CancellationToken::new();
    let sweeper = KeySweeper::new(db, state.hasher.clone(), config.key_sweep_interval);
    let sweeper_handle = tokio::spawn(sweeper.run(shutdown.clone()));

    let app = router(state);
    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind listener");
    info!(%addr, "Custodial ledger listening (docs at /docs)");

    let server_shutdown = shutdown.clone();
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutdown signal received");
            server_shutdown.cancel();
        })
        .await
    {
        error!(error = %e, "Server error");
    }

    shutdown.cancel();
    let _ = sweeper_handle.await;
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.pretty().init();
    }
}
