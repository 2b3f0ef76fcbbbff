// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Custodial Ledger - Wallet Ledger & Authorization Engine
//!
//! Holds per-user balances in minor currency units, executes wallet-to-wallet
//! transfers, reconciles gateway deposits from signed webhooks and issues
//! permission-scoped API keys for service-to-service callers.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Principal resolution (HS256 user JWT or `x-api-key`)
//! - `engine` - Transfers, deposit reconciliation and API key authority
//! - `providers` - Payment gateway integration (Paystack)
//! - `storage` - Embedded ACID store (redb)
//! - `key_sweeper` - Background expiry of lapsed API keys

pub mod api;
pub mod auth;
pub mod config;
pub mod engine;
pub mod error;
pub mod key_sweeper;
pub mod money;
pub mod providers;
pub mod state;
pub mod storage;

#[cfg(test)]
mod test_support;
