// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Ledger Storage Module
//!
//! Persistent state lives in a single embedded redb file:
//!
//! ```text
//! $DATA_DIR/
//!   ledger.redb     # wallets, ledger entries, API keys, sequences
//! ```
//!
//! ## Consistency Model
//!
//! - All writes go through a [`UnitOfWork`] (one redb write transaction)
//! - redb serializes write transactions, so balance updates never interleave
//! - Readers see committed snapshots only
//! - A unit of work whose balance mutations are not paired with ledger
//!   entries is refused at commit

pub mod api_keys;
pub mod database;
pub mod history_cache;
pub mod ledger;
pub mod wallets;

pub use api_keys::{ApiKeyStore, KeyStatus, NewApiKey, StoredApiKey};
pub use database::{LedgerDatabase, StoreError, StoreResult, UnitOfWork};
pub use history_cache::HistoryCache;
pub use ledger::{Ledger, LedgerEntry, TxStatus, TxType};
pub use wallets::{Wallet, WalletStore};
