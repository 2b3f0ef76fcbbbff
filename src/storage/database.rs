// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded ledger database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `wallets`: wallet_id → serialized Wallet
//! - `wallet_numbers`: wallet number → wallet_id
//! - `wallet_owners`: owner_id → wallet_id
//! - `ledger`: entry_id → serialized LedgerEntry
//! - `wallet_ledger_index`: composite key (wallet_id|!entry_id) → entry_id
//! - `reference_index`: composite key (reference|0x00|entry_id) → entry_id
//! - `api_keys`: key_id → serialized StoredApiKey
//! - `key_fingerprints`: composite key (fingerprint|0x00|key_id) → key_id
//! - `owner_keys`: composite key (owner_id|0x00|key_id) → key_id
//! - `sequences`: sequence name → last allocated id
//!
//! ## Units of Work
//!
//! Every mutation runs inside a [`UnitOfWork`], which wraps exactly one redb
//! write transaction. redb admits a single writer at a time, so units of work
//! are serialized against each other; readers see committed snapshots only.
//! A unit of work that is dropped without `commit` is rolled back.

use std::collections::BTreeSet;
use std::path::Path;

use redb::{
    Database, ReadTransaction, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction,
};
use serde::{de::DeserializeOwned, Serialize};

use super::history_cache::HistoryCache;
use crate::engine::error::{LedgerError, LedgerResult};

// =============================================================================
// Table Definitions
// =============================================================================

pub(crate) const WALLETS: TableDefinition<u64, &[u8]> = TableDefinition::new("wallets");

pub(crate) const WALLET_NUMBERS: TableDefinition<&str, u64> =
    TableDefinition::new("wallet_numbers");

pub(crate) const WALLET_OWNERS: TableDefinition<&str, u64> = TableDefinition::new("wallet_owners");

pub(crate) const LEDGER: TableDefinition<u64, &[u8]> = TableDefinition::new("ledger");

/// Key format: `wallet_id_be | !entry_id_be` so a forward scan is newest-first.
pub(crate) const WALLET_LEDGER_INDEX: TableDefinition<&[u8], u64> =
    TableDefinition::new("wallet_ledger_index");

pub(crate) const REFERENCE_INDEX: TableDefinition<&[u8], u64> =
    TableDefinition::new("reference_index");

pub(crate) const API_KEYS: TableDefinition<u64, &[u8]> = TableDefinition::new("api_keys");

pub(crate) const KEY_FINGERPRINTS: TableDefinition<&[u8], u64> =
    TableDefinition::new("key_fingerprints");

pub(crate) const OWNER_KEYS: TableDefinition<&[u8], u64> = TableDefinition::new("owner_keys");

const SEQUENCES: TableDefinition<&str, u64> = TableDefinition::new("sequences");

pub(crate) const WALLET_SEQUENCE: &str = "wallet";
pub(crate) const LEDGER_SEQUENCE: &str = "ledger";
pub(crate) const API_KEY_SEQUENCE: &str = "api_key";

/// Default number of wallets whose history is kept in memory.
pub const DEFAULT_HISTORY_CACHE_CAPACITY: usize = 1024;

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt index: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// Key & Record Helpers
// =============================================================================

/// `prefix | 0x00 | id_be` composite key for string-keyed secondary indexes.
pub(crate) fn tagged_key(prefix: &str, id: u64) -> Vec<u8> {
    let mut key = tagged_prefix(prefix);
    key.extend_from_slice(&id.to_be_bytes());
    key
}

/// Scan prefix matching every [`tagged_key`] built from `prefix`.
pub(crate) fn tagged_prefix(prefix: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + 1 + 8);
    key.extend_from_slice(prefix.as_bytes());
    key.push(0);
    key
}

/// Collect the ids stored under every key starting with `prefix`, in key order.
pub(crate) fn scan_prefix<T>(table: &T, prefix: &[u8]) -> StoreResult<Vec<u64>>
where
    T: ReadableTable<&'static [u8], u64>,
{
    let mut ids = Vec::new();
    for entry in table.range(prefix..)? {
        let (key, value) = entry?;
        if !key.value().starts_with(prefix) {
            break;
        }
        ids.push(value.value());
    }
    Ok(ids)
}

/// Load and deserialize a JSON record by numeric id.
pub(crate) fn load_record<T, R>(table: &R, id: u64) -> StoreResult<Option<T>>
where
    T: DeserializeOwned,
    R: ReadableTable<u64, &'static [u8]>,
{
    match table.get(id)? {
        Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
        None => Ok(None),
    }
}

pub(crate) fn encode_record<T: Serialize>(record: &T) -> StoreResult<Vec<u8>> {
    Ok(serde_json::to_vec(record)?)
}

// =============================================================================
// LedgerDatabase
// =============================================================================

/// Embedded ACID store for wallets, ledger entries and API keys.
pub struct LedgerDatabase {
    db: Database,
    history: HistoryCache,
}

impl LedgerDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        Self::open_with_cache(path, DEFAULT_HISTORY_CACHE_CAPACITY)
    }

    /// Open (or create) the database with a custom history cache capacity.
    pub fn open_with_cache(path: &Path, history_capacity: usize) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(WALLETS)?;
            let _ = write_txn.open_table(WALLET_NUMBERS)?;
            let _ = write_txn.open_table(WALLET_OWNERS)?;
            let _ = write_txn.open_table(LEDGER)?;
            let _ = write_txn.open_table(WALLET_LEDGER_INDEX)?;
            let _ = write_txn.open_table(REFERENCE_INDEX)?;
            let _ = write_txn.open_table(API_KEYS)?;
            let _ = write_txn.open_table(KEY_FINGERPRINTS)?;
            let _ = write_txn.open_table(OWNER_KEYS)?;
            let _ = write_txn.open_table(SEQUENCES)?;
        }
        write_txn.commit()?;

        Ok(Self {
            db,
            history: HistoryCache::new(history_capacity),
        })
    }

    /// Start an atomic unit of work. Blocks while another one is in flight.
    pub fn begin(&self) -> StoreResult<UnitOfWork<'_>> {
        Ok(UnitOfWork {
            txn: self.db.begin_write()?,
            history: &self.history,
            balance_mutations: 0,
            balance_entries: 0,
            touched_wallets: BTreeSet::new(),
        })
    }

    /// Start a read-only snapshot.
    pub fn read(&self) -> StoreResult<ReadTransaction> {
        Ok(self.db.begin_read()?)
    }

    pub(crate) fn history(&self) -> &HistoryCache {
        &self.history
    }
}

// =============================================================================
// UnitOfWork
// =============================================================================

/// One atomic, isolated group of writes.
///
/// Tracks how many wallet balances were changed and how many balance-affecting
/// ledger entries were written; `commit` refuses to persist a unit of work in
/// which the two counts differ.
pub struct UnitOfWork<'db> {
    txn: WriteTransaction,
    history: &'db HistoryCache,
    balance_mutations: usize,
    balance_entries: usize,
    touched_wallets: BTreeSet<u64>,
}

impl<'db> UnitOfWork<'db> {
    pub(crate) fn txn(&self) -> &WriteTransaction {
        &self.txn
    }

    /// Allocate the next id of a named sequence (ids start at 1).
    pub(crate) fn next_id(&self, sequence: &str) -> StoreResult<u64> {
        let mut table = self.txn.open_table(SEQUENCES)?;
        let next = table.get(sequence)?.map(|v| v.value()).unwrap_or(0) + 1;
        table.insert(sequence, next)?;
        Ok(next)
    }

    pub(crate) fn note_balance_mutation(&mut self, wallet_id: u64) {
        self.balance_mutations += 1;
        self.touched_wallets.insert(wallet_id);
    }

    pub(crate) fn note_balance_entry(&mut self, wallet_id: u64) {
        self.balance_entries += 1;
        self.touched_wallets.insert(wallet_id);
    }

    pub(crate) fn note_touched(&mut self, wallet_id: u64) {
        self.touched_wallets.insert(wallet_id);
    }

    /// Persist every write of this unit of work, or none of them.
    pub fn commit(self) -> LedgerResult<()> {
        if self.balance_mutations != self.balance_entries {
            let mutations = self.balance_mutations;
            let entries = self.balance_entries;
            tracing::error!(mutations, entries, "refusing to commit unpaired balance mutation");
            self.txn.abort().map_err(StoreError::from)?;
            return Err(LedgerError::UnpairedMutation { mutations, entries });
        }

        let touched = self.touched_wallets;
        let history = self.history;
        self.txn.commit().map_err(StoreError::from)?;

        for wallet_id in touched {
            history.invalidate(wallet_id);
        }
        Ok(())
    }

    /// Discard every write of this unit of work.
    pub fn abort(self) -> StoreResult<()> {
        self.txn.abort()?;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

/// Scratch database for tests; the directory is removed when dropped.
#[cfg(test)]
pub(crate) fn temp_db() -> (LedgerDatabase, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db = LedgerDatabase::open(&dir.path().join("ledger.redb")).unwrap();
    (db, dir)
}
