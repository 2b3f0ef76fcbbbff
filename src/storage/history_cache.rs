// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! LRU cache for per-wallet transaction history.
//!
//! Caches the newest-first history of recently queried wallets to avoid
//! repeated redb scans for the most common read. Every committed unit of work
//! invalidates the wallets it touched.
//!
//! A reader captures the cache generation *before* opening its snapshot and
//! hands it back on `put`; a fill is dropped if any invalidation happened in
//! between, so a stale snapshot can never overwrite a fresher one.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;

use super::ledger::LedgerEntry;

struct CacheState {
    entries: LruCache<u64, Vec<LedgerEntry>>,
    generation: u64,
}

/// In-process LRU cache for hot wallet histories.
pub struct HistoryCache {
    state: Mutex<CacheState>,
}

impl HistoryCache {
    /// Create a new cache holding at most `capacity` wallets (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            state: Mutex::new(CacheState {
                entries: LruCache::new(capacity),
                generation: 0,
            }),
        }
    }

    /// Current generation; capture before reading from the database.
    pub fn generation(&self) -> u64 {
        self.state.lock().map(|s| s.generation).unwrap_or(u64::MAX)
    }

    /// Cached history for a wallet, if present.
    pub fn get(&self, wallet_id: u64) -> Option<Vec<LedgerEntry>> {
        let mut state = self.state.lock().ok()?;
        state.entries.get(&wallet_id).cloned()
    }

    /// Store a history read under `observed_generation`.
    ///
    /// Ignored when an invalidation happened after the generation was observed.
    pub fn put(&self, wallet_id: u64, entries: Vec<LedgerEntry>, observed_generation: u64) {
        if let Ok(mut state) = self.state.lock() {
            if state.generation == observed_generation {
                state.entries.put(wallet_id, entries);
            }
        }
    }

    /// Drop the cached history of a wallet.
    pub fn invalidate(&self, wallet_id: u64) {
        if let Ok(mut state) = self.state.lock() {
            state.generation = state.generation.wrapping_add(1);
            state.entries.pop(&wallet_id);
        }
    }
}
