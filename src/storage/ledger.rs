// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Append-only transaction ledger.
//!
//! Every balance-affecting event is recorded here. Entries are never deleted;
//! an entry's status may move from `initiated` to a terminal state exactly once
//! and is immutable afterwards. The ledger is the source of truth for whether a
//! reference has already been settled.

use chrono::{DateTime, Utc};
use redb::ReadableTable;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::database::{
    encode_record, load_record, scan_prefix, tagged_key, tagged_prefix, LedgerDatabase,
    StoreResult, UnitOfWork, LEDGER, LEDGER_SEQUENCE, REFERENCE_INDEX, WALLET_LEDGER_INDEX,
};
use crate::engine::error::{LedgerError, LedgerResult};

/// Kind of balance-affecting event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TxType {
    /// External funds arriving through the payment gateway
    Deposit,
    /// Sender side of an internal transfer (negative amount)
    TransferOut,
    /// Recipient side of an internal transfer (positive amount)
    TransferIn,
}

impl TxType {
    fn is_transfer(self) -> bool {
        matches!(self, TxType::TransferOut | TxType::TransferIn)
    }
}

/// Ledger entry status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    /// Awaiting gateway confirmation
    #[serde(alias = "pending")]
    Initiated,
    /// Settled; the balance change has been applied
    Success,
    /// Terminally failed; no balance change
    Failed,
}

impl TxStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, TxStatus::Initiated)
    }
}

impl std::fmt::Display for TxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TxStatus::Initiated => write!(f, "initiated"),
            TxStatus::Success => write!(f, "success"),
            TxStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Stored ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LedgerEntry {
    /// Monotonic entry id (allocation order equals commit order)
    pub id: u64,
    /// Wallet whose balance this entry describes
    pub wallet_id: u64,
    /// Event kind
    #[serde(rename = "type")]
    pub tx_type: TxType,
    /// Signed amount in minor units (negative for transfer_out)
    pub amount: i64,
    /// Current status
    pub status: TxStatus,
    /// Logical event reference, shared by both sides of a transfer
    pub reference: String,
    /// When the entry was recorded
    pub created_at: DateTime<Utc>,
    /// When the status last changed
    pub updated_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn new(
        id: u64,
        wallet_id: u64,
        tx_type: TxType,
        amount: i64,
        reference: String,
        status: TxStatus,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            wallet_id,
            tx_type,
            amount,
            status,
            reference,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Build the wallet history key: `wallet_id_be | !entry_id_be`.
fn wallet_index_key(wallet_id: u64, entry_id: u64) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&wallet_id.to_be_bytes());
    key[8..].copy_from_slice(&(!entry_id).to_be_bytes());
    key
}

/// Load every entry filed under `reference`, oldest first.
fn collect_reference<I, L>(index: &I, ledger: &L, reference: &str) -> StoreResult<Vec<LedgerEntry>>
where
    I: ReadableTable<&'static [u8], u64>,
    L: ReadableTable<u64, &'static [u8]>,
{
    let mut entries = Vec::new();
    for id in scan_prefix(index, &tagged_prefix(reference))? {
        if let Some(entry) = load_record::<LedgerEntry, _>(ledger, id)? {
            // Guard against prefix collisions from references containing NUL
            if entry.reference == reference {
                entries.push(entry);
            }
        }
    }
    Ok(entries)
}

// =============================================================================
// Write side
// =============================================================================

impl UnitOfWork<'_> {
    /// Append a ledger entry.
    ///
    /// An entry recorded with status `success` counts as the pairing record of
    /// one balance mutation in this unit of work.
    pub fn record(
        &mut self,
        wallet_id: u64,
        tx_type: TxType,
        amount: i64,
        reference: &str,
        status: TxStatus,
    ) -> LedgerResult<LedgerEntry> {
        let existing = self.entries_for_reference(reference)?;
        let clash = existing.iter().any(|entry| {
            entry.wallet_id == wallet_id || !(entry.tx_type.is_transfer() && tx_type.is_transfer())
        });
        if clash {
            return Err(LedgerError::DuplicateReference(reference.to_string()));
        }

        let id = self.next_id(LEDGER_SEQUENCE)?;
        let entry = LedgerEntry::new(id, wallet_id, tx_type, amount, reference.to_string(), status);
        let json = encode_record(&entry)?;
        {
            let mut ledger = self.txn().open_table(LEDGER)?;
            ledger.insert(id, json.as_slice())?;

            let mut by_wallet = self.txn().open_table(WALLET_LEDGER_INDEX)?;
            by_wallet.insert(wallet_index_key(wallet_id, id).as_slice(), id)?;

            let mut by_reference = self.txn().open_table(REFERENCE_INDEX)?;
            by_reference.insert(tagged_key(reference, id).as_slice(), id)?;
        }

        if status == TxStatus::Success {
            self.note_balance_entry(wallet_id);
        } else {
            self.note_touched(wallet_id);
        }
        Ok(entry)
    }

    /// Move an `initiated` entry to a terminal status.
    ///
    /// Returns `None` without writing anything if the entry is already terminal.
    /// Settling to `success` counts as the pairing record of one balance
    /// mutation; `settled_amount` replaces the recorded amount when given.
    pub fn settle(
        &mut self,
        entry_id: u64,
        outcome: TxStatus,
        settled_amount: Option<i64>,
    ) -> LedgerResult<Option<LedgerEntry>> {
        let mut entry = {
            let ledger = self.txn().open_table(LEDGER)?;
            load_record::<LedgerEntry, _>(&ledger, entry_id)?
        }
        .ok_or(LedgerError::TransactionNotFound)?;

        if entry.status.is_terminal() || !outcome.is_terminal() {
            return Ok(None);
        }

        entry.status = outcome;
        if let Some(amount) = settled_amount {
            entry.amount = amount;
        }
        entry.updated_at = Utc::now();

        let json = encode_record(&entry)?;
        {
            let mut ledger = self.txn().open_table(LEDGER)?;
            ledger.insert(entry_id, json.as_slice())?;
        }

        if outcome == TxStatus::Success {
            self.note_balance_entry(entry.wallet_id);
        } else {
            self.note_touched(entry.wallet_id);
        }
        Ok(Some(entry))
    }

    /// Entries filed under `reference`, including writes of this unit of work.
    pub fn entries_for_reference(&self, reference: &str) -> LedgerResult<Vec<LedgerEntry>> {
        let index = self.txn().open_table(REFERENCE_INDEX)?;
        let ledger = self.txn().open_table(LEDGER)?;
        Ok(collect_reference(&index, &ledger, reference)?)
    }
}

// =============================================================================
// Read side
// =============================================================================

/// Read access to committed ledger entries.
pub struct Ledger<'a> {
    db: &'a LedgerDatabase,
}

impl<'a> Ledger<'a> {
    pub fn new(db: &'a LedgerDatabase) -> Self {
        Self { db }
    }

    /// All entries of a wallet, most recent first.
    pub fn list_for_wallet(&self, wallet_id: u64) -> LedgerResult<Vec<LedgerEntry>> {
        let cache = self.db.history();
        if let Some(cached) = cache.get(wallet_id) {
            return Ok(cached);
        }

        let generation = cache.generation();
        let read_txn = self.db.read()?;
        let index = read_txn.open_table(WALLET_LEDGER_INDEX)?;
        let ledger = read_txn.open_table(LEDGER)?;

        let mut entries = Vec::new();
        for id in scan_prefix(&index, &wallet_id.to_be_bytes())? {
            match load_record::<LedgerEntry, _>(&ledger, id)? {
                Some(entry) => entries.push(entry),
                None => tracing::warn!(wallet_id, entry_id = id, "dangling wallet ledger index"),
            }
        }

        cache.put(wallet_id, entries.clone(), generation);
        Ok(entries)
    }

    /// The first entry recorded under `reference`, if any.
    pub fn find_by_reference(&self, reference: &str) -> LedgerResult<Option<LedgerEntry>> {
        Ok(self.entries_for_reference(reference)?.into_iter().next())
    }

    /// Every entry recorded under `reference` (two for a transfer), oldest first.
    pub fn entries_for_reference(&self, reference: &str) -> LedgerResult<Vec<LedgerEntry>> {
        let read_txn = self.db.read()?;
        let index = read_txn.open_table(REFERENCE_INDEX)?;
        let ledger = read_txn.open_table(LEDGER)?;
        Ok(collect_reference(&index, &ledger, reference)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::temp_db;

    #[test]
    fn record_and_find_by_reference() {
        let (db, _dir) = temp_db();

        let mut uow = db.begin().unwrap();
        uow.record(1, TxType::Deposit, 5000, "ps_1", TxStatus::Initiated)
            .unwrap();
        uow.commit().unwrap();

        let ledger = Ledger::new(&db);
        let found = ledger.find_by_reference("ps_1").unwrap().unwrap();
        assert_eq!(found.amount, 5000);
        assert_eq!(found.status, TxStatus::Initiated);
        assert!(ledger.find_by_reference("ps_2").unwrap().is_none());
    }

    #[test]
    fn list_for_wallet_is_newest_first() {
        let (db, _dir) = temp_db();

        for i in 0..3 {
            let mut uow = db.begin().unwrap();
            uow.record(7, TxType::Deposit, 100 + i, &format!("ps_{i}"), TxStatus::Initiated)
                .unwrap();
            uow.commit().unwrap();
        }

        let ledger = Ledger::new(&db);
        let history = ledger.list_for_wallet(7).unwrap();
        let refs: Vec<&str> = history.iter().map(|e| e.reference.as_str()).collect();
        assert_eq!(refs, vec!["ps_2", "ps_1", "ps_0"]);
        assert!(ledger.list_for_wallet(8).unwrap().is_empty());
    }

    #[test]
    fn cached_history_is_invalidated_by_commit() {
        let (db, _dir) = temp_db();
        let ledger = Ledger::new(&db);

        assert!(ledger.list_for_wallet(3).unwrap().is_empty());

        let mut uow = db.begin().unwrap();
        uow.record(3, TxType::Deposit, 10, "ps_x", TxStatus::Initiated)
            .unwrap();
        uow.commit().unwrap();

        assert_eq!(ledger.list_for_wallet(3).unwrap().len(), 1);
    }

    #[test]
    fn duplicate_deposit_reference_is_rejected() {
        let (db, _dir) = temp_db();

        let mut uow = db.begin().unwrap();
        uow.record(1, TxType::Deposit, 10, "ps_dup", TxStatus::Initiated)
            .unwrap();
        let err = uow
            .record(2, TxType::Deposit, 10, "ps_dup", TxStatus::Initiated)
            .unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateReference(_)));
    }

    #[test]
    fn transfer_sides_share_a_reference() {
        let (db, _dir) = temp_db();

        let mut uow = db.begin().unwrap();
        uow.record(1, TxType::TransferOut, -30, "tr_1", TxStatus::Initiated)
            .unwrap();
        uow.record(2, TxType::TransferIn, 30, "tr_1", TxStatus::Initiated)
            .unwrap();
        assert!(matches!(
            uow.record(2, TxType::TransferIn, 30, "tr_1", TxStatus::Initiated),
            Err(LedgerError::DuplicateReference(_))
        ));
        uow.commit().unwrap();

        let entries = Ledger::new(&db).entries_for_reference("tr_1").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].amount, -entries[1].amount);
    }

    #[test]
    fn settle_is_one_shot() {
        let (db, _dir) = temp_db();

        let mut uow = db.begin().unwrap();
        let entry = uow
            .record(1, TxType::Deposit, 10, "ps_once", TxStatus::Initiated)
            .unwrap();
        let failed = uow.settle(entry.id, TxStatus::Failed, None).unwrap().unwrap();
        assert_eq!(failed.status, TxStatus::Failed);
        assert!(uow.settle(entry.id, TxStatus::Success, None).unwrap().is_none());
        uow.commit().unwrap();

        let stored = Ledger::new(&db).find_by_reference("ps_once").unwrap().unwrap();
        assert_eq!(stored.status, TxStatus::Failed);
    }

    #[test]
    fn status_accepts_pending_alias() {
        let status: TxStatus = serde_json::from_str("\"pending\"").unwrap();
        assert_eq!(status, TxStatus::Initiated);
        assert_eq!(TxStatus::Initiated.to_string(), "initiated");
    }
}
