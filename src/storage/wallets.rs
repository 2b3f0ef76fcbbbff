// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet records and balance state.
//!
//! Balances change only through [`UnitOfWork::credit`] and
//! [`UnitOfWork::debit`]; each call is a read-modify-write inside the single
//! redb write transaction, so concurrent units of work on the same wallet are
//! serialized and a debit can never pass the zero floor.

use chrono::{DateTime, Utc};
use redb::ReadableTable;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::database::{
    encode_record, load_record, LedgerDatabase, StoreError, UnitOfWork, WALLETS, WALLET_NUMBERS,
    WALLET_OWNERS, WALLET_SEQUENCE,
};
use crate::engine::error::{LedgerError, LedgerResult};
use crate::money::{checked_credit, checked_debit, Amount};

/// Length of the externally addressable wallet number.
pub const WALLET_NUMBER_LEN: usize = 12;

/// Stored wallet record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Wallet {
    /// Internal wallet id; also the global lock order for transfers
    pub id: u64,
    /// Owning user (exactly one wallet per user)
    pub owner_id: String,
    /// Externally addressable wallet number
    pub number: String,
    /// Balance in minor units
    pub balance: u64,
    /// Contact email handed to the payment gateway
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// When the wallet was opened
    pub created_at: DateTime<Utc>,
    /// Last balance change
    pub updated_at: DateTime<Utc>,
}

/// Wallet numbers are matched case-insensitively.
fn normalize_number(number: &str) -> String {
    number.trim().to_ascii_uppercase()
}

fn generate_wallet_number() -> String {
    let mut number = Uuid::new_v4().simple().to_string();
    number.truncate(WALLET_NUMBER_LEN);
    number.make_ascii_uppercase();
    number
}

// =============================================================================
// Write side
// =============================================================================

impl UnitOfWork<'_> {
    /// Load a wallet inside this unit of work.
    pub fn wallet(&self, wallet_id: u64) -> LedgerResult<Wallet> {
        let table = self.txn().open_table(WALLETS)?;
        load_record::<Wallet, _>(&table, wallet_id)?.ok_or(LedgerError::WalletNotFound)
    }

    /// Resolve a wallet id by owner inside this unit of work.
    pub fn wallet_id_for_owner(&self, owner_id: &str) -> LedgerResult<Option<u64>> {
        let owners = self.txn().open_table(WALLET_OWNERS)?;
        let id = owners.get(owner_id)?.map(|v| v.value());
        Ok(id)
    }

    /// Resolve a wallet id by number inside this unit of work.
    pub fn wallet_id_for_number(&self, number: &str) -> LedgerResult<Option<u64>> {
        let number = normalize_number(number);
        let numbers = self.txn().open_table(WALLET_NUMBERS)?;
        let id = numbers.get(number.as_str())?.map(|v| v.value());
        Ok(id)
    }

    fn store_wallet(&self, wallet: &Wallet) -> LedgerResult<()> {
        let json = encode_record(wallet)?;
        let mut table = self.txn().open_table(WALLETS)?;
        table.insert(wallet.id, json.as_slice())?;
        Ok(())
    }

    /// Open the wallet of `owner_id`, or return the existing one.
    ///
    /// An existing wallet without a contact email adopts `email`.
    pub fn open_wallet(&mut self, owner_id: &str, email: Option<&str>) -> LedgerResult<Wallet> {
        if let Some(id) = self.wallet_id_for_owner(owner_id)? {
            let mut wallet = self.wallet(id)?;
            if wallet.email.is_none() && email.is_some() {
                wallet.email = email.map(str::to_string);
                self.store_wallet(&wallet)?;
            }
            return Ok(wallet);
        }

        let number = loop {
            let candidate = generate_wallet_number();
            if self.wallet_id_for_number(&candidate)?.is_none() {
                break candidate;
            }
            tracing::debug!("wallet number collision, regenerating");
        };

        let id = self.next_id(WALLET_SEQUENCE)?;
        let now = Utc::now();
        let wallet = Wallet {
            id,
            owner_id: owner_id.to_string(),
            number,
            balance: 0,
            email: email.map(str::to_string),
            created_at: now,
            updated_at: now,
        };
        self.store_wallet(&wallet)?;
        {
            let mut owners = self.txn().open_table(WALLET_OWNERS)?;
            owners.insert(owner_id, id)?;
            let mut numbers = self.txn().open_table(WALLET_NUMBERS)?;
            numbers.insert(wallet.number.as_str(), id)?;
        }
        self.note_touched(id);

        tracing::info!(wallet_id = id, number = %wallet.number, "wallet opened");
        Ok(wallet)
    }

    /// Add `amount` to a wallet balance. Returns the new balance.
    pub fn credit(&mut self, wallet_id: u64, amount: Amount) -> LedgerResult<u64> {
        let mut wallet = self.wallet(wallet_id)?;
        wallet.balance = checked_credit(wallet.balance, amount)?;
        wallet.updated_at = Utc::now();
        self.store_wallet(&wallet)?;
        self.note_balance_mutation(wallet_id);
        Ok(wallet.balance)
    }

    /// Subtract `amount` from a wallet balance. Returns the new balance.
    pub fn debit(&mut self, wallet_id: u64, amount: Amount) -> LedgerResult<u64> {
        let mut wallet = self.wallet(wallet_id)?;
        wallet.balance = checked_debit(wallet.balance, amount)?;
        wallet.updated_at = Utc::now();
        self.store_wallet(&wallet)?;
        self.note_balance_mutation(wallet_id);
        Ok(wallet.balance)
    }
}

// =============================================================================
// Read side
// =============================================================================

/// Read access to committed wallet state.
pub struct WalletStore<'a> {
    db: &'a LedgerDatabase,
}

impl<'a> WalletStore<'a> {
    pub fn new(db: &'a LedgerDatabase) -> Self {
        Self { db }
    }

    pub fn get(&self, wallet_id: u64) -> LedgerResult<Wallet> {
        let read_txn = self.db.read()?;
        let table = read_txn.open_table(WALLETS)?;
        load_record::<Wallet, _>(&table, wallet_id)?.ok_or(LedgerError::WalletNotFound)
    }

    pub fn get_balance(&self, wallet_id: u64) -> LedgerResult<u64> {
        Ok(self.get(wallet_id)?.balance)
    }

    /// The wallet owned by `owner_id`.
    pub fn find_by_owner(&self, owner_id: &str) -> LedgerResult<Wallet> {
        let read_txn = self.db.read()?;
        let owners = read_txn.open_table(WALLET_OWNERS)?;
        let id = owners
            .get(owner_id)?
            .map(|v| v.value())
            .ok_or(LedgerError::WalletNotFound)?;
        let table = read_txn.open_table(WALLETS)?;
        load_record::<Wallet, _>(&table, id)?.ok_or_else(|| {
            StoreError::Corrupt(format!("owner index points at missing wallet {id}")).into()
        })
    }

    /// The wallet addressed by `number`.
    pub fn find_by_number(&self, number: &str) -> LedgerResult<Wallet> {
        let number = normalize_number(number);
        let read_txn = self.db.read()?;
        let numbers = read_txn.open_table(WALLET_NUMBERS)?;
        let id = numbers
            .get(number.as_str())?
            .map(|v| v.value())
            .ok_or(LedgerError::WalletNotFound)?;
        let table = read_txn.open_table(WALLETS)?;
        load_record::<Wallet, _>(&table, id)?.ok_or_else(|| {
            StoreError::Corrupt(format!("number index points at missing wallet {id}")).into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::temp_db;
    use crate::storage::ledger::{TxStatus, TxType};

    fn amount(v: i64) -> Amount {
        Amount::new(v).unwrap()
    }

    #[test]
    fn open_wallet_is_idempotent_per_owner() {
        let (db, _dir) = temp_db();

        let mut uow = db.begin().unwrap();
        let first = uow.open_wallet("user-1", None).unwrap();
        let again = uow.open_wallet("user-1", None).unwrap();
        let other = uow.open_wallet("user-2", Some("b@example.com")).unwrap();
        uow.commit().unwrap();

        assert_eq!(first, again);
        assert_ne!(first.number, other.number);
        assert_eq!(first.number.len(), WALLET_NUMBER_LEN);
        assert!(first
            .number
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));

        let store = WalletStore::new(&db);
        assert_eq!(store.find_by_owner("user-1").unwrap().id, first.id);
        assert_eq!(store.find_by_number(&other.number).unwrap().id, other.id);
        assert_eq!(store.get_balance(first.id).unwrap(), 0);
    }

    #[test]
    fn unknown_wallets_are_not_found() {
        let (db, _dir) = temp_db();
        let store = WalletStore::new(&db);
        assert!(matches!(
            store.find_by_number("DEADBEEF0000"),
            Err(LedgerError::WalletNotFound)
        ));
        assert!(matches!(
            store.find_by_owner("nobody"),
            Err(LedgerError::WalletNotFound)
        ));
        assert!(matches!(store.get(42), Err(LedgerError::WalletNotFound)));
    }

    #[test]
    fn credit_and_debit_paired_with_entries() {
        let (db, _dir) = temp_db();

        let mut uow = db.begin().unwrap();
        let wallet = uow.open_wallet("user-1", None).unwrap();
        assert_eq!(uow.credit(wallet.id, amount(500)).unwrap(), 500);
        uow.record(wallet.id, TxType::Deposit, 500, "ps_a", TxStatus::Success)
            .unwrap();
        uow.commit().unwrap();

        let mut uow = db.begin().unwrap();
        let err = uow.debit(wallet.id, amount(501)).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds));
        uow.abort().unwrap();

        assert_eq!(WalletStore::new(&db).get_balance(wallet.id).unwrap(), 500);
    }

    #[test]
    fn unpaired_credit_is_rolled_back() {
        let (db, _dir) = temp_db();

        let mut uow = db.begin().unwrap();
        let wallet = uow.open_wallet("user-1", None).unwrap();
        uow.commit().unwrap();

        let mut uow = db.begin().unwrap();
        uow.credit(wallet.id, amount(100)).unwrap();
        assert!(matches!(
            uow.commit(),
            Err(LedgerError::UnpairedMutation { .. })
        ));

        assert_eq!(WalletStore::new(&db).get_balance(wallet.id).unwrap(), 0);
    }
}
