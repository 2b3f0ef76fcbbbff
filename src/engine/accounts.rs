// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet provisioning and read-only account queries.

use super::error::LedgerResult;
use super::principal::{Permission, Principal};
use crate::storage::{Ledger, LedgerDatabase, LedgerEntry, Wallet, WalletStore};

pub struct Accounts<'a> {
    db: &'a LedgerDatabase,
}

impl<'a> Accounts<'a> {
    pub fn new(db: &'a LedgerDatabase) -> Self {
        Self { db }
    }

    /// Open the caller's wallet (idempotent). Users only.
    pub fn open_wallet(&self, principal: &Principal) -> LedgerResult<Wallet> {
        principal.require_user()?;
        let mut uow = self.db.begin()?;
        let wallet = uow.open_wallet(&principal.owner_id, principal.email.as_deref())?;
        uow.commit()?;
        Ok(wallet)
    }

    /// The caller's wallet.
    pub fn wallet(&self, principal: &Principal) -> LedgerResult<Wallet> {
        principal.require(Permission::Read)?;
        WalletStore::new(self.db).find_by_owner(&principal.owner_id)
    }

    pub fn balance(&self, principal: &Principal) -> LedgerResult<u64> {
        Ok(self.wallet(principal)?.balance)
    }

    /// The caller's transactions, most recent first.
    pub fn history(&self, principal: &Principal) -> LedgerResult<Vec<LedgerEntry>> {
        let wallet = self.wallet(principal)?;
        Ledger::new(self.db).list_for_wallet(wallet.id)
    }
}
