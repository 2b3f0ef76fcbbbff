// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet-to-wallet transfers.
//!
//! A transfer is one unit of work: debit, credit and both ledger entries
//! commit together or not at all. Wallets are loaded in ascending id order.

use serde::Serialize;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use super::error::{LedgerError, LedgerResult};
use super::principal::{Permission, Principal};
use crate::money::Amount;
use crate::storage::{LedgerDatabase, TxStatus, TxType, WalletStore};

const REFERENCE_PREFIX: &str = "tr_";

/// Result of a committed transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct TransferOutcome {
    /// Reference shared by both ledger entries
    pub reference: String,
    pub amount: u64,
    pub recipient_number: String,
    /// Sender balance after the debit
    pub balance: u64,
}

pub struct TransferEngine<'a> {
    db: &'a LedgerDatabase,
}

impl<'a> TransferEngine<'a> {
    pub fn new(db: &'a LedgerDatabase) -> Self {
        Self { db }
    }

    /// Move `amount` minor units from the caller's wallet to `recipient_number`.
    pub fn transfer(
        &self,
        principal: &Principal,
        recipient_number: &str,
        amount: i64,
    ) -> LedgerResult<TransferOutcome> {
        principal.require(Permission::Transfer)?;
        let amount = Amount::new(amount)?;
        let sender = WalletStore::new(self.db).find_by_owner(&principal.owner_id)?;
        self.transfer_between(sender.id, recipient_number, amount)
    }

    pub fn transfer_between(
        &self,
        sender_wallet_id: u64,
        recipient_number: &str,
        amount: Amount,
    ) -> LedgerResult<TransferOutcome> {
        let mut uow = self.db.begin()?;

        let recipient_wallet_id = uow
            .wallet_id_for_number(recipient_number)?
            .ok_or(LedgerError::RecipientNotFound)?;
        if recipient_wallet_id == sender_wallet_id {
            return Err(LedgerError::InvalidTransfer);
        }

        let (first, second) = if sender_wallet_id < recipient_wallet_id {
            (sender_wallet_id, recipient_wallet_id)
        } else {
            (recipient_wallet_id, sender_wallet_id)
        };
        let first = uow.wallet(first)?;
        let second = uow.wallet(second)?;
        let recipient = if first.id == recipient_wallet_id { first } else { second };

        let balance = uow.debit(sender_wallet_id, amount)?;
        uow.credit(recipient_wallet_id, amount)?;

        let reference = format!("{REFERENCE_PREFIX}{}", Uuid::new_v4().simple());
        uow.record(
            sender_wallet_id,
            TxType::TransferOut,
            amount.as_debit(),
            &reference,
            TxStatus::Success,
        )?;
        uow.record(
            recipient_wallet_id,
            TxType::TransferIn,
            amount.as_credit(),
            &reference,
            TxStatus::Success,
        )?;
        uow.commit()?;

        info!(
            reference = %reference,
            from_wallet = sender_wallet_id,
            to_wallet = recipient_wallet_id,
            amount = %amount,
            "transfer committed"
        );

        Ok(TransferOutcome {
            reference,
            amount: amount.minor_units(),
            recipient_number: recipient.number,
            balance,
        })
    }
}
