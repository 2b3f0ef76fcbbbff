// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ledger error taxonomy.

use crate::storage::StoreError;

/// Coarse classification used by callers to decide how to report an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input, rejected before any state access.
    Validation,
    /// Credential missing, unknown or expired.
    Unauthorized,
    /// Authenticated but lacking the required capability.
    Forbidden,
    /// Referenced resource does not exist (or is not visible to the caller).
    NotFound,
    /// Operation rejected; state unchanged.
    Conflict,
    /// Upstream dependency failed.
    Upstream,
    /// Storage or invariant failure.
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    // Validation
    #[error("amount must be a positive integer in minor units")]
    InvalidAmount,

    #[error("invalid expiry format: {0}")]
    InvalidExpiry(String),

    #[error("at least one permission is required")]
    EmptyPermissions,

    #[error("key name must not be empty")]
    InvalidKeyName,

    // Authorization
    #[error("insufficient permissions")]
    Forbidden,

    #[error("invalid API key")]
    InvalidKey,

    #[error("API key has expired")]
    KeyExpired,

    // Not found
    #[error("wallet not found")]
    WalletNotFound,

    #[error("recipient wallet not found")]
    RecipientNotFound,

    #[error("transaction not found")]
    TransactionNotFound,

    #[error("API key not found")]
    KeyNotFound,

    // Conflict
    #[error("insufficient funds")]
    InsufficientFunds,

    #[error("balance overflow")]
    Overflow,

    #[error("maximum of 5 active API keys reached")]
    TooManyActiveKeys,

    #[error("API key has not expired")]
    KeyNotExpired,

    #[error("API key has already been rolled over")]
    KeyAlreadyRolledOver,

    #[error("cannot transfer to the same wallet")]
    InvalidTransfer,

    #[error("reference {0} already exists")]
    DuplicateReference(String),

    // Dependency
    #[error("payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("invalid webhook signature")]
    InvalidSignature,

    // Internal
    #[error("secure random source unavailable")]
    RandomUnavailable,

    #[error("unit of work mutated {mutations} balance(s) but wrote {entries} ledger entr(ies)")]
    UnpairedMutation { mutations: usize, entries: usize },

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::InvalidAmount
            | LedgerError::InvalidExpiry(_)
            | LedgerError::EmptyPermissions
            | LedgerError::InvalidKeyName
            | LedgerError::InvalidSignature => ErrorKind::Validation,
            LedgerError::InvalidKey | LedgerError::KeyExpired => ErrorKind::Unauthorized,
            LedgerError::Forbidden => ErrorKind::Forbidden,
            LedgerError::WalletNotFound
            | LedgerError::RecipientNotFound
            | LedgerError::TransactionNotFound
            | LedgerError::KeyNotFound => ErrorKind::NotFound,
            LedgerError::InsufficientFunds
            | LedgerError::Overflow
            | LedgerError::TooManyActiveKeys
            | LedgerError::KeyNotExpired
            | LedgerError::KeyAlreadyRolledOver
            | LedgerError::InvalidTransfer
            | LedgerError::DuplicateReference(_) => ErrorKind::Conflict,
            LedgerError::GatewayUnavailable(_) => ErrorKind::Upstream,
            LedgerError::RandomUnavailable
            | LedgerError::UnpairedMutation { .. }
            | LedgerError::Storage(_) => ErrorKind::Internal,
        }
    }
}

impl From<redb::TableError> for LedgerError {
    fn from(err: redb::TableError) -> Self {
        LedgerError::Storage(StoreError::from(err))
    }
}

impl From<redb::StorageError> for LedgerError {
    fn from(err: redb::StorageError) -> Self {
        LedgerError::Storage(StoreError::from(err))
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_is_stable() {
        assert_eq!(LedgerError::InvalidAmount.kind(), ErrorKind::Validation);
        assert_eq!(LedgerError::KeyExpired.kind(), ErrorKind::Unauthorized);
        assert_eq!(LedgerError::Forbidden.kind(), ErrorKind::Forbidden);
        assert_eq!(LedgerError::RecipientNotFound.kind(), ErrorKind::NotFound);
        assert_eq!(LedgerError::TooManyActiveKeys.kind(), ErrorKind::Conflict);
        assert_eq!(
            LedgerError::GatewayUnavailable("timeout".into()).kind(),
            ErrorKind::Upstream
        );
    }

    #[test]
    fn redb_errors_are_internal_storage_errors() {
        let err: LedgerError = redb::StorageError::Corrupted("bad page".into()).into();
        assert!(matches!(err, LedgerError::Storage(StoreError::RedbStorage(_))));
        assert_eq!(err.kind(), ErrorKind::Internal);

        let err: LedgerError = redb::TableError::TableDoesNotExist("wallets".into()).into();
        assert!(matches!(err, LedgerError::Storage(StoreError::RedbTable(_))));
        assert_eq!(err.kind(), ErrorKind::Internal);
    }
}
