// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Ledger & Authorization Engine
//!
//! Business operations over [`crate::storage`]. Every operation takes the
//! caller as an explicit [`Principal`] and checks its permission before
//! looking anything up.
//!
//! - [`accounts`]: wallet provisioning, balance, history
//! - [`transfer`]: atomic wallet-to-wallet transfers
//! - [`deposit`]: gateway deposits and webhook reconciliation
//! - [`keys`]: API key issuance, validation, rollover, revocation

pub mod accounts;
pub mod deposit;
pub mod error;
pub mod expiry;
pub mod keys;
pub mod principal;
pub mod transfer;

pub use accounts::Accounts;
pub use deposit::{DepositReconciler, DepositSession, DepositStatus, WebhookOutcome};
pub use error::{ErrorKind, LedgerError, LedgerResult};
pub use keys::{ApiKeyAuthority, ApiKeySummary, IssuedKey, KeyHasher, MAX_ACTIVE_KEYS};
pub use principal::{Permission, PermissionSet, Principal, PrincipalSource};
pub use transfer::{TransferEngine, TransferOutcome};
