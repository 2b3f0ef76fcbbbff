// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Fixed-point money in minor currency units.
//!
//! Balances are stored as `u64` minor units (e.g. kobo). Request amounts are
//! wrapped in [`Amount`], which is always strictly positive and small enough
//! to be negated into a signed ledger amount without overflow. No floating
//! point ever enters balance arithmetic.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::engine::error::{LedgerError, LedgerResult};

/// A strictly positive amount in minor units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Amount(u64);

impl Amount {
    /// Validate a caller-supplied amount.
    ///
    /// Zero and negative values are rejected with `InvalidAmount`.
    pub fn new(minor_units: i64) -> LedgerResult<Self> {
        if minor_units <= 0 {
            return Err(LedgerError::InvalidAmount);
        }
        Ok(Self(minor_units as u64))
    }

    /// Raw value in minor units.
    pub fn minor_units(self) -> u64 {
        self.0
    }

    /// Signed ledger representation of a credit.
    pub fn as_credit(self) -> i64 {
        self.0 as i64
    }

    /// Signed ledger representation of a debit.
    pub fn as_debit(self) -> i64 {
        -(self.0 as i64)
    }
}

impl TryFrom<i64> for Amount {
    type Error = LedgerError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Amount::new(value)
    }
}

impl From<Amount> for i64 {
    fn from(amount: Amount) -> Self {
        amount.as_credit()
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Add `amount` to `balance`, failing with `Overflow` past `u64::MAX`.
pub fn checked_credit(balance: u64, amount: Amount) -> LedgerResult<u64> {
    balance
        .checked_add(amount.minor_units())
        .ok_or(LedgerError::Overflow)
}

/// Subtract `amount` from `balance`, failing with `InsufficientFunds` if the
/// result would be negative.
pub fn checked_debit(balance: u64, amount: Amount) -> LedgerResult<u64> {
    balance
        .checked_sub(amount.minor_units())
        .ok_or(LedgerError::InsufficientFunds)
}
