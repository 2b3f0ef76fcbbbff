// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authenticated principals and capabilities.
//!
//! Every engine operation takes the caller as an explicit [`Principal`];
//! nothing in the engine reads an ambient "current user".

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::error::{LedgerError, LedgerResult};

/// A capability that can be granted to an API key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Deposit,
    Transfer,
    Read,
}

impl Permission {
    pub const ALL: [Permission; 3] = [Permission::Deposit, Permission::Transfer, Permission::Read];
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Permission::Deposit => write!(f, "deposit"),
            Permission::Transfer => write!(f, "transfer"),
            Permission::Read => write!(f, "read"),
        }
    }
}

/// A set of permissions, serialized as a plain array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeSet<Permission>);

impl PermissionSet {
    pub fn all() -> Self {
        Self::from_iter(Permission::ALL)
    }

    pub fn contains(&self, permission: Permission) -> bool {
        self.0.contains(&permission)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Permission> + '_ {
        self.0.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<Permission> {
        self.iter().collect()
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Fail with `Forbidden` unless `held` grants `required`.
pub fn authorize(held: &PermissionSet, required: Permission) -> LedgerResult<()> {
    if held.contains(required) {
        Ok(())
    } else {
        Err(LedgerError::Forbidden)
    }
}

/// How the caller authenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrincipalSource {
    /// Interactive user with a bearer token
    User,
    /// Service caller presenting an API key
    ApiKey { key_id: u64 },
}

/// The authenticated caller of an engine operation.
#[derive(Debug, Clone)]
pub struct Principal {
    pub owner_id: String,
    pub source: PrincipalSource,
    pub permissions: PermissionSet,
    pub email: Option<String>,
}

impl Principal {
    /// A user principal; users hold every capability on their own wallet.
    pub fn user(owner_id: impl Into<String>, email: Option<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            source: PrincipalSource::User,
            permissions: PermissionSet::all(),
            email,
        }
    }

    pub fn api_key(owner_id: impl Into<String>, key_id: u64, permissions: PermissionSet) -> Self {
        Self {
            owner_id: owner_id.into(),
            source: PrincipalSource::ApiKey { key_id },
            permissions,
            email: None,
        }
    }

    pub fn is_user(&self) -> bool {
        self.source == PrincipalSource::User
    }

    pub fn require(&self, permission: Permission) -> LedgerResult<()> {
        authorize(&self.permissions, permission)
    }

    /// Key management is reserved for users.
    pub fn require_user(&self) -> LedgerResult<()> {
        if self.is_user() {
            Ok(())
        } else {
            Err(LedgerError::Forbidden)
        }
    }
}
