// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! API key records.
//!
//! Only the keyed hash of a secret is stored. Keys are located by their
//! fingerprint, which is derived from the secret but reveals nothing usable
//! for authentication.

use chrono::{DateTime, Utc};
use redb::ReadableTable;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::database::{
    encode_record, load_record, scan_prefix, tagged_key, tagged_prefix, LedgerDatabase,
    StoreError, StoreResult, UnitOfWork, API_KEYS, API_KEY_SEQUENCE, KEY_FINGERPRINTS, OWNER_KEYS,
};
use crate::engine::error::LedgerResult;
use crate::engine::principal::PermissionSet;

/// Stored key status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum KeyStatus {
    Active,
    Expired,
    Revoked,
}

/// Persisted API key. Never serialized to clients as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredApiKey {
    pub id: u64,
    pub owner_id: String,
    pub name: String,
    /// Hex HMAC-SHA256 of the secret under the server pepper
    pub secret_hash: String,
    /// Non-secret lookup token
    pub fingerprint: String,
    pub permissions: PermissionSet,
    pub status: KeyStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    /// Key this one superseded through rollover
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rolled_over_from: Option<u64>,
}

impl StoredApiKey {
    /// Status with lapsed expiry applied, whatever the stored status says.
    pub fn effective_status(&self, now: DateTime<Utc>) -> KeyStatus {
        match self.status {
            KeyStatus::Active if self.expires_at <= now => KeyStatus::Expired,
            status => status,
        }
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.effective_status(now) == KeyStatus::Active
    }
}

/// Fields of a key about to be inserted.
#[derive(Debug, Clone)]
pub struct NewApiKey {
    pub owner_id: String,
    pub name: String,
    pub secret_hash: String,
    pub fingerprint: String,
    pub permissions: PermissionSet,
    pub expires_at: DateTime<Utc>,
    pub rolled_over_from: Option<u64>,
}

fn collect_keys<I, K>(index: &I, keys: &K, prefix: &[u8]) -> StoreResult<Vec<StoredApiKey>>
where
    I: ReadableTable<&'static [u8], u64>,
    K: ReadableTable<u64, &'static [u8]>,
{
    let mut found = Vec::new();
    for id in scan_prefix(index, prefix)? {
        if let Some(key) = load_record::<StoredApiKey, _>(keys, id)? {
            found.push(key);
        }
    }
    Ok(found)
}

// =============================================================================
// Write side
// =============================================================================

impl UnitOfWork<'_> {
    pub fn insert_api_key(&mut self, new: NewApiKey) -> LedgerResult<StoredApiKey> {
        let id = self.next_id(API_KEY_SEQUENCE)?;
        let key = StoredApiKey {
            id,
            owner_id: new.owner_id,
            name: new.name,
            secret_hash: new.secret_hash,
            fingerprint: new.fingerprint,
            permissions: new.permissions,
            status: KeyStatus::Active,
            expires_at: new.expires_at,
            created_at: Utc::now(),
            rolled_over_from: new.rolled_over_from,
        };

        self.store_api_key(&key)?;
        {
            let mut by_fingerprint = self.txn().open_table(KEY_FINGERPRINTS)?;
            by_fingerprint.insert(tagged_key(&key.fingerprint, id).as_slice(), id)?;
            let mut by_owner = self.txn().open_table(OWNER_KEYS)?;
            by_owner.insert(tagged_key(&key.owner_id, id).as_slice(), id)?;
        }
        Ok(key)
    }

    /// Overwrite an existing key record (status changes only).
    pub fn store_api_key(&self, key: &StoredApiKey) -> LedgerResult<()> {
        let json = encode_record(key)?;
        let mut table = self.txn().open_table(API_KEYS)?;
        table.insert(key.id, json.as_slice())?;
        Ok(())
    }

    pub fn api_key(&self, key_id: u64) -> LedgerResult<Option<StoredApiKey>> {
        let table = self.txn().open_table(API_KEYS)?;
        Ok(load_record(&table, key_id)?)
    }

    /// Every key of `owner_id`, including writes of this unit of work.
    pub fn api_keys_for_owner(&self, owner_id: &str) -> LedgerResult<Vec<StoredApiKey>> {
        let index = self.txn().open_table(OWNER_KEYS)?;
        let keys = self.txn().open_table(API_KEYS)?;
        let found = collect_keys(&index, &keys, &tagged_prefix(owner_id))?;
        Ok(found.into_iter().filter(|k| k.owner_id == owner_id).collect())
    }

    /// Every key still stored as active, in id order.
    pub fn stored_active_keys(&self) -> LedgerResult<Vec<StoredApiKey>> {
        let table = self.txn().open_table(API_KEYS)?;
        let mut active = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            let key: StoredApiKey =
                serde_json::from_slice(value.value()).map_err(StoreError::from)?;
            if key.status == KeyStatus::Active {
                active.push(key);
            }
        }
        Ok(active)
    }
}

// =============================================================================
// Read side
// =============================================================================

/// Read access to committed API keys.
pub struct ApiKeyStore<'a> {
    db: &'a LedgerDatabase,
}

impl<'a> ApiKeyStore<'a> {
    pub fn new(db: &'a LedgerDatabase) -> Self {
        Self { db }
    }

    pub fn get(&self, key_id: u64) -> LedgerResult<Option<StoredApiKey>> {
        let read_txn = self.db.read()?;
        let table = read_txn.open_table(API_KEYS)?;
        Ok(load_record(&table, key_id)?)
    }

    /// Candidate keys sharing a fingerprint.
    pub fn find_by_fingerprint(&self, fingerprint: &str) -> LedgerResult<Vec<StoredApiKey>> {
        let read_txn = self.db.read()?;
        let index = read_txn.open_table(KEY_FINGERPRINTS)?;
        let keys = read_txn.open_table(API_KEYS)?;
        let found = collect_keys(&index, &keys, &tagged_prefix(fingerprint))?;
        Ok(found
            .into_iter()
            .filter(|k| k.fingerprint == fingerprint)
            .collect())
    }

    /// Every key of `owner_id`, oldest first.
    pub fn list_for_owner(&self, owner_id: &str) -> LedgerResult<Vec<StoredApiKey>> {
        let read_txn = self.db.read()?;
        let index = read_txn.open_table(OWNER_KEYS)?;
        let keys = read_txn.open_table(API_KEYS)?;
        let found = collect_keys(&index, &keys, &tagged_prefix(owner_id))?;
        Ok(found.into_iter().filter(|k| k.owner_id == owner_id).collect())
    }
}
