// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! API key authority.
//!
//! ## Key Format
//!
//! ```text
//! sk_<base64url(32 random bytes)>
//! ```
//!
//! - `fingerprint`: first 16 hex chars of SHA-256(secret), used for lookup
//! - `secret_hash`: hex HMAC-SHA256(pepper, secret), compared in constant time
//!
//! The plaintext secret leaves this module exactly once, in [`IssuedKey`].
//!
//! ## Expiry
//!
//! Expiry is a timestamp check: a key whose `expires_at` has passed is treated
//! as expired everywhere, whether or not the sweeper has updated its stored
//! status yet.

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use ring::rand::{SecureRandom, SystemRandom};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::info;
use utoipa::ToSchema;

use super::error::{LedgerError, LedgerResult};
use super::expiry;
use super::principal::{authorize, Permission, PermissionSet, Principal};
use crate::storage::{ApiKeyStore, KeyStatus, LedgerDatabase, NewApiKey, StoredApiKey};

type HmacSha256 = Hmac<Sha256>;

/// Maximum number of simultaneously active keys per owner.
pub const MAX_ACTIVE_KEYS: usize = 5;

/// Prefix of every plaintext secret.
pub const SECRET_PREFIX: &str = "sk_";

const SECRET_BYTES: usize = 32;
const FINGERPRINT_HEX_LEN: usize = 16;

// =============================================================================
// KeyHasher
// =============================================================================

/// Secret generation and one-way hashing under a server-side pepper.
pub struct KeyHasher {
    pepper: Vec<u8>,
    rng: SystemRandom,
}

impl KeyHasher {
    pub fn new(pepper: impl AsRef<[u8]>) -> Self {
        Self {
            pepper: pepper.as_ref().to_vec(),
            rng: SystemRandom::new(),
        }
    }

    pub fn generate_secret(&self) -> LedgerResult<String> {
        let mut bytes = [0u8; SECRET_BYTES];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| LedgerError::RandomUnavailable)?;
        Ok(format!(
            "{SECRET_PREFIX}{}",
            Base64UrlUnpadded::encode_string(&bytes)
        ))
    }

    pub fn fingerprint(&self, secret: &str) -> String {
        let digest = Sha256::digest(secret.as_bytes());
        let mut fingerprint = hex::encode(digest);
        fingerprint.truncate(FINGERPRINT_HEX_LEN);
        fingerprint
    }

    fn mac(&self, secret: &str) -> Option<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.pepper).ok()?;
        mac.update(secret.as_bytes());
        Some(mac)
    }

    pub fn hash(&self, secret: &str) -> LedgerResult<String> {
        let mac = self.mac(secret).ok_or(LedgerError::InvalidKey)?;
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    pub fn verify(&self, secret: &str, secret_hash: &str) -> bool {
        let Ok(expected) = hex::decode(secret_hash) else {
            return false;
        };
        self.mac(secret)
            .map(|mac| mac.verify_slice(&expected).is_ok())
            .unwrap_or(false)
    }
}

// =============================================================================
// Views
// =============================================================================

/// A freshly issued key. The only value that ever carries the plaintext.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct IssuedKey {
    pub key_id: u64,
    pub name: String,
    /// Plaintext secret; shown once and never stored
    pub api_key: String,
    pub permissions: Vec<Permission>,
    pub expires_at: DateTime<Utc>,
}

/// Key metadata safe to return to its owner.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiKeySummary {
    pub key_id: u64,
    pub name: String,
    pub permissions: Vec<Permission>,
    pub status: KeyStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rolled_over_from: Option<u64>,
}

impl ApiKeySummary {
    fn from_stored(key: &StoredApiKey, now: DateTime<Utc>) -> Self {
        Self {
            key_id: key.id,
            name: key.name.clone(),
            permissions: key.permissions.to_vec(),
            status: key.effective_status(now),
            expires_at: key.expires_at,
            created_at: key.created_at,
            rolled_over_from: key.rolled_over_from,
        }
    }
}

// =============================================================================
// ApiKeyAuthority
// =============================================================================

pub struct ApiKeyAuthority<'a> {
    db: &'a LedgerDatabase,
    hasher: &'a KeyHasher,
}

impl<'a> ApiKeyAuthority<'a> {
    pub fn new(db: &'a LedgerDatabase, hasher: &'a KeyHasher) -> Self {
        Self { db, hasher }
    }

    /// Issue a new key for the calling user.
    pub fn issue(
        &self,
        principal: &Principal,
        name: &str,
        permissions: PermissionSet,
        expiry: &str,
    ) -> LedgerResult<IssuedKey> {
        principal.require_user()?;
        let name = name.trim();
        if name.is_empty() {
            return Err(LedgerError::InvalidKeyName);
        }
        if permissions.is_empty() {
            return Err(LedgerError::EmptyPermissions);
        }
        let now = Utc::now();
        let expires_at = expiry::expires_at(now, expiry)?;

        let issued = self.insert_key(&principal.owner_id, name, permissions, expires_at, None, now)?;
        info!(
            owner_id = %principal.owner_id,
            key_id = issued.key_id,
            expires_at = %issued.expires_at,
            "API key issued"
        );
        Ok(issued)
    }

    /// Replace a lapsed or revoked key with a new one carrying the same
    /// permissions. The old record is left untouched; a key can be superseded
    /// only once.
    pub fn rollover(
        &self,
        principal: &Principal,
        expired_key_id: u64,
        expiry: &str,
    ) -> LedgerResult<IssuedKey> {
        principal.require_user()?;
        let now = Utc::now();
        let expires_at = expiry::expires_at(now, expiry)?;

        let old = ApiKeyStore::new(self.db)
            .get(expired_key_id)?
            .filter(|k| k.owner_id == principal.owner_id)
            .ok_or(LedgerError::KeyNotFound)?;
        if old.is_active_at(now) {
            return Err(LedgerError::KeyNotExpired);
        }

        let issued = self.insert_key(
            &principal.owner_id,
            &old.name,
            old.permissions.clone(),
            expires_at,
            Some(old.id),
            now,
        )?;
        info!(
            owner_id = %principal.owner_id,
            old_key_id = old.id,
            key_id = issued.key_id,
            "API key rolled over"
        );
        Ok(issued)
    }

    fn insert_key(
        &self,
        owner_id: &str,
        name: &str,
        permissions: PermissionSet,
        expires_at: DateTime<Utc>,
        rolled_over_from: Option<u64>,
        now: DateTime<Utc>,
    ) -> LedgerResult<IssuedKey> {
        let secret = self.hasher.generate_secret()?;
        let secret_hash = self.hasher.hash(&secret)?;
        let fingerprint = self.hasher.fingerprint(&secret);

        // Counted inside the writing unit of work so concurrent issuance
        // cannot exceed the cap
        let mut uow = self.db.begin()?;
        let existing = uow.api_keys_for_owner(owner_id)?;
        if let Some(old_id) = rolled_over_from {
            if existing.iter().any(|k| k.rolled_over_from == Some(old_id)) {
                return Err(LedgerError::KeyAlreadyRolledOver);
            }
        }
        let active = existing.iter().filter(|k| k.is_active_at(now)).count();
        if active >= MAX_ACTIVE_KEYS {
            return Err(LedgerError::TooManyActiveKeys);
        }

        let stored = uow.insert_api_key(NewApiKey {
            owner_id: owner_id.to_string(),
            name: name.to_string(),
            secret_hash,
            fingerprint,
            permissions,
            expires_at,
            rolled_over_from,
        })?;
        uow.commit()?;

        Ok(IssuedKey {
            key_id: stored.id,
            name: stored.name,
            api_key: secret,
            permissions: stored.permissions.to_vec(),
            expires_at: stored.expires_at,
        })
    }

    /// Resolve a presented secret to the principal it authenticates.
    pub fn validate(&self, presented: &str) -> LedgerResult<Principal> {
        let presented = presented.trim();
        if !presented.starts_with(SECRET_PREFIX) {
            return Err(LedgerError::InvalidKey);
        }

        let fingerprint = self.hasher.fingerprint(presented);
        let key = ApiKeyStore::new(self.db)
            .find_by_fingerprint(&fingerprint)?
            .into_iter()
            .find(|k| self.hasher.verify(presented, &k.secret_hash))
            .ok_or(LedgerError::InvalidKey)?;

        if !key.is_active_at(Utc::now()) {
            return Err(LedgerError::KeyExpired);
        }
        Ok(Principal::api_key(key.owner_id, key.id, key.permissions))
    }

    pub fn authorize(&self, principal: &Principal, required: Permission) -> LedgerResult<()> {
        authorize(&principal.permissions, required)
    }

    /// Revoke one of the caller's keys. Revoking twice is a no-op.
    pub fn revoke(&self, principal: &Principal, key_id: u64) -> LedgerResult<ApiKeySummary> {
        principal.require_user()?;
        let uow = self.db.begin()?;
        let mut key = uow
            .api_key(key_id)?
            .filter(|k| k.owner_id == principal.owner_id)
            .ok_or(LedgerError::KeyNotFound)?;

        if key.status != KeyStatus::Revoked {
            key.status = KeyStatus::Revoked;
            uow.store_api_key(&key)?;
            uow.commit()?;
            info!(owner_id = %principal.owner_id, key_id, "API key revoked");
        }
        Ok(ApiKeySummary::from_stored(&key, Utc::now()))
    }

    /// Every key of the caller, oldest first. Never includes secrets or hashes.
    pub fn list(&self, principal: &Principal) -> LedgerResult<Vec<ApiKeySummary>> {
        principal.require_user()?;
        let now = Utc::now();
        Ok(ApiKeyStore::new(self.db)
            .list_for_owner(&principal.owner_id)?
            .iter()
            .map(|k| ApiKeySummary::from_stored(k, now))
            .collect())
    }

    /// Mark every lapsed active key as expired. Returns the number updated.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> LedgerResult<usize> {
        let uow = self.db.begin()?;
        let mut swept = 0;
        for mut key in uow.stored_active_keys()? {
            if key.expires_at <= now {
                key.status = KeyStatus::Expired;
                uow.store_api_key(&key)?;
                swept += 1;
            }
        }
        if swept == 0 {
            uow.abort()?;
        } else {
            uow.commit()?;
        }
        Ok(swept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::temp_db;
    use chrono::Duration;

    fn read_only() -> PermissionSet {
        PermissionSet::from_iter([Permission::Read])
    }

    /// Force a key's expiry into the past without waiting.
    fn backdate(db: &LedgerDatabase, key_id: u64) {
        let uow = db.begin().unwrap();
        let mut key = uow.api_key(key_id).unwrap().unwrap();
        key.expires_at = Utc::now() - Duration::seconds(1);
        uow.store_api_key(&key).unwrap();
        uow.commit().unwrap();
    }

    #[test]
    fn hasher_round_trip() {
        let hasher = KeyHasher::new("pepper");
        let secret = hasher.generate_secret().unwrap();
        assert!(secret.starts_with(SECRET_PREFIX));
        assert_eq!(secret.len(), SECRET_PREFIX.len() + 43);

        let hash = hasher.hash(&secret).unwrap();
        assert!(hasher.verify(&secret, &hash));
        assert!(!hasher.verify("sk_other", &hash));
        assert!(!KeyHasher::new("other-pepper").verify(&secret, &hash));
        assert_eq!(hasher.fingerprint(&secret).len(), FINGERPRINT_HEX_LEN);
        assert_ne!(hasher.generate_secret().unwrap(), secret);
    }

    #[test]
    fn issue_then_validate() {
        let (db, _dir) = temp_db();
        let hasher = KeyHasher::new("pepper");
        let authority = ApiKeyAuthority::new(&db, &hasher);
        let user = Principal::user("alice", None);

        let issued = authority
            .issue(&user, "billing", read_only(), "1D")
            .unwrap();
        let principal = authority.validate(&issued.api_key).unwrap();
        assert_eq!(principal.owner_id, "alice");
        assert_eq!(principal.permissions, read_only());
        assert!(authority.authorize(&principal, Permission::Read).is_ok());
        assert!(matches!(
            authority.authorize(&principal, Permission::Transfer),
            Err(LedgerError::Forbidden)
        ));

        // Only the hash is persisted
        let stored = ApiKeyStore::new(&db).list_for_owner("alice").unwrap();
        assert_ne!(stored[0].secret_hash, issued.api_key);
        assert!(!stored[0].secret_hash.contains(&issued.api_key));
    }

    #[test]
    fn validate_rejects_unknown_and_expired_keys() {
        let (db, _dir) = temp_db();
        let hasher = KeyHasher::new("pepper");
        let authority = ApiKeyAuthority::new(&db, &hasher);
        let user = Principal::user("alice", None);

        assert!(matches!(
            authority.validate("sk_nope"),
            Err(LedgerError::InvalidKey)
        ));
        assert!(matches!(
            authority.validate("garbage"),
            Err(LedgerError::InvalidKey)
        ));

        let issued = authority.issue(&user, "svc", read_only(), "1H").unwrap();
        backdate(&db, issued.key_id);
        assert!(matches!(
            authority.validate(&issued.api_key),
            Err(LedgerError::KeyExpired)
        ));

        let revoked = authority.issue(&user, "svc2", read_only(), "1H").unwrap();
        authority.revoke(&user, revoked.key_id).unwrap();
        assert!(matches!(
            authority.validate(&revoked.api_key),
            Err(LedgerError::KeyExpired)
        ));
    }

    #[test]
    fn issue_validates_input_before_state() {
        let (db, _dir) = temp_db();
        let hasher = KeyHasher::new("pepper");
        let authority = ApiKeyAuthority::new(&db, &hasher);
        let user = Principal::user("alice", None);

        assert!(matches!(
            authority.issue(&user, "svc", read_only(), "1W"),
            Err(LedgerError::InvalidExpiry(_))
        ));
        assert!(matches!(
            authority.issue(&user, "svc", PermissionSet::default(), "1D"),
            Err(LedgerError::EmptyPermissions)
        ));
        assert!(matches!(
            authority.issue(&user, "  ", read_only(), "1D"),
            Err(LedgerError::InvalidKeyName)
        ));
        assert!(authority.list(&user).unwrap().is_empty());
    }

    #[test]
    fn at_most_five_active_keys() {
        let (db, _dir) = temp_db();
        let hasher = KeyHasher::new("pepper");
        let authority = ApiKeyAuthority::new(&db, &hasher);
        let user = Principal::user("alice", None);

        let mut ids = Vec::new();
        for i in 0..MAX_ACTIVE_KEYS {
            ids.push(
                authority
                    .issue(&user, &format!("k{i}"), read_only(), "1D")
                    .unwrap()
                    .key_id,
            );
        }
        assert!(matches!(
            authority.issue(&user, "k6", read_only(), "1D"),
            Err(LedgerError::TooManyActiveKeys)
        ));

        // Another owner is unaffected
        let bob = Principal::user("bob", None);
        assert!(authority.issue(&bob, "k1", read_only(), "1D").is_ok());

        // Revoking frees a slot
        authority.revoke(&user, ids[0]).unwrap();
        authority.issue(&user, "k6", read_only(), "1D").unwrap();

        // So does lapsing, even before the sweeper runs
        backdate(&db, ids[1]);
        authority.issue(&user, "k7", read_only(), "1D").unwrap();

        assert!(matches!(
            authority.issue(&user, "k8", read_only(), "1D"),
            Err(LedgerError::TooManyActiveKeys)
        ));
    }

    #[test]
    fn rollover_rules() {
        let (db, _dir) = temp_db();
        let hasher = KeyHasher::new("pepper");
        let authority = ApiKeyAuthority::new(&db, &hasher);
        let alice = Principal::user("alice", None);
        let bob = Principal::user("bob", None);

        let perms = PermissionSet::from_iter([Permission::Deposit, Permission::Transfer]);
        let issued = authority.issue(&alice, "svc", perms.clone(), "1D").unwrap();

        assert!(matches!(
            authority.rollover(&alice, issued.key_id, "1D"),
            Err(LedgerError::KeyNotExpired)
        ));
        assert!(matches!(
            authority.rollover(&alice, 999, "1D"),
            Err(LedgerError::KeyNotFound)
        ));

        backdate(&db, issued.key_id);
        assert!(matches!(
            authority.rollover(&bob, issued.key_id, "1D"),
            Err(LedgerError::KeyNotFound)
        ));

        let rolled = authority.rollover(&alice, issued.key_id, "1M").unwrap();
        assert_ne!(rolled.key_id, issued.key_id);
        assert_eq!(rolled.permissions, perms.to_vec());
        assert_eq!(rolled.name, "svc");

        let principal = authority.validate(&rolled.api_key).unwrap();
        assert_eq!(principal.permissions, perms);

        // The old record keeps its stored status
        let keys = authority.list(&alice).unwrap();
        let old = keys.iter().find(|k| k.key_id == issued.key_id).unwrap();
        assert_eq!(old.status, KeyStatus::Expired);
        let new = keys.iter().find(|k| k.key_id == rolled.key_id).unwrap();
        assert_eq!(new.rolled_over_from, Some(issued.key_id));

        // A superseded key cannot be rolled over again
        assert!(matches!(
            authority.rollover(&alice, issued.key_id, "1D"),
            Err(LedgerError::KeyAlreadyRolledOver)
        ));
        assert_eq!(authority.list(&alice).unwrap().len(), 2);

        // Revoked keys can be rolled over, once
        let revoked = authority.issue(&alice, "batch", read_only(), "1D").unwrap();
        authority.revoke(&alice, revoked.key_id).unwrap();
        let replacement = authority.rollover(&alice, revoked.key_id, "1D").unwrap();
        assert_eq!(replacement.name, "batch");
        assert_eq!(replacement.permissions, vec![Permission::Read]);
        assert!(authority.validate(&replacement.api_key).is_ok());
        assert!(matches!(
            authority.rollover(&alice, revoked.key_id, "1D"),
            Err(LedgerError::KeyAlreadyRolledOver)
        ));
    }

    #[test]
    fn key_principals_cannot_manage_keys() {
        let (db, _dir) = temp_db();
        let hasher = KeyHasher::new("pepper");
        let authority = ApiKeyAuthority::new(&db, &hasher);
        let key_principal = Principal::api_key("alice", 1, PermissionSet::all());

        assert!(matches!(
            authority.issue(&key_principal, "svc", read_only(), "1D"),
            Err(LedgerError::Forbidden)
        ));
        assert!(matches!(
            authority.list(&key_principal),
            Err(LedgerError::Forbidden)
        ));
    }

    #[test]
    fn sweep_marks_lapsed_keys() {
        let (db, _dir) = temp_db();
        let hasher = KeyHasher::new("pepper");
        let authority = ApiKeyAuthority::new(&db, &hasher);
        let user = Principal::user("alice", None);

        let lapsed = authority.issue(&user, "a", read_only(), "1H").unwrap();
        authority.issue(&user, "b", read_only(), "1D").unwrap();
        backdate(&db, lapsed.key_id);

        assert_eq!(authority.sweep_expired(Utc::now()).unwrap(), 1);
        assert_eq!(authority.sweep_expired(Utc::now()).unwrap(), 0);

        let stored = ApiKeyStore::new(&db).list_for_owner("alice").unwrap();
        assert_eq!(stored[0].status, KeyStatus::Expired);
        assert_eq!(stored[1].status, KeyStatus::Active);
    }
}
