// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Deposit reconciliation.
//!
//! ```text
//! initiated ──charge.success──▶ success
//!     │
//!     └──────charge.failed────▶ failed
//! ```
//!
//! Terminal states never change. The ledger entry of a deposit is the
//! idempotency record: a webhook for a reference that is already terminal is
//! acknowledged without touching any balance.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;

use super::error::{LedgerError, LedgerResult};
use super::principal::{Permission, Principal};
use crate::money::Amount;
use crate::providers::{ChargeRequest, PaymentGateway};
use crate::storage::{Ledger, LedgerDatabase, LedgerEntry, TxStatus, TxType, WalletStore};

/// A charge waiting for the payer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct DepositSession {
    pub reference: String,
    /// Hosted checkout page
    pub authorization_url: String,
    pub amount: u64,
}

/// Current state of a deposit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct DepositStatus {
    pub reference: String,
    pub status: TxStatus,
    pub amount: i64,
}

impl From<LedgerEntry> for DepositStatus {
    fn from(entry: LedgerEntry) -> Self {
        Self {
            reference: entry.reference,
            status: entry.status,
            amount: entry.amount,
        }
    }
}

/// Gateway webhook body. Unknown fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    pub data: WebhookData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookData {
    pub reference: String,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
}

/// What a verified webhook did. Every variant is acknowledged to the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Deposit credited and moved to `success`
    Settled { reference: String, amount: u64 },
    /// Deposit moved to `failed` without a balance change
    Failed { reference: String },
    /// Reference already terminal; nothing changed
    AlreadySettled { reference: String },
    /// No deposit with this reference; nothing changed
    UnknownReference { reference: String },
    /// Event type not relevant to deposits, or body unreadable
    Ignored,
    /// Internal failure, logged for operators; nothing changed
    Errored,
}

enum Resolution {
    Settle,
    Fail,
    Ignore,
}

fn resolve(event: &WebhookEvent) -> Resolution {
    let status = event.data.status.as_deref().map(str::to_ascii_lowercase);
    let is_charge = event.event.starts_with("charge.");
    match (event.event.as_str(), status.as_deref()) {
        (_, Some("failed" | "abandoned" | "reversed")) if is_charge => Resolution::Fail,
        ("charge.failed", _) => Resolution::Fail,
        ("charge.success", None | Some("success")) => Resolution::Settle,
        _ => Resolution::Ignore,
    }
}

pub struct DepositReconciler<'a> {
    db: &'a LedgerDatabase,
    gateway: &'a dyn PaymentGateway,
}

impl<'a> DepositReconciler<'a> {
    pub fn new(db: &'a LedgerDatabase, gateway: &'a dyn PaymentGateway) -> Self {
        Self { db, gateway }
    }

    /// Create a gateway charge and record it as an `initiated` deposit.
    ///
    /// The gateway is called before any write, so no lock is held while
    /// waiting on it.
    pub async fn initiate(&self, principal: &Principal, amount: i64) -> LedgerResult<DepositSession> {
        principal.require(Permission::Deposit)?;
        let amount = Amount::new(amount)?;
        let wallet = WalletStore::new(self.db).find_by_owner(&principal.owner_id)?;

        let request = ChargeRequest {
            amount,
            email: principal.email.clone().or_else(|| wallet.email.clone()),
            metadata: json!({
                "wallet_id": wallet.id,
                "wallet_number": wallet.number,
            }),
        };
        let session = self.gateway.init_charge(request).await.map_err(|e| {
            warn!(wallet_id = wallet.id, error = %e, "deposit initialization failed");
            LedgerError::GatewayUnavailable(e.to_string())
        })?;

        let mut uow = self.db.begin()?;
        uow.record(
            wallet.id,
            TxType::Deposit,
            amount.as_credit(),
            &session.reference,
            TxStatus::Initiated,
        )?;
        uow.commit()?;

        info!(
            wallet_id = wallet.id,
            reference = %session.reference,
            amount = %amount,
            "deposit initiated"
        );
        Ok(DepositSession {
            reference: session.reference,
            authorization_url: session.redirect_url,
            amount: amount.minor_units(),
        })
    }

    /// Verify and apply a gateway webhook.
    ///
    /// Only a missing or wrong signature is an error; it is rejected before
    /// the body is even parsed.
    pub fn handle_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> LedgerResult<WebhookOutcome> {
        let verified = signature
            .map(|sig| self.gateway.verify_signature(payload, sig))
            .unwrap_or(false);
        if !verified {
            warn!("rejected webhook with invalid signature");
            return Err(LedgerError::InvalidSignature);
        }

        let event: WebhookEvent = match serde_json::from_slice(payload) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "unreadable webhook body");
                return Ok(WebhookOutcome::Ignored);
            }
        };

        match self.apply_event(&event) {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                error!(
                    reference = %event.data.reference,
                    event = %event.event,
                    error = %e,
                    "webhook could not be applied"
                );
                Ok(WebhookOutcome::Errored)
            }
        }
    }

    fn apply_event(&self, event: &WebhookEvent) -> LedgerResult<WebhookOutcome> {
        let reference = event.data.reference.clone();
        let resolution = resolve(event);
        if let Resolution::Ignore = resolution {
            debug!(event = %event.event, reference = %reference, "ignoring webhook event");
            return Ok(WebhookOutcome::Ignored);
        }

        // Looked up inside the unit of work so a concurrent delivery of the
        // same event observes the first one's terminal status
        let mut uow = self.db.begin()?;
        let deposit = uow
            .entries_for_reference(&reference)?
            .into_iter()
            .find(|e| e.tx_type == TxType::Deposit);

        let Some(entry) = deposit else {
            info!(reference = %reference, "webhook for unknown reference");
            return Ok(WebhookOutcome::UnknownReference { reference });
        };
        if entry.status.is_terminal() {
            info!(reference = %reference, status = %entry.status, "duplicate webhook");
            return Ok(WebhookOutcome::AlreadySettled { reference });
        }

        match resolution {
            Resolution::Settle => {
                let amount = match event.data.amount {
                    Some(reported) => Amount::new(reported)?,
                    None => Amount::new(entry.amount)?,
                };
                if amount.as_credit() != entry.amount {
                    warn!(
                        reference = %reference,
                        initiated = entry.amount,
                        settled = amount.as_credit(),
                        "settled amount differs from initiated amount"
                    );
                }
                uow.credit(entry.wallet_id, amount)?;
                uow.settle(entry.id, TxStatus::Success, Some(amount.as_credit()))?;
                uow.commit()?;
                info!(reference = %reference, wallet_id = entry.wallet_id, amount = %amount, "deposit settled");
                Ok(WebhookOutcome::Settled {
                    reference,
                    amount: amount.minor_units(),
                })
            }
            Resolution::Fail => {
                uow.settle(entry.id, TxStatus::Failed, None)?;
                uow.commit()?;
                info!(reference = %reference, "deposit failed");
                Ok(WebhookOutcome::Failed { reference })
            }
            Resolution::Ignore => Ok(WebhookOutcome::Ignored),
        }
    }

    /// Status of one of the caller's deposits.
    ///
    /// Permission is checked first, and another owner's deposit is reported as
    /// not found.
    pub fn status(&self, principal: &Principal, reference: &str) -> LedgerResult<DepositStatus> {
        principal.require(Permission::Read)?;
        let wallet = match WalletStore::new(self.db).find_by_owner(&principal.owner_id) {
            Ok(wallet) => wallet,
            Err(LedgerError::WalletNotFound) => return Err(LedgerError::TransactionNotFound),
            Err(e) => return Err(e),
        };

        Ledger::new(self.db)
            .entries_for_reference(reference)?
            .into_iter()
            .find(|e| e.tx_type == TxType::Deposit && e.wallet_id == wallet.id)
            .map(DepositStatus::from)
            .ok_or(LedgerError::TransactionNotFound)
    }
}
