// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Initiate and confirm.
//!
//! The notifier is awaited only in [`TransferService::initiate`], before any
//! ledger unit exists. Settlement runs on a blocking thread because opening a
//! unit waits for the ledger's single writer lock.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tracing::{error, info, warn};

use crate::auth::{AuthenticatedUser, ClientContext};
use crate::challenge::{ChallengeStore, TransferIntent, DEFAULT_CHALLENGE_TTL};
use crate::models::{
    non_blank, normalize_currency, validate_amount, ConfirmTransferRequest,
    ConfirmTransferResponse, InitiateTransferRequest, InitiateTransferResponse, SettlementClass,
    TransferReceipt, TransferStatus,
};
use crate::notifier::Notifier;
use crate::storage::{
    AuditEvent, AuditEventType, AuditRepository, BeneficiaryRepository, ClientProfile,
    FileStorage, Ledger, LedgerError, StoredTransfer,
};

use super::error::{
    TransferError, DELIVERY_WARNING, MSG_CLIENT_NOT_FOUND, MSG_CODE_REQUIRED,
    MSG_CURRENCY_MISMATCH,
};

/// Message of a successful initiation.
pub const INITIATE_MESSAGE: &str = "Code OTP envoyé par email";

const MSG_FIELDS_REQUIRED: &str = "Compte source, bénéficiaire, montant et devise sont requis";

/// Outcome of the validation and challenge steps of an initiation.
struct Started {
    intent: TransferIntent,
    warning: Option<String>,
}

pub struct TransferService {
    ledger: Arc<Ledger>,
    storage: Arc<FileStorage>,
    challenges: Arc<dyn ChallengeStore>,
    notifier: Arc<dyn Notifier>,
    otp_ttl: Duration,
}

impl TransferService {
    pub fn new(
        ledger: Arc<Ledger>,
        storage: Arc<FileStorage>,
        challenges: Arc<dyn ChallengeStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            ledger,
            storage,
            challenges,
            notifier,
            otp_ttl: DEFAULT_CHALLENGE_TTL,
        }
    }

    pub fn with_otp_ttl(mut self, otp_ttl: Duration) -> Self {
        self.otp_ttl = otp_ttl;
        self
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn storage(&self) -> &Arc<FileStorage> {
        &self.storage
    }

    pub fn challenges(&self) -> &Arc<dyn ChallengeStore> {
        &self.challenges
    }

    /// Client linked to a login identity.
    pub fn resolve_client(&self, user_id: &str) -> Result<ClientProfile, TransferError> {
        self.ledger
            .client_for_user(user_id)?
            .ok_or_else(|| TransferError::not_found(MSG_CLIENT_NOT_FOUND))
    }

    // =========================================================================
    // Initiate
    // =========================================================================

    /// Validate a transfer, issue its challenge and send the code.
    ///
    /// The balance check here is advisory; `confirm` repeats it under the
    /// ledger lock. A delivery failure keeps the challenge and comes back as
    /// `warning`.
    pub async fn initiate(
        &self,
        user: &AuthenticatedUser,
        ctx: &ClientContext,
        request: InitiateTransferRequest,
    ) -> Result<InitiateTransferResponse, TransferError> {
        let result = self.start(user, &request).await;

        let event = audit_event(
            AuditEventType::TransferInitiated,
            "Initiation virement",
            user,
            ctx,
        );
        let event = match &result {
            Ok(started) => event
                .with_resource("account", &started.intent.source_account_id)
                .with_details(json!({
                    "beneficiaryId": started.intent.beneficiary_id,
                    "amount": started.intent.amount.to_string(),
                    "currency": started.intent.currency,
                    "delivered": started.warning.is_none(),
                })),
            Err(e) => event.failed(e.public_message()),
        };
        AuditRepository::new(&self.storage).record(&event);

        let started = result?;
        Ok(InitiateTransferResponse {
            success: true,
            message: INITIATE_MESSAGE.to_string(),
            expires_in: self.otp_ttl.as_secs(),
            warning: started.warning,
        })
    }

    async fn start(
        &self,
        user: &AuthenticatedUser,
        request: &InitiateTransferRequest,
    ) -> Result<Started, TransferError> {
        let intent = parse_intent(request)?;
        let client = self.resolve_client(&user.user_id)?;

        let account = self
            .ledger
            .account_owned(&intent.source_account_id, &client.client_id)?;
        if account.currency != intent.currency {
            return Err(TransferError::InvalidRequest(MSG_CURRENCY_MISMATCH.to_string()));
        }
        if account.balance < intent.amount {
            return Err(TransferError::InsufficientFunds);
        }

        BeneficiaryRepository::new(&self.storage)
            .find_owned(&intent.beneficiary_id, &client.client_id)
            .map_err(TransferError::from_beneficiary_lookup)?;

        let issued = self
            .challenges
            .issue(&user.user_id, intent.clone(), self.otp_ttl)
            .await?;

        let warning = match self.notifier.send_code(&client.email, &issued.code).await {
            Ok(()) => None,
            Err(e) => {
                warn!(user_id = %user.user_id, error = %e, "Transfer code delivery failed");
                Some(DELIVERY_WARNING.to_string())
            }
        };

        info!(
            user_id = %user.user_id,
            source_account_id = %intent.source_account_id,
            expires_at = %issued.expires_at,
            "Transfer challenge issued"
        );

        Ok(Started { intent, warning })
    }

    // =========================================================================
    // Confirm
    // =========================================================================

    /// Consume the caller's challenge and settle the bound transfer.
    ///
    /// The challenge is consumed before the ledger is touched, so any later
    /// failure requires a new initiation.
    pub async fn confirm(
        &self,
        user: &AuthenticatedUser,
        ctx: &ClientContext,
        request: ConfirmTransferRequest,
    ) -> Result<ConfirmTransferResponse, TransferError> {
        let Some(code) = non_blank(&request.otp) else {
            return Err(TransferError::InvalidRequest(MSG_CODE_REQUIRED.to_string()));
        };
        let audit = AuditRepository::new(&self.storage);

        let verified = audit_event(
            AuditEventType::TransferOtpVerified,
            "Vérification OTP",
            user,
            ctx,
        );
        let intent = match self.challenges.verify(&user.user_id, code).await {
            Ok(intent) => {
                audit.record(&verified.with_resource("account", &intent.source_account_id));
                intent
            }
            Err(e) => {
                let err = TransferError::from(e);
                audit.record(&verified.failed(err.public_message()));
                return Err(err);
            }
        };

        match self.settle(&user.user_id, intent.clone()).await {
            Ok(transfer) => {
                let action = format!(
                    "Virement {} de {} {} vers {}",
                    transfer.settlement_class.describe(),
                    transfer.amount,
                    transfer.currency,
                    transfer.beneficiary_name
                );
                audit.record(
                    &audit_event(AuditEventType::TransferSettled, action, user, ctx)
                        .with_resource("transfer", &transfer.id)
                        .with_details(json!({
                            "sourceAccountId": transfer.source_account_id,
                            "destinationAccountId": transfer.destination_account_id,
                            "settlementClass": transfer.settlement_class,
                            "status": transfer.status,
                        })),
                );
                info!(
                    user_id = %user.user_id,
                    transfer_id = %transfer.id,
                    status = transfer.status.as_str(),
                    "Transfer recorded"
                );

                Ok(ConfirmTransferResponse {
                    success: true,
                    message: transfer.settlement_class.status_message().to_string(),
                    transaction: TransferReceipt::from(&transfer),
                })
            }
            Err(e) => {
                match &e {
                    TransferError::Internal(detail) => {
                        error!(user_id = %user.user_id, error = %detail, "Transfer settlement failed")
                    }
                    other => {
                        warn!(user_id = %user.user_id, error = %other, "Transfer settlement rejected")
                    }
                }
                audit.record(
                    &audit_event(AuditEventType::TransferSettled, "Exécution virement", user, ctx)
                        .with_resource("account", &intent.source_account_id)
                        .with_details(json!({
                            "beneficiaryId": intent.beneficiary_id,
                            "amount": intent.amount.to_string(),
                            "currency": intent.currency,
                        }))
                        .failed(e.public_message()),
                );
                Err(e)
            }
        }
    }

    async fn settle(
        &self,
        user_id: &str,
        intent: TransferIntent,
    ) -> Result<StoredTransfer, TransferError> {
        let client = self.resolve_client(user_id)?;
        let ledger = self.ledger.clone();
        let storage = self.storage.clone();

        tokio::task::spawn_blocking(move || {
            settle_in_unit(&ledger, &storage, &client.client_id, &intent)
        })
        .await
        .map_err(|e| TransferError::Internal(format!("settlement task failed: {e}")))?
    }
}

/// Move the money for `intent` inside one ledger unit.
///
/// Returning early drops the unit, which discards every write made so far.
pub(crate) fn settle_in_unit(
    ledger: &Ledger,
    storage: &FileStorage,
    client_id: &str,
    intent: &TransferIntent,
) -> Result<StoredTransfer, TransferError> {
    let unit = ledger.begin_unit()?;

    let source = unit.balance_for_update(&intent.source_account_id, client_id)?;
    if source.balance < intent.amount {
        return Err(TransferError::InsufficientFunds);
    }

    let beneficiary = BeneficiaryRepository::new(storage)
        .find_owned(&intent.beneficiary_id, client_id)
        .map_err(TransferError::from_beneficiary_lookup)?;

    let now = Utc::now();
    let (status, destination_account_id, settled_at) = match beneficiary.settlement_class {
        SettlementClass::SameInstitution => {
            let destination = unit
                .find_by_routing_id(&beneficiary.routing_id)?
                .ok_or(TransferError::DestinationNotFound)?;
            unit.credit(&destination, intent.amount, &intent.currency)
                .map_err(|e| match e {
                    LedgerError::AccountNotFound(_) => TransferError::DestinationNotFound,
                    other => other.into(),
                })?;
            (TransferStatus::Settled, Some(destination), Some(now))
        }
        SettlementClass::DomesticOther | SettlementClass::International => {
            (TransferStatus::Pending, None, None)
        }
    };

    unit.debit(&intent.source_account_id, intent.amount, &intent.currency)?;

    let transfer = StoredTransfer {
        id: uuid::Uuid::new_v4().to_string(),
        source_account_id: intent.source_account_id.clone(),
        destination_account_id,
        beneficiary_id: beneficiary.id.clone(),
        beneficiary_name: beneficiary.name,
        beneficiary_bank: beneficiary.bank_name,
        settlement_class: beneficiary.settlement_class,
        amount: intent.amount,
        currency: intent.currency.clone(),
        status,
        reference: intent.reference.clone(),
        created_at: now,
        settled_at,
    };
    unit.insert_transfer(&transfer)?;
    unit.commit()?;

    Ok(transfer)
}

fn parse_intent(request: &InitiateTransferRequest) -> Result<TransferIntent, TransferError> {
    let (Some(source_account_id), Some(beneficiary_id), Some(amount), Some(currency)) = (
        non_blank(&request.source_account_id),
        non_blank(&request.beneficiary_id),
        request.amount,
        non_blank(&request.currency),
    ) else {
        return Err(TransferError::InvalidRequest(MSG_FIELDS_REQUIRED.to_string()));
    };

    let amount = validate_amount(amount).map_err(TransferError::InvalidRequest)?;

    Ok(TransferIntent {
        source_account_id: source_account_id.to_string(),
        beneficiary_id: beneficiary_id.to_string(),
        amount,
        currency: normalize_currency(currency),
        reference: non_blank(&request.reference).map(str::to_string),
    })
}

fn audit_event(
    event_type: AuditEventType,
    action: impl Into<String>,
    user: &AuthenticatedUser,
    ctx: &ClientContext,
) -> AuditEvent {
    AuditEvent::new(event_type, action)
        .with_user(&user.user_id)
        .with_origin(ctx.ip.as_deref(), ctx.user_agent.as_deref())
}

impl From<&StoredTransfer> for TransferReceipt {
    fn from(transfer: &StoredTransfer) -> Self {
        Self {
            id: transfer.id.clone(),
            amount: transfer.amount,
            currency: transfer.currency.clone(),
            beneficiary: transfer.beneficiary_name.clone(),
            beneficiary_bank: transfer.beneficiary_bank.clone(),
            transfer_type: transfer.settlement_class,
            reference: transfer.reference.clone(),
            status: transfer.status,
            created_at: transfer.created_at,
            settled_at: transfer.settled_at,
            settlement_time: transfer.settlement_class.settlement_time().to_string(),
        }
    }
}
