// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::http::StatusCode;

use crate::challenge::ChallengeError;
use crate::storage::{LedgerError, StorageError};

pub const MSG_CODE_REQUIRED: &str = "Code OTP requis";
pub const MSG_SESSION_NOT_FOUND: &str = "Session de transfert expirée ou introuvable";
pub const MSG_ACCOUNT_NOT_FOUND: &str = "Compte source non trouvé";
pub const MSG_BENEFICIARY_NOT_FOUND: &str = "Bénéficiaire non trouvé";
pub const MSG_CLIENT_NOT_FOUND: &str = "Client non trouvé";
pub const MSG_CURRENCY_MISMATCH: &str = "Devise incompatible avec le compte";

/// Warning attached to an initiation whose code could not be delivered.
pub const DELIVERY_WARNING: &str =
    "Le code n'a pas pu être envoyé. Relancez le virement pour recevoir un nouveau code";

/// Failure of a transfer step. Every variant is final for the attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransferError {
    /// Missing, malformed or non-positive input.
    #[error("{0}")]
    InvalidRequest(String),

    /// Client, account, beneficiary or challenge absent or not the caller's.
    #[error("{0}")]
    NotFound(String),

    #[error("Solde insuffisant")]
    InsufficientFunds,

    #[error("Code OTP expiré")]
    Expired,

    /// Wrong code; the challenge stays live until it expires.
    #[error("Code OTP invalide")]
    CodeMismatch,

    /// A same-institution beneficiary whose routing id matches no account.
    #[error("Compte destination introuvable dans notre banque")]
    DestinationNotFound,

    #[error("internal error: {0}")]
    Internal(String),
}

impl TransferError {
    pub fn error_code(&self) -> &'static str {
        match self {
            TransferError::InvalidRequest(_) => "invalid_request",
            TransferError::NotFound(_) => "not_found",
            TransferError::InsufficientFunds => "insufficient_funds",
            TransferError::Expired => "otp_expired",
            TransferError::CodeMismatch => "otp_mismatch",
            TransferError::DestinationNotFound => "destination_not_found",
            TransferError::Internal(_) => "internal_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            TransferError::InvalidRequest(_)
            | TransferError::InsufficientFunds
            | TransferError::Expired => StatusCode::BAD_REQUEST,
            TransferError::CodeMismatch => StatusCode::UNAUTHORIZED,
            TransferError::NotFound(_) | TransferError::DestinationNotFound => {
                StatusCode::NOT_FOUND
            }
            TransferError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text safe to show the caller or write to the audit log.
    pub fn public_message(&self) -> String {
        match self {
            TransferError::Internal(_) => crate::error::INTERNAL_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }

    pub(crate) fn not_found(message: &str) -> Self {
        TransferError::NotFound(message.to_string())
    }

    /// Map a beneficiary lookup failure.
    pub(crate) fn from_beneficiary_lookup(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(_) => Self::not_found(MSG_BENEFICIARY_NOT_FOUND),
            other => TransferError::Internal(other.to_string()),
        }
    }
}

impl From<ChallengeError> for TransferError {
    fn from(e: ChallengeError) -> Self {
        match e {
            ChallengeError::NotFound => Self::not_found(MSG_SESSION_NOT_FOUND),
            ChallengeError::Expired => TransferError::Expired,
            ChallengeError::CodeMismatch => TransferError::CodeMismatch,
            ChallengeError::Internal(detail) => TransferError::Internal(detail),
        }
    }
}

impl From<LedgerError> for TransferError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::AccountNotFound(_) => Self::not_found(MSG_ACCOUNT_NOT_FOUND),
            LedgerError::ClientNotFound(_) => Self::not_found(MSG_CLIENT_NOT_FOUND),
            LedgerError::InsufficientFunds { .. } => TransferError::InsufficientFunds,
            LedgerError::CurrencyMismatch { .. } => {
                TransferError::InvalidRequest(MSG_CURRENCY_MISMATCH.to_string())
            }
            other => TransferError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_table() {
        let cases = [
            (TransferError::InvalidRequest("x".into()), StatusCode::BAD_REQUEST),
            (TransferError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (TransferError::InsufficientFunds, StatusCode::BAD_REQUEST),
            (TransferError::Expired, StatusCode::BAD_REQUEST),
            (TransferError::CodeMismatch, StatusCode::UNAUTHORIZED),
            (TransferError::DestinationNotFound, StatusCode::NOT_FOUND),
            (TransferError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.status_code(), status, "{err:?}");
        }
    }

    #[test]
    fn challenge_errors_map_to_transfer_errors() {
        assert_eq!(
            TransferError::from(ChallengeError::NotFound),
            TransferError::NotFound(MSG_SESSION_NOT_FOUND.to_string())
        );
        assert_eq!(
            TransferError::from(ChallengeError::Expired),
            TransferError::Expired
        );
        assert_eq!(
            TransferError::from(ChallengeError::CodeMismatch),
            TransferError::CodeMismatch
        );
    }

    #[test]
    fn ledger_errors_map_to_transfer_errors() {
        let err = TransferError::from(LedgerError::InsufficientFunds {
            account_id: "a1".to_string(),
            balance: rust_decimal::Decimal::ONE,
            requested: rust_decimal::Decimal::TEN,
        });
        assert_eq!(err, TransferError::InsufficientFunds);

        let err = TransferError::from(LedgerError::AccountNotFound("a1".to_string()));
        assert_eq!(err.to_string(), MSG_ACCOUNT_NOT_FOUND);
    }

    #[test]
    fn internal_detail_is_not_public() {
        let err = TransferError::Internal("redb commit error".to_string());
        assert!(!err.public_message().contains("redb"));
    }
}
