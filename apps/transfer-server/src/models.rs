// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! This module defines the domain enumerations and the request/response data
//! structures used by the REST API. All wire types derive `Serialize`,
//! `Deserialize`, and `ToSchema` for automatic JSON handling and OpenAPI
//! documentation. Field names on the wire are camelCase.
//!
//! ## Money
//!
//! Amounts are [`rust_decimal::Decimal`] everywhere. They are accepted as JSON
//! numbers or decimal strings and serialized as strings, so no value ever
//! passes through a float.
//!
//! ## Model Categories
//!
//! - **Domain enums**: settlement class, transfer status, account class
//! - **Transfers**: initiate/confirm requests and receipts
//! - **Beneficiaries**: create/update requests and envelopes
//! - **Accounts**: balances and transaction history

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use unicode_normalization::UnicodeNormalization;
use utoipa::{IntoParams, ToSchema};

/// Maximum number of fractional digits accepted on an amount.
pub const MAX_AMOUNT_SCALE: u32 = 2;

// =============================================================================
// Settlement Class
// =============================================================================

/// How a transfer to a beneficiary is processed.
///
/// Closed set: the settlement switch in the orchestrator is exhaustive over it.
/// The legacy labels of the web front-end are accepted on input.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum SettlementClass {
    /// Destination account is held at this institution; settled instantly.
    #[serde(alias = "meme banque", alias = "même banque")]
    SameInstitution,
    /// Another bank in the same country; settled by a later batch.
    #[serde(alias = "autre banque nationale")]
    DomesticOther,
    /// A foreign bank; settled by a later batch.
    #[serde(alias = "banque etrangere", alias = "banque étrangère")]
    International,
}

impl SettlementClass {
    /// Canonical wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SettlementClass::SameInstitution => "same-institution",
            SettlementClass::DomesticOther => "domestic-other",
            SettlementClass::International => "international",
        }
    }

    /// Short description used in audit text.
    pub fn describe(&self) -> &'static str {
        match self {
            SettlementClass::SameInstitution => "interne",
            SettlementClass::DomesticOther => "national",
            SettlementClass::International => "international",
        }
    }

    /// Message returned to the caller after a successful confirmation.
    pub fn status_message(&self) -> &'static str {
        match self {
            SettlementClass::SameInstitution => "Virement effectué instantanément",
            SettlementClass::DomesticOther => "Virement en cours de traitement (1-2 jours ouvrés)",
            SettlementClass::International => {
                "Virement international en cours de traitement (3-5 jours ouvrés)"
            }
        }
    }

    /// Expected settlement delay. Presentation only, never stored.
    pub fn settlement_time(&self) -> &'static str {
        match self {
            SettlementClass::SameInstitution => "Immédiat",
            SettlementClass::DomesticOther => "1-2 jours ouvrés",
            SettlementClass::International => "3-5 jours ouvrés",
        }
    }
}

impl fmt::Display for SettlementClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettlementClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded: String = s
            .trim()
            .nfkd()
            .filter(|c| c.is_ascii())
            .collect::<String>()
            .to_ascii_lowercase();
        match folded.as_str() {
            "same-institution" | "meme banque" => Ok(SettlementClass::SameInstitution),
            "domestic-other" | "autre banque nationale" => Ok(SettlementClass::DomesticOther),
            "international" | "banque etrangere" => Ok(SettlementClass::International),
            _ => Err(format!("Type de bénéficiaire invalide: {s}")),
        }
    }
}

// =============================================================================
// Transfer Status
// =============================================================================

/// Settlement status of a recorded transfer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Pending,
    Settled,
    Rejected,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Pending => "pending",
            TransferStatus::Settled => "settled",
            TransferStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for TransferStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(TransferStatus::Pending),
            "settled" => Ok(TransferStatus::Settled),
            "rejected" => Ok(TransferStatus::Rejected),
            other => Err(format!("Statut invalide: {other}")),
        }
    }
}

// =============================================================================
// Account Class
// =============================================================================

/// Kind of account holding funds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AccountClass {
    #[serde(alias = "courant")]
    Checking,
    #[serde(alias = "epargne", alias = "épargne")]
    Savings,
}

// =============================================================================
// Normalisation helpers
// =============================================================================

/// Canonical form of a routing identifier (IBAN): NFKC, no whitespace, upper-case.
pub fn normalize_routing_id(raw: &str) -> String {
    raw.nfkc()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

/// Canonical form of a currency code.
pub fn normalize_currency(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

/// Check that an amount is strictly positive with at most two decimals.
pub fn validate_amount(amount: Decimal) -> Result<Decimal, String> {
    if amount <= Decimal::ZERO {
        return Err("Le montant doit être positif".to_string());
    }
    let mut normalized = amount.normalize();
    if normalized.scale() > MAX_AMOUNT_SCALE {
        return Err("Le montant ne peut avoir plus de 2 décimales".to_string());
    }
    normalized.rescale(MAX_AMOUNT_SCALE);
    Ok(normalized)
}

/// Accept an identifier sent either as a JSON string or a JSON number.
fn de_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Int(i64),
        Uint(u64),
    }

    Ok(match Option::<RawId>::deserialize(deserializer)? {
        Some(RawId::Text(s)) => Some(s),
        Some(RawId::Int(n)) => Some(n.to_string()),
        Some(RawId::Uint(n)) => Some(n.to_string()),
        None => None,
    })
}

/// Trimmed, non-empty value of an optional text field.
pub fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

// =============================================================================
// Transfer Models
// =============================================================================

/// Request to start a transfer. Every field is checked by the orchestrator so
/// that a missing field yields a domain error rather than a decoding failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InitiateTransferRequest {
    /// Source account (must belong to the caller).
    #[serde(default, deserialize_with = "de_opt_id")]
    #[schema(value_type = Option<String>)]
    pub source_account_id: Option<String>,
    /// Saved beneficiary (must belong to the caller).
    #[serde(default, deserialize_with = "de_opt_id")]
    #[schema(value_type = Option<String>)]
    pub beneficiary_id: Option<String>,
    /// Amount, as a number or a decimal string.
    #[serde(default)]
    #[schema(value_type = Option<String>, example = "150.00")]
    pub amount: Option<Decimal>,
    /// ISO currency code; must match the source account.
    #[serde(default)]
    pub currency: Option<String>,
    /// Free-text reference shown on the statement.
    #[serde(default)]
    pub reference: Option<String>,
}

/// Response to a successful initiation. The code is never included.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InitiateTransferResponse {
    pub success: bool,
    pub message: String,
    /// Seconds until the code expires.
    pub expires_in: u64,
    /// Present when the code could not be delivered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Request to confirm the pending transfer with the delivered code.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmTransferRequest {
    #[serde(default, deserialize_with = "de_opt_id")]
    #[schema(value_type = Option<String>)]
    pub otp: Option<String>,
}

/// Outcome of a confirmed transfer.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransferReceipt {
    pub id: String,
    #[schema(value_type = String)]
    pub amount: Decimal,
    pub currency: String,
    /// Beneficiary display name at the time of transfer.
    pub beneficiary: String,
    pub beneficiary_bank: String,
    pub transfer_type: SettlementClass,
    pub reference: Option<String>,
    pub status: TransferStatus,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
    /// Expected settlement delay for this class.
    pub settlement_time: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmTransferResponse {
    pub success: bool,
    pub message: String,
    pub transaction: TransferReceipt,
}

// =============================================================================
// Beneficiary Models
// =============================================================================

/// Body for creating or replacing a beneficiary.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BeneficiaryRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub bank_name: Option<String>,
    #[serde(default)]
    pub account_number: Option<String>,
    #[serde(default)]
    pub rib: Option<String>,
    #[serde(default)]
    pub iban: Option<String>,
    /// Settlement class, canonical or legacy label.
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

/// Validated beneficiary fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeneficiaryFields {
    pub name: String,
    pub bank_name: String,
    pub account_number: Option<String>,
    pub rib: Option<String>,
    pub routing_id: String,
    pub settlement_class: SettlementClass,
}

impl BeneficiaryRequest {
    /// Validate required fields and normalise the routing identifier.
    pub fn validate(&self) -> Result<BeneficiaryFields, String> {
        let (Some(name), Some(bank_name), Some(iban), Some(kind)) = (
            non_blank(&self.name),
            non_blank(&self.bank_name),
            non_blank(&self.iban),
            non_blank(&self.kind),
        ) else {
            return Err("Nom, banque, IBAN et type sont requis".to_string());
        };

        let routing_id = normalize_routing_id(iban);
        if routing_id.is_empty() {
            return Err("IBAN invalide".to_string());
        }

        Ok(BeneficiaryFields {
            name: name.to_string(),
            bank_name: bank_name.to_string(),
            account_number: non_blank(&self.account_number).map(str::to_string),
            rib: non_blank(&self.rib).map(str::to_string),
            routing_id,
            settlement_class: kind.parse()?,
        })
    }
}

// =============================================================================
// Account Models
// =============================================================================

/// One of the caller's accounts.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    pub id: String,
    pub account_number: String,
    pub iban: String,
    pub currency: String,
    #[schema(value_type = String)]
    pub balance: Decimal,
    pub account_type: AccountClass,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AccountsResponse {
    pub success: bool,
    pub accounts: Vec<AccountSummary>,
}

/// Filters for the transaction history.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query, rename_all = "camelCase")]
pub struct HistoryQuery {
    /// Maximum rows (default 20, max 200).
    pub limit: Option<usize>,
    /// `pending`, `settled`, `rejected` or `all`.
    pub status: Option<String>,
    /// Inclusive lower bound on the creation date (YYYY-MM-DD).
    pub start_date: Option<NaiveDate>,
    /// Inclusive upper bound on the creation date (YYYY-MM-DD).
    pub end_date: Option<NaiveDate>,
}

/// A recorded transfer, seen from the caller's side.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    pub source_account_id: String,
    pub destination_account_id: Option<String>,
    pub beneficiary_id: String,
    pub beneficiary: String,
    pub beneficiary_bank: String,
    pub transfer_type: SettlementClass,
    #[schema(value_type = String)]
    pub amount: Decimal,
    pub currency: String,
    pub status: TransferStatus,
    pub reference: Option<String>,
    /// Always `debit` for transfers the caller initiated.
    pub direction: String,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HistoryResponse {
    pub success: bool,
    pub transactions: Vec<HistoryEntry>,
}
