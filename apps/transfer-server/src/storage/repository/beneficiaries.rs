// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Beneficiary directory.
//!
//! Beneficiaries are saved transfer destinations owned by one client.
//! Each beneficiary is stored as a separate JSON file under `beneficiaries/`.
//! The routing identifier (IBAN) is unique per owning client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{BeneficiaryFields, SettlementClass};

use super::super::{FileStorage, OwnershipCheck, StorageError, StorageResult};

/// Beneficiary stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StoredBeneficiary {
    /// Unique beneficiary identifier (UUID)
    pub id: String,
    /// Owning client
    pub client_id: String,
    /// Display name
    pub name: String,
    pub bank_name: String,
    pub account_number: Option<String>,
    pub rib: Option<String>,
    /// Normalised routing identifier
    #[serde(rename = "iban")]
    pub routing_id: String,
    #[serde(rename = "type")]
    pub settlement_class: SettlementClass,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl super::super::OwnedResource for StoredBeneficiary {
    fn owner_client_id(&self) -> &str {
        &self.client_id
    }

    fn resource_label(&self) -> &'static str {
        "Beneficiary"
    }
}

impl StoredBeneficiary {
    /// Build a new beneficiary for `client_id` from validated fields.
    pub fn new(client_id: &str, fields: BeneficiaryFields) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            client_id: client_id.to_string(),
            name: fields.name,
            bank_name: fields.bank_name,
            account_number: fields.account_number,
            rib: fields.rib,
            routing_id: fields.routing_id,
            settlement_class: fields.settlement_class,
            created_at: now,
            updated_at: now,
        }
    }

    /// Copy of this beneficiary with its editable fields replaced.
    pub fn with_fields(&self, fields: BeneficiaryFields) -> Self {
        Self {
            name: fields.name,
            bank_name: fields.bank_name,
            account_number: fields.account_number,
            rib: fields.rib,
            routing_id: fields.routing_id,
            settlement_class: fields.settlement_class,
            updated_at: Utc::now(),
            ..self.clone()
        }
    }
}

/// Repository for beneficiary operations.
pub struct BeneficiaryRepository<'a> {
    storage: &'a FileStorage,
}

impl<'a> BeneficiaryRepository<'a> {
    /// Create a new BeneficiaryRepository.
    pub fn new(storage: &'a FileStorage) -> Self {
        Self { storage }
    }

    /// Check if a beneficiary exists.
    pub fn exists(&self, beneficiary_id: &str) -> bool {
        is_safe_id(beneficiary_id)
            && self
                .storage
                .exists(self.storage.paths().beneficiary(beneficiary_id))
    }

    /// Get a beneficiary by ID.
    pub fn get(&self, beneficiary_id: &str) -> StorageResult<StoredBeneficiary> {
        if !self.exists(beneficiary_id) {
            return Err(StorageError::NotFound(format!("Beneficiary {beneficiary_id}")));
        }
        self.storage
            .read_json(self.storage.paths().beneficiary(beneficiary_id))
    }

    /// Get a beneficiary only if it belongs to `client_id`.
    ///
    /// A beneficiary owned by another client is reported as not found.
    pub fn find_owned(
        &self,
        beneficiary_id: &str,
        client_id: &str,
    ) -> StorageResult<StoredBeneficiary> {
        self.get(beneficiary_id).verify_owner(client_id)
    }

    /// Create a new beneficiary.
    ///
    /// # Errors
    /// `Conflict` if the client already has a beneficiary with the same
    /// routing identifier.
    pub fn create(&self, beneficiary: &StoredBeneficiary) -> StorageResult<()> {
        let beneficiary_id = &beneficiary.id;
        let _guard = self.storage.lock_writes()?;

        if self.exists(beneficiary_id) {
            return Err(StorageError::AlreadyExists(format!(
                "Beneficiary {beneficiary_id}"
            )));
        }
        self.ensure_unique_routing(beneficiary)?;

        self.storage
            .write_json(self.storage.paths().beneficiary(beneficiary_id), beneficiary)
    }

    /// Replace an existing beneficiary.
    ///
    /// # Errors
    /// `NotFound` if absent, `Conflict` if the new routing identifier is used
    /// by another of the client's beneficiaries.
    pub fn update(&self, beneficiary: &StoredBeneficiary) -> StorageResult<()> {
        let beneficiary_id = &beneficiary.id;
        let _guard = self.storage.lock_writes()?;

        if !self.exists(beneficiary_id) {
            return Err(StorageError::NotFound(format!("Beneficiary {beneficiary_id}")));
        }
        self.ensure_unique_routing(beneficiary)?;

        self.storage
            .write_json(self.storage.paths().beneficiary(beneficiary_id), beneficiary)
    }

    /// Delete a beneficiary. Recorded transfers keep their own snapshot.
    pub fn delete(&self, beneficiary_id: &str) -> StorageResult<()> {
        let _guard = self.storage.lock_writes()?;

        if !self.exists(beneficiary_id) {
            return Err(StorageError::NotFound(format!("Beneficiary {beneficiary_id}")));
        }

        self.storage
            .delete(self.storage.paths().beneficiary(beneficiary_id))
    }

    /// List all beneficiaries owned by a client, newest first.
    pub fn list_by_client(&self, client_id: &str) -> StorageResult<Vec<StoredBeneficiary>> {
        let beneficiary_ids = self
            .storage
            .list_files(self.storage.paths().beneficiaries_dir(), "json")?;

        let mut beneficiaries = Vec::new();
        for id in beneficiary_ids {
            match self.get(&id) {
                Ok(beneficiary) if beneficiary.client_id == client_id => {
                    beneficiaries.push(beneficiary)
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(beneficiary_id = %id, error = %e, "Skipping unreadable beneficiary");
                }
            }
        }

        beneficiaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(beneficiaries)
    }

    fn ensure_unique_routing(&self, candidate: &StoredBeneficiary) -> StorageResult<()> {
        let clash = self
            .list_by_client(&candidate.client_id)?
            .into_iter()
            .any(|b| b.id != candidate.id && b.routing_id == candidate.routing_id);

        if clash {
            return Err(StorageError::Conflict(
                "Ce bénéficiaire existe déjà".to_string(),
            ));
        }
        Ok(())
    }
}

/// Identifiers become file names; reject anything that could escape the directory.
fn is_safe_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
