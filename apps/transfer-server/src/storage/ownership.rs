// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ownership enforcement for client-scoped resources.
//!
//! Accounts and beneficiaries belong to a banking client, not to the login
//! identity directly. Every lookup that feeds a transfer goes through these
//! checks. A resource owned by someone else is reported as not found so its
//! existence is never disclosed.

use super::{StorageError, StorageResult};

/// Trait for resources that have an owning client.
pub trait OwnedResource {
    /// Get the owning client's ID.
    fn owner_client_id(&self) -> &str;

    /// Human-readable name used in not-found messages.
    fn resource_label(&self) -> &'static str {
        "Resource"
    }
}

/// Trait for enforcing ownership on storage operations.
pub trait OwnershipEnforcer {
    /// Verify that the client owns this resource.
    ///
    /// # Errors
    /// Returns `StorageError::NotFound` if the client doesn't own the resource.
    fn verify_ownership(&self, client_id: &str) -> StorageResult<()>;
}

impl<T: OwnedResource> OwnershipEnforcer for T {
    fn verify_ownership(&self, client_id: &str) -> StorageResult<()> {
        if self.owner_client_id() == client_id {
            Ok(())
        } else {
            Err(StorageError::NotFound(format!(
                "{} not found for client",
                self.resource_label()
            )))
        }
    }
}

/// Ownership check chained onto a lookup result.
pub trait OwnershipCheck<T> {
    /// Verify ownership and return the resource if authorized.
    fn verify_owner(self, client_id: &str) -> StorageResult<T>;
}

impl<T: OwnedResource> OwnershipCheck<T> for StorageResult<T> {
    fn verify_owner(self, client_id: &str) -> StorageResult<T> {
        let resource = self?;
        resource.verify_ownership(client_id)?;
        Ok(resource)
    }
}

impl<T: OwnedResource> OwnershipCheck<T> for Option<T> {
    fn verify_owner(self, client_id: &str) -> StorageResult<T> {
        match self {
            Some(resource) => {
                resource.verify_ownership(client_id)?;
                Ok(resource)
            }
            None => Err(StorageError::NotFound("resource".to_string())),
        }
    }
}
