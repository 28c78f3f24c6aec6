// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Persistent state lives under a single data root:
//!
//! ```text
//! data/
//!   ledger.redb             # Accounts, clients, transfers (ACID)
//!   beneficiaries/
//!     {beneficiary_id}.json
//!   audit/
//!     {date}/events.jsonl   # Daily audit logs
//! ```
//!
//! ## Consistency
//!
//! - Balances and transfer records only change together, inside one
//!   [`LedgerUnit`].
//! - Beneficiaries and audit entries are plain files; individual writes are
//!   atomic and need no further locking.
//! - Ownership is enforced on every lookup that feeds a transfer.

pub mod audit;
pub mod fs;
pub mod ledger;
pub mod ownership;
pub mod paths;
pub mod repository;

pub use audit::{AuditEvent, AuditEventType, AuditRepository};
pub use fs::{FileStorage, StorageError, StorageResult};
pub use ledger::{
    ClientProfile, Ledger, LedgerError, LedgerResult, LedgerSeed, LedgerUnit, SeedReport,
    StoredAccount, StoredTransfer, TransferFilter,
};
pub use ownership::{OwnedResource, OwnershipCheck, OwnershipEnforcer};
pub use paths::StoragePaths;
pub use repository::{BeneficiaryRepository, StoredBeneficiary};
