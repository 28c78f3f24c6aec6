// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Path constants and utilities for the on-disk storage layout.

use std::path::{Path, PathBuf};

/// Default base directory for all persistent storage.
pub const DATA_ROOT: &str = "./data";

/// Storage path utilities.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self::new(DATA_ROOT)
    }
}

impl StoragePaths {
    /// Create a new StoragePaths with a custom root (useful for testing).
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory for all data.
    pub fn root(&self) -> &Path {
        &self.root
    }

    // ========== Ledger ==========

    /// Path to the embedded ledger database.
    pub fn ledger_db(&self) -> PathBuf {
        self.root.join("ledger.redb")
    }

    // ========== Beneficiary Paths ==========

    /// Directory containing all beneficiaries.
    pub fn beneficiaries_dir(&self) -> PathBuf {
        self.root.join("beneficiaries")
    }

    /// Path to a specific beneficiary file.
    pub fn beneficiary(&self, beneficiary_id: &str) -> PathBuf {
        self.beneficiaries_dir()
            .join(format!("{beneficiary_id}.json"))
    }

    // ========== Audit Log Paths ==========

    /// Directory containing audit logs.
    pub fn audit_dir(&self) -> PathBuf {
        self.root.join("audit")
    }

    /// Directory for a specific date's audit logs.
    pub fn audit_date_dir(&self, date: &str) -> PathBuf {
        self.audit_dir().join(date)
    }

    /// Path to a daily audit events file (JSONL format).
    pub fn audit_events_file(&self, date: &str) -> PathBuf {
        self.audit_date_dir(date).join("events.jsonl")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_paths_use_data_root() {
        let paths = StoragePaths::default();
        assert_eq!(paths.root(), Path::new("./data"));
    }

    #[test]
    fn custom_root_for_testing() {
        let paths = StoragePaths::new("/tmp/test-data");
        assert_eq!(paths.root(), Path::new("/tmp/test-data"));
        assert_eq!(
            paths.ledger_db(),
            PathBuf::from("/tmp/test-data/ledger.redb")
        );
    }

    #[test]
    fn beneficiary_paths_are_correct() {
        let paths = StoragePaths::new("/data");
        assert_eq!(paths.beneficiaries_dir(), PathBuf::from("/data/beneficiaries"));
        assert_eq!(
            paths.beneficiary("bn-123"),
            PathBuf::from("/data/beneficiaries/bn-123.json")
        );
    }

    #[test]
    fn audit_paths_are_correct() {
        let paths = StoragePaths::new("/data");
        assert_eq!(paths.audit_dir(), PathBuf::from("/data/audit"));
        assert_eq!(
            paths.audit_events_file("2026-01-31"),
            PathBuf::from("/data/audit/2026-01-31/events.jsonl")
        );
    }
}
