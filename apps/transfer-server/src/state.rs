// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use jsonwebtoken::DecodingKey;

use crate::storage::{FileStorage, Ledger};
use crate::transfer::TransferService;

/// Token verification settings.
///
/// Without a decoding key, tokens are only accepted by `dev` builds.
#[derive(Clone, Default)]
pub struct AuthConfig {
    pub decoding_key: Option<DecodingKey>,
    pub issuer: Option<String>,
}

impl AuthConfig {
    /// Verify tokens with a shared HS256 secret.
    pub fn hs256(secret: &str, issuer: Option<String>) -> Self {
        Self {
            decoding_key: Some(DecodingKey::from_secret(secret.as_bytes())),
            issuer,
        }
    }

    /// Whether signatures are checked.
    pub fn is_verifying(&self) -> bool {
        self.decoding_key.is_some()
    }
}

#[derive(Clone)]
pub struct AppState {
    storage: Arc<FileStorage>,
    ledger: Arc<Ledger>,
    transfers: Arc<TransferService>,
    pub auth_config: AuthConfig,
}

impl AppState {
    pub fn new(transfers: TransferService, auth_config: AuthConfig) -> Self {
        Self {
            storage: transfers.storage().clone(),
            ledger: transfers.ledger().clone(),
            transfers: Arc::new(transfers),
            auth_config,
        }
    }

    /// Beneficiary and audit storage.
    pub fn storage(&self) -> Arc<FileStorage> {
        self.storage.clone()
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn transfers(&self) -> &TransferService {
        &self.transfers
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Arc;

    use tempfile::TempDir;

    use crate::auth::extractor::tests::TEST_SECRET;
    use crate::notifier::RecordingNotifier;
    use crate::transfer::service::tests::fixture;

    /// State over a seeded ledger, verifying tokens signed with the test secret.
    pub(crate) fn test_state() -> (AppState, TempDir) {
        let (state, _notifier, temp) = test_state_with_notifier();
        (state, temp)
    }

    pub(crate) fn test_state_with_notifier() -> (AppState, Arc<RecordingNotifier>, TempDir) {
        let fixture = fixture();
        let state = AppState::new(fixture.service, AuthConfig::hs256(TEST_SECRET, None));
        (state, fixture.notifier, fixture.temp)
    }

    #[test]
    fn state_shares_service_storage() {
        let (state, _temp) = test_state();
        assert!(Arc::ptr_eq(&state.storage(), state.transfers().storage()));
        assert!(state.auth_config.is_verifying());
        assert!(state.ledger().health_check().is_ok());
    }
}
