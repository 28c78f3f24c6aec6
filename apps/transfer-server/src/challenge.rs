// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Challenge Store
//!
//! Holds the one-time code that guards a pending transfer. A challenge binds
//! the full transfer parameters to one user, lives for a fixed TTL, and is
//! consumed by the first matching verification.
//!
//! ## Rules
//!
//! - At most one live challenge per user: issuing replaces the previous one.
//! - A matching code removes the entry in the same critical section that
//!   compared it, so concurrent verifications of one code yield exactly one
//!   winner. Every other caller sees `NotFound`.
//! - A wrong code leaves the entry in place until it expires.
//! - An expired entry is removed by the verification that finds it.
//!
//! [`InMemoryChallengeStore`] is process-local. A deployment with several
//! instances needs a shared [`ChallengeStore`] that keeps verify-and-remove
//! atomic.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use ring::rand::{SecureRandom, SystemRandom};
use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Default challenge lifetime.
pub const DEFAULT_CHALLENGE_TTL: Duration = Duration::from_secs(300);

/// Default interval between hygiene sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Random bytes per code; rendered as twice as many hex characters.
const CODE_BYTES: usize = 4;

/// Transfer parameters bound to a challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferIntent {
    pub source_account_id: String,
    pub beneficiary_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub reference: Option<String>,
}

/// A one-time code. Never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct OtpCode(String);

impl OtpCode {
    /// Wrap an existing code (for stores that keep codes elsewhere).
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The code itself, for delivery to the user only.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for OtpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OtpCode(****)")
    }
}

/// Result of issuing a challenge.
#[derive(Debug, Clone)]
pub struct IssuedChallenge {
    pub code: OtpCode,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChallengeError {
    #[error("no pending challenge")]
    NotFound,

    #[error("challenge expired")]
    Expired,

    #[error("code mismatch")]
    CodeMismatch,

    #[error("challenge store failure: {0}")]
    Internal(String),
}

/// Ephemeral, single-use, per-user challenge storage.
#[async_trait]
pub trait ChallengeStore: Send + Sync {
    /// Replace any challenge of `user_id` with a fresh one bound to `intent`.
    async fn issue(
        &self,
        user_id: &str,
        intent: TransferIntent,
        ttl: Duration,
    ) -> Result<IssuedChallenge, ChallengeError>;

    /// Consume the challenge of `user_id` if `code` matches and it is live.
    async fn verify(&self, user_id: &str, code: &str) -> Result<TransferIntent, ChallengeError>;

    /// Drop every expired challenge. Returns how many were removed.
    async fn purge_expired(&self) -> usize;
}

#[derive(Debug)]
struct PendingChallenge {
    code: OtpCode,
    intent: TransferIntent,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

/// Process-local challenge store on a sharded concurrent map.
pub struct InMemoryChallengeStore {
    entries: DashMap<String, PendingChallenge>,
    rng: SystemRandom,
}

impl Default for InMemoryChallengeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryChallengeStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            rng: SystemRandom::new(),
        }
    }

    /// Number of stored challenges, live or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn generate_code(&self) -> Result<OtpCode, ChallengeError> {
        let mut bytes = [0u8; CODE_BYTES];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| ChallengeError::Internal("random source unavailable".to_string()))?;
        Ok(OtpCode(
            bytes.iter().map(|b| format!("{b:02X}")).collect(),
        ))
    }
}

#[async_trait]
impl ChallengeStore for InMemoryChallengeStore {
    async fn issue(
        &self,
        user_id: &str,
        intent: TransferIntent,
        ttl: Duration,
    ) -> Result<IssuedChallenge, ChallengeError> {
        let code = self.generate_code()?;
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|_| ChallengeError::Internal("challenge TTL out of range".to_string()))?;
        let created_at = Utc::now();
        let expires_at = created_at + ttl;

        let replaced = self
            .entries
            .insert(
                user_id.to_string(),
                PendingChallenge {
                    code: code.clone(),
                    intent,
                    created_at,
                    expires_at,
                },
            )
            .is_some();
        debug!(user_id = %user_id, replaced, "Challenge issued");

        Ok(IssuedChallenge { code, expires_at })
    }

    async fn verify(&self, user_id: &str, code: &str) -> Result<TransferIntent, ChallengeError> {
        let now = Utc::now();

        // The entry guard holds the shard lock: compare and remove are one step.
        match self.entries.entry(user_id.to_string()) {
            Entry::Vacant(_) => Err(ChallengeError::NotFound),
            Entry::Occupied(entry) => {
                if now >= entry.get().expires_at {
                    entry.remove();
                    return Err(ChallengeError::Expired);
                }
                if !codes_match(entry.get().code.expose(), code) {
                    return Err(ChallengeError::CodeMismatch);
                }
                let consumed = entry.remove();
                debug!(
                    user_id = %user_id,
                    age_ms = (now - consumed.created_at).num_milliseconds(),
                    "Challenge consumed"
                );
                Ok(consumed.intent)
            }
        }
    }

    async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.entries.len();
        self.entries.retain(|_, challenge| now < challenge.expires_at);
        before.saturating_sub(self.entries.len())
    }
}

/// Case-insensitive comparison in time independent of where the codes differ.
fn codes_match(expected: &str, supplied: &str) -> bool {
    let supplied = supplied.trim().to_ascii_uppercase();
    let (a, b) = (expected.as_bytes(), supplied.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

// =============================================================================
// Sweeper
// =============================================================================

/// Background task that drops expired challenges.
///
/// Correctness never depends on it: expiry is also checked on every verify.
pub struct ChallengeSweeper {
    store: Arc<dyn ChallengeStore>,
    interval: Duration,
}

impl ChallengeSweeper {
    pub fn new(store: Arc<dyn ChallengeStore>) -> Self {
        Self {
            store,
            interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run the sweep loop until the cancellation token is triggered.
    ///
    /// Should be spawned as a background task:
    /// ```rust,ignore
    /// tokio::spawn(sweeper.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Challenge sweeper starting"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Challenge sweeper shutting down");
                    return;
                }
            }

            let removed = self.store.purge_expired().await;
            if removed > 0 {
                info!(removed, "Challenge sweeper: purged expired challenges");
            }
        }
    }
}
