// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ledger store backed by redb (pure Rust, ACID).
//!
//! The ledger is the only authority for balances. Every balance mutation
//! happens inside a [`LedgerUnit`], which wraps one redb write transaction
//! together with the transfer record it produces. redb admits a single
//! writer, so opening a unit locks every account until the unit commits or
//! is dropped. Dropping a unit without committing discards all its writes.
//!
//! ## Table Layout
//!
//! - `clients`: client_id → serialized ClientProfile
//! - `user_clients`: user_id → client_id
//! - `accounts`: account_id → serialized StoredAccount
//! - `routing_index`: normalised routing id → account_id
//! - `transfers`: transfer_id → serialized StoredTransfer
//! - `account_transfer_index`: composite key (account|!timestamp|transfer_id) → direction

use std::path::Path;

use chrono::{DateTime, Utc};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{normalize_currency, normalize_routing_id, AccountClass, SettlementClass, TransferStatus};

use super::OwnedResource;

// =============================================================================
// Table Definitions
// =============================================================================

const CLIENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("clients");

const USER_CLIENTS: TableDefinition<&str, &str> = TableDefinition::new("user_clients");

/// Primary table: account_id → serialized StoredAccount (JSON bytes).
const ACCOUNTS: TableDefinition<&str, &[u8]> = TableDefinition::new("accounts");

/// Map: normalised routing identifier → account_id.
const ROUTING_INDEX: TableDefinition<&str, &str> = TableDefinition::new("routing_index");

/// Primary table: transfer_id → serialized StoredTransfer (JSON bytes).
const TRANSFERS: TableDefinition<&str, &[u8]> = TableDefinition::new("transfers");

/// Index: composite key → direction.
/// Key format: `account_id|!timestamp_be|transfer_id` for newest-first range scans.
const ACCOUNT_TRANSFER_INDEX: TableDefinition<&[u8], &str> =
    TableDefinition::new("account_transfer_index");

const DIRECTION_DEBIT: &str = "debit";

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("account not found: {0}")]
    AccountNotFound(String),

    #[error("client not found: {0}")]
    ClientNotFound(String),

    #[error("insufficient funds on {account_id}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        account_id: String,
        balance: Decimal,
        requested: Decimal,
    },

    #[error("currency mismatch on {account_id}: account holds {expected}, got {actual}")]
    CurrencyMismatch {
        account_id: String,
        expected: String,
        actual: String,
    },

    #[error("balance overflow on {0}")]
    Overflow(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

// =============================================================================
// Records
// =============================================================================

/// Banking client linked to a login identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientProfile {
    pub client_id: String,
    /// Identity from the bearer token.
    pub user_id: String,
    /// Verified address that receives one-time codes.
    pub email: String,
    pub full_name: String,
}

/// One client's holding of funds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredAccount {
    pub account_id: String,
    pub client_id: String,
    pub account_number: String,
    /// IBAN-equivalent, stored normalised.
    pub routing_id: String,
    pub currency: String,
    pub balance: Decimal,
    #[serde(default = "default_account_class")]
    pub account_class: AccountClass,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn default_account_class() -> AccountClass {
    AccountClass::Checking
}

impl OwnedResource for StoredAccount {
    fn owner_client_id(&self) -> &str {
        &self.client_id
    }

    fn resource_label(&self) -> &'static str {
        "Account"
    }
}

/// Durable record of a money movement. Written once, inside the unit that
/// moves the money.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredTransfer {
    pub id: String,
    pub source_account_id: String,
    /// Internal destination; `None` when the money leaves the institution.
    pub destination_account_id: Option<String>,
    pub beneficiary_id: String,
    /// Beneficiary snapshot taken at confirmation time.
    pub beneficiary_name: String,
    pub beneficiary_bank: String,
    pub settlement_class: SettlementClass,
    pub amount: Decimal,
    pub currency: String,
    pub status: TransferStatus,
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

/// History filter. All bounds are inclusive.
#[derive(Debug, Clone)]
pub struct TransferFilter {
    pub status: Option<TransferStatus>,
    pub from: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: usize,
}

impl Default for TransferFilter {
    fn default() -> Self {
        Self {
            status: None,
            from: None,
            until: None,
            limit: 20,
        }
    }
}

impl TransferFilter {
    fn matches(&self, transfer: &StoredTransfer) -> bool {
        self.status.is_none_or(|s| transfer.status == s)
            && self.from.is_none_or(|from| transfer.created_at >= from)
            && self.until.is_none_or(|until| transfer.created_at <= until)
    }
}

/// Start-up data for clients and accounts, since onboarding happens elsewhere.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerSeed {
    #[serde(default)]
    pub clients: Vec<ClientProfile>,
    #[serde(default)]
    pub accounts: Vec<StoredAccount>,
}

impl LedgerSeed {
    /// Load a seed document from a JSON file.
    pub fn from_file(path: &Path) -> LedgerResult<Self> {
        let data = std::fs::read(path)?;
        Ok(serde_json::from_slice(&data)?)
    }
}

/// What a seed run actually inserted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub clients_added: usize,
    pub accounts_added: usize,
}

// =============================================================================
// Index Key Helpers
// =============================================================================

/// Build a composite key for the account_transfer_index table.
///
/// Format: `account_id | inverted_timestamp_be_bytes | transfer_id`
///
/// The inverted timestamp ensures newest-first ordering when scanning forward.
fn make_index_key(account_id: &str, created_at: DateTime<Utc>, transfer_id: &str) -> Vec<u8> {
    let mut key = make_prefix(account_id);
    key.extend_from_slice(&(!created_at.timestamp_micros() as u64).to_be_bytes());
    key.push(b'|');
    key.extend_from_slice(transfer_id.as_bytes());
    key
}

/// Build a prefix key for range scanning all transfers of an account.
///
/// The account id is length-prefixed so that no id is a key prefix of another.
fn make_prefix(account_id: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(4 + account_id.len() + 1 + 8 + 1 + 36);
    prefix.extend_from_slice(&(account_id.len() as u32).to_be_bytes());
    prefix.extend_from_slice(account_id.as_bytes());
    prefix.push(b'|');
    prefix
}

/// Upper bound for a prefix range scan.
fn make_prefix_end(account_id: &str) -> Vec<u8> {
    let mut end = make_prefix(account_id);
    end.extend_from_slice(&[0xFF; 20]);
    end
}

/// Extract the transfer id from a composite index key.
fn transfer_id_from_key(key: &[u8], prefix_len: usize) -> Option<&str> {
    // prefix | 8 timestamp bytes | '|' | id
    let start = prefix_len + 8 + 1;
    key.get(start..).and_then(|id| std::str::from_utf8(id).ok())
}

// =============================================================================
// Ledger
// =============================================================================

/// Embedded ACID ledger.
pub struct Ledger {
    db: Database,
}

impl Ledger {
    /// Open (or create) the ledger database at the given path.
    pub fn open(path: &Path) -> LedgerResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(CLIENTS)?;
            let _ = write_txn.open_table(USER_CLIENTS)?;
            let _ = write_txn.open_table(ACCOUNTS)?;
            let _ = write_txn.open_table(ROUTING_INDEX)?;
            let _ = write_txn.open_table(TRANSFERS)?;
            let _ = write_txn.open_table(ACCOUNT_TRANSFER_INDEX)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Cheap readiness probe: a read transaction over the accounts table.
    pub fn health_check(&self) -> LedgerResult<()> {
        let read_txn = self.db.begin_read()?;
        let _ = read_txn.open_table(ACCOUNTS)?;
        Ok(())
    }

    // =========================================================================
    // Clients
    // =========================================================================

    /// Register a client. Returns `false` if the client id already exists.
    pub fn register_client(&self, profile: &ClientProfile) -> LedgerResult<bool> {
        let json = serde_json::to_vec(profile)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut clients = write_txn.open_table(CLIENTS)?;
            if clients.get(profile.client_id.as_str())?.is_some() {
                return Ok(false);
            }
            let mut users = write_txn.open_table(USER_CLIENTS)?;
            if users.get(profile.user_id.as_str())?.is_some() {
                return Err(LedgerError::AlreadyExists(format!(
                    "user {} is already linked to a client",
                    profile.user_id
                )));
            }
            clients.insert(profile.client_id.as_str(), json.as_slice())?;
            users.insert(profile.user_id.as_str(), profile.client_id.as_str())?;
        }
        write_txn.commit()?;
        Ok(true)
    }

    /// Resolve the client linked to a login identity.
    pub fn client_for_user(&self, user_id: &str) -> LedgerResult<Option<ClientProfile>> {
        let read_txn = self.db.begin_read()?;
        let users = read_txn.open_table(USER_CLIENTS)?;
        let client_id = match users.get(user_id)? {
            Some(v) => v.value().to_string(),
            None => return Ok(None),
        };
        let clients = read_txn.open_table(CLIENTS)?;
        match clients.get(client_id.as_str())? {
            Some(v) => Ok(Some(serde_json::from_slice(v.value())?)),
            None => Ok(None),
        }
    }

    // =========================================================================
    // Accounts
    // =========================================================================

    /// Open an account. Returns `false` if the account id already exists.
    ///
    /// # Errors
    /// `AlreadyExists` if the routing identifier is held by another account,
    /// `ClientNotFound` if the owning client is unknown.
    pub fn open_account(&self, account: &StoredAccount) -> LedgerResult<bool> {
        let mut account = account.clone();
        account.routing_id = normalize_routing_id(&account.routing_id);
        account.currency = normalize_currency(&account.currency);
        let json = serde_json::to_vec(&account)?;

        let write_txn = self.db.begin_write()?;
        {
            let clients = write_txn.open_table(CLIENTS)?;
            if clients.get(account.client_id.as_str())?.is_none() {
                return Err(LedgerError::ClientNotFound(account.client_id));
            }

            let mut accounts = write_txn.open_table(ACCOUNTS)?;
            if accounts.get(account.account_id.as_str())?.is_some() {
                return Ok(false);
            }

            let mut routing = write_txn.open_table(ROUTING_INDEX)?;
            if routing.get(account.routing_id.as_str())?.is_some() {
                return Err(LedgerError::AlreadyExists(format!(
                    "routing id {}",
                    account.routing_id
                )));
            }

            accounts.insert(account.account_id.as_str(), json.as_slice())?;
            routing.insert(account.routing_id.as_str(), account.account_id.as_str())?;
        }
        write_txn.commit()?;
        Ok(true)
    }

    /// Look up an account by id.
    pub fn account(&self, account_id: &str) -> LedgerResult<Option<StoredAccount>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ACCOUNTS)?;
        match table.get(account_id)? {
            Some(v) => Ok(Some(serde_json::from_slice(v.value())?)),
            None => Ok(None),
        }
    }

    /// Look up an account the client owns. Foreign accounts are not found.
    pub fn account_owned(&self, account_id: &str, client_id: &str) -> LedgerResult<StoredAccount> {
        match self.account(account_id)? {
            Some(account) if account.owner_client_id() == client_id => Ok(account),
            _ => Err(LedgerError::AccountNotFound(account_id.to_string())),
        }
    }

    /// All accounts of a client, ordered by account number.
    pub fn list_accounts(&self, client_id: &str) -> LedgerResult<Vec<StoredAccount>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ACCOUNTS)?;

        let mut accounts = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            let account: StoredAccount = serde_json::from_slice(value.value())?;
            if account.client_id == client_id {
                accounts.push(account);
            }
        }
        accounts.sort_by(|a, b| a.account_number.cmp(&b.account_number));
        Ok(accounts)
    }

    /// Resolve a routing identifier to an internal account id.
    ///
    /// `None` means the destination is outside the institution.
    pub fn find_by_routing_id(&self, routing_id: &str) -> LedgerResult<Option<String>> {
        let routing_id = normalize_routing_id(routing_id);
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ROUTING_INDEX)?;
        Ok(table.get(routing_id.as_str())?.map(|v| v.value().to_string()))
    }

    // =========================================================================
    // Transfers
    // =========================================================================

    /// Look up a single transfer.
    pub fn get_transfer(&self, transfer_id: &str) -> LedgerResult<Option<StoredTransfer>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TRANSFERS)?;
        match table.get(transfer_id)? {
            Some(v) => Ok(Some(serde_json::from_slice(v.value())?)),
            None => Ok(None),
        }
    }

    /// Transfers debited from `account_id`, newest first.
    pub fn list_transfers(
        &self,
        account_id: &str,
        filter: &TransferFilter,
    ) -> LedgerResult<Vec<StoredTransfer>> {
        let read_txn = self.db.begin_read()?;
        let idx_table = read_txn.open_table(ACCOUNT_TRANSFER_INDEX)?;
        let tx_table = read_txn.open_table(TRANSFERS)?;

        let prefix = make_prefix(account_id);
        let prefix_end = make_prefix_end(account_id);

        let mut results = Vec::new();
        for entry in idx_table.range(prefix.as_slice()..prefix_end.as_slice())? {
            let (key, _direction) = entry?;
            let key_bytes = key.value().to_vec();

            let Some(transfer_id) = transfer_id_from_key(&key_bytes, prefix.len()) else {
                continue;
            };
            if let Some(value) = tx_table.get(transfer_id)? {
                let transfer: StoredTransfer = serde_json::from_slice(value.value())?;
                if filter.matches(&transfer) {
                    results.push(transfer);
                }
            }

            if results.len() >= filter.limit {
                break;
            }
        }

        Ok(results)
    }

    /// Transfers debited from any of the client's accounts, newest first.
    pub fn list_client_transfers(
        &self,
        client_id: &str,
        filter: &TransferFilter,
    ) -> LedgerResult<Vec<StoredTransfer>> {
        let mut all = Vec::new();
        for account in self.list_accounts(client_id)? {
            all.extend(self.list_transfers(&account.account_id, filter)?);
        }
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all.truncate(filter.limit);
        Ok(all)
    }

    // =========================================================================
    // Seeding
    // =========================================================================

    /// Insert seed clients and accounts, skipping those already present.
    pub fn seed(&self, seed: &LedgerSeed) -> LedgerResult<SeedReport> {
        let mut report = SeedReport::default();
        for client in &seed.clients {
            if self.register_client(client)? {
                report.clients_added += 1;
            }
        }
        for account in &seed.accounts {
            if self.open_account(account)? {
                report.accounts_added += 1;
            }
        }
        Ok(report)
    }

    // =========================================================================
    // Atomic units
    // =========================================================================

    /// Begin an atomic unit. Blocks while another unit is open.
    ///
    /// Must not be called from an async task directly; run it on a blocking
    /// thread.
    pub fn begin_unit(&self) -> LedgerResult<LedgerUnit> {
        Ok(LedgerUnit {
            txn: self.db.begin_write()?,
        })
    }
}

// =============================================================================
// LedgerUnit
// =============================================================================

/// One all-or-nothing group of ledger writes.
///
/// Holds the ledger's exclusive write lock from creation until [`commit`] or
/// drop. Reads inside the unit observe its own uncommitted writes.
///
/// [`commit`]: LedgerUnit::commit
pub struct LedgerUnit {
    txn: WriteTransaction,
}

impl LedgerUnit {
    fn load_account(&self, account_id: &str) -> LedgerResult<StoredAccount> {
        let table = self.txn.open_table(ACCOUNTS)?;
        let bytes = {
            let value = table
                .get(account_id)?
                .ok_or_else(|| LedgerError::AccountNotFound(account_id.to_string()))?;
            value.value().to_vec()
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn store_account(&self, account: &StoredAccount) -> LedgerResult<()> {
        let json = serde_json::to_vec(account)?;
        let mut table = self.txn.open_table(ACCOUNTS)?;
        table.insert(account.account_id.as_str(), json.as_slice())?;
        Ok(())
    }

    /// Read an account the client owns, under the unit's lock.
    ///
    /// # Errors
    /// `AccountNotFound` if the account is absent or owned by another client.
    pub fn balance_for_update(
        &self,
        account_id: &str,
        client_id: &str,
    ) -> LedgerResult<StoredAccount> {
        match self.load_account(account_id) {
            Ok(account) if account.owner_client_id() == client_id => Ok(account),
            Ok(_) => Err(LedgerError::AccountNotFound(account_id.to_string())),
            Err(e) => Err(e),
        }
    }

    /// Resolve a routing identifier inside the unit.
    pub fn find_by_routing_id(&self, routing_id: &str) -> LedgerResult<Option<String>> {
        let routing_id = normalize_routing_id(routing_id);
        let table = self.txn.open_table(ROUTING_INDEX)?;
        let found = table.get(routing_id.as_str())?.map(|v| v.value().to_string());
        Ok(found)
    }

    /// Decrease a balance. The balance never goes negative.
    pub fn debit(
        &self,
        account_id: &str,
        amount: Decimal,
        currency: &str,
    ) -> LedgerResult<StoredAccount> {
        let mut account = self.load_account(account_id)?;
        ensure_currency(&account, currency)?;

        if account.balance < amount {
            return Err(LedgerError::InsufficientFunds {
                account_id: account.account_id,
                balance: account.balance,
                requested: amount,
            });
        }
        account.balance -= amount;

        self.store_account(&account)?;
        Ok(account)
    }

    /// Increase a balance.
    pub fn credit(
        &self,
        account_id: &str,
        amount: Decimal,
        currency: &str,
    ) -> LedgerResult<StoredAccount> {
        let mut account = self.load_account(account_id)?;
        ensure_currency(&account, currency)?;

        account.balance = account
            .balance
            .checked_add(amount)
            .ok_or_else(|| LedgerError::Overflow(account.account_id.clone()))?;

        self.store_account(&account)?;
        Ok(account)
    }

    /// Record a transfer and index it under its source account.
    pub fn insert_transfer(&self, transfer: &StoredTransfer) -> LedgerResult<()> {
        let json = serde_json::to_vec(transfer)?;

        let mut tx_table = self.txn.open_table(TRANSFERS)?;
        if tx_table.get(transfer.id.as_str())?.is_some() {
            return Err(LedgerError::AlreadyExists(format!("transfer {}", transfer.id)));
        }
        tx_table.insert(transfer.id.as_str(), json.as_slice())?;

        let mut idx_table = self.txn.open_table(ACCOUNT_TRANSFER_INDEX)?;
        let key = make_index_key(&transfer.source_account_id, transfer.created_at, &transfer.id);
        idx_table.insert(key.as_slice(), DIRECTION_DEBIT)?;
        Ok(())
    }

    /// Make every write of the unit durable and release the lock.
    pub fn commit(self) -> LedgerResult<()> {
        self.txn.commit()?;
        Ok(())
    }

    /// Discard every write of the unit and release the lock.
    pub fn rollback(self) -> LedgerResult<()> {
        self.txn.abort()?;
        Ok(())
    }
}

fn ensure_currency(account: &StoredAccount, currency: &str) -> LedgerResult<()> {
    if account.currency.eq_ignore_ascii_case(currency) {
        Ok(())
    } else {
        Err(LedgerError::CurrencyMismatch {
            account_id: account.account_id.clone(),
            expected: account.currency.clone(),
            actual: currency.to_string(),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::TempDir;

    pub(crate) fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    pub(crate) fn client(id: &str, user: &str) -> ClientProfile {
        ClientProfile {
            client_id: id.to_string(),
            user_id: user.to_string(),
            email: format!("{user}@example.test"),
            full_name: format!("Client {id}"),
        }
    }

    pub(crate) fn account(id: &str, client_id: &str, routing: &str, balance: &str) -> StoredAccount {
        StoredAccount {
            account_id: id.to_string(),
            client_id: client_id.to_string(),
            account_number: format!("N-{id}"),
            routing_id: routing.to_string(),
            currency: "EUR".to_string(),
            balance: dec(balance),
            account_class: AccountClass::Checking,
            created_at: Utc::now(),
        }
    }

    fn transfer(id: &str, source: &str, amount: &str, status: TransferStatus) -> StoredTransfer {
        StoredTransfer {
            id: id.to_string(),
            source_account_id: source.to_string(),
            destination_account_id: None,
            beneficiary_id: "bn-1".to_string(),
            beneficiary_name: "Alice".to_string(),
            beneficiary_bank: "BNP".to_string(),
            settlement_class: SettlementClass::DomesticOther,
            amount: dec(amount),
            currency: "EUR".to_string(),
            status,
            reference: None,
            created_at: Utc::now(),
            settled_at: None,
        }
    }

    fn setup() -> (TempDir, Ledger) {
        let temp = TempDir::new().unwrap();
        let ledger = Ledger::open(&temp.path().join("ledger.redb")).unwrap();
        ledger
            .seed(&LedgerSeed {
                clients: vec![client("c1", "u1"), client("c2", "u2")],
                accounts: vec![
                    account("a1", "c1", "FR76 0001", "1000.00"),
                    account("a2", "c2", "FR76 0002", "0.00"),
                ],
            })
            .unwrap();
        (temp, ledger)
    }

    #[test]
    fn seed_is_idempotent() {
        let (_temp, ledger) = setup();
        let report = ledger
            .seed(&LedgerSeed {
                clients: vec![client("c1", "u1")],
                accounts: vec![account("a1", "c1", "FR76 0001", "5.00")],
            })
            .unwrap();
        assert_eq!(report, SeedReport::default());
        assert_eq!(ledger.account("a1").unwrap().unwrap().balance, dec("1000.00"));
    }

    #[test]
    fn client_resolution_and_routing_lookup() {
        let (_temp, ledger) = setup();
        assert_eq!(ledger.client_for_user("u2").unwrap().unwrap().client_id, "c2");
        assert!(ledger.client_for_user("ghost").unwrap().is_none());

        assert_eq!(
            ledger.find_by_routing_id("fr760002").unwrap().as_deref(),
            Some("a2")
        );
        assert!(ledger.find_by_routing_id("DE00").unwrap().is_none());
    }

    #[test]
    fn duplicate_routing_id_is_rejected() {
        let (_temp, ledger) = setup();
        let result = ledger.open_account(&account("a3", "c1", "fr76 0001", "0"));
        assert!(matches!(result, Err(LedgerError::AlreadyExists(_))));
    }

    #[test]
    fn balance_for_update_enforces_ownership() {
        let (_temp, ledger) = setup();
        let unit = ledger.begin_unit().unwrap();
        assert!(unit.balance_for_update("a1", "c1").is_ok());
        assert!(matches!(
            unit.balance_for_update("a1", "c2"),
            Err(LedgerError::AccountNotFound(_))
        ));
        assert!(matches!(
            unit.balance_for_update("missing", "c1"),
            Err(LedgerError::AccountNotFound(_))
        ));
        unit.rollback().unwrap();
    }

    #[test]
    fn debit_credit_and_commit() {
        let (_temp, ledger) = setup();
        let unit = ledger.begin_unit().unwrap();
        let source = unit.debit("a1", dec("250.50"), "EUR").unwrap();
        assert_eq!(source.balance, dec("749.50"));
        unit.credit("a2", dec("250.50"), "eur").unwrap();
        unit.insert_transfer(&transfer("t1", "a1", "250.50", TransferStatus::Settled))
            .unwrap();
        unit.commit().unwrap();

        assert_eq!(ledger.account("a1").unwrap().unwrap().balance, dec("749.50"));
        assert_eq!(ledger.account("a2").unwrap().unwrap().balance, dec("250.50"));
        assert!(ledger.get_transfer("t1").unwrap().is_some());
    }

    #[test]
    fn debit_never_goes_negative() {
        let (_temp, ledger) = setup();
        let unit = ledger.begin_unit().unwrap();
        let result = unit.debit("a1", dec("1000.01"), "EUR");
        assert!(matches!(result, Err(LedgerError::InsufficientFunds { .. })));
        // Exactly the balance is allowed.
        assert_eq!(unit.debit("a1", dec("1000.00"), "EUR").unwrap().balance, Decimal::ZERO);
    }

    #[test]
    fn currency_mismatch_is_rejected() {
        let (_temp, ledger) = setup();
        let unit = ledger.begin_unit().unwrap();
        assert!(matches!(
            unit.credit("a2", dec("1"), "USD"),
            Err(LedgerError::CurrencyMismatch { .. })
        ));
    }

    #[test]
    fn dropped_unit_leaves_no_trace() {
        let (_temp, ledger) = setup();
        {
            let unit = ledger.begin_unit().unwrap();
            unit.debit("a1", dec("100"), "EUR").unwrap();
            unit.insert_transfer(&transfer("t-lost", "a1", "100", TransferStatus::Pending))
                .unwrap();
            // no commit
        }
        assert_eq!(ledger.account("a1").unwrap().unwrap().balance, dec("1000.00"));
        assert!(ledger.get_transfer("t-lost").unwrap().is_none());

        let unit = ledger.begin_unit().unwrap();
        unit.debit("a1", dec("100"), "EUR").unwrap();
        unit.rollback().unwrap();
        assert_eq!(ledger.account("a1").unwrap().unwrap().balance, dec("1000.00"));
    }

    #[test]
    fn list_transfers_newest_first_with_filters() {
        let (_temp, ledger) = setup();
        let unit = ledger.begin_unit().unwrap();
        let mut old = transfer("t-old", "a1", "10", TransferStatus::Pending);
        old.created_at = Utc::now() - chrono::Duration::days(3);
        let new = transfer("t-new", "a1", "20", TransferStatus::Settled);
        unit.insert_transfer(&old).unwrap();
        unit.insert_transfer(&new).unwrap();
        unit.insert_transfer(&transfer("t-other", "a2", "5", TransferStatus::Pending))
            .unwrap();
        unit.commit().unwrap();

        let all = ledger.list_transfers("a1", &TransferFilter::default()).unwrap();
        let ids: Vec<_> = all.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["t-new", "t-old"]);

        let pending = ledger
            .list_transfers(
                "a1",
                &TransferFilter {
                    status: Some(TransferStatus::Pending),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "t-old");

        let recent = ledger
            .list_client_transfers(
                "c1",
                &TransferFilter {
                    from: Some(Utc::now() - chrono::Duration::days(1)),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, "t-new");
    }

    #[test]
    fn unit_resolves_routing_ids() {
        let (_temp, ledger) = setup();
        let unit = ledger.begin_unit().unwrap();
        assert_eq!(unit.find_by_routing_id("fr76 0002").unwrap().as_deref(), Some("a2"));
        assert!(unit.find_by_routing_id("DE00").unwrap().is_none());
        unit.rollback().unwrap();
    }

    #[test]
    fn account_ids_sharing_a_prefix_keep_separate_histories() {
        let (_temp, ledger) = setup();
        ledger
            .open_account(&account("a1|x", "c1", "FR76 0009", "50.00"))
            .unwrap();

        let unit = ledger.begin_unit().unwrap();
        unit.insert_transfer(&transfer("t-a1", "a1", "10", TransferStatus::Pending))
            .unwrap();
        unit.insert_transfer(&transfer("t-a1x", "a1|x", "5", TransferStatus::Pending))
            .unwrap();
        unit.commit().unwrap();

        let a1 = ledger.list_transfers("a1", &TransferFilter::default()).unwrap();
        let ids: Vec<_> = a1.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["t-a1"]);

        let a1x = ledger.list_transfers("a1|x", &TransferFilter::default()).unwrap();
        let ids: Vec<_> = a1x.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["t-a1x"]);
    }
}
