//! Repository Façade (spec §4.9): ownership-scoped relational access.
//! Every method takes the owning `userId` explicitly and must reject
//! mutation of rows it doesn't own. Returns typed records, never raw
//! driver rows; storage failures surface as `StorageError`.
//!
//! Grounded on the teacher's `hledger.rs` in spirit only (it owns access to
//! the in-memory posting arena behind a small set of methods); the actual
//! shape here — an async trait over owned DTOs — is drawn from
//! `ibank-service`'s repository layer, since the teacher has no persistence
//! boundary of its own.

pub mod postgres;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::model::{
    Account, Category, CategoryRule, Id, ImportBatch, ImportEvent, ImportSource, LedgerEntry,
};

#[async_trait]
pub trait Repo: Send + Sync {
    async fn find_accounts(&self, user_id: Id) -> Result<Vec<Account>, StorageError>;
    async fn find_account(&self, user_id: Id, account_id: Id) -> Result<Option<Account>, StorageError>;
    async fn insert_account(&self, account: &Account) -> Result<(), StorageError>;

    async fn find_categories(&self, user_id: Id) -> Result<Vec<Category>, StorageError>;

    async fn find_enabled_rules(&self, user_id: Id) -> Result<Vec<CategoryRule>, StorageError>;
    async fn insert_rule(&self, rule: &CategoryRule) -> Result<(), StorageError>;

    async fn find_import_source(
        &self,
        user_id: Id,
        file_hash: &str,
    ) -> Result<Option<ImportSource>, StorageError>;
    async fn insert_import_source(&self, source: &ImportSource) -> Result<(), StorageError>;

    /// Inserts the entry if `(userId, importedHash)` is unclaimed; returns
    /// `false` without inserting when it's already present (spec §4.8).
    async fn insert_entry_if_absent(&self, entry: &LedgerEntry) -> Result<bool, StorageError>;

    /// Entries within the window used by the transfer matcher (spec §4.7),
    /// scoped to the user and excluding entries already linked to a
    /// transfer group.
    async fn find_unlinked_entries_in_window(
        &self,
        user_id: Id,
        window_start: chrono::NaiveDate,
        window_end: chrono::NaiveDate,
    ) -> Result<Vec<LedgerEntry>, StorageError>;

    async fn link_transfer_pair(
        &self,
        outgoing_id: Id,
        incoming_id: Id,
        transfer_group_id: Id,
    ) -> Result<(), StorageError>;

    async fn insert_import_batch(&self, batch: &ImportBatch) -> Result<(), StorageError>;

    /// Most recent import batches for the user, newest first (spec §6
    /// `GET /imports`).
    async fn find_recent_import_batches(
        &self,
        user_id: Id,
        limit: i64,
    ) -> Result<Vec<ImportBatch>, StorageError>;

    async fn append_event(&self, event: &ImportEvent) -> Result<(), StorageError>;

    /// Whether a parse-error event with the same `{userId, sourceType,
    /// fileName, errorCode}` was recorded within the last 15 seconds
    /// (spec §4.10 dedup window).
    async fn recent_duplicate_event(
        &self,
        user_id: Id,
        source_type: crate::model::SourceType,
        file_name: &str,
        error_code: &str,
    ) -> Result<bool, StorageError>;
}
