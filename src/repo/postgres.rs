//! `sqlx`-backed `Repo` implementation against the schema in `migrations/`.
//! Uses the runtime query builder (`sqlx::query_as`) rather than the
//! compile-time `query!` macros, since this pipeline doesn't assume a live
//! database is reachable at build time.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::StorageError;
use crate::model::{
    Account, Category, CategoryRule, Id, ImportBatch, ImportEvent, ImportSource, LedgerEntry,
    SourceType,
};
use crate::normalize::normalize_for_match;

use super::Repo;

pub struct PostgresRepo {
    pool: PgPool,
}

impl PostgresRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn storage_err(context: &str, e: sqlx::Error) -> StorageError {
    StorageError::new(context, e)
}

#[async_trait]
impl Repo for PostgresRepo {
    async fn find_accounts(&self, user_id: Id) -> Result<Vec<Account>, StorageError> {
        sqlx::query_as::<_, Account>(
            "SELECT id, user_id, account_type, name, institution, currency, parent_account_id \
             FROM accounts WHERE user_id = $1 ORDER BY name",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage_err("find_accounts", e))
    }

    async fn find_account(&self, user_id: Id, account_id: Id) -> Result<Option<Account>, StorageError> {
        sqlx::query_as::<_, Account>(
            "SELECT id, user_id, account_type, name, institution, currency, parent_account_id \
             FROM accounts WHERE user_id = $1 AND id = $2",
        )
        .bind(user_id)
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| storage_err("find_account", e))
    }

    async fn insert_account(&self, account: &Account) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO accounts (id, user_id, account_type, name, institution, currency, parent_account_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(account.id)
        .bind(account.user_id)
        .bind(account.account_type)
        .bind(&account.name)
        .bind(&account.institution)
        .bind(&account.currency)
        .bind(account.parent_account_id)
        .execute(&self.pool)
        .await
        .map_err(|e| storage_err("insert_account", e))?;
        Ok(())
    }

    async fn find_categories(&self, user_id: Id) -> Result<Vec<Category>, StorageError> {
        sqlx::query_as::<_, Category>(
            "SELECT id, user_id, name, color, icon, parent_id FROM categories WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage_err("find_categories", e))
    }

    async fn find_enabled_rules(&self, user_id: Id) -> Result<Vec<CategoryRule>, StorageError> {
        sqlx::query_as::<_, CategoryRule>(
            "SELECT id, user_id, name, priority, enabled, match_type, pattern, account_id, \
             min_amount_cents, max_amount_cents, category_id, created_seq \
             FROM category_rules WHERE user_id = $1 AND enabled = true \
             ORDER BY priority ASC, created_seq ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage_err("find_enabled_rules", e))
    }

    async fn insert_rule(&self, rule: &CategoryRule) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO category_rules (id, user_id, name, priority, enabled, match_type, pattern, \
             account_id, min_amount_cents, max_amount_cents, category_id, created_seq) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(rule.id)
        .bind(rule.user_id)
        .bind(&rule.name)
        .bind(rule.priority)
        .bind(rule.enabled)
        .bind(rule.match_type)
        .bind(&rule.pattern)
        .bind(rule.account_id)
        .bind(rule.min_amount_cents.map(|v| v as i64))
        .bind(rule.max_amount_cents.map(|v| v as i64))
        .bind(rule.category_id)
        .bind(rule.created_seq)
        .execute(&self.pool)
        .await
        .map_err(|e| storage_err("insert_rule", e))?;
        Ok(())
    }

    async fn find_import_source(
        &self,
        user_id: Id,
        file_hash: &str,
    ) -> Result<Option<ImportSource>, StorageError> {
        sqlx::query_as::<_, ImportSource>(
            "SELECT id, user_id, institution_id, kind, file_name, file_hash, created_at \
             FROM import_sources WHERE user_id = $1 AND file_hash = $2",
        )
        .bind(user_id)
        .bind(file_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| storage_err("find_import_source", e))
    }

    async fn insert_import_source(&self, source: &ImportSource) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO import_sources (id, user_id, institution_id, kind, file_name, file_hash, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(source.id)
        .bind(source.user_id)
        .bind(&source.institution_id)
        .bind(source.kind)
        .bind(&source.file_name)
        .bind(&source.file_hash)
        .bind(source.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| storage_err("insert_import_source", e))?;
        Ok(())
    }

    async fn insert_entry_if_absent(&self, entry: &LedgerEntry) -> Result<bool, StorageError> {
        let result = sqlx::query(
            "INSERT INTO transactions (id, user_id, account_id, category_id, import_batch_id, \
             posted_at, description, normalized_description, amount_cents, currency, entry_type, \
             direction, status, is_internal_transfer, imported_hash, transfer_group_id, \
             transfer_peer_id, transfer_from_account_id, transfer_to_account_id, external_id, \
             raw_json, created_at, updated_at) \
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19,$20,$21,$22,$23) \
             ON CONFLICT (user_id, imported_hash) WHERE imported_hash IS NOT NULL DO NOTHING",
        )
        .bind(entry.id)
        .bind(entry.user_id)
        .bind(entry.account_id)
        .bind(entry.category_id)
        .bind(entry.import_batch_id)
        .bind(entry.posted_at)
        .bind(&entry.description)
        .bind(&entry.normalized_description)
        .bind(entry.amount_cents)
        .bind(&entry.currency)
        .bind(entry.entry_type)
        .bind(entry.direction)
        .bind(entry.status)
        .bind(entry.is_internal_transfer)
        .bind(&entry.imported_hash)
        .bind(entry.transfer_group_id)
        .bind(entry.transfer_peer_id)
        .bind(entry.transfer_from_account_id)
        .bind(entry.transfer_to_account_id)
        .bind(&entry.external_id)
        .bind(&entry.raw_json)
        .bind(entry.created_at)
        .bind(entry.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| storage_err("insert_entry_if_absent", e))?;

        Ok(result.rows_affected() == 1)
    }

    async fn find_unlinked_entries_in_window(
        &self,
        user_id: Id,
        window_start: chrono::NaiveDate,
        window_end: chrono::NaiveDate,
    ) -> Result<Vec<LedgerEntry>, StorageError> {
        sqlx::query_as::<_, LedgerEntry>(
            "SELECT * FROM transactions WHERE user_id = $1 AND posted_at BETWEEN $2 AND $3 \
             AND transfer_group_id IS NULL",
        )
        .bind(user_id)
        .bind(window_start)
        .bind(window_end)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage_err("find_unlinked_entries_in_window", e))
    }

    async fn link_transfer_pair(
        &self,
        outgoing_id: Id,
        incoming_id: Id,
        transfer_group_id: Id,
    ) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(|e| storage_err("link_transfer_pair:begin", e))?;

        let (from_account_id, to_account_id): (Id, Id) = sqlx::query_as(
            "SELECT o.account_id, i.account_id FROM transactions o, transactions i \
             WHERE o.id = $1 AND i.id = $2",
        )
        .bind(outgoing_id)
        .bind(incoming_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| storage_err("link_transfer_pair:accounts", e))?;

        let (from_name, to_name): (String, String) = sqlx::query_as(
            "SELECT (SELECT name FROM accounts WHERE id = $1), (SELECT name FROM accounts WHERE id = $2)",
        )
        .bind(from_account_id)
        .bind(to_account_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| storage_err("link_transfer_pair:account_names", e))?;

        let description = format!("Transfer: {from_name} -> {to_name}");
        let normalized_description = format!(
            "TRANSFER: {} -> {}",
            normalize_for_match(&from_name),
            normalize_for_match(&to_name)
        );

        sqlx::query(
            "UPDATE transactions SET entry_type = 'transfer', is_internal_transfer = true, \
             transfer_group_id = $1, transfer_peer_id = $2, \
             transfer_from_account_id = $3, transfer_to_account_id = $4, \
             description = $5, normalized_description = $6 \
             WHERE id = $7",
        )
        .bind(transfer_group_id)
        .bind(incoming_id)
        .bind(from_account_id)
        .bind(to_account_id)
        .bind(&description)
        .bind(&normalized_description)
        .bind(outgoing_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| storage_err("link_transfer_pair:outgoing", e))?;

        sqlx::query(
            "UPDATE transactions SET entry_type = 'transfer', is_internal_transfer = true, \
             transfer_group_id = $1, transfer_peer_id = $2, \
             transfer_from_account_id = $3, transfer_to_account_id = $4, \
             description = $5, normalized_description = $6 \
             WHERE id = $7",
        )
        .bind(transfer_group_id)
        .bind(outgoing_id)
        .bind(from_account_id)
        .bind(to_account_id)
        .bind(&description)
        .bind(&normalized_description)
        .bind(incoming_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| storage_err("link_transfer_pair:incoming", e))?;

        tx.commit().await.map_err(|e| storage_err("link_transfer_pair:commit", e))?;
        Ok(())
    }

    async fn insert_import_batch(&self, batch: &ImportBatch) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO import_batches (id, user_id, source, file_name, mapping_json, \
             total_imported, total_skipped, imported_at) VALUES ($1,$2,$3,$4,$5,$6,$7,$8)",
        )
        .bind(batch.id)
        .bind(batch.user_id)
        .bind(batch.source)
        .bind(&batch.file_name)
        .bind(&batch.mapping_json)
        .bind(batch.total_imported)
        .bind(batch.total_skipped)
        .bind(batch.imported_at)
        .execute(&self.pool)
        .await
        .map_err(|e| storage_err("insert_import_batch", e))?;
        Ok(())
    }

    async fn find_recent_import_batches(
        &self,
        user_id: Id,
        limit: i64,
    ) -> Result<Vec<ImportBatch>, StorageError> {
        sqlx::query_as::<_, ImportBatch>(
            "SELECT id, user_id, source, file_name, mapping_json, total_imported, total_skipped, \
             imported_at FROM import_batches WHERE user_id = $1 ORDER BY imported_at DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage_err("find_recent_import_batches", e))
    }

    async fn append_event(&self, event: &ImportEvent) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO import_events (id, user_id, source_type, file_name, event, phase, error_code, \
             total_rows, valid_rows, ignored_rows, error_rows, imported, skipped, duplicates, \
             invalid_rows, transfer_created, card_payment_detected, card_payment_not_converted, \
             created_at) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19)",
        )
        .bind(event.id)
        .bind(event.user_id)
        .bind(event.source_type)
        .bind(&event.file_name)
        .bind(&event.event)
        .bind(event.phase)
        .bind(&event.error_code)
        .bind(event.total_rows)
        .bind(event.valid_rows)
        .bind(event.ignored_rows)
        .bind(event.error_rows)
        .bind(event.imported)
        .bind(event.skipped)
        .bind(event.duplicates)
        .bind(event.invalid_rows)
        .bind(event.transfer_created)
        .bind(event.card_payment_detected)
        .bind(event.card_payment_not_converted)
        .bind(event.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| storage_err("append_event", e))?;
        Ok(())
    }

    async fn recent_duplicate_event(
        &self,
        user_id: Id,
        source_type: SourceType,
        file_name: &str,
        error_code: &str,
    ) -> Result<bool, StorageError> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT count(*) FROM import_events \
             WHERE user_id = $1 AND source_type = $2 AND file_name = $3 AND error_code = $4 \
             AND created_at > now() - interval '15 seconds'",
        )
        .bind(user_id)
        .bind(source_type)
        .bind(file_name)
        .bind(error_code)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| storage_err("recent_duplicate_event", e))?;

        Ok(row.map(|(n,)| n > 0).unwrap_or(false))
    }
}
