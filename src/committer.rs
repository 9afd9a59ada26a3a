//! Ledger Committer (spec §4.8): the single-transaction-per-batch commit
//! path. Computes the file-level and row-level content hashes, short-
//! circuits on a previously-seen file, upserts each row, runs the transfer
//! matcher across the touched window, and writes one `ImportBatch`.
//!
//! Grounded on the teacher's `merge.rs`/`merge/merger.rs` (the top-level
//! "take staged postings, dedup against existing, merge, write back" loop)
//! generalized from an in-memory ledger-journal merge to a relational
//! upsert-per-row commit with content-addressed idempotency.

use std::collections::VecDeque;

use chrono::{NaiveDate, Utc};

use crate::context::RequestContext;
use crate::error::PipelineError;
use crate::fingerprint::FingerprintBuilder;
use crate::matcher::{match_transfers, AutoMatch, MatchCandidate, TransferSuggestion};
use crate::model::{
    Account, AccountType, CanonicalImportRow, Direction, EntryStatus, EntryType, Id, ImportBatch,
    ImportSource, ImportSourceKind, LedgerEntry, RowType, SourceType,
};
use crate::repo::Repo;
use crate::router::{self, CreditAccountCandidate, RouteOutcome};
use crate::rules::{categorize, order_rules};

const IMPORTED_HASH_ALGORITHM_VERSION: i64 = 1;
const FILE_HASH_ALGORITHM_VERSION: i64 = 1;

const TRANSFER_MATCH_WINDOW_DAYS: i64 = 3;

pub struct CommitOptions {
    pub default_account_id: Id,
    pub apply_rules: bool,
    pub card_payment: crate::router::CardPaymentOptions,
}

#[derive(Default)]
pub struct CommitReport {
    pub duplicate_import_source: bool,
    pub total_imported: i32,
    pub total_skipped: i32,
    pub duplicates: i32,
    pub invalid_rows: i32,
    pub total_transfers_created: i32,
    pub total_card_payments_detected: i32,
    pub total_card_payments_not_converted: i32,
    pub deterministic_categorized_count: i32,
    pub transfer_review_suggestions: Vec<TransferSuggestion>,
    pub imported_range: Option<(NaiveDate, NaiveDate)>,
}

/// Content digest over `{filename, kind, canonical rows with ISO date, 2dp
/// amount, upcased direction, normalized description, upcased externalId}`
/// (spec §4.8 step 1). Identical bytes under a different filename still
/// dedup correctly since the filename is folded in once, not per row.
fn compute_file_hash(file_name: &str, kind: SourceType, rows: &[CanonicalImportRow]) -> String {
    let mut builder = FingerprintBuilder::new("import_source", FILE_HASH_ALGORITHM_VERSION, "file")
        .with(file_name)
        .with(kind as i32 as i64);

    for row in rows {
        let direction = Direction::of(row.amount_cents());
        let external_id_upper = row.external_id.as_deref().map(|s| s.to_uppercase());
        builder = builder
            .with(row.date.format("%Y-%m-%d").to_string().as_str())
            .with(format!("{:.2}", row.amount).as_str())
            .with(format!("{:?}", direction).to_uppercase().as_str())
            .with(row.normalized_description.as_str())
            .with(external_id_upper.as_deref());
    }

    builder.build().value().to_string()
}

/// Per-row dedup key (spec §4.8 step 2b / §8 hash stability).
fn compute_imported_hash(
    user_id: Id,
    account_id: Id,
    row: &CanonicalImportRow,
    row_type: RowType,
    direction: Direction,
    institution_id: Option<&str>,
) -> String {
    FingerprintBuilder::new("ledger_entry", IMPORTED_HASH_ALGORITHM_VERSION, "row")
        .with(user_id.to_string().as_str())
        .with(account_id.to_string().as_str())
        .with(row.date.format("%Y-%m-%d").to_string().as_str())
        .with(&row.amount_cents())
        .with(format!("{:?}", row_type).as_str())
        .with(format!("{:?}", direction).as_str())
        .with(row.normalized_description.as_str())
        .with(row.merchant_key.as_str())
        .with(institution_id)
        .build()
        .value()
        .to_string()
}

fn row_type_to_entry_type(row_type: RowType) -> EntryType {
    match row_type {
        RowType::Income => EntryType::Income,
        RowType::Expense => EntryType::Expense,
        RowType::Transfer => EntryType::Transfer,
        RowType::CcPurchase => EntryType::CcPurchase,
        RowType::CcPayment => EntryType::CcPayment,
    }
}

pub async fn commit(
    ctx: &RequestContext,
    repo: &dyn Repo,
    file_name: &str,
    institution_id: Option<&str>,
    rows: Vec<CanonicalImportRow>,
    opts: CommitOptions,
) -> Result<CommitReport, PipelineError> {
    let user_id = ctx.user_id;
    let kind = rows.first().map(|r| r.source_type).unwrap_or(SourceType::Manual);

    let file_hash = compute_file_hash(file_name, kind, &rows);

    if let Some(_existing) = repo
        .find_import_source(user_id, &file_hash)
        .await
        .map_err(PipelineError::from)?
    {
        return Ok(CommitReport {
            duplicate_import_source: true,
            total_skipped: rows.len() as i32,
            duplicates: rows.len() as i32,
            ..Default::default()
        });
    }

    let default_account = repo
        .find_account(user_id, opts.default_account_id)
        .await
        .map_err(PipelineError::from)?
        .ok_or_else(|| {
            PipelineError::InvalidPayload {
                reason: "defaultAccountId does not reference an account owned by this user".to_string(),
            }
        })?;

    let rules = if opts.apply_rules {
        order_rules(repo.find_enabled_rules(user_id).await.map_err(PipelineError::from)?)
    } else {
        Vec::new()
    };

    let user_accounts = repo.find_accounts(user_id).await.map_err(PipelineError::from)?;
    let valid_account_ids: std::collections::HashSet<Id> = user_accounts.iter().map(|a| a.id).collect();
    let credit_candidates = sibling_credit_candidates(&user_accounts, &default_account);

    let mut report = CommitReport::default();
    let mut min_date: Option<NaiveDate> = None;
    let mut max_date: Option<NaiveDate> = None;
    let mut queue: VecDeque<CanonicalImportRow> = rows.into_iter().collect();

    while let Some(mut row) = queue.pop_front() {
        if ctx.is_expired() {
            return Err(PipelineError::ImportCommitFailed(anyhow::anyhow!(
                "request deadline exceeded mid-commit"
            )));
        }

        let invoice_mode = default_account.account_type == AccountType::Credit
            || router::is_credit_invoice_document(row.document_type.as_deref());

        let outcome = if invoice_mode {
            router::route_invoice_row(&mut row, &opts.card_payment, default_account.id)
        } else {
            router::route_statement_payment(&mut row, &opts.card_payment, &credit_candidates, &default_account)
        };

        match outcome {
            RouteOutcome::Skipped => {
                report.total_card_payments_detected += 1;
                report.total_skipped += 1;
                continue;
            }
            RouteOutcome::NotConverted => {
                report.total_card_payments_detected += 1;
                report.total_card_payments_not_converted += 1;
            }
            RouteOutcome::ConvertedToTransferPair(peer) => {
                report.total_card_payments_detected += 1;
                queue.push_back(peer);
            }
            RouteOutcome::RoutedToCredit | RouteOutcome::Unchanged => {}
        }

        if let Some(account_id) = row.account_id {
            if !valid_account_ids.contains(&account_id) {
                report.invalid_rows += 1;
                report.total_skipped += 1;
                continue;
            }
        }

        let account_id = row.account_id.unwrap_or(default_account.id);
        let row_type = row.row_type;
        let direction = Direction::of(row.amount_cents());

        if let Some(category_id) = categorize(&row, &rules) {
            row.category_id = Some(category_id);
            report.deterministic_categorized_count += 1;
        }

        let imported_hash = compute_imported_hash(user_id, account_id, &row, row_type, direction, institution_id);

        let now = Utc::now();
        let entry = LedgerEntry {
            id: Id::new(),
            user_id,
            account_id,
            category_id: row.category_id,
            import_batch_id: None,
            posted_at: row.date,
            description: row.description.clone(),
            normalized_description: row.normalized_description.clone(),
            amount_cents: row.amount_cents().0,
            currency: default_account.currency.clone(),
            entry_type: row_type_to_entry_type(row_type),
            direction,
            status: EntryStatus::Posted,
            is_internal_transfer: row_type == RowType::Transfer,
            imported_hash: Some(imported_hash),
            transfer_group_id: None,
            transfer_peer_id: None,
            transfer_from_account_id: None,
            transfer_to_account_id: None,
            external_id: row.external_id.clone(),
            raw_json: Some(serde_json::to_value(&row.raw).unwrap_or_default()),
            created_at: now,
            updated_at: now,
        };

        let inserted = repo
            .insert_entry_if_absent(&entry)
            .await
            .map_err(PipelineError::from)?;

        if inserted {
            report.total_imported += 1;
            min_date = Some(min_date.map_or(entry.posted_at, |d: NaiveDate| d.min(entry.posted_at)));
            max_date = Some(max_date.map_or(entry.posted_at, |d: NaiveDate| d.max(entry.posted_at)));
        } else {
            report.duplicates += 1;
        }
    }

    if let (Some(min_date), Some(max_date)) = (min_date, max_date) {
        report.imported_range = Some((min_date, max_date));
        run_transfer_matching(ctx, repo, user_id, min_date, max_date, &mut report).await?;
    }

    let source = ImportSource {
        id: Id::new(),
        user_id,
        institution_id: institution_id.map(|s| s.to_string()),
        kind: if default_account.account_type == AccountType::Credit {
            ImportSourceKind::CcStatement
        } else {
            ImportSourceKind::BankStatement
        },
        file_name: file_name.to_string(),
        file_hash,
        created_at: Utc::now(),
    };
    repo.insert_import_source(&source).await.map_err(PipelineError::from)?;

    let batch = ImportBatch {
        id: Id::new(),
        user_id,
        source: kind,
        file_name: file_name.to_string(),
        mapping_json: None,
        total_imported: report.total_imported,
        total_skipped: report.total_skipped + report.duplicates,
        imported_at: Utc::now(),
    };
    repo.insert_import_batch(&batch).await.map_err(PipelineError::from)?;

    Ok(report)
}

/// Credit accounts parented under `default_account`, the candidate pool for
/// `router::route_statement_payment`. Due-day and nearest-recent-purchase
/// signals aren't threaded through the repository façade yet, so candidates
/// here compete on parent/institution match alone; see DESIGN.md.
fn sibling_credit_candidates(user_accounts: &[Account], default_account: &Account) -> Vec<CreditAccountCandidate> {
    if default_account.account_type == AccountType::Credit {
        return Vec::new();
    }

    user_accounts
        .iter()
        .filter(|a| a.account_type == AccountType::Credit && a.parent_account_id == Some(default_account.id))
        .map(|account| CreditAccountCandidate {
            account: account.clone(),
            due_day: None,
            nearest_recent_purchase_delta_cents: None,
        })
        .collect()
}

/// Runs the transfer matcher across entries touching `[minDate - 3d,
/// maxDate + 3d]` and applies auto-matches by persisting the link (spec
/// §4.8 step 3, §4.7).
async fn run_transfer_matching(
    ctx: &RequestContext,
    repo: &dyn Repo,
    user_id: Id,
    min_date: NaiveDate,
    max_date: NaiveDate,
    report: &mut CommitReport,
) -> Result<(), PipelineError> {
    let window_start = min_date - chrono::Duration::days(TRANSFER_MATCH_WINDOW_DAYS);
    let window_end = max_date + chrono::Duration::days(TRANSFER_MATCH_WINDOW_DAYS);

    let Some(entries) = ctx
        .run(repo.find_unlinked_entries_in_window(user_id, window_start, window_end))
        .await
    else {
        return Err(PipelineError::ImportCommitFailed(anyhow::anyhow!(
            "transfer matcher exceeded the request deadline"
        )));
    };
    let entries = entries.map_err(PipelineError::from)?;

    let candidates: Vec<MatchCandidate> = entries
        .iter()
        .map(|e| {
            MatchCandidate::from_entry(
                e,
                None,
                matches!(e.entry_type, EntryType::CcPayment | EntryType::CcPurchase),
            )
        })
        .collect();

    let result = match_transfers(&candidates);

    for AutoMatch {
        outgoing_id,
        incoming_id,
        ..
    } in result.auto_matches
    {
        let transfer_group_id = Id::new();
        repo.link_transfer_pair(outgoing_id, incoming_id, transfer_group_id)
            .await
            .map_err(PipelineError::from)?;
        report.total_transfers_created += 1;
    }

    report.transfer_review_suggestions = result.suggestions;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn row(date: &str, amount_str: &str, desc: &str) -> CanonicalImportRow {
        CanonicalImportRow {
            date: date.parse().unwrap(),
            amount: amount_str.parse().unwrap(),
            balance_after: None,
            transaction_kind_raw: String::new(),
            counterparty_raw: desc.to_string(),
            transaction_kind_norm: String::new(),
            counterparty_norm: desc.to_string(),
            merchant_key: "transacao".to_string(),
            source_type: SourceType::Csv,
            document_type: None,
            description: desc.to_string(),
            normalized_description: desc.to_string(),
            row_type: RowType::Expense,
            external_id: None,
            account_hint: None,
            account_id: None,
            category_id: None,
            raw: BTreeMap::new(),
        }
    }

    #[test]
    fn file_hash_is_stable_for_identical_rows() {
        let rows = vec![row("2026-02-20", "-150.34", "Supermercado Local QA")];
        let a = compute_file_hash("statement.csv", SourceType::Csv, &rows);
        let b = compute_file_hash("statement.csv", SourceType::Csv, &rows);
        assert_eq!(a, b);
    }

    #[test]
    fn imported_hash_ignores_incidental_whitespace_and_diacritics() {
        let user = Id::new();
        let account = Id::new();
        let r1 = row("2026-02-20", "-150.34", "CAFE  CENTRAL");
        let mut r2 = row("2026-02-20", "-150.34", "café central");
        r2.normalized_description = crate::normalize::normalize_for_match(&r2.description);
        let mut r1 = r1;
        r1.normalized_description = crate::normalize::normalize_for_match(&r1.description);

        let h1 = compute_imported_hash(user, account, &r1, RowType::Expense, Direction::Out, None);
        let h2 = compute_imported_hash(user, account, &r2, RowType::Expense, Direction::Out, None);
        assert_eq!(h1, h2);
    }
}
