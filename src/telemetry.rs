//! Import telemetry (spec §4.10): writes one `ImportEvent` row per parse or
//! commit outcome and emits a matching `tracing` event, deduplicating
//! repeat parse-failure events from the same `{userId, sourceType, fileName,
//! errorCode}` within a 15 second window so a client's retry storm doesn't
//! flood the event log.
//!
//! Grounded on the teacher CLI's `eprintln!`-per-stage diagnostics
//! (`main.rs`'s progress reporting around each subcommand), generalized
//! from stderr lines to a structured `tracing` event plus a persisted row.

use chrono::Utc;

use crate::analyzer::AnalysisSummary;
use crate::committer::CommitReport;
use crate::error::StorageError;
use crate::model::{EventPhase, Id, ImportEvent, SourceType};
use crate::repo::Repo;

/// Records a parse-phase outcome. `error_code` is `Some` only when the
/// parse failed outright (not merely produced ignored/error rows).
pub async fn record_parse(
    repo: &dyn Repo,
    user_id: Id,
    source_type: SourceType,
    file_name: &str,
    summary: Option<&AnalysisSummary>,
    error_code: Option<&str>,
) -> Result<(), StorageError> {
    if let Some(code) = error_code {
        if repo.recent_duplicate_event(user_id, source_type, file_name, code).await? {
            tracing::debug!(
                user_id = %user_id,
                source_type = ?source_type,
                file_name,
                error_code = code,
                "suppressing duplicate parse-failure event within dedup window"
            );
            return Ok(());
        }
    }

    let event = ImportEvent {
        id: Id::new(),
        user_id,
        source_type,
        file_name: file_name.to_string(),
        event: if error_code.is_some() { "parse_failed".to_string() } else { "parsed".to_string() },
        phase: EventPhase::Parse,
        error_code: error_code.map(|s| s.to_string()),
        total_rows: summary.map(|s| s.total_rows as i32),
        valid_rows: summary.map(|s| s.valid_rows as i32),
        ignored_rows: summary.map(|s| s.ignored_rows as i32),
        error_rows: summary.map(|s| s.error_rows as i32),
        imported: None,
        skipped: None,
        duplicates: None,
        invalid_rows: None,
        transfer_created: None,
        card_payment_detected: None,
        card_payment_not_converted: None,
        created_at: Utc::now(),
    };

    tracing::info!(
        user_id = %user_id,
        source_type = ?source_type,
        file_name,
        event = %event.event,
        total_rows = ?event.total_rows,
        valid_rows = ?event.valid_rows,
        "import parse recorded"
    );

    repo.append_event(&event).await
}

/// Records a commit-phase outcome.
pub async fn record_commit(
    repo: &dyn Repo,
    user_id: Id,
    source_type: SourceType,
    file_name: &str,
    report: &CommitReport,
    error_code: Option<&str>,
) -> Result<(), StorageError> {
    if let Some(code) = error_code {
        if repo.recent_duplicate_event(user_id, source_type, file_name, code).await? {
            tracing::debug!(
                user_id = %user_id,
                source_type = ?source_type,
                file_name,
                error_code = code,
                "suppressing duplicate commit-failure event within dedup window"
            );
            return Ok(());
        }
    }

    let event = ImportEvent {
        id: Id::new(),
        user_id,
        source_type,
        file_name: file_name.to_string(),
        event: if error_code.is_some() { "commit_failed".to_string() } else { "committed".to_string() },
        phase: EventPhase::Commit,
        error_code: error_code.map(|s| s.to_string()),
        total_rows: None,
        valid_rows: None,
        ignored_rows: None,
        error_rows: None,
        imported: Some(report.total_imported),
        skipped: Some(report.total_skipped),
        duplicates: Some(report.duplicates),
        invalid_rows: Some(report.invalid_rows),
        transfer_created: Some(report.total_transfers_created),
        card_payment_detected: Some(report.total_card_payments_detected),
        card_payment_not_converted: Some(report.total_card_payments_not_converted),
        created_at: Utc::now(),
    };

    tracing::info!(
        user_id = %user_id,
        source_type = ?source_type,
        file_name,
        event = %event.event,
        imported = report.total_imported,
        duplicates = report.duplicates,
        transfers_created = report.total_transfers_created,
        "import commit recorded"
    );

    repo.append_event(&event).await
}
