//! Parse Analyzer (spec §4.4): classifies each candidate row as
//! `ok|ignored|error`, with per-row reasons and aggregate counts.
//!
//! Grounded on the teacher's `importers/cmd.rs` summary-printing loop (it
//! tallies imported/skipped counts while walking `ImportedTransaction`s one
//! at a time) generalized into a structured per-row diagnostic rather than
//! text printed to stdout.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::canonicalizer::{canonicalize, CanonicalizeError, CanonicalizeOptions};
use crate::model::CanonicalImportRow;
use crate::normalize::normalize_for_match;
use crate::parsers::ParsedRow;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowStatus {
    Ok,
    Ignored,
    Error,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticEntry {
    pub status: RowStatus,
    pub reason: Option<&'static str>,
    /// Stable zero-based position among `ok` rows; addresses the row at
    /// commit time (spec §4.4, §5).
    pub commit_index: Option<usize>,
    pub row: Option<CanonicalImportRow>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSummary {
    pub total_rows: usize,
    pub valid_rows: usize,
    pub ignored_rows: usize,
    pub error_rows: usize,
    pub reasons: BTreeMap<String, usize>,
}

pub struct AnalysisResult {
    pub summary: AnalysisSummary,
    pub preview: Vec<DiagnosticEntry>,
    pub ok_rows: Vec<CanonicalImportRow>,
}

const PREVIEW_LIMIT: usize = 50;

/// Normalized-description substrings that mark a balance/running-total
/// line rather than a transaction (spec §4.4: `saldo_line`).
const SALDO_MARKERS: &[&str] = &["SALDO DO DIA", "SALDO ANTERIOR", "SALDO ATUAL"];

pub fn analyze(rows: &[ParsedRow], opts: &CanonicalizeOptions) -> AnalysisResult {
    let mut summary = AnalysisSummary {
        total_rows: rows.len(),
        ..Default::default()
    };
    let mut preview = Vec::new();
    let mut ok_rows = Vec::new();
    let mut commit_index = 0usize;

    for row in rows {
        let entry = classify_row(row, opts, &mut commit_index);

        match entry.status {
            RowStatus::Ok => summary.valid_rows += 1,
            RowStatus::Ignored => summary.ignored_rows += 1,
            RowStatus::Error => summary.error_rows += 1,
        }
        if let Some(reason) = entry.reason {
            *summary.reasons.entry(reason.to_string()).or_insert(0) += 1;
        }
        if let Some(canonical) = &entry.row {
            ok_rows.push(canonical.clone());
        }
        if preview.len() < PREVIEW_LIMIT {
            preview.push(entry);
        }
    }

    AnalysisResult {
        summary,
        preview,
        ok_rows,
    }
}

fn classify_row(
    row: &ParsedRow,
    opts: &CanonicalizeOptions,
    commit_index: &mut usize,
) -> DiagnosticEntry {
    if row.description_raw.as_deref().unwrap_or("").trim().is_empty() {
        return ignored(row, "missing_description");
    }

    if let Some(desc) = &row.description_raw {
        let norm = normalize_for_match(desc);
        if SALDO_MARKERS.iter().any(|m| norm.contains(m)) {
            return ignored(row, "saldo_line");
        }
    }

    if row.date_raw.is_none() {
        return error(row, "missing_date");
    }
    if row.amount_raw.as_deref().unwrap_or("").trim().is_empty() {
        return error(row, "missing_amount");
    }

    match canonicalize(row, opts) {
        Ok(canonical) => {
            if canonical.amount.is_zero() {
                return ignored(row, "zero_amount");
            }
            let idx = *commit_index;
            *commit_index += 1;
            DiagnosticEntry {
                status: RowStatus::Ok,
                reason: None,
                commit_index: Some(idx),
                row: Some(canonical),
            }
        }
        Err(CanonicalizeError::MissingDate) => error(row, "missing_date"),
        Err(CanonicalizeError::InvalidDate(_)) => error(row, "invalid_date"),
        Err(CanonicalizeError::MissingAmount) => error(row, "missing_amount"),
        Err(CanonicalizeError::InvalidAmount(_)) => error(row, "invalid_amount"),
    }
}

fn ignored(_row: &ParsedRow, reason: &'static str) -> DiagnosticEntry {
    DiagnosticEntry {
        status: RowStatus::Ignored,
        reason: Some(reason),
        commit_index: None,
        row: None,
    }
}

fn error(_row: &ParsedRow, reason: &'static str) -> DiagnosticEntry {
    DiagnosticEntry {
        status: RowStatus::Error,
        reason: Some(reason),
        commit_index: None,
        row: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SourceType;

    fn opts() -> CanonicalizeOptions {
        CanonicalizeOptions {
            source_type: SourceType::Csv,
            document_type: None,
            type_hint: None,
        }
    }

    fn row(date: Option<&str>, amount: Option<&str>, desc: &str) -> ParsedRow {
        ParsedRow {
            raw: Default::default(),
            date_raw: date.map(String::from),
            description_raw: Some(desc.to_string()),
            amount_raw: amount.map(String::from),
            balance_after_raw: None,
            external_id: None,
            account_hint: None,
        }
    }

    #[test]
    fn ok_rows_get_sequential_commit_index() {
        let rows = vec![
            row(Some("2026-02-20"), Some("-10.00"), "COMPRA A"),
            row(Some("2026-02-21"), Some("-20.00"), "COMPRA B"),
        ];
        let result = analyze(&rows, &opts());
        assert_eq!(2, result.summary.valid_rows);
        assert_eq!(Some(0), result.preview[0].commit_index);
        assert_eq!(Some(1), result.preview[1].commit_index);
    }

    #[test]
    fn missing_date_is_an_error_row() {
        let rows = vec![row(None, Some("-10.00"), "COMPRA A")];
        let result = analyze(&rows, &opts());
        assert_eq!(1, result.summary.error_rows);
        assert_eq!(Some("missing_date"), result.preview[0].reason);
    }

    #[test]
    fn saldo_line_is_ignored_not_errored() {
        let rows = vec![row(Some("2026-02-20"), Some("100.00"), "Saldo do dia")];
        let result = analyze(&rows, &opts());
        assert_eq!(1, result.summary.ignored_rows);
        assert_eq!(Some("saldo_line"), result.preview[0].reason);
    }

    #[test]
    fn zero_amount_is_ignored() {
        let rows = vec![row(Some("2026-02-20"), Some("0.00"), "COMPRA A")];
        let result = analyze(&rows, &opts());
        assert_eq!(1, result.summary.ignored_rows);
        assert_eq!(Some("zero_amount"), result.preview[0].reason);
    }
}
