//! Wire DTOs for the three endpoints in spec §6. Kept separate from
//! `model.rs` since these shapes are request/response envelopes, not
//! persisted rows — mirrors the teacher's `HealthResponse`/`RejectOutcome`
//! pattern of small ad-hoc response structs next to their handlers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::matcher::TransferSuggestion;
use crate::model::{CanonicalImportRow, Id, ImportBatch, SourceType};
use crate::parsers::delimited::MappingConfidence;
use crate::router::CardPaymentOptions;

#[derive(Debug, Deserialize)]
pub struct ParseQuery {
    #[serde(default)]
    pub pdf_password: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseResponse {
    pub source_type: SourceType,
    pub document_type: Option<String>,
    pub issuer_profile: Option<&'static str>,
    pub metadata: BTreeMap<String, String>,
    pub needs_mapping: bool,
    pub columns: Option<Vec<String>>,
    pub suggested_mapping: BTreeMap<String, String>,
    pub suggested_mapping_confidence: Option<MappingConfidence>,
    pub applied_mapping: Option<BTreeMap<String, String>>,
    pub total_rows: usize,
    pub valid_rows: usize,
    pub ignored_rows: usize,
    pub error_rows: usize,
    pub reasons: BTreeMap<String, usize>,
    pub rows: Vec<CanonicalImportRow>,
    pub preview: Vec<crate::analyzer::DiagnosticEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitMappingOptions {
    #[serde(default)]
    pub convert_card_payments_to_transfer: Option<bool>,
    #[serde(default)]
    pub card_payment_target_account_id: Option<Id>,
    #[serde(default)]
    pub skip_card_payment_lines: Option<bool>,
}

impl CommitMappingOptions {
    pub fn into_card_payment_options(self) -> CardPaymentOptions {
        let default = CardPaymentOptions::default();
        CardPaymentOptions {
            convert_card_payments_to_transfer: self
                .convert_card_payments_to_transfer
                .unwrap_or(default.convert_card_payments_to_transfer),
            card_payment_target_account_id: self
                .card_payment_target_account_id
                .or(default.card_payment_target_account_id),
            skip_card_payment_lines: self
                .skip_card_payment_lines
                .unwrap_or(default.skip_card_payment_lines),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRequest {
    pub source_type: SourceType,
    pub file_name: String,
    pub institution_id: Option<String>,
    pub default_account_id: Id,
    #[serde(default)]
    pub mapping: Option<CommitMappingOptions>,
    pub apply_rules: bool,
    pub rows: Vec<CanonicalImportRow>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportedRangeDto {
    pub from: chrono::NaiveDate,
    pub to: chrono::NaiveDate,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitResponse {
    pub total_imported: i32,
    pub total_skipped: i32,
    pub duplicates: i32,
    pub invalid_rows: i32,
    pub total_transfers_created: i32,
    pub total_card_payments_detected: i32,
    pub total_card_payments_not_converted: i32,
    pub transfer_review_suggestions: Vec<TransferSuggestion>,
    pub deterministic_categorized_count: i32,
    pub imported_range: Option<ImportedRangeDto>,
    pub idempotent: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListImportsResponse {
    pub batches: Vec<ImportBatch>,
}
