//! HTTP handlers for the three endpoints in spec §6: `POST /imports/parse`,
//! `POST /imports/commit`, `GET /imports`.
//!
//! Grounded on `ibank-service`'s handler shape (thin functions that build a
//! request struct, delegate to a pure core function, and map the result
//! through `Json`/`ApiError`) generalized to this pipeline's three-stage
//! parse/analyze -> commit flow.

use std::collections::BTreeMap;

use axum::extract::{Multipart, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;

use crate::analyzer::analyze;
use crate::canonicalizer::CanonicalizeOptions;
use crate::committer::{self, CommitOptions};
use crate::context::RequestContext;
use crate::error::PipelineError;
use crate::model::{Id, RowType, SourceType};
use crate::parsers::{delimited, document, markup};
use crate::telemetry;

use super::dto::{
    CommitRequest, CommitResponse, ImportedRangeDto, ListImportsResponse, ParseQuery, ParseResponse,
};
use super::{ApiError, ServerState};

/// Extracts `userId` from the `x-user-id` header (spec §6: the service sits
/// behind an authenticating gateway that forwards the caller's id this way).
fn user_id_from_headers(headers: &HeaderMap) -> Result<Id, ApiError> {
    let raw = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::bad_request("missing x-user-id header"))?;
    raw.parse::<Id>()
        .map_err(|_| ApiError::bad_request("x-user-id is not a valid id"))
}

pub async fn parse_handler(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Query(query): Query<ParseQuery>,
    mut multipart: Multipart,
) -> Result<Json<ParseResponse>, ApiError> {
    let user_id = user_id_from_headers(&headers)?;

    let mut file_bytes: Option<Vec<u8>> = None;
    let mut file_name = "upload".to_string();
    let mut content_type: Option<String> = None;
    let mut mapping: Option<BTreeMap<String, String>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::from(PipelineError::InvalidPayload { reason: e.to_string() }))?
    {
        match field.name().unwrap_or_default() {
            "file" => {
                content_type = field.content_type().map(|s| s.to_string());
                if let Some(name) = field.file_name() {
                    file_name = name.to_string();
                }
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::from(PipelineError::InvalidPayload { reason: e.to_string() }))?;
                file_bytes = Some(bytes.to_vec());
            }
            "mapping" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::from(PipelineError::InvalidMappingJson { reason: e.to_string() }))?;
                let parsed: BTreeMap<String, String> = serde_json::from_str(&text)
                    .map_err(|e| ApiError::from(PipelineError::InvalidMappingJson { reason: e.to_string() }))?;
                mapping = Some(parsed);
            }
            _ => {}
        }
    }

    let bytes = file_bytes.ok_or_else(|| ApiError::from(PipelineError::FileMissing))?;
    if bytes.is_empty() {
        return Err(ApiError::from(PipelineError::FileEmpty));
    }
    if bytes.len() as u64 > state.config.max_upload_bytes {
        return Err(ApiError::from(PipelineError::FileSizeLimitExceeded {
            limit_bytes: state.config.max_upload_bytes,
        }));
    }

    let source_type = infer_source_type(content_type.as_deref(), &bytes);

    let output = match source_type {
        SourceType::Csv => delimited::parse(&bytes)
            .map_err(|e| PipelineError::ImportParseFailed(e))?,
        SourceType::Ofx => markup::parse(&bytes)
            .map_err(|e| PipelineError::ImportParseFailed(e))?,
        SourceType::Pdf => {
            document::parse(
                &bytes,
                query.pdf_password.as_deref(),
                state.config.pdf_extraction_deadline,
            )
            .await?
        }
        SourceType::Manual => return Err(ApiError::from(PipelineError::InvalidContentType)),
    };

    let needs_mapping = output.columns.is_some() && mapping.is_none();
    let (suggested_mapping, suggested_mapping_confidence) = match &output.columns {
        Some(cols) => {
            let suggestion = delimited::suggest_mapping(cols);
            (suggestion.mapping, Some(suggestion.confidence))
        }
        None => (BTreeMap::new(), None),
    };

    let type_hint = mapping
        .as_ref()
        .and_then(|m| m.get("type"))
        .and_then(|t| match t.as_str() {
            "income" => Some(RowType::Income),
            "expense" => Some(RowType::Expense),
            "transfer" => Some(RowType::Transfer),
            _ => None,
        });

    let parsed_rows = if needs_mapping {
        Vec::new()
    } else if let (Some(columns), Some(applied)) = (&output.columns, &mapping) {
        let mut rows = output.rows.clone();
        delimited::apply_mapping(&mut rows, columns, applied).map_err(ApiError::from)?;
        rows
    } else {
        output.rows.clone()
    };

    let opts = CanonicalizeOptions {
        source_type: output.source_type(),
        document_type: output.document_type.clone(),
        type_hint,
    };
    let analysis = analyze(&parsed_rows, &opts);

    let response = ParseResponse {
        source_type: output.source_type(),
        document_type: output.document_type.clone(),
        issuer_profile: output.issuer_profile,
        metadata: output.metadata.clone(),
        needs_mapping,
        columns: output.columns.clone(),
        suggested_mapping,
        suggested_mapping_confidence,
        applied_mapping: mapping,
        total_rows: analysis.summary.total_rows,
        valid_rows: analysis.summary.valid_rows,
        ignored_rows: analysis.summary.ignored_rows,
        error_rows: analysis.summary.error_rows,
        reasons: analysis.summary.reasons.clone(),
        rows: analysis.ok_rows,
        preview: analysis.preview,
    };

    if let Err(e) = telemetry::record_parse(
        state.repo.as_ref(),
        user_id,
        output.source_type(),
        &file_name,
        Some(&analysis.summary),
        None,
    )
    .await
    {
        tracing::warn!(user_id = %user_id, error = %e, "failed to record parse telemetry");
    }

    Ok(Json(response))
}

fn infer_source_type(content_type: Option<&str>, bytes: &[u8]) -> SourceType {
    match content_type {
        Some(ct) if ct.contains("csv") || ct.contains("text/plain") => SourceType::Csv,
        Some(ct) if ct.contains("ofx") || ct.contains("sgml") || ct.contains("xml") => SourceType::Ofx,
        Some(ct) if ct.contains("pdf") => SourceType::Pdf,
        _ if bytes.starts_with(b"%PDF") => SourceType::Pdf,
        _ if bytes.windows(4).any(|w| w == b"OFXH") => SourceType::Ofx,
        _ => SourceType::Csv,
    }
}

pub async fn commit_handler(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Json(req): Json<CommitRequest>,
) -> Result<(StatusCode, Json<CommitResponse>), ApiError> {
    let user_id = user_id_from_headers(&headers)?;
    let ctx = RequestContext::new(user_id, state.config.request_deadline);

    if req.rows.len() > state.config.max_commit_rows {
        return Err(ApiError::from(PipelineError::RowsLimitExceeded {
            got: req.rows.len(),
            limit: state.config.max_commit_rows,
        }));
    }

    let card_payment = req
        .mapping
        .map(|m| m.into_card_payment_options())
        .unwrap_or_default();

    let opts = CommitOptions {
        default_account_id: req.default_account_id,
        apply_rules: req.apply_rules,
        card_payment,
    };

    let report = committer::commit(
        &ctx,
        state.repo.as_ref(),
        &req.file_name,
        req.institution_id.as_deref(),
        req.rows,
        opts,
    )
    .await;

    let report = match report {
        Ok(r) => r,
        Err(e) => {
            let _ = telemetry::record_commit(
                state.repo.as_ref(),
                user_id,
                req.source_type,
                &req.file_name,
                &committer::CommitReport::default(),
                Some(e.code()),
            )
            .await;
            return Err(ApiError::from(e));
        }
    };

    if let Err(e) = telemetry::record_commit(
        state.repo.as_ref(),
        user_id,
        req.source_type,
        &req.file_name,
        &report,
        None,
    )
    .await
    {
        tracing::warn!(user_id = %user_id, error = %e, "failed to record commit telemetry");
    }

    let status = if report.duplicate_import_source {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };

    let response = CommitResponse {
        total_imported: report.total_imported,
        total_skipped: report.total_skipped,
        duplicates: report.duplicates,
        invalid_rows: report.invalid_rows,
        total_transfers_created: report.total_transfers_created,
        total_card_payments_detected: report.total_card_payments_detected,
        total_card_payments_not_converted: report.total_card_payments_not_converted,
        transfer_review_suggestions: report.transfer_review_suggestions,
        deterministic_categorized_count: report.deterministic_categorized_count,
        imported_range: report.imported_range.map(|(from, to)| ImportedRangeDto { from, to }),
        idempotent: report.duplicate_import_source,
    };

    Ok((status, Json(response)))
}

const RECENT_IMPORTS_LIMIT: i64 = 50;

pub async fn list_handler(
    State(state): State<ServerState>,
    headers: HeaderMap,
) -> Result<Json<ListImportsResponse>, ApiError> {
    let user_id = user_id_from_headers(&headers)?;
    let batches = state
        .repo
        .find_recent_import_batches(user_id, RECENT_IMPORTS_LIMIT)
        .await
        .map_err(PipelineError::from)?;
    Ok(Json(ListImportsResponse { batches }))
}
