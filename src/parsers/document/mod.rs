//! Portable-document parser (spec §4.2): text extraction, issuer
//! classification, and per-profile line extraction, wrapped with the
//! caller-supplied extraction deadline.

pub mod extractor;
pub mod profiles;

use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::PipelineError;
use crate::parsers::{ParseOutput, ParsedRow};

use extractor::extract_with_fallback;

pub async fn parse(
    bytes: &[u8],
    password: Option<&str>,
    deadline: Duration,
) -> Result<ParseOutput, PipelineError> {
    let owned = bytes.to_vec();
    let owned_password = password.map(|p| p.to_string());

    let extraction = tokio::time::timeout(
        deadline,
        tokio::task::spawn_blocking(move || {
            extract_with_fallback(&owned, owned_password.as_deref())
        }),
    )
    .await;

    let text = match extraction {
        Err(_) => {
            return Err(PipelineError::SourceParserUnavailable {
                technical_reason: "text extraction exceeded the extraction deadline".to_string(),
                supported_issuer_profiles: profiles::SUPPORTED_PROFILES.to_vec(),
            })
        }
        Ok(Err(join_err)) => {
            return Err(PipelineError::SourceParserUnavailable {
                technical_reason: join_err.to_string(),
                supported_issuer_profiles: profiles::SUPPORTED_PROFILES.to_vec(),
            })
        }
        Ok(Ok(Err(e))) => return Err(e.into()),
        Ok(Ok(Ok(text))) => text,
    };

    let issuer_profile = profiles::classify(&text).ok_or_else(|| PipelineError::SourceParserUnavailable {
        technical_reason: "document text did not match any known issuer profile".to_string(),
        supported_issuer_profiles: profiles::SUPPORTED_PROFILES.to_vec(),
    })?;

    let lines = match issuer_profile {
        "inter_statement" => profiles::inter_statement::extract(&text),
        "inter_invoice" => profiles::inter_invoice::extract(&text),
        "mercado_pago_statement" => profiles::mercado_pago_statement::extract(&text),
        "mercado_pago_invoice" => profiles::mercado_pago_invoice::extract(&text),
        "nubank_invoice" => profiles::nubank_invoice::extract(&text),
        other => unreachable!("unclassified profile {other}"),
    }
    .map_err(|e| PipelineError::SourceParserUnavailable {
        technical_reason: e.to_string(),
        supported_issuer_profiles: profiles::SUPPORTED_PROFILES.to_vec(),
    })?;

    if lines.is_empty() {
        return Err(PipelineError::PdfNoTransactions);
    }

    let document_type = lines[0].document_type.to_string();
    let rows = lines
        .into_iter()
        .map(|line| ParsedRow {
            raw: BTreeMap::new(),
            date_raw: Some(line.date.format("%Y-%m-%d").to_string()),
            description_raw: Some(line.description),
            amount_raw: Some(line.amount.to_string()),
            balance_after_raw: None,
            external_id: None,
            account_hint: None,
        })
        .collect();

    Ok(ParseOutput {
        columns: None,
        rows,
        detected_encoding: None,
        document_type: Some(document_type),
        issuer_profile: Some(issuer_profile),
        metadata: BTreeMap::new(),
    })
}
