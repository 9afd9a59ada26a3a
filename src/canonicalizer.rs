//! Canonicalizer (spec §4.3): turns a parser's `ParsedRow` into a
//! `CanonicalImportRow` with a split description, normalized fields, a
//! signed amount, and an inferred row type.
//!
//! Grounded on the teacher's `importers/nationwide.rs`/`nationwide_csv.rs`
//! pairing (a raw-record struct feeding a builder that resolves a posting's
//! direction and description) generalized from that single issuer's rules
//! to the composed-description patterns named in spec §4.3.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;

use crate::model::{CanonicalImportRow, RowType, SourceType};
use crate::normalize::{build_merchant_key, normalize_for_match, parse_flexible_date, parse_money_input};
use crate::parsers::ParsedRow;

lazy_static! {
    /// Composed "<kind>: <counterparty>" patterns (spec §4.3 examples:
    /// "Pix enviado: X", "Compra no debito - Y").
    static ref COMPOSED: Regex =
        Regex::new(r"(?i)^\s*(.+?)\s*[:\-]\s*(.+)$").unwrap();
}

/// Keyword scan fallback when the description has no composed "kind:
/// counterparty" shape; longest match wins so more specific phrases beat
/// generic ones ("PIX ENVIADO" before "PIX").
const KIND_KEYWORDS: &[&str] = &[
    "PIX ENVIADO",
    "PIX RECEBIDO",
    "COMPRA NO DEBITO",
    "COMPRA NO CREDITO",
    "TED",
    "DOC",
    "SAQUE",
    "TARIFA",
    "ESTORNO",
    "PIX",
    "COMPRA",
];

#[derive(Debug, thiserror::Error)]
pub enum CanonicalizeError {
    #[error("missing date")]
    MissingDate,
    #[error("invalid date: {0}")]
    InvalidDate(String),
    #[error("missing amount")]
    MissingAmount,
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
}

pub struct CanonicalizeOptions {
    pub source_type: SourceType,
    pub document_type: Option<String>,
    /// Caller-hinted row type; wins over the amount-sign inference.
    pub type_hint: Option<RowType>,
}

pub fn canonicalize(
    row: &ParsedRow,
    opts: &CanonicalizeOptions,
) -> Result<CanonicalImportRow, CanonicalizeError> {
    let date_raw = row.date_raw.as_deref().ok_or(CanonicalizeError::MissingDate)?;
    let date = parse_flexible_date(date_raw).map_err(|_| CanonicalizeError::InvalidDate(date_raw.to_string()))?;

    let amount_raw = row.amount_raw.as_deref().ok_or(CanonicalizeError::MissingAmount)?;
    let amount = parse_money_input(amount_raw).map_err(|_| CanonicalizeError::InvalidAmount(amount_raw.to_string()))?;

    let description = row
        .description_raw
        .clone()
        .unwrap_or_default();

    let (kind_raw, counterparty_raw) = split_description(&description);

    let transaction_kind_norm = normalize_for_match(&kind_raw);
    let counterparty_norm = normalize_for_match(&counterparty_raw);
    let merchant_key = build_merchant_key(&counterparty_raw);
    let normalized_description = normalize_for_match(&description);

    let row_type = opts.type_hint.unwrap_or_else(|| {
        if amount >= Decimal::ZERO {
            RowType::Income
        } else {
            RowType::Expense
        }
    });

    let balance_after = row
        .balance_after_raw
        .as_deref()
        .and_then(|b| parse_money_input(b).ok());

    Ok(CanonicalImportRow {
        date,
        amount,
        balance_after,
        transaction_kind_raw: kind_raw,
        counterparty_raw,
        transaction_kind_norm,
        counterparty_norm,
        merchant_key,
        source_type: opts.source_type,
        document_type: opts.document_type.clone(),
        description: description.clone(),
        normalized_description,
        row_type,
        external_id: row.external_id.clone(),
        account_hint: row.account_hint.clone(),
        account_id: None,
        category_id: None,
        raw: row
            .raw
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect::<BTreeMap<_, _>>(),
    })
}

/// Splits into `(transactionKindRaw, counterpartyRaw)`. Tries the composed
/// "kind: counterparty" shape first, falling back to a keyword scan, and
/// finally to the whole description as the counterparty (spec §4.3).
fn split_description(description: &str) -> (String, String) {
    if let Some(c) = COMPOSED.captures(description) {
        let kind_candidate = c[1].trim();
        let norm_kind = normalize_for_match(kind_candidate);
        if KIND_KEYWORDS.iter().any(|k| norm_kind.contains(k)) {
            return (kind_candidate.to_string(), c[2].trim().to_string());
        }
    }

    let norm = normalize_for_match(description);
    let mut best: Option<&'static str> = None;
    for kw in KIND_KEYWORDS {
        if norm.contains(kw) && best.map_or(true, |b| kw.len() > b.len()) {
            best = Some(kw);
        }
    }

    match best {
        Some(kind) => (kind.to_string(), description.trim().to_string()),
        None => (String::new(), description.trim().to_string()),
    }
}
