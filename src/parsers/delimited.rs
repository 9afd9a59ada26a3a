//! Delimited-text parser (spec §4.2): separator/encoding sniffing, a header
//! mapping suggester, and a mapping-confidence classifier.
//!
//! Grounded on the teacher's `importers/util/csv.rs` (`check_header`,
//! `deserialize_captured_number`) for the general shape of hand-rolled CSV
//! plumbing, and on `encoding_rs_io`'s `DecodeReaderBytes` (already a
//! teacher dependency, used by its own BOM/charset sniffing in
//! `importers/nationwide_csv.rs`) for encoding fallback.

use std::collections::BTreeMap;

use encoding_rs::{UTF_8, WINDOWS_1252};
use encoding_rs_io::DecodeReaderBytesBuilder;
use std::io::Read;

use crate::error::PipelineError;
use crate::parsers::{ParseOutput, ParsedRow};

const CANDIDATE_SEPARATORS: [u8; 4] = [b',', b';', b'\t', b'|'];
const SNIFF_LINES: usize = 20;

#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingConfidence {
    Alta,
    Media,
    Baixa,
}

/// Required column roles the committer path cannot function without.
const REQUIRED_ROLES: [&str; 3] = ["date", "description", "amount"];

/// Header token -> role synonym table (spec §4.2: "infers which header
/// column is date/description/amount/debit/credit/type/account by
/// normalized header tokens with synonyms").
fn role_synonyms(token: &str) -> Option<&'static str> {
    let t = crate::normalize::normalize_for_match(token);
    match t.as_str() {
        "DATE" | "DATA" | "DT" | "DT LANCAMENTO" | "DATA LANCAMENTO" => Some("date"),
        "DESCRIPTION" | "DESCRICAO" | "HISTORICO" | "MEMO" | "DETALHES" => Some("description"),
        "AMOUNT" | "VALOR" | "VALUE" | "MONTANTE" => Some("amount"),
        "DEBIT" | "DEBITO" => Some("debit"),
        "CREDIT" | "CREDITO" => Some("credit"),
        "TYPE" | "TIPO" => Some("type"),
        "ACCOUNT" | "CONTA" => Some("account"),
        "BALANCE" | "SALDO" | "BALANCE AFTER" | "SALDO APOS" => Some("balanceAfter"),
        _ => None,
    }
}

pub struct MappingSuggestion {
    pub mapping: BTreeMap<String, String>,
    pub confidence: MappingConfidence,
    pub missing_required: Vec<String>,
}

pub fn suggest_mapping(columns: &[String]) -> MappingSuggestion {
    let mut mapping = BTreeMap::new();
    for col in columns {
        if let Some(role) = role_synonyms(col) {
            mapping.entry(role.to_string()).or_insert_with(|| col.clone());
        }
    }

    let missing_required: Vec<String> = REQUIRED_ROLES
        .iter()
        .filter(|r| !mapping.contains_key(**r))
        .map(|r| r.to_string())
        .collect();

    // "amount" can be satisfied by a debit+credit pair instead.
    let missing_required: Vec<String> = if missing_required == vec!["amount".to_string()]
        && mapping.contains_key("debit")
        && mapping.contains_key("credit")
    {
        Vec::new()
    } else {
        missing_required
    };

    let confidence = if missing_required.is_empty() {
        if mapping.len() >= 4 {
            MappingConfidence::Alta
        } else {
            MappingConfidence::Media
        }
    } else {
        MappingConfidence::Baixa
    };

    MappingSuggestion {
        mapping,
        confidence,
        missing_required,
    }
}

/// Applies a caller-confirmed `{role: column}` mapping to every row's `raw`
/// columns, populating the typed fields the canonicalizer reads (spec §4.2:
/// "once a mapping is supplied or confirmed, every row is re-read through
/// it"). A `debit`/`credit` pair stands in for `amount` when the caller has
/// no single signed-amount column.
pub fn apply_mapping(
    rows: &mut [ParsedRow],
    columns: &[String],
    mapping: &BTreeMap<String, String>,
) -> Result<(), PipelineError> {
    let missing: Vec<String> = mapping
        .values()
        .filter(|col| !columns.contains(col))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(PipelineError::InvalidMappingColumns { missing });
    }

    for row in rows.iter_mut() {
        row.date_raw = mapping.get("date").and_then(|col| row.raw.get(col)).cloned();
        row.description_raw = mapping.get("description").and_then(|col| row.raw.get(col)).cloned();
        row.balance_after_raw = mapping.get("balanceAfter").and_then(|col| row.raw.get(col)).cloned();
        row.external_id = mapping.get("externalId").and_then(|col| row.raw.get(col)).cloned();
        row.account_hint = mapping.get("account").and_then(|col| row.raw.get(col)).cloned();

        row.amount_raw = match mapping.get("amount").and_then(|col| row.raw.get(col)) {
            Some(amount) => Some(amount.clone()),
            None => amount_from_debit_credit(row, mapping),
        };
    }

    Ok(())
}

fn amount_from_debit_credit(row: &ParsedRow, mapping: &BTreeMap<String, String>) -> Option<String> {
    let debit = mapping.get("debit").and_then(|col| row.raw.get(col)).filter(|v| is_nonzero_token(v));
    if let Some(debit) = debit {
        let trimmed = debit.trim().trim_start_matches('-');
        return Some(format!("-{trimmed}"));
    }
    mapping
        .get("credit")
        .and_then(|col| row.raw.get(col))
        .filter(|v| is_nonzero_token(v))
        .cloned()
}

fn is_nonzero_token(v: &str) -> bool {
    let stripped: String = v.chars().filter(|c| !matches!(c, '0' | '.' | ',' | '-' | ' ')).collect();
    !v.trim().is_empty() && !stripped.is_empty()
}

/// Detects the majority separator across the first `SNIFF_LINES` non-empty
/// lines, by counting occurrences of each candidate per line and picking
/// the one with the most lines in agreement on a nonzero count.
pub fn detect_separator(text: &str) -> u8 {
    let mut votes = [0usize; CANDIDATE_SEPARATORS.len()];
    for line in text.lines().filter(|l| !l.trim().is_empty()).take(SNIFF_LINES) {
        let counts: Vec<usize> = CANDIDATE_SEPARATORS
            .iter()
            .map(|sep| line.bytes().filter(|b| b == sep).count())
            .collect();
        if let Some((idx, &max)) = counts.iter().enumerate().max_by_key(|(_, c)| **c) {
            if max > 0 {
                votes[idx] += 1;
            }
        }
    }
    let (best_idx, _) = votes.iter().enumerate().max_by_key(|(_, v)| **v).unwrap_or((0, &0));
    CANDIDATE_SEPARATORS[best_idx]
}

/// Sniffs encoding by BOM first, then by heuristic high-bit byte counts,
/// falling back to cp1252 (the common mis-saved export encoding for
/// Brazilian and European bank exports alike).
pub fn detect_encoding(bytes: &[u8]) -> &'static encoding_rs::Encoding {
    if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        return UTF_8;
    }
    if std::str::from_utf8(bytes).is_ok() {
        return UTF_8;
    }
    WINDOWS_1252
}

pub fn decode(bytes: &[u8]) -> anyhow::Result<(String, &'static str)> {
    let encoding = detect_encoding(bytes);
    let mut decoder = DecodeReaderBytesBuilder::new()
        .encoding(Some(encoding))
        .build(bytes);
    let mut text = String::new();
    decoder.read_to_string(&mut text)?;
    Ok((text, encoding.name()))
}

pub fn parse(bytes: &[u8]) -> anyhow::Result<ParseOutput> {
    let (text, encoding_name) = decode(bytes)?;
    let separator = detect_separator(&text);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(separator)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut raw = BTreeMap::new();
        for (idx, field) in record.iter().enumerate() {
            if let Some(col) = headers.get(idx) {
                raw.insert(col.clone(), field.to_string());
            }
        }
        rows.push(ParsedRow {
            raw,
            ..Default::default()
        });
    }

    Ok(ParseOutput {
        columns: Some(headers),
        rows,
        detected_encoding: Some(encoding_name.to_string()),
        document_type: None,
        issuer_profile: None,
        metadata: BTreeMap::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_separator_picks_majority() {
        let text = "a;b;c\n1;2;3\n4;5;6\n";
        assert_eq!(b';', detect_separator(text));
    }

    #[test]
    fn suggest_mapping_recognizes_synonyms() {
        let cols = vec!["Data".to_string(), "Historico".to_string(), "Valor".to_string()];
        let s = suggest_mapping(&cols);
        assert_eq!(MappingConfidence::Alta, s.confidence);
        assert!(s.missing_required.is_empty());
    }

    #[test]
    fn suggest_mapping_flags_missing_date_as_baixa() {
        let cols = vec!["Historico".to_string(), "Valor".to_string()];
        let s = suggest_mapping(&cols);
        assert_eq!(MappingConfidence::Baixa, s.confidence);
        assert_eq!(vec!["date".to_string()], s.missing_required);
    }

    #[test]
    fn suggest_mapping_accepts_debit_credit_pair_in_lieu_of_amount() {
        let cols = vec![
            "Data".to_string(),
            "Historico".to_string(),
            "Debito".to_string(),
            "Credito".to_string(),
        ];
        let s = suggest_mapping(&cols);
        assert!(s.missing_required.is_empty());
    }
}
