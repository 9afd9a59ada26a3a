//! Markup-exchange parser (spec §4.2): extracts transaction blocks from an
//! OFX-style SGML container. OFX is tag-soup, not well-formed XML (tags
//! frequently go unclosed), so this walks it line-by-line the way the
//! teacher's `comment.rs` walks ledger-format comment lines — small
//! hand-written regexes against one line at a time, no general parser.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;

use crate::parsers::{ParseOutput, ParsedRow};

lazy_static! {
    static ref STMTTRN_OPEN: Regex = Regex::new(r"(?i)<STMTTRN>").unwrap();
    static ref STMTTRN_CLOSE: Regex = Regex::new(r"(?i)</STMTTRN>").unwrap();
    static ref TAG_VALUE: Regex = Regex::new(r"(?i)<([A-Z0-9.]+)>\s*([^<\r\n]*)").unwrap();
    static ref ACCTID: Regex = Regex::new(r"(?i)<ACCTID>\s*([^<\r\n]*)").unwrap();
}

pub fn parse(bytes: &[u8]) -> anyhow::Result<ParseOutput> {
    let text = String::from_utf8_lossy(bytes);

    let account_hint = ACCTID.captures(&text).map(|c| c[1].trim().to_string());

    let mut rows = Vec::new();
    let mut in_block = false;
    let mut current: BTreeMap<String, String> = BTreeMap::new();

    for line in text.lines() {
        if STMTTRN_OPEN.is_match(line) {
            in_block = true;
            current = BTreeMap::new();
            continue;
        }
        if STMTTRN_CLOSE.is_match(line) {
            in_block = false;
            if !current.is_empty() {
                rows.push(row_from_block(&current, account_hint.clone()));
            }
            continue;
        }
        if in_block {
            if let Some(caps) = TAG_VALUE.captures(line) {
                let tag = caps[1].to_uppercase();
                let value = caps[2].trim().to_string();
                current.insert(tag, value);
            }
        }
    }

    Ok(ParseOutput {
        columns: None,
        rows,
        detected_encoding: Some("utf-8".to_string()),
        document_type: None,
        issuer_profile: None,
        metadata: BTreeMap::new(),
    })
}

fn row_from_block(block: &BTreeMap<String, String>, account_hint: Option<String>) -> ParsedRow {
    let mut raw = BTreeMap::new();
    for (k, v) in block {
        raw.insert(k.clone(), v.clone());
    }

    let date_raw = block.get("DTPOSTED").map(|d| ofx_date_to_iso(d));
    let amount_raw = block.get("TRNAMT").cloned();
    let description_raw = block
        .get("NAME")
        .or_else(|| block.get("MEMO"))
        .cloned();
    let external_id = block.get("FITID").cloned();

    ParsedRow {
        raw,
        date_raw,
        description_raw,
        amount_raw,
        balance_after_raw: None,
        external_id,
        account_hint,
    }
}

/// OFX dates are `YYYYMMDD[HHMMSS[.XXX][TZ]]`; this keeps only the date
/// portion in ISO form, which `parse_flexible_date` already accepts.
fn ofx_date_to_iso(raw: &str) -> String {
    if raw.len() >= 8 {
        format!("{}-{}-{}", &raw[0..4], &raw[4..6], &raw[6..8])
    } else {
        raw.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
<OFX>
<BANKMSGSRSV1>
<STMTTRNRS>
<STMTRS>
<BANKACCTFROM>
<ACCTID>1234567890
</BANKACCTFROM>
<BANKTRANLIST>
<STMTTRN>
<TRNTYPE>DEBIT
<DTPOSTED>20260220120000
<TRNAMT>-150.34
<FITID>98765
<NAME>SUPERMERCADO LOCAL QA
</STMTTRN>
</BANKTRANLIST>
</STMTRS>
</STMTTRNRS>
</BANKMSGSRSV1>
</OFX>
"#;

    #[test]
    fn parses_single_transaction_block() {
        let out = parse(SAMPLE.as_bytes()).unwrap();
        assert_eq!(1, out.rows.len());
        let row = &out.rows[0];
        assert_eq!(Some("2026-02-20".to_string()), row.date_raw);
        assert_eq!(Some("-150.34".to_string()), row.amount_raw);
        assert_eq!(Some("SUPERMERCADO LOCAL QA".to_string()), row.description_raw);
        assert_eq!(Some("98765".to_string()), row.external_id);
        assert_eq!(Some("1234567890".to_string()), row.account_hint);
    }
}
