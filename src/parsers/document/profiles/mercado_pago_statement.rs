//! Mercado Pago account statement line extractor. Same per-day-header
//! shape as `inter_statement` but amounts carry an explicit `R$` prefix
//! rather than a trailing sign glyph, and direction is lexical
//! (Mercado Pago statements never show a raw `+`/`-`).

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;

use super::{extract_money, is_common_noise_line, positive_by_lexical_hint, ProfileLine};

lazy_static! {
    static ref DAY_HEADER: Regex = Regex::new(r"^(\d{1,2}\s+de\s+\w+\s+de\s+\d{4})$").unwrap();
    static ref TXN_LINE: Regex = Regex::new(r"(?i)^(.+?)\s+R\$\s*([\d.,]+)$").unwrap();
}

const IGNORE_LINES: &[&str] = &["DINHEIRO DISPONIVEL", "RENDIMENTO DO DIA"];

pub fn extract(text: &str) -> anyhow::Result<Vec<ProfileLine>> {
    let mut lines = Vec::new();
    let mut current_date: Option<NaiveDate> = None;

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() || is_common_noise_line(line) {
            continue;
        }
        if let Some(c) = DAY_HEADER.captures(line) {
            current_date = crate::normalize::parse_flexible_date(&c[1]).ok();
            continue;
        }
        let norm = crate::normalize::normalize_for_match(line);
        if IGNORE_LINES.iter().any(|d| norm.contains(d)) {
            continue;
        }
        let Some(date) = current_date else { continue };
        let Some(c) = TXN_LINE.captures(line) else { continue };
        let description = c[1].trim().to_string();
        let Some(mut amount) = extract_money(&c[2]) else { continue };
        amount = if positive_by_lexical_hint(&description) {
            amount.abs()
        } else {
            -amount.abs()
        };
        lines.push(ProfileLine {
            date,
            amount,
            description,
            document_type: "bank_statement",
        });
    }

    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn extracts_lines_with_rs_prefix() {
        let text = "5 de fevereiro de 2026\nCOMPRA LOJA ABC R$ 50,00\nDEVOLUCAO LOJA ABC R$ 50,00\n";
        let out = extract(text).unwrap();
        assert_eq!(2, out.len());
        assert_eq!(Decimal::new(-5000, 2), out[0].amount);
        assert_eq!(Decimal::new(5000, 2), out[1].amount);
    }
}
