//! Banco Inter credit-card invoice line extractor.
//!
//! Lines carry an inline `dd/MM` date prefix (no year — inferred from the
//! invoice's due date, rolling back across a year boundary per spec §4.2)
//! followed by a description and an amount. Purchases are negative by
//! default; "PAGAMENTO RECEBIDO"/"ESTORNO" lines flip positive.

use lazy_static::lazy_static;
use regex::Regex;

use super::{extract_money, is_common_noise_line, positive_by_lexical_hint, resolve_invoice_year, ProfileLine};

lazy_static! {
    static ref DUE_DATE: Regex = Regex::new(r"(?i)vencimento[:\s]+(\d{2}/\d{2}/\d{4})").unwrap();
    static ref TXN_LINE: Regex = Regex::new(r"^(\d{2})/(\d{2})\s+(.+?)\s+R?\$?\s*(-?[\d.,]+)$").unwrap();
}

/// Per-profile denylist beyond the common footer noise (spec §4.2,
/// §9 "partially data-driven... leaves additions to per-profile fixtures").
const IGNORE_LINES: &[&str] = &["LIMITE DISPONIVEL", "PAGAMENTO MINIMO"];

pub fn extract(text: &str) -> anyhow::Result<Vec<ProfileLine>> {
    let due_date = DUE_DATE
        .captures(text)
        .and_then(|c| crate::normalize::parse_flexible_date(&c[1]).ok());
    let Some(due_date) = due_date else {
        anyhow::bail!("inter_invoice: no due date found");
    };

    let mut lines = Vec::new();
    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() || is_common_noise_line(line) {
            continue;
        }
        let norm = crate::normalize::normalize_for_match(line);
        if IGNORE_LINES.iter().any(|d| norm.contains(d)) {
            continue;
        }
        let Some(c) = TXN_LINE.captures(line) else { continue };
        let (month, day): (u32, u32) = (c[1].parse().unwrap_or(0), c[2].parse().unwrap_or(0));
        let Some(date) = resolve_invoice_year(due_date, month, day) else { continue };
        let description = c[3].trim().to_string();
        let Some(mut amount) = extract_money(&c[4]) else { continue };
        if !positive_by_lexical_hint(&description) {
            amount = -amount.abs();
        } else {
            amount = amount.abs();
        }
        lines.push(ProfileLine {
            date,
            amount,
            description,
            document_type: "credit_card_invoice",
        });
    }

    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn extracts_purchase_as_negative_and_refund_as_positive() {
        let text = "Vencimento: 10/02/2026\n05/02 COMPRA NO DEBITO UBER 23,00\n15/12 ESTORNO COMPRA DUPLICADA 10,00\n";
        let out = extract(text).unwrap();
        assert_eq!(2, out.len());
        assert_eq!(2026, chrono::Datelike::year(&out[0].date));
        assert_eq!(Decimal::new(-2300, 2), out[0].amount);
        assert_eq!(2025, chrono::Datelike::year(&out[1].date));
        assert_eq!(Decimal::new(1000, 2), out[1].amount);
    }
}
