//! Mercado Pago credit-card invoice line extractor. Same inline-date,
//! due-date-anchored year inference as `inter_invoice`; dates are
//! ISO-ish (`dd/MM`) and amounts carry an `R$` prefix instead of a bare
//! trailing number.

use lazy_static::lazy_static;
use regex::Regex;

use super::{extract_money, is_common_noise_line, positive_by_lexical_hint, resolve_invoice_year, ProfileLine};

lazy_static! {
    static ref DUE_DATE: Regex = Regex::new(r"(?i)vencimento[:\s]+(\d{2}/\d{2}/\d{4})").unwrap();
    static ref TXN_LINE: Regex = Regex::new(r"(?i)^(\d{2})/(\d{2})\s+(.+?)\s+R\$\s*([\d.,]+)$").unwrap();
}

pub fn extract(text: &str) -> anyhow::Result<Vec<ProfileLine>> {
    let due_date = DUE_DATE
        .captures(text)
        .and_then(|c| crate::normalize::parse_flexible_date(&c[1]).ok());
    let Some(due_date) = due_date else {
        anyhow::bail!("mercado_pago_invoice: no due date found");
    };

    let mut lines = Vec::new();
    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() || is_common_noise_line(line) {
            continue;
        }
        let Some(c) = TXN_LINE.captures(line) else { continue };
        let (month, day): (u32, u32) = (c[1].parse().unwrap_or(0), c[2].parse().unwrap_or(0));
        let Some(date) = resolve_invoice_year(due_date, month, day) else { continue };
        let description = c[3].trim().to_string();
        let Some(mut amount) = extract_money(&c[4]) else { continue };
        amount = if positive_by_lexical_hint(&description) {
            amount.abs()
        } else {
            -amount.abs()
        };
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
    fn extracts_purchase_line_and_applies_year_rollover() {
        let text = "Vencimento: 10/02/2026\n15/12 COMPRA LOJA XYZ R$ 80,00\n";
        let out = extract(text).unwrap();
        assert_eq!(1, out.len());
        assert_eq!(2025, chrono::Datelike::year(&out[0].date));
        assert_eq!(Decimal::new(-8000, 2), out[0].amount);
    }
}
