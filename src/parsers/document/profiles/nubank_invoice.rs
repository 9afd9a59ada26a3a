//! Nubank credit-card invoice line extractor. Dates are rendered
//! `dd MMM` with a three-letter Portuguese month abbreviation rather than
//! numeric, so this profile carries its own small date table instead of
//! reusing `parse_flexible_date`.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;

use super::{extract_money, is_common_noise_line, positive_by_lexical_hint, ProfileLine};

lazy_static! {
    static ref DUE_DATE: Regex = Regex::new(r"(?i)vencimento[:\s]+(\d{2}/\d{2}/\d{4})").unwrap();
    static ref TXN_LINE: Regex =
        Regex::new(r"(?i)^(\d{1,2})\s+([A-Z]{3})\s+(.+?)\s+R?\$?\s*([\d.,]+)$").unwrap();
}

const MONTH_ABBR: &[&str] = &[
    "JAN", "FEV", "MAR", "ABR", "MAI", "JUN", "JUL", "AGO", "SET", "OUT", "NOV", "DEZ",
];

fn resolve_year(due: NaiveDate, month: u32, day: u32) -> Option<NaiveDate> {
    use chrono::Datelike;
    let year = if month > due.month() { due.year() - 1 } else { due.year() };
    NaiveDate::from_ymd_opt(year, month, day)
}

pub fn extract(text: &str) -> anyhow::Result<Vec<ProfileLine>> {
    let due_date = DUE_DATE
        .captures(text)
        .and_then(|c| crate::normalize::parse_flexible_date(&c[1]).ok());
    let Some(due_date) = due_date else {
        anyhow::bail!("nubank_invoice: no due date found");
    };

    let mut lines = Vec::new();
    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() || is_common_noise_line(line) {
            continue;
        }
        let Some(c) = TXN_LINE.captures(line) else { continue };
        let day: u32 = c[1].parse().unwrap_or(0);
        let month_abbr = c[2].to_uppercase();
        let Some(month_idx) = MONTH_ABBR.iter().position(|m| *m == month_abbr) else { continue };
        let Some(date) = resolve_year(due_date, (month_idx + 1) as u32, day) else { continue };
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
    fn extracts_purchase_line_with_month_abbreviation() {
        let text = "Vencimento: 10/02/2026\n05 FEV COMPRA NETFLIX 39,90\n";
        let out = extract(text).unwrap();
        assert_eq!(1, out.len());
        assert_eq!(2026, chrono::Datelike::year(&out[0].date));
        assert_eq!(Decimal::new(-3990, 2), out[0].amount);
    }

    #[test]
    fn rolls_back_year_when_month_exceeds_due_month() {
        let text = "Vencimento: 10/02/2026\n15 DEZ COMPRA LOJA 10,00\n";
        let out = extract(text).unwrap();
        assert_eq!(2025, chrono::Datelike::year(&out[0].date));
    }
}
