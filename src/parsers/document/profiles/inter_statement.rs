//! Banco Inter checking-account statement line extractor.
//!
//! Layout: a per-day header line (`dd/MM/yyyy`) followed by one or more
//! transaction lines carrying a description and a trailing signed amount,
//! direction derived from the statement's own `+`/`-` column rather than a
//! lexical hint.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;

use super::{extract_money, is_common_noise_line, ProfileLine};

lazy_static! {
    static ref DAY_HEADER: Regex = Regex::new(r"^(\d{2}/\d{2}/\d{4})$").unwrap();
    static ref TXN_LINE: Regex = Regex::new(r"^(.+?)\s+R?\$?\s*(-?[\d.,]+[+-]?)$").unwrap();
}

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
        let Some(date) = current_date else { continue };
        if let Some(c) = TXN_LINE.captures(line) {
            let description = c[1].trim().to_string();
            let Some(amount) = extract_money(&c[2]) else { continue };
            lines.push(ProfileLine {
                date,
                amount,
                description,
                document_type: "bank_statement",
            });
        }
    }

    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_lines_under_day_header() {
        let text = "20/02/2026\nSUPERMERCADO LOCAL QA 150,34-\nPIX RECEBIDO FULANO 200,00+\n";
        let out = extract(text).unwrap();
        assert_eq!(2, out.len());
        assert_eq!(Decimal::new(-15034, 2), out[0].amount);
        assert_eq!(Decimal::new(20000, 2), out[1].amount);
    }
}
