//! Issuer profile classifier and the common line-rule shape each profile
//! extractor implements (spec §4.2). The profile set is closed; adding one
//! means adding both a classifier keyword and a submodule here.

pub mod inter_invoice;
pub mod inter_statement;
pub mod mercado_pago_invoice;
pub mod mercado_pago_statement;
pub mod nubank_invoice;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::normalize::normalize_for_match;

pub const SUPPORTED_PROFILES: &[&'static str] = &[
    "inter_statement",
    "inter_invoice",
    "mercado_pago_invoice",
    "mercado_pago_statement",
    "nubank_invoice",
];

/// One line recognized by a profile's extractor: already date-resolved and
/// sign-resolved, still carrying the raw description for the canonicalizer
/// to split further.
#[derive(Clone, Debug)]
pub struct ProfileLine {
    pub date: NaiveDate,
    pub amount: Decimal,
    pub description: String,
    pub document_type: &'static str,
}

/// Classifies normalized document text against the closed profile set by
/// simple keyword presence; order matters where issuers share vocabulary
/// (e.g. both Inter variants mention "BANCO INTER").
pub fn classify(text: &str) -> Option<&'static str> {
    let norm = normalize_for_match(text);

    if norm.contains("NUBANK") && (norm.contains("FATURA") || norm.contains("CARTAO")) {
        return Some("nubank_invoice");
    }
    if norm.contains("MERCADO PAGO") {
        if norm.contains("FATURA") {
            return Some("mercado_pago_invoice");
        }
        return Some("mercado_pago_statement");
    }
    if norm.contains("BANCO INTER") || norm.contains("INTER S.A") || norm.contains("INTER SA") {
        if norm.contains("FATURA") {
            return Some("inter_invoice");
        }
        return Some("inter_statement");
    }

    None
}

/// Shared footer/pagination noise filtered out of every profile before
/// line-rule extraction runs (spec §4.2: "Ignores formatting/footer lines
/// via per-profile denylist").
pub fn is_common_noise_line(line: &str) -> bool {
    let norm = normalize_for_match(line);
    if norm.is_empty() {
        return true;
    }
    norm.contains("SALDO DO DIA")
        || norm.starts_with("TOTAL")
        || PAGING.is_match(&norm)
}

lazy_static::lazy_static! {
    static ref PAGING: regex::Regex = regex::Regex::new(r"^--\s*\d+\s+OF\s+\d+\s*--$").unwrap();
}

/// Lexical hints that force a positive sign regardless of the document's
/// default direction (spec §4.2).
const POSITIVE_HINTS: &[&str] = &["ESTORNO", "CREDITO", "DEVOLUCAO", "PAGAMENTO RECEBIDO"];

pub fn positive_by_lexical_hint(description: &str) -> bool {
    let norm = normalize_for_match(description);
    POSITIVE_HINTS.iter().any(|h| norm.contains(h))
}

/// Parses a monetary token, tolerating an explicit `R$` prefix and a
/// trailing `+`/`-` sign glyph the flexible money parser doesn't itself
/// recognize.
pub fn extract_money(token: &str) -> Option<Decimal> {
    let trimmed = token.trim();
    let (body, forced_negative) = if let Some(stripped) = trimmed.strip_suffix('-') {
        (stripped, true)
    } else if let Some(stripped) = trimmed.strip_suffix('+') {
        (stripped, false)
    } else {
        (trimmed, false)
    };
    let value = crate::normalize::parse_money_input(body).ok()?;
    Some(if forced_negative { -value.abs() } else { value })
}

/// Rolls an invoice line's month back a year when it's greater than the
/// due month, per spec §4.2 ("rolls month back across year boundary when
/// an invoice line's month is greater than the due month").
pub fn resolve_invoice_year(due_date: NaiveDate, month: u32, day: u32) -> Option<NaiveDate> {
    use chrono::Datelike;
    let year = if month > due_date.month() {
        due_date.year() - 1
    } else {
        due_date.year()
    };
    NaiveDate::from_ymd_opt(year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_picks_nubank_invoice() {
        assert_eq!(Some("nubank_invoice"), classify("NUBANK FATURA DO CARTAO"));
    }

    #[test]
    fn classify_picks_mercado_pago_statement() {
        assert_eq!(Some("mercado_pago_statement"), classify("extrato MERCADO PAGO conta"));
    }

    #[test]
    fn classify_returns_none_for_unrecognized_issuer() {
        assert_eq!(None, classify("some random bank document"));
    }

    #[test]
    fn resolve_invoice_year_rolls_back_past_due_month() {
        let due = NaiveDate::from_ymd_opt(2026, 2, 10).unwrap();
        assert_eq!(
            NaiveDate::from_ymd_opt(2026, 2, 5),
            resolve_invoice_year(due, 2, 5)
        );
        assert_eq!(
            NaiveDate::from_ymd_opt(2025, 12, 15),
            resolve_invoice_year(due, 12, 15)
        );
    }

    #[test]
    fn is_common_noise_line_matches_paging_artifact() {
        assert!(is_common_noise_line("-- 2 of 5 --"));
        assert!(is_common_noise_line("Saldo do dia 1.234,00"));
        assert!(!is_common_noise_line("05/02 COMPRA UBER 23,00"));
    }
}
