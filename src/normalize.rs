//! Text Normalizer (spec §4.1): folding encodings, repairing mojibake,
//! deriving merchant keys, and parsing the loose date/money formats the
//! source parsers hand it.
//!
//! Grounded on the teacher's `comment.rs` (hand-written `lazy_static!`
//! regexes compiled once, matched against a borrowed `&str`) generalized
//! from comment-tag parsing to free-text normalization, plus
//! `importers/nationwide_csv.rs`'s manual date/decimal parsing (a custom
//! `Deserialize` there; a plain function here since this pipeline parses
//! outside of serde).

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq)]
pub enum NormalizeError {
    #[error("unrecognized date format: {0:?}")]
    InvalidDate(String),
    #[error("ambiguous or unrecognized amount: {0:?}")]
    InvalidAmount(String),
}

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
    static ref ISO_DATE: Regex = Regex::new(r"^(\d{4})-(\d{2})-(\d{2})$").unwrap();
    static ref SLASH_DATE: Regex = Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{2}|\d{4})$").unwrap();
    static ref HYPHEN_DATE: Regex = Regex::new(r"^(\d{1,2})-(\d{1,2})-(\d{4})$").unwrap();
    static ref WORD_DATE: Regex =
        Regex::new(r"(?i)^(\d{1,2})\s+de\s+([a-zç]+)\s+de\s+(\d{4})$").unwrap();
    static ref MONEY_TOKEN: Regex =
        Regex::new(r"(?i)^\s*r?\$?\s*(-?[\d.,]+)\s*(c|d)?\s*$").unwrap();
    static ref NUMERIC_SUFFIX: Regex = Regex::new(r"\s*#?\d{3,}$").unwrap();
}

const PT_MONTHS: &[&str] = &[
    "janeiro",
    "fevereiro",
    "marco",
    "abril",
    "maio",
    "junho",
    "julho",
    "agosto",
    "setembro",
    "outubro",
    "novembro",
    "dezembro",
];

/// Generic tokens stripped when deriving a merchant key: payment verbs and
/// channel names that carry no vendor identity of their own.
const MERCHANT_NOISE_TOKENS: &[&str] = &[
    "PAGAMENTO",
    "COMPRA",
    "DEBITO",
    "CREDITO",
    "PIX",
    "TRANSFERENCIA",
    "ENVIADO",
    "RECEBIDO",
    "PARC",
    "PARCELA",
];

/// Uppercase, diacritic-stripped, whitespace-collapsed form used only for
/// matching (rule patterns, transfer scoring, merchant key derivation).
/// Never used for display.
pub fn normalize_for_match(s: &str) -> String {
    let fixed = fix_mojibake(s);
    let stripped = strip_diacritics(&fixed);
    let upper = stripped.to_uppercase();
    WHITESPACE.replace_all(upper.trim(), " ").into_owned()
}

fn strip_diacritics(s: &str) -> String {
    s.chars().map(unicode_decompose).collect()
}

/// Minimal NFD-style decomposition for the Latin-1 Supplement + Latin
/// Extended-A range this pipeline actually sees (pt-BR text). Avoids a
/// full-blown unicode-normalization dependency for a closed alphabet.
fn unicode_decompose(c: char) -> String {
    let base = match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
        'Á' | 'À' | 'Â' | 'Ã' | 'Ä' => 'A',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'É' | 'È' | 'Ê' | 'Ë' => 'E',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' => 'O',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
        'ç' => 'c',
        'Ç' => 'C',
        'ñ' => 'n',
        'Ñ' => 'N',
        other => other,
    };
    base.to_string()
}

/// Repairs byte-sequence -> code-point misinterpretations commonly produced
/// when latin-1/cp1252 bytes get decoded as UTF-8 and re-encoded, producing
/// the familiar "Ã§Ã£o" mangling. Round-trips the string through latin-1
/// bytes when doing so yields valid UTF-8 containing a known mojibake
/// marker; otherwise returns the input unchanged.
pub fn fix_mojibake(s: &str) -> String {
    if !looks_like_mojibake(s) {
        return s.to_string();
    }
    let bytes: Vec<u8> = s.chars().filter_map(|c| u32::try_from(c).ok().and_then(|v| u8::try_from(v).ok())).collect();
    if bytes.len() != s.chars().count() {
        return s.to_string();
    }
    match String::from_utf8(bytes) {
        Ok(repaired) if repaired.chars().all(|c| !c.is_control() || c == '\n' || c == '\t') => repaired,
        _ => s.to_string(),
    }
}

fn looks_like_mojibake(s: &str) -> bool {
    s.contains('Ã') || s.contains('Â') || s.contains("â€")
}

/// Stable short key for deduplicating rule patterns across similar vendors.
/// "transacao" is the sentinel for "no usable merchant" (spec §4.1).
pub fn build_merchant_key(text: &str) -> String {
    let normalized = normalize_for_match(text);
    let mut key = normalized;
    for noise in MERCHANT_NOISE_TOKENS {
        key = key.replace(noise, " ");
    }
    key = NUMERIC_SUFFIX.replace(&key, "").into_owned();
    key = WHITESPACE.replace_all(key.trim(), " ").into_owned();
    if key.is_empty() {
        "transacao".to_string()
    } else {
        key
    }
}

/// Accepts ISO (`YYYY-MM-DD`), Brazilian slash (`dd/MM/yyyy`, `dd/MM/yy`),
/// hyphenated (`dd-MM-yyyy`), and Portuguese word-month dates. Two-digit
/// years `< 70` resolve to the 2000s, else the 1900s.
pub fn parse_flexible_date(input: &str) -> Result<NaiveDate, NormalizeError> {
    let trimmed = input.trim();

    if let Some(c) = ISO_DATE.captures(trimmed) {
        return ymd(&c[1], &c[2], &c[3], trimmed);
    }
    if let Some(c) = SLASH_DATE.captures(trimmed) {
        let year = resolve_two_digit_year(&c[3]);
        return dmy(&c[1], &c[2], &year, trimmed);
    }
    if let Some(c) = HYPHEN_DATE.captures(trimmed) {
        return dmy(&c[1], &c[2], &c[3], trimmed);
    }
    if let Some(c) = WORD_DATE.captures(trimmed) {
        let month_name = normalize_for_match(&c[2]).to_lowercase();
        let month_idx = PT_MONTHS
            .iter()
            .position(|m| *m == month_name)
            .ok_or_else(|| NormalizeError::InvalidDate(input.to_string()))?;
        return dmy(&c[1], &(month_idx + 1).to_string(), &c[3], trimmed);
    }

    Err(NormalizeError::InvalidDate(input.to_string()))
}

fn resolve_two_digit_year(y: &str) -> String {
    if y.len() == 4 {
        return y.to_string();
    }
    let n: u32 = y.parse().unwrap_or(0);
    if n < 70 {
        format!("20{:02}", n)
    } else {
        format!("19{:02}", n)
    }
}

fn ymd(y: &str, m: &str, d: &str, original: &str) -> Result<NaiveDate, NormalizeError> {
    let (y, m, d): (i32, u32, u32) = (
        y.parse().unwrap_or(0),
        m.parse().unwrap_or(0),
        d.parse().unwrap_or(0),
    );
    NaiveDate::from_ymd_opt(y, m, d).ok_or_else(|| NormalizeError::InvalidDate(original.to_string()))
}

fn dmy(d: &str, m: &str, y: &str, original: &str) -> Result<NaiveDate, NormalizeError> {
    ymd(y, m, d, original)
}

/// Parses a loosely-formatted monetary token. Accepts Brazilian grouping
/// (`.` thousands, `,` decimals), plain ASCII decimals, an `R$` prefix, and
/// a trailing `C`/`D` suffix where `D` forces the result negative.
pub fn parse_money_input(text: &str) -> Result<Decimal, NormalizeError> {
    let caps = MONEY_TOKEN
        .captures(text)
        .ok_or_else(|| NormalizeError::InvalidAmount(text.to_string()))?;
    let number = &caps[1];
    let suffix = caps.get(2).map(|m| m.as_str().to_lowercase());

    let has_comma = number.contains(',');
    let has_dot = number.contains('.');
    let normalized = if has_comma && has_dot {
        number.replace('.', "").replace(',', ".")
    } else if has_comma {
        number.replace(',', ".")
    } else {
        number.to_string()
    };

    let mut value = Decimal::from_str(&normalized)
        .map_err(|_| NormalizeError::InvalidAmount(text.to_string()))?;

    if let Some(s) = suffix {
        if s == "d" {
            value = -value.abs();
        } else if s == "c" {
            value = value.abs();
        }
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_for_match_strips_diacritics_and_collapses_space() {
        assert_eq!("CARTAO  DE CREDITO".replace("  ", " "), normalize_for_match("  Cartão  de crédito "));
    }

    #[test]
    fn build_merchant_key_strips_noise_tokens() {
        assert_eq!("UBER", build_merchant_key("PAGAMENTO COMPRA UBER 12345"));
    }

    #[test]
    fn build_merchant_key_falls_back_to_sentinel() {
        assert_eq!("transacao", build_merchant_key("PAGAMENTO COMPRA"));
    }

    #[test]
    fn parse_flexible_date_handles_iso_slash_hyphen_and_word_forms() {
        let expected = NaiveDate::from_ymd_opt(2026, 2, 5).unwrap();
        assert_eq!(expected, parse_flexible_date("2026-02-05").unwrap());
        assert_eq!(expected, parse_flexible_date("05/02/2026").unwrap());
        assert_eq!(expected, parse_flexible_date("05-02-2026").unwrap());
        assert_eq!(expected, parse_flexible_date("5 de fevereiro de 2026").unwrap());
    }

    #[test]
    fn parse_flexible_date_two_digit_year_pivot() {
        assert_eq!(2026, parse_flexible_date("05/02/26").unwrap().format("%Y").to_string().parse::<i32>().unwrap());
        assert_eq!(1999, parse_flexible_date("05/02/99").unwrap().format("%Y").to_string().parse::<i32>().unwrap());
    }

    #[test]
    fn parse_flexible_date_rejects_garbage() {
        assert!(parse_flexible_date("not a date").is_err());
    }

    #[test]
    fn parse_money_input_handles_brazilian_grouping() {
        assert_eq!(Decimal::from_str("1234.56").unwrap(), parse_money_input("1.234,56").unwrap());
    }

    #[test]
    fn parse_money_input_handles_rs_prefix_and_debit_suffix() {
        assert_eq!(Decimal::from_str("-50.00").unwrap(), parse_money_input("R$ 50,00 D").unwrap());
    }

    #[test]
    fn parse_money_input_rejects_ambiguous_text() {
        assert!(parse_money_input("about fifty bucks").is_err());
    }
}
