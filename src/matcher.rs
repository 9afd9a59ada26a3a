//! Transfer Matcher (spec §4.7): pairs an outgoing entry in one account
//! with an incoming entry in another within a date/amount/text window,
//! scoring candidates and deciding auto-match / suggestion / ignore.
//!
//! Grounded on the teacher's `merge/matching.rs` (candidate pairing across
//! two transaction lists scored by multiple weighted signals before a
//! pair is accepted) generalized from its unconditional-merge acceptance
//! to this system's three-tier score bands.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::Serialize;

use crate::model::{Direction, Id, LedgerEntry};
use crate::normalize::normalize_for_match;

const AMOUNT_SCORE_DIVISOR_CENTS: f64 = 165.0;
const AMOUNT_SCORE_ZERO_THRESHOLD_CENTS: i64 = 150;
const DEFAULT_WINDOW_DAYS: i64 = 1;
const WIDE_WINDOW_DAYS: i64 = 3;
const MERCHANT_KEY_PENALTY: f64 = 0.08;

const AUTO_MATCH_MIN_SCORE: f64 = 0.82;
const SUGGESTION_MIN_SCORE: f64 = 0.62;
const SUGGESTION_MAX_DELTA_CENTS: i64 = 150;

const KEYWORD_MARKERS: &[&str] = &["PIX", "TED", "DOC", "TRANSFER", "ENVIADO", "RECEBIDO"];
const WIDE_WINDOW_MARKERS: &[&str] = &["TED", "DOC"];

#[derive(Clone, Debug)]
pub struct MatchCandidate {
    pub entry_id: Id,
    pub account_id: Id,
    pub posted_at: NaiveDate,
    pub amount_cents: i64,
    pub direction: Direction,
    pub normalized_description: String,
    pub merchant_key: Option<String>,
    pub is_card_payment: bool,
}

impl MatchCandidate {
    pub fn from_entry(e: &LedgerEntry, merchant_key: Option<String>, is_card_payment: bool) -> Self {
        Self {
            entry_id: e.id,
            account_id: e.account_id,
            posted_at: e.posted_at,
            amount_cents: e.amount_cents,
            direction: e.direction,
            normalized_description: e.normalized_description.clone(),
            merchant_key,
            is_card_payment,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferSuggestion {
    pub from_account_id: Id,
    pub to_account_id: Id,
    pub amount_cents: i64,
    pub date: NaiveDate,
    pub confidence: f64,
    pub description: String,
    pub counterpart_description: String,
}

#[derive(Clone, Debug)]
pub struct AutoMatch {
    pub outgoing_id: Id,
    pub incoming_id: Id,
    pub from_account_id: Id,
    pub to_account_id: Id,
}

#[derive(Default)]
pub struct MatchResult {
    pub auto_matches: Vec<AutoMatch>,
    pub suggestions: Vec<TransferSuggestion>,
}

fn window_days(out_desc: &str, in_desc: &str) -> i64 {
    if WIDE_WINDOW_MARKERS.iter().any(|m| out_desc.contains(m) || in_desc.contains(m)) {
        WIDE_WINDOW_DAYS
    } else {
        DEFAULT_WINDOW_DAYS
    }
}

fn amount_score(out_cents: i64, in_cents: i64) -> f64 {
    let delta = (out_cents.unsigned_abs() as i64 - in_cents.unsigned_abs() as i64).unsigned_abs() as i64;
    if delta > AMOUNT_SCORE_ZERO_THRESHOLD_CENTS {
        0.0
    } else {
        (1.0 - delta as f64 / AMOUNT_SCORE_DIVISOR_CENTS).max(0.0)
    }
}

fn date_score(out_date: NaiveDate, in_date: NaiveDate, window_days: i64) -> f64 {
    let delta_days = (in_date - out_date).num_days().abs() as f64;
    let window_span = window_days as f64 + 1.0;
    (1.0 - delta_days / window_span).max(0.0)
}

fn keyword_score(out_desc: &str, in_desc: &str) -> f64 {
    if KEYWORD_MARKERS.iter().any(|m| out_desc.contains(m) || in_desc.contains(m)) {
        1.0
    } else {
        0.45
    }
}

fn jaccard_text_score(out_desc: &str, in_desc: &str) -> f64 {
    let out_tokens: HashSet<&str> = out_desc.split_whitespace().filter(|t| t.len() >= 3).collect();
    let in_tokens: HashSet<&str> = in_desc.split_whitespace().filter(|t| t.len() >= 3).collect();
    if out_tokens.is_empty() && in_tokens.is_empty() {
        return 0.0;
    }
    let intersection = out_tokens.intersection(&in_tokens).count() as f64;
    let union = out_tokens.union(&in_tokens).count() as f64;
    if union == 0.0 {
        0.0
    } else {
        intersection / union
    }
}

fn merchant_penalty(out_key: &Option<String>, in_key: &Option<String>) -> f64 {
    match (out_key, in_key) {
        (Some(a), Some(b)) if a != b => MERCHANT_KEY_PENALTY,
        _ => 0.0,
    }
}

/// Combined score per spec §4.7: `0.55*amount + 0.25*date + 0.10*keyword +
/// 0.10*text - penalty`, clamped to `[0, 1]`.
pub fn score(out: &MatchCandidate, inc: &MatchCandidate) -> f64 {
    let window = window_days(&out.normalized_description, &inc.normalized_description);
    let a = amount_score(out.amount_cents, inc.amount_cents);
    let d = date_score(out.posted_at, inc.posted_at, window);
    let k = keyword_score(&out.normalized_description, &inc.normalized_description);
    let t = jaccard_text_score(&out.normalized_description, &inc.normalized_description);
    let penalty = merchant_penalty(&out.merchant_key, &inc.merchant_key);

    (0.55 * a + 0.25 * d + 0.10 * k + 0.10 * t - penalty).clamp(0.0, 1.0)
}

/// Matches outgoing entries against incoming entries within the batch's
/// surrounding window. Card-payment rows are excluded from both sides
/// (spec §4.7: "to avoid shadowing the dedicated router").
pub fn match_transfers(candidates: &[MatchCandidate]) -> MatchResult {
    let outgoing: Vec<&MatchCandidate> = candidates
        .iter()
        .filter(|c| c.direction == Direction::Out && !c.is_card_payment)
        .collect();
    let incoming: Vec<&MatchCandidate> = candidates
        .iter()
        .filter(|c| c.direction == Direction::In && !c.is_card_payment)
        .collect();

    let mut result = MatchResult::default();
    let mut claimed_incoming: HashSet<Id> = HashSet::new();

    for out in &outgoing {
        let mut best: Option<(f64, &MatchCandidate)> = None;
        for inc in &incoming {
            if inc.account_id == out.account_id || claimed_incoming.contains(&inc.entry_id) {
                continue;
            }
            let window = window_days(&out.normalized_description, &inc.normalized_description);
            let delta_days = (inc.posted_at - out.posted_at).num_days().abs();
            if delta_days > window {
                continue;
            }
            let s = score(out, inc);
            if best.map_or(true, |(b, _)| s > b) {
                best = Some((s, inc));
            }
        }

        let Some((best_score, inc)) = best else { continue };
        let delta_cents = (out.amount_cents.unsigned_abs() as i64 - inc.amount_cents.unsigned_abs() as i64).unsigned_abs() as i64;

        if best_score >= AUTO_MATCH_MIN_SCORE && delta_cents == 0 {
            claimed_incoming.insert(inc.entry_id);
            result.auto_matches.push(AutoMatch {
                outgoing_id: out.entry_id,
                incoming_id: inc.entry_id,
                from_account_id: out.account_id,
                to_account_id: inc.account_id,
            });
        } else if best_score >= SUGGESTION_MIN_SCORE || delta_cents <= SUGGESTION_MAX_DELTA_CENTS {
            result.suggestions.push(TransferSuggestion {
                from_account_id: out.account_id,
                to_account_id: inc.account_id,
                amount_cents: out.amount_cents,
                date: out.posted_at,
                confidence: best_score,
                description: normalize_for_match(&out.normalized_description),
                counterpart_description: normalize_for_match(&inc.normalized_description),
            });
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(account: Id, date: NaiveDate, amount_cents: i64, direction: Direction, desc: &str) -> MatchCandidate {
        MatchCandidate {
            entry_id: Id::new(),
            account_id: account,
            posted_at: date,
            amount_cents,
            direction,
            normalized_description: desc.to_string(),
            merchant_key: None,
            is_card_payment: false,
        }
    }

    #[test]
    fn exact_same_day_pix_auto_matches() {
        let a1 = Id::new();
        let a2 = Id::new();
        let d = NaiveDate::from_ymd_opt(2026, 3, 8).unwrap();
        let out = candidate(a1, d, -450, Direction::Out, "PIX TRANSFERENCIA ALFA BETA");
        let inc = candidate(a2, d, 450, Direction::In, "PIX TRANSFERENCIA ALFA BETA");
        let result = match_transfers(&[out, inc]);
        assert_eq!(1, result.auto_matches.len());
        assert!(result.suggestions.is_empty());
    }

    #[test]
    fn next_day_pix_pair_still_auto_matches_within_default_window() {
        let a1 = Id::new();
        let a2 = Id::new();
        let d = NaiveDate::from_ymd_opt(2026, 3, 8).unwrap();
        let out = candidate(a1, d, -450, Direction::Out, "PIX TRANSFERENCIA ALFA BETA");
        let inc = candidate(a2, d + chrono::Duration::days(1), 450, Direction::In, "PIX TRANSFERENCIA ALFA BETA");
        let result = match_transfers(&[out, inc]);
        assert_eq!(1, result.auto_matches.len());
        assert!(result.suggestions.is_empty());
    }

    #[test]
    fn small_delta_is_a_suggestion_not_auto_match() {
        let a1 = Id::new();
        let a2 = Id::new();
        let d = NaiveDate::from_ymd_opt(2026, 3, 8).unwrap();
        let out = candidate(a1, d, -450, Direction::Out, "PIX TRANSFERENCIA ALFA");
        let inc = candidate(a2, d, 575, Direction::In, "PIX RECEBIDO ALFA");
        let result = match_transfers(&[out, inc]);
        assert!(result.auto_matches.is_empty());
        assert_eq!(1, result.suggestions.len());
    }

    #[test]
    fn large_delta_is_ignored() {
        let a1 = Id::new();
        let a2 = Id::new();
        let d = NaiveDate::from_ymd_opt(2026, 3, 8).unwrap();
        let out = candidate(a1, d, -450, Direction::Out, "PIX TRANSFERENCIA ALFA");
        let inc = candidate(a2, d, 601, Direction::In, "PIX RECEBIDO ALFA");
        let result = match_transfers(&[out, inc]);
        assert!(result.auto_matches.is_empty());
        assert!(result.suggestions.is_empty());
    }

    #[test]
    fn card_payment_rows_are_excluded_from_matching() {
        let a1 = Id::new();
        let a2 = Id::new();
        let d = NaiveDate::from_ymd_opt(2026, 3, 8).unwrap();
        let mut out = candidate(a1, d, -450, Direction::Out, "PAGAMENTO FATURA");
        out.is_card_payment = true;
        let inc = candidate(a2, d, 450, Direction::In, "RANDOM CREDIT");
        let result = match_transfers(&[out, inc]);
        assert!(result.auto_matches.is_empty());
        assert!(result.suggestions.is_empty());
    }
}
