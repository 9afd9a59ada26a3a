//! Card-Payment Router (spec §4.6): detects card-fatura payment lines on a
//! bank statement and converts them to a transfer pair into a credit
//! account, and (in the opposite direction) routes credit-invoice purchase
//! lines to the right credit account even when the caller's default
//! account is a checking account.
//!
//! Grounded on the teacher's `merge/merger.rs` staged-transaction shape
//! (a raw posting gets reclassified and paired with a synthesized
//! counterpart before the final transaction list is built) generalized
//! from its pure-merge role to this system's routing-then-commit pipeline.

use chrono::NaiveDate;

use crate::model::{Account, AccountType, CanonicalImportRow, Id, RowType};
use crate::normalize::normalize_for_match;

/// Vocabulary recognized as a card-fatura payment line on a bank statement
/// (spec §4.6).
fn is_statement_payment_line(description_norm: &str) -> bool {
    const EXACT_PHRASES: &[&str] = &[
        "PAGAMENTO FATURA",
        "PGTO FATURA",
        "PAG CART",
        "CREDIT CARD PAYMENT",
    ];
    if EXACT_PHRASES.iter().any(|p| description_norm.contains(p)) {
        return true;
    }
    description_norm.contains("FATURA")
        && (description_norm.contains("PAGAMENTO")
            || description_norm.contains("PAG")
            || description_norm.contains("PGTO")
            || description_norm.contains("CARTAO"))
}

/// Invoice "payment received" lines, skipped per the `skip_card_payment_lines`
/// option rather than routed as purchases.
fn is_invoice_payment_received_line(description_norm: &str) -> bool {
    description_norm.contains("PAGAMENTO RECEBIDO")
}

pub struct CardPaymentOptions {
    pub convert_card_payments_to_transfer: bool,
    pub card_payment_target_account_id: Option<Id>,
    pub skip_card_payment_lines: bool,
}

impl Default for CardPaymentOptions {
    fn default() -> Self {
        Self {
            convert_card_payments_to_transfer: true,
            card_payment_target_account_id: None,
            skip_card_payment_lines: true,
        }
    }
}

/// A credit account plus the signals the destination scorer needs.
pub struct CreditAccountCandidate {
    pub account: Account,
    pub due_day: Option<u32>,
    /// Absolute difference in cents between this statement row and the
    /// nearest recent purchase on the candidate account within the ±45 day
    /// window, if one exists.
    pub nearest_recent_purchase_delta_cents: Option<i64>,
}

const MIN_SCORE: i32 = 5;
const MIN_MARGIN: f64 = 1.5;

fn score_candidate(
    candidate: &CreditAccountCandidate,
    default_account: &Account,
    post_date: NaiveDate,
) -> f64 {
    let mut score = 0.0;

    if candidate.account.parent_account_id == Some(default_account.id) {
        score += 3.0;
    }
    if candidate.account.institution.is_some() && candidate.account.institution == default_account.institution {
        score += 2.0;
    }
    if let Some(due_day) = candidate.due_day {
        use chrono::Datelike;
        let delta = (due_day as i32 - post_date.day() as i32).unsigned_abs();
        if delta <= 3 {
            score += 2.0;
        } else if delta <= 7 {
            score += 1.0;
        }
    }
    if let Some(delta_cents) = candidate.nearest_recent_purchase_delta_cents {
        if delta_cents.unsigned_abs() <= 50 {
            score += 3.0;
        } else if delta_cents.unsigned_abs() <= 300 {
            score += 1.0;
        }
    }

    score
}

/// Picks the best-scoring destination, requiring `best >= MIN_SCORE` and a
/// margin of at least `MIN_MARGIN` over the runner-up (spec §4.6).
pub fn select_destination(
    candidates: &[CreditAccountCandidate],
    default_account: &Account,
    post_date: NaiveDate,
) -> Option<Id> {
    let mut scored: Vec<(f64, Id)> = candidates
        .iter()
        .map(|c| (score_candidate(c, default_account, post_date), c.account.id))
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap());

    match scored.as_slice() {
        [] => None,
        [(only_score, id)] if *only_score >= MIN_SCORE as f64 => Some(*id),
        [(best_score, id), (runner_up, _), ..]
            if *best_score >= MIN_SCORE as f64 && best_score - runner_up >= MIN_MARGIN =>
        {
            Some(*id)
        }
        _ => None,
    }
}

/// Result of running a row through the router.
pub enum RouteOutcome {
    /// Row was left untouched (not a card-payment/invoice-purchase line).
    Unchanged,
    /// Statement line converted to a matched transfer pair: the mutated
    /// outgoing row plus a synthesized incoming peer row.
    ConvertedToTransferPair(CanonicalImportRow),
    /// Invoice purchase routed to a (possibly synthesized) credit account.
    RoutedToCredit,
    /// Invoice payment-received line, dropped per `skip_card_payment_lines`.
    Skipped,
    /// Statement line matched the vocabulary but no destination could be
    /// confidently selected.
    NotConverted,
}

#[derive(Default)]
pub struct RouterTally {
    pub transfers_created: usize,
    pub card_payment_detected: usize,
    pub card_payment_not_converted: usize,
}

/// Statement-to-credit mode (spec §4.6): the default account is
/// checking/cash. Mutates `row` in place to the outgoing leg and returns
/// the synthesized incoming leg on success.
pub fn route_statement_payment(
    row: &mut CanonicalImportRow,
    opts: &CardPaymentOptions,
    candidates: &[CreditAccountCandidate],
    default_account: &Account,
) -> RouteOutcome {
    if !is_statement_payment_line(&row.normalized_description) {
        return RouteOutcome::Unchanged;
    }

    if !opts.convert_card_payments_to_transfer {
        return RouteOutcome::NotConverted;
    }

    let destination = opts
        .card_payment_target_account_id
        .or_else(|| select_destination(candidates, default_account, row.date));

    let Some(destination) = destination else {
        return RouteOutcome::NotConverted;
    };

    let destination_name = candidates
        .iter()
        .find(|c| c.account.id == destination)
        .map(|c| c.account.name.as_str())
        .unwrap_or("credit account");

    row.row_type = RowType::Transfer;
    row.account_id = Some(default_account.id);
    row.normalized_description = format!(
        "TRANSFER: {} -> {}",
        normalize_for_match(&default_account.name),
        normalize_for_match(destination_name)
    );

    let mut peer = row.clone();
    peer.amount = -row.amount;
    peer.account_id = Some(destination);
    peer.row_type = RowType::CcPayment;

    RouteOutcome::ConvertedToTransferPair(peer)
}

/// Invoice-to-credit mode (spec §4.6): the default account is credit, or
/// the row's `documentType` is `credit_card_invoice`.
pub fn route_invoice_row(
    row: &mut CanonicalImportRow,
    opts: &CardPaymentOptions,
    credit_account_id: Id,
) -> RouteOutcome {
    if is_invoice_payment_received_line(&row.normalized_description) {
        return if opts.skip_card_payment_lines {
            RouteOutcome::Skipped
        } else {
            RouteOutcome::Unchanged
        };
    }

    row.account_id = Some(credit_account_id);
    row.row_type = RowType::CcPurchase;
    RouteOutcome::RoutedToCredit
}

pub fn is_credit_invoice_document(document_type: Option<&str>) -> bool {
    document_type == Some("credit_card_invoice")
}
