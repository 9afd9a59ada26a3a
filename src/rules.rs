//! Rule Engine (spec §4.5): evaluates ordered `CategoryRule`s against a
//! canonical row, first match wins.
//!
//! Grounded on the teacher's `rule.rs`/`rules/table.rs` predicate-against-
//! posting evaluation loop (ordered rule table, first match short-circuits)
//! generalized from ledger-posting predicates to the contains/regex +
//! account/amount filter combination spec'd here.

use regex::RegexBuilder;

use crate::model::{CanonicalImportRow, CategoryRule, Id, MatchType};
use crate::normalize::normalize_for_match;

#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("rule pattern does not compile: {0}")]
    InvalidPattern(String),
}

/// Validates a rule's pattern compiles, for rule-create time (spec §9:
/// "a bad pattern at rule-create time is `400 invalid_pattern`, not a
/// runtime failure at commit").
pub fn validate_pattern(match_type: MatchType, pattern: &str) -> Result<(), RuleError> {
    if match_type == MatchType::Regex {
        compile(pattern).map(|_| ())
    } else {
        Ok(())
    }
}

fn compile(pattern: &str) -> Result<regex::Regex, RuleError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .unicode(true)
        .build()
        .map_err(|e| RuleError::InvalidPattern(e.to_string()))
}

/// Evaluates `rules` (already sorted by ascending priority, then creation
/// order, by the caller) against `row`, returning the first matching
/// rule's category. Disabled rules are skipped. A manual category already
/// set on the row always wins and short-circuits evaluation entirely.
pub fn categorize(row: &CanonicalImportRow, rules: &[CategoryRule]) -> Option<Id> {
    if let Some(manual) = row.category_id {
        return Some(manual);
    }

    for rule in rules {
        if !rule.enabled {
            continue;
        }
        if let Some(account_id) = rule.account_id {
            if row.account_id != Some(account_id) {
                continue;
            }
        }
        if !amount_in_range(row, rule) {
            continue;
        }
        if rule_matches(row, rule) {
            return Some(rule.category_id);
        }
    }

    None
}

fn amount_in_range(row: &CanonicalImportRow, rule: &CategoryRule) -> bool {
    let amount_cents = row.amount_cents().0.unsigned_abs();
    if let Some(min) = rule.min_amount_cents {
        if amount_cents < min {
            return false;
        }
    }
    if let Some(max) = rule.max_amount_cents {
        if amount_cents > max {
            return false;
        }
    }
    true
}

fn rule_matches(row: &CanonicalImportRow, rule: &CategoryRule) -> bool {
    let haystack = if !row.counterparty_norm.is_empty() {
        &row.counterparty_norm
    } else {
        &row.normalized_description
    };

    match rule.match_type {
        MatchType::Contains => haystack.contains(&normalize_for_match(&rule.pattern)),
        MatchType::Regex => match compile(&rule.pattern) {
            Ok(re) => re.is_match(haystack),
            Err(_) => false,
        },
    }
}

/// Sorts rules by ascending priority, then by `created_seq` to break ties
/// deterministically (spec §3: "ties broken by creation order").
pub fn order_rules(mut rules: Vec<CategoryRule>) -> Vec<CategoryRule> {
    rules.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.created_seq.cmp(&b.created_seq)));
    rules
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn row(counterparty_norm: &str, amount: &str) -> CanonicalImportRow {
        CanonicalImportRow {
            date: NaiveDate::from_ymd_opt(2026, 2, 20).unwrap(),
            amount: amount.parse().unwrap(),
            balance_after: None,
            transaction_kind_raw: String::new(),
            counterparty_raw: counterparty_norm.to_string(),
            transaction_kind_norm: String::new(),
            counterparty_norm: counterparty_norm.to_string(),
            merchant_key: "transacao".to_string(),
            source_type: crate::model::SourceType::Csv,
            document_type: None,
            description: counterparty_norm.to_string(),
            normalized_description: counterparty_norm.to_string(),
            row_type: crate::model::RowType::Expense,
            external_id: None,
            account_hint: None,
            account_id: None,
            category_id: None,
            raw: BTreeMap::new(),
        }
    }

    fn rule(priority: i32, created_seq: i64, pattern: &str, category_id: Id) -> CategoryRule {
        CategoryRule {
            id: Id::new(),
            user_id: Id::new(),
            name: pattern.to_string(),
            priority,
            enabled: true,
            match_type: MatchType::Contains,
            pattern: pattern.to_string(),
            account_id: None,
            min_amount_cents: None,
            max_amount_cents: None,
            category_id,
            created_seq,
        }
    }

    #[test]
    fn lower_priority_number_wins_over_higher() {
        let cat_p = Id::new();
        let cat_q = Id::new();
        let rule_a = rule(5, 1, "PADARIA SAO FRANCISCO", cat_p);
        let rule_b = rule(100, 2, "PADARIA", cat_q);
        let rules = order_rules(vec![rule_b, rule_a]);
        let row = row("PAGAMENTO PADARIA SAO FRANCISCO", "-10.00");
        assert_eq!(Some(cat_p), categorize(&row, &rules));
    }

    #[test]
    fn manual_category_short_circuits_rules() {
        let manual = Id::new();
        let mut row = row("PADARIA SAO FRANCISCO", "-10.00");
        row.category_id = Some(manual);
        let rules = vec![rule(5, 1, "PADARIA", Id::new())];
        assert_eq!(Some(manual), categorize(&row, &rules));
    }

    #[test]
    fn disabled_rule_is_skipped() {
        let mut r = rule(5, 1, "PADARIA", Id::new());
        r.enabled = false;
        let row = row("PADARIA SAO FRANCISCO", "-10.00");
        assert_eq!(None, categorize(&row, &[r]));
    }

    #[test]
    fn amount_range_filter_excludes_out_of_range_rows() {
        let cat = Id::new();
        let mut r = rule(5, 1, "PADARIA", cat);
        r.min_amount_cents = Some(2000);
        let row = row("PADARIA SAO FRANCISCO", "-10.00");
        assert_eq!(None, categorize(&row, &[r]));
    }

    #[test]
    fn invalid_regex_pattern_is_rejected_at_validation_time() {
        assert!(validate_pattern(MatchType::Regex, "(unclosed").is_err());
        assert!(validate_pattern(MatchType::Regex, "valid.*pattern").is_ok());
    }
}
