//! Data model, per spec §3. Plain structs with `serde`/`sqlx::FromRow`
//! derives, generalizing the teacher's wrapper-struct style
//! (`TransactionInternal`/`PostingInternal` in its own `internal.rs`) to this
//! system's relational rows instead of `ledger_parser` journal types.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid_b64::UuidB64;

use crate::money::Cents;

/// Thin wrapper around `UuidB64` so this crate can implement `sqlx::Type`
/// for it directly (the orphan rule blocks implementing a foreign trait
/// for a bare foreign type).
#[derive(Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id(UuidB64);

impl Id {
    pub fn new() -> Self {
        Id(UuidB64::new())
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&self.0, f)
    }
}

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

impl std::str::FromStr for Id {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<UuidB64>()
            .map(Id)
            .map_err(|e| anyhow::anyhow!("invalid id: {e}"))
    }
}

impl sqlx::Type<sqlx::Postgres> for Id {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <uuid::Uuid as sqlx::Type<sqlx::Postgres>>::type_info()
    }
}

impl sqlx::Encode<'_, sqlx::Postgres> for Id {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <uuid::Uuid as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0.uuid(), buf)
    }
}

impl sqlx::Decode<'_, sqlx::Postgres> for Id {
    fn decode(value: sqlx::postgres::PgValueRef<'_>) -> Result<Self, sqlx::error::BoxDynError> {
        let uuid = <uuid::Uuid as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Id(UuidB64::from(uuid)))
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "account_type", rename_all = "snake_case")]
pub enum AccountType {
    Checking,
    Credit,
    Cash,
    Investment,
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Account {
    pub id: Id,
    pub user_id: Id,
    #[serde(rename = "type")]
    pub account_type: AccountType,
    pub name: String,
    pub institution: Option<String>,
    pub currency: String,
    pub parent_account_id: Option<Id>,
}

impl Account {
    /// Invariant: a credit account's `parentAccountId`, if set, must
    /// reference a non-credit account owned by the same user. Caller
    /// supplies the parent's type and owner since `Account` has no back-link.
    pub fn validate_parent(&self, parent: Option<&Account>) -> bool {
        match (self.account_type, self.parent_account_id, parent) {
            (AccountType::Credit, Some(parent_id), Some(parent)) => {
                parent.id == parent_id
                    && parent.user_id == self.user_id
                    && parent.account_type != AccountType::Credit
            }
            (AccountType::Credit, Some(_), None) => false,
            (AccountType::Credit, None, _) => true,
            (_, None, _) => true,
            (_, Some(_), _) => false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    pub id: Id,
    pub user_id: Id,
    pub name: String,
    pub color: String,
    pub icon: Option<String>,
    pub parent_id: Option<Id>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "match_type", rename_all = "snake_case")]
pub enum MatchType {
    Contains,
    Regex,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CategoryRule {
    pub id: Id,
    pub user_id: Id,
    pub name: String,
    pub priority: i32,
    pub enabled: bool,
    pub match_type: MatchType,
    pub pattern: String,
    pub account_id: Option<Id>,
    pub min_amount_cents: Option<u64>,
    pub max_amount_cents: Option<u64>,
    pub category_id: Id,
    /// Not part of the persisted row; used to break priority ties by
    /// insertion order when two rules share a priority.
    pub created_seq: i64,
}

impl sqlx::FromRow<'_, sqlx::postgres::PgRow> for CategoryRule {
    fn from_row(row: &sqlx::postgres::PgRow) -> sqlx::Result<Self> {
        use sqlx::Row;
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            name: row.try_get("name")?,
            priority: row.try_get("priority")?,
            enabled: row.try_get("enabled")?,
            match_type: row.try_get("match_type")?,
            pattern: row.try_get("pattern")?,
            account_id: row.try_get("account_id")?,
            min_amount_cents: row.try_get::<Option<i64>, _>("min_amount_cents")?.map(|v| v as u64),
            max_amount_cents: row.try_get::<Option<i64>, _>("max_amount_cents")?.map(|v| v as u64),
            category_id: row.try_get("category_id")?,
            created_seq: row.try_get("created_seq")?,
        })
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "source_type", rename_all = "snake_case")]
pub enum SourceType {
    Csv,
    Ofx,
    Pdf,
    Manual,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowType {
    Income,
    Expense,
    Transfer,
    CcPurchase,
    CcPayment,
}

/// Transient intermediate representation produced by parsers/canonicalizer
/// and consumed by the rule engine, router, matcher and committer. Never
/// persisted directly; destroyed when the batch commit returns.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalImportRow {
    pub date: NaiveDate,
    pub amount: Decimal,
    pub balance_after: Option<Decimal>,
    pub transaction_kind_raw: String,
    pub counterparty_raw: String,
    pub transaction_kind_norm: String,
    pub counterparty_norm: String,
    pub merchant_key: String,
    pub source_type: SourceType,
    pub document_type: Option<String>,
    pub description: String,
    pub normalized_description: String,
    #[serde(rename = "type")]
    pub row_type: RowType,
    pub external_id: Option<String>,
    pub account_hint: Option<String>,
    pub account_id: Option<Id>,
    pub category_id: Option<Id>,
    /// Opaque per-row payload carried for audit; never branched on after
    /// canonicalization (spec §9).
    #[serde(default)]
    pub raw: BTreeMap<String, serde_json::Value>,
}

impl CanonicalImportRow {
    pub fn amount_cents(&self) -> Cents {
        Cents((self.amount * Decimal::from(100)).round().to_string().parse().unwrap_or(0))
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "transaction_type", rename_all = "snake_case")]
pub enum EntryType {
    Income,
    Expense,
    Transfer,
    CcPurchase,
    CcPayment,
    Fee,
    Refund,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "direction", rename_all = "snake_case")]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn of(amount_cents: Cents) -> Self {
        if amount_cents.is_outflow() {
            Direction::Out
        } else {
            Direction::In
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "entry_status", rename_all = "snake_case")]
pub enum EntryStatus {
    Posted,
    Pending,
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct LedgerEntry {
    pub id: Id,
    pub user_id: Id,
    pub account_id: Id,
    pub category_id: Option<Id>,
    pub import_batch_id: Option<Id>,
    pub posted_at: NaiveDate,
    pub description: String,
    pub normalized_description: String,
    pub amount_cents: i64,
    pub currency: String,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub direction: Direction,
    pub status: EntryStatus,
    pub is_internal_transfer: bool,
    pub imported_hash: Option<String>,
    pub transfer_group_id: Option<Id>,
    pub transfer_peer_id: Option<Id>,
    pub transfer_from_account_id: Option<Id>,
    pub transfer_to_account_id: Option<Id>,
    pub external_id: Option<String>,
    pub raw_json: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Sign/direction coherence invariant (spec §3, §8).
    pub fn sign_direction_coherent(&self) -> bool {
        (self.amount_cents <= 0) == (self.direction == Direction::Out)
    }

    /// `isInternalTransfer <=> type == transfer` invariant.
    pub fn transfer_flag_coherent(&self) -> bool {
        self.is_internal_transfer == (self.entry_type == EntryType::Transfer)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ImportBatch {
    pub id: Id,
    pub user_id: Id,
    pub source: SourceType,
    pub file_name: String,
    pub mapping_json: Option<serde_json::Value>,
    pub total_imported: i32,
    pub total_skipped: i32,
    pub imported_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "import_source_kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportSourceKind {
    BankStatement,
    CcStatement,
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct ImportSource {
    pub id: Id,
    pub user_id: Id,
    pub institution_id: Option<String>,
    pub kind: ImportSourceKind,
    pub file_name: String,
    pub file_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "event_phase", rename_all = "snake_case")]
pub enum EventPhase {
    Parse,
    Commit,
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct ImportEvent {
    pub id: Id,
    pub user_id: Id,
    pub source_type: SourceType,
    pub file_name: String,
    pub event: String,
    pub phase: EventPhase,
    pub error_code: Option<String>,
    pub total_rows: Option<i32>,
    pub valid_rows: Option<i32>,
    pub ignored_rows: Option<i32>,
    pub error_rows: Option<i32>,
    pub imported: Option<i32>,
    pub skipped: Option<i32>,
    pub duplicates: Option<i32>,
    pub invalid_rows: Option<i32>,
    pub transfer_created: Option<i32>,
    pub card_payment_detected: Option<i32>,
    pub card_payment_not_converted: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(id: Id, user: Id, t: AccountType, parent: Option<Id>) -> Account {
        Account {
            id,
            user_id: user,
            account_type: t,
            name: "acct".into(),
            institution: None,
            currency: "BRL".into(),
            parent_account_id: parent,
        }
    }

    #[test]
    fn credit_account_parent_must_be_non_credit_same_user() {
        let user = Id::new();
        let checking_id = Id::new();
        let checking = account(checking_id, user, AccountType::Checking, None);
        let credit = account(Id::new(), user, AccountType::Credit, Some(checking_id));
        assert!(credit.validate_parent(Some(&checking)));

        let other_user_checking = account(checking_id, Id::new(), AccountType::Checking, None);
        assert!(!credit.validate_parent(Some(&other_user_checking)));

        let credit_parent = account(checking_id, user, AccountType::Credit, None);
        assert!(!credit.validate_parent(Some(&credit_parent)));
    }

    #[test]
    fn sign_direction_coherence() {
        let now = Utc::now();
        let mut e = LedgerEntry {
            id: Id::new(),
            user_id: Id::new(),
            account_id: Id::new(),
            category_id: None,
            import_batch_id: None,
            posted_at: NaiveDate::from_ymd_opt(2026, 2, 20).unwrap(),
            description: "x".into(),
            normalized_description: "X".into(),
            amount_cents: -150,
            currency: "BRL".into(),
            entry_type: EntryType::Expense,
            direction: Direction::Out,
            status: EntryStatus::Posted,
            is_internal_transfer: false,
            imported_hash: None,
            transfer_group_id: None,
            transfer_peer_id: None,
            transfer_from_account_id: None,
            transfer_to_account_id: None,
            external_id: None,
            raw_json: None,
            created_at: now,
            updated_at: now,
        };
        assert!(e.sign_direction_coherent());
        e.direction = Direction::In;
        assert!(!e.sign_direction_coherent());
    }
}
