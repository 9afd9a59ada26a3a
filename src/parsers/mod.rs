//! Source Parsers (spec §4.2): three variants sharing a common output
//! shape. Each variant lives in its own submodule, mirroring the teacher's
//! per-institution `importers/` layout but keyed by file *shape* rather than
//! by issuer, since a single issuer profile set (for portable documents)
//! lives under one of the three shapes.

pub mod delimited;
pub mod document;
pub mod markup;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::SourceType;

/// One candidate row surfaced by any parser variant, before canonicalization.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedRow {
    pub raw: BTreeMap<String, String>,
    pub date_raw: Option<String>,
    pub description_raw: Option<String>,
    pub amount_raw: Option<String>,
    pub balance_after_raw: Option<String>,
    pub external_id: Option<String>,
    pub account_hint: Option<String>,
}

/// Common result shape across all three parser variants (spec §4.2).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseOutput {
    pub columns: Option<Vec<String>>,
    pub rows: Vec<ParsedRow>,
    pub detected_encoding: Option<String>,
    pub document_type: Option<String>,
    pub issuer_profile: Option<&'static str>,
    pub metadata: BTreeMap<String, String>,
}

impl ParseOutput {
    pub fn source_type(&self) -> SourceType {
        if self.document_type.is_some() || self.issuer_profile.is_some() {
            SourceType::Pdf
        } else if self.columns.is_some() {
            SourceType::Csv
        } else {
            SourceType::Ofx
        }
    }
}
