//! Import & Ledger Pipeline: parses bank/card statements (CSV, OFX, portable
//! documents), canonicalizes and deduplicates rows, categorizes them, routes
//! card-payment lines to transfers, matches cross-account transfers, and
//! commits the result to a relational ledger. See `DESIGN.md` for the
//! module-by-module grounding against the teacher and example corpus.

pub mod analyzer;
pub mod canonicalizer;
pub mod committer;
pub mod config;
pub mod context;
pub mod error;
pub mod fingerprint;
pub mod matcher;
pub mod model;
pub mod money;
pub mod normalize;
pub mod parsers;
pub mod repo;
pub mod router;
pub mod rules;
pub mod server;
pub mod telemetry;
