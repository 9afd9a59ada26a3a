//! Process-level configuration, read from the environment (spec §6: "Exit
//! codes and environment: ... Environment consumed: storage URL, request
//! deadline default").
//!
//! Generalizes `petermax2-hledger-import`'s `ImporterConfig::load`
//! (env-var-overridable path, sensible default) from a single TOML config
//! file to the small set of env vars this service needs.

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_REQUEST_DEADLINE_SECS: u64 = 30;
const DEFAULT_PDF_EXTRACTION_DEADLINE_SECS: u64 = 12;
const DEFAULT_MAX_UPLOAD_BYTES: u64 = 12 * 1024 * 1024;
const DEFAULT_MAX_COMMIT_ROWS: usize = 5_000;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub request_deadline: Duration,
    pub pdf_extraction_deadline: Duration,
    pub max_upload_bytes: u64,
    pub max_commit_rows: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("LEDGERIMPORT_DATABASE_URL")
            .context("LEDGERIMPORT_DATABASE_URL must be set")?;

        let bind_addr =
            env::var("LEDGERIMPORT_BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());

        let request_deadline = env_secs(
            "LEDGERIMPORT_REQUEST_DEADLINE_SECS",
            DEFAULT_REQUEST_DEADLINE_SECS,
        )?;
        let pdf_extraction_deadline = env_secs(
            "LEDGERIMPORT_PDF_EXTRACTION_DEADLINE_SECS",
            DEFAULT_PDF_EXTRACTION_DEADLINE_SECS,
        )?;
        let max_upload_bytes = env_u64(
            "LEDGERIMPORT_MAX_UPLOAD_BYTES",
            DEFAULT_MAX_UPLOAD_BYTES,
        )?;
        let max_commit_rows = env_u64("LEDGERIMPORT_MAX_COMMIT_ROWS", DEFAULT_MAX_COMMIT_ROWS as u64)?
            as usize;

        Ok(Self {
            database_url,
            bind_addr,
            request_deadline: Duration::from_secs(request_deadline),
            pdf_extraction_deadline: Duration::from_secs(pdf_extraction_deadline),
            max_upload_bytes,
            max_commit_rows,
        })
    }
}

fn env_secs(key: &'static str, default: u64) -> Result<u64> {
    env_u64(key, default)
}

fn env_u64(key: &'static str, default: u64) -> Result<u64> {
    match env::var(key) {
        Ok(v) => v.parse::<u64>().with_context(|| format!("{key} is not a valid integer")),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(e) => Err(e).with_context(|| format!("reading {key}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_u64_defaults_when_unset() {
        std::env::remove_var("LEDGERIMPORT_TEST_KEY_UNSET");
        assert_eq!(7, env_u64("LEDGERIMPORT_TEST_KEY_UNSET", 7).unwrap());
    }

    #[test]
    fn env_u64_parses_override() {
        std::env::set_var("LEDGERIMPORT_TEST_KEY_SET", "99");
        assert_eq!(99, env_u64("LEDGERIMPORT_TEST_KEY_SET", 7).unwrap());
        std::env::remove_var("LEDGERIMPORT_TEST_KEY_SET");
    }
}
