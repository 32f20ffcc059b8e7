//! Environment-driven setup for embedding the guard.
//!
//! Raw values are collected into `SetupInput` (from `WARDEN_*` variables,
//! with `.env` honored) and resolved separately, so resolution is testable
//! without touching process state.

use std::env;

use anyhow::{Context, Result};
use dotenvy::from_filename_override;

use warden_core::guard::GuardConfig;
use warden_core::ident::AccountId;

pub const JOURNAL_PATH_DEFAULT: &str = "warden_audit.jsonl";

/// Raw setup values before resolution. Identities have no defaults; the
/// journal path does.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetupInput {
    pub administrative: Option<String>,
    pub operator: Option<String>,
    pub pool: Option<String>,
    pub guard_account: Option<String>,
    pub journal_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardSetup {
    pub guard: GuardConfig,
    pub journal_path: String,
}

impl SetupInput {
    pub fn from_env() -> Self {
        load_env_file();
        Self {
            administrative: env_opt("WARDEN_ADMINISTRATIVE"),
            operator: env_opt("WARDEN_OPERATOR"),
            pool: env_opt("WARDEN_POOL"),
            guard_account: env_opt("WARDEN_ACCOUNT"),
            journal_path: env_opt("WARDEN_JOURNAL_PATH"),
        }
    }

    pub fn resolve(self) -> Result<GuardSetup> {
        let administrative = parse_identity("WARDEN_ADMINISTRATIVE", self.administrative)?;
        let operator = parse_identity("WARDEN_OPERATOR", self.operator)?;
        let pool = parse_identity("WARDEN_POOL", self.pool)?;
        let account = parse_identity("WARDEN_ACCOUNT", self.guard_account)?;
        Ok(GuardSetup {
            guard: GuardConfig {
                administrative,
                operator,
                pool,
                account,
            },
            journal_path: self
                .journal_path
                .unwrap_or_else(|| JOURNAL_PATH_DEFAULT.to_string()),
        })
    }
}

fn parse_identity(key: &str, value: Option<String>) -> Result<AccountId> {
    let raw = value.with_context(|| format!("{key} is not set"))?;
    raw.parse::<AccountId>()
        .with_context(|| format!("{key} is not a valid 0x-hex identity"))
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.is_empty())
}

fn load_env_file() {
    from_filename_override(".env").ok();
}
