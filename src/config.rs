//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (ledger auth tokens) are referenced by env-var name in the
//! config and resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub platform: PlatformConfig,
    pub ledger: LedgerConfig,
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PlatformConfig {
    pub name: String,
    /// Account entitled to close, cancel, resolve, and withdraw fees.
    pub owner_account: String,
    /// Platform fee as a percentage of the losing pool (0–100).
    pub fee_pct: Decimal,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LedgerConfig {
    /// "memory" or "remote".
    pub backend: String,
    /// Base URL of the remote ledger service (remote backend only).
    #[serde(default)]
    pub base_url: Option<String>,
    /// Env var holding the bearer token for the remote ledger.
    #[serde(default)]
    pub auth_token_env: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub port: u16,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Parse configuration from TOML text.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}
