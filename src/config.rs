//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs. Every
//! section has defaults, so a partial file (or an empty one) is valid.
//! Credentials are referenced by env-var name in the config and resolved at
//! runtime via `std::env::var`.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::fs;
use std::time::Duration;

use crate::engine::retry::RetryPolicy;
use crate::types::{Credentials, Mode, Outcome};

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub session: SessionConfig,
    pub risk: RiskConfig,
    pub retry: RetryConfig,
    pub catalog: CatalogConfig,
    pub venue: VenueConfig,
    pub storage: StorageConfig,
    pub tickets: Vec<Ticket>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SessionConfig {
    pub default_league: String,
    pub mode: Mode,
    /// Fallback username when `username_env` is not set.
    pub username: Option<String>,
    pub username_env: String,
    pub password_env: String,
    pub driver_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_league: "bundesliga".to_string(),
            mode: Mode::Paper,
            username: None,
            username_env: "PUNTER_USERNAME".to_string(),
            password_env: "PUNTER_PASSWORD".to_string(),
            driver_timeout_secs: 30,
        }
    }
}

impl SessionConfig {
    pub fn driver_timeout(&self) -> Duration {
        Duration::from_secs(self.driver_timeout_secs)
    }
}

/// Stake limits enforced by the risk manager.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RiskConfig {
    pub min_stake: Decimal,
    pub max_stake: Decimal,
    /// Ceiling on the sum of stakes tendered in one session.
    pub max_sum_stake: Decimal,
    /// Betting stops once `calculated / starting` falls to this ratio.
    pub min_bankroll_percent: Decimal,
    /// Largest share of the calculated bankroll a single live stake may use.
    pub max_stake_percent: Decimal,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            min_stake: dec!(1),
            max_stake: dec!(800),
            max_sum_stake: dec!(9999),
            min_bankroll_percent: dec!(0.4),
            max_stake_percent: dec!(0.6),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetryConfig {
    pub login: RetryPolicy,
    pub league: RetryPolicy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            login: RetryPolicy::login(),
            league: RetryPolicy::league(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CatalogConfig {
    pub similarity_cutoff: f64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            similarity_cutoff: 0.7,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct VenueConfig {
    /// JSON file the replay driver serves events from.
    pub fixture: String,
}

impl Default for VenueConfig {
    fn default() -> Self {
        Self {
            fixture: "venue.json".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub ledger_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            ledger_path: "punter_ledger.json".to_string(),
        }
    }
}

/// One bet the binary should attempt.
#[derive(Debug, Deserialize, Clone)]
pub struct Ticket {
    /// League to switch to first; the current one is kept when absent.
    #[serde(default)]
    pub league: Option<String>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub home: Option<String>,
    #[serde(default)]
    pub away: Option<String>,
    pub pick: Outcome,
    pub stake: Decimal,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    /// Build login credentials. The username env var wins over the
    /// `username` key; the password only ever comes from the environment.
    pub fn credentials(&self) -> Result<Credentials> {
        let username = match Self::resolve_env(&self.session.username_env) {
            Ok(name) => name,
            Err(e) => self.session.username.clone().ok_or(e)?,
        };
        let password = Self::resolve_env(&self.session.password_env)?;
        Ok(Credentials::new(username, password))
    }
}
