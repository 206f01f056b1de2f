//! Application configuration loaded from environment variables.

use std::path::PathBuf;

use common::Quantity;
use ledger::{CorrectionPolicy, LedgerConfig};
use thiserror::Error;

/// A configuration variable held a value that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid value for {var}: {value:?}")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default `"0.0.0.0"`)
/// - `PORT`: listen port (default `3000`)
/// - `RUST_LOG`: tracing filter directive (default `"info"`)
/// - `DATABASE_URL`: PostgreSQL connection string; in-memory storage when unset
/// - `DEFAULT_LOW_STOCK_THRESHOLD`: default threshold (default `5`, `none` or
///   empty disables it)
/// - `LEDGER_STRICT_ITEMS`: reads of unknown items fail (default `false`)
/// - `LEDGER_AUTO_REGISTER`: appends create unknown items (default `true`)
/// - `LEDGER_ALLOW_NEGATIVE_CORRECTIONS`: corrections may go below zero
///   (default `false`)
/// - `CATALOG_PATH`: JSON catalog of materials, recipes and thresholds
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub default_threshold: Option<Quantity>,
    pub ledger: LedgerConfig,
    pub catalog_path: Option<PathBuf>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Loads configuration through `lookup`, falling back to defaults for
    /// variables it does not return.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let port = match lookup("PORT") {
            Some(raw) => raw.trim().parse().map_err(|_| invalid("PORT", raw))?,
            None => defaults.port,
        };

        let default_threshold = match lookup("DEFAULT_LOW_STOCK_THRESHOLD") {
            Some(raw) => parse_threshold(raw)?,
            None => defaults.default_threshold,
        };

        let mut ledger = LedgerConfig::new();
        if let Some(raw) = lookup("LEDGER_STRICT_ITEMS") {
            ledger = ledger.strict(parse_bool("LEDGER_STRICT_ITEMS", raw)?);
        }
        if let Some(raw) = lookup("LEDGER_AUTO_REGISTER") {
            ledger = ledger.auto_register(parse_bool("LEDGER_AUTO_REGISTER", raw)?);
        }
        if let Some(raw) = lookup("LEDGER_ALLOW_NEGATIVE_CORRECTIONS")
            && parse_bool("LEDGER_ALLOW_NEGATIVE_CORRECTIONS", raw)?
        {
            ledger = ledger.correction_policy(CorrectionPolicy::AllowNegative);
        }

        Ok(Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port,
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            default_threshold,
            ledger,
            catalog_path: lookup("CATALOG_PATH")
                .filter(|path| !path.trim().is_empty())
                .map(PathBuf::from),
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            default_threshold: Some(Quantity::new(5)),
            ledger: LedgerConfig::default(),
            catalog_path: None,
        }
    }
}

fn invalid(var: &'static str, value: String) -> ConfigError {
    ConfigError { var, value }
}

fn parse_threshold(raw: String) -> Result<Option<Quantity>, ConfigError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    match trimmed.parse::<i64>() {
        Ok(value) if value >= 0 => Ok(Some(Quantity::new(value))),
        _ => Err(invalid("DEFAULT_LOW_STOCK_THRESHOLD", raw)),
    }
}

fn parse_bool(var: &'static str, raw: String) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(invalid(var, raw)),
    }
}
