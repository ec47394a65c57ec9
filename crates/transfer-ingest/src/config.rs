//! Ingestion configuration
//!
//! Sources, endpoint, store location, and fetch policy. Loaded from
//! environment variables (see [`IngestConfig::from_env`]) or assembled with
//! [`IngestConfig::builder`] in tests and embedding callers.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use transfer_common::types::DEFAULT_PATH_TEMPLATE;
use transfer_common::Source;
use url::Url;

use crate::error::{IngestError, Result};

pub const DEFAULT_BASE_URL: &str = "https://www.emajorleague.com/";
pub const DEFAULT_SOURCES: &str = "34=League 34";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://transfers.db";
pub const DEFAULT_TABLE: &str = "transfers";
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 200;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_PAGES: u32 = 50;

/// HTTP fetch policy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FetchConfig {
    /// Total attempts per page, including the first one
    pub max_attempts: u32,
    /// Fixed delay between attempts in milliseconds
    pub retry_delay_ms: u64,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: default_user_agent(),
        }
    }
}

impl FetchConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_user_agent() -> String {
    format!("transfer-watch/{}", env!("CARGO_PKG_VERSION"))
}

/// Main ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Site root every source path is joined onto
    pub base_url: Url,
    /// Listings scraped on every run, in order
    pub sources: Vec<Source>,
    /// sqlx connection string for the store
    pub database_url: String,
    /// Destination table name
    pub table: String,
    pub fetch: FetchConfig,
    /// Upper bound on pages fetched per source in one run
    pub max_pages: u32,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            sources: vec![Source::new("34", "League 34")],
            database_url: DEFAULT_DATABASE_URL.to_string(),
            table: DEFAULT_TABLE.to_string(),
            fetch: FetchConfig::default(),
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

#[allow(clippy::expect_used)]
fn default_base_url() -> Url {
    Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid")
}

impl IngestConfig {
    pub fn builder() -> IngestConfigBuilder {
        IngestConfigBuilder::default()
    }

    /// Load configuration from environment variables
    ///
    /// - `TRANSFER_BASE_URL`: site root (default: `https://www.emajorleague.com/`)
    /// - `TRANSFER_SOURCES`: comma-separated `id=Display Name` list
    /// - `TRANSFER_PATH_TEMPLATE`: listing path with `{id}` and `{page}`
    /// - `TRANSFER_DATABASE_URL`: sqlx SQLite URL (default: `sqlite://transfers.db`)
    /// - `TRANSFER_TABLE`: destination table (default: `transfers`)
    /// - `TRANSFER_MAX_ATTEMPTS`, `TRANSFER_RETRY_DELAY_MS`, `TRANSFER_TIMEOUT_SECS`
    /// - `TRANSFER_MAX_PAGES`: per-source page limit (default: 50)
    /// - `TRANSFER_USER_AGENT`
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup("TRANSFER_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let template =
            lookup("TRANSFER_PATH_TEMPLATE").unwrap_or_else(|| DEFAULT_PATH_TEMPLATE.to_string());
        let sources = lookup("TRANSFER_SOURCES").unwrap_or_else(|| DEFAULT_SOURCES.to_string());

        let sources = parse_sources(&sources)?
            .into_iter()
            .map(|s| s.with_path_template(template.clone()))
            .collect();

        let defaults = FetchConfig::default();
        let config = Self {
            base_url: parse_base_url(&base_url)?,
            sources,
            database_url: lookup("TRANSFER_DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            table: lookup("TRANSFER_TABLE").unwrap_or_else(|| DEFAULT_TABLE.to_string()),
            fetch: FetchConfig {
                max_attempts: parse_var(&lookup, "TRANSFER_MAX_ATTEMPTS", defaults.max_attempts)?,
                retry_delay_ms: parse_var(
                    &lookup,
                    "TRANSFER_RETRY_DELAY_MS",
                    defaults.retry_delay_ms,
                )?,
                timeout_secs: parse_var(&lookup, "TRANSFER_TIMEOUT_SECS", defaults.timeout_secs)?,
                user_agent: lookup("TRANSFER_USER_AGENT").unwrap_or(defaults.user_agent),
            },
            max_pages: parse_var(&lookup, "TRANSFER_MAX_PAGES", DEFAULT_MAX_PAGES)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.base_url.cannot_be_a_base() {
            return Err(IngestError::Config(format!(
                "base URL '{}' cannot be joined with paths",
                self.base_url
            )));
        }

        if self.sources.is_empty() {
            return Err(IngestError::Config("at least one source is required".to_string()));
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            source.validate()?;
            if !seen.insert(source.id.as_str()) {
                return Err(IngestError::Config(format!("duplicate source id '{}'", source.id)));
            }
        }

        if !is_identifier(&self.table) {
            return Err(IngestError::Config(format!(
                "table name '{}' must be alphanumeric or underscore",
                self.table
            )));
        }

        if self.fetch.max_attempts == 0 {
            return Err(IngestError::Config("TRANSFER_MAX_ATTEMPTS must be greater than 0".into()));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(IngestError::Config("TRANSFER_TIMEOUT_SECS must be greater than 0".into()));
        }
        if self.max_pages == 0 {
            return Err(IngestError::Config("TRANSFER_MAX_PAGES must be greater than 0".into()));
        }

        Ok(())
    }
}

/// Parse a comma-separated `id=Display Name` list
pub fn parse_sources(spec: &str) -> Result<Vec<Source>> {
    spec.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.parse::<Source>().map_err(IngestError::from))
        .collect()
}

/// Parse a base URL, making sure relative joins append instead of replace
pub fn parse_base_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw.trim())?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| IngestError::Config(format!("{} has invalid value '{}': {}", key, raw, e))),
        None => Ok(default),
    }
}

pub(crate) fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Builder for IngestConfig
#[derive(Debug, Default)]
pub struct IngestConfigBuilder {
    base_url: Option<Url>,
    sources: Option<Vec<Source>>,
    database_url: Option<String>,
    table: Option<String>,
    fetch: Option<FetchConfig>,
    max_pages: Option<u32>,
}

impl IngestConfigBuilder {
    pub fn base_url(mut self, url: Url) -> Self {
        self.base_url = Some(url);
        self
    }

    pub fn sources(mut self, sources: Vec<Source>) -> Self {
        self.sources = Some(sources);
        self
    }

    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn fetch(mut self, fetch: FetchConfig) -> Self {
        self.fetch = Some(fetch);
        self
    }

    pub fn max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = Some(max_pages);
        self
    }

    pub fn build(self) -> IngestConfig {
        let default = IngestConfig::default();
        IngestConfig {
            base_url: self.base_url.unwrap_or(default.base_url),
            sources: self.sources.unwrap_or(default.sources),
            database_url: self.database_url.unwrap_or(default.database_url),
            table: self.table.unwrap_or(default.table),
            fetch: self.fetch.unwrap_or(default.fetch),
            max_pages: self.max_pages.unwrap_or(default.max_pages),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_map(vars: &[(&str, &str)]) -> Result<IngestConfig> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        IngestConfig::from_vars(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = from_map(&[]).unwrap();
        assert_eq!(config.base_url.as_str(), DEFAULT_BASE_URL);
        assert_eq!(config.sources, vec![Source::new("34", "League 34")]);
        assert_eq!(config.table, "transfers");
        assert_eq!(config.fetch.max_attempts, 3);
        assert_eq!(config.fetch.retry_delay(), Duration::from_millis(200));
        assert_eq!(config.max_pages, 50);
    }

    #[test]
    fn test_sources_and_template_from_vars() {
        let config = from_map(&[
            ("TRANSFER_SOURCES", "34=Super League, 35=First League"),
            ("TRANSFER_PATH_TEMPLATE", "transfers/{id}/{page}"),
            ("TRANSFER_BASE_URL", "http://localhost:8080/mirror"),
        ])
        .unwrap();

        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[1].name, "First League");
        assert_eq!(config.sources[0].page_path(2), "transfers/34/2");
        assert_eq!(config.base_url.as_str(), "http://localhost:8080/mirror/");
    }

    #[test]
    fn test_invalid_number_is_config_error() {
        let err = from_map(&[("TRANSFER_MAX_ATTEMPTS", "many")]).unwrap_err();
        assert!(matches!(err, IngestError::Config(_)));
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        assert!(from_map(&[("TRANSFER_SOURCES", "34=A,34=B")]).is_err());
        assert!(from_map(&[("TRANSFER_SOURCES", " , ")]).is_err());
        assert!(from_map(&[("TRANSFER_TABLE", "transfers; DROP TABLE x")]).is_err());
        assert!(from_map(&[("TRANSFER_MAX_PAGES", "0")]).is_err());
        assert!(from_map(&[("TRANSFER_PATH_TEMPLATE", "transfers/{id}")]).is_err());
    }

    #[test]
    fn test_builder() {
        let config = IngestConfig::builder()
            .table("league_transfers")
            .max_pages(5)
            .build();
        assert_eq!(config.table, "league_transfers");
        assert_eq!(config.max_pages, 5);
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert!(config.validate().is_ok());
    }
}
