//! Configuration loading.
//!
//! Settings come from a TOML or JSON file (chosen by extension), falling back
//! to built-in defaults for the three supported stores. Environment variables
//! are applied last and win over the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::browser::BrowserEngineConfig;
use crate::extract::StrategyKind;
use crate::fetch::{LoadTiming, RetryPolicy};
use crate::models::Category;

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILENAME: &str = "wongprime.toml";

/// Database used when neither the config nor `DATABASE_URL` names one.
pub const DEFAULT_DATABASE_URL: &str = "sqlite:wongprime.db";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {format} config {path}: {message}")]
    Parse {
        path: PathBuf,
        format: &'static str,
        message: String,
    },

    #[error("unknown source '{0}'")]
    UnknownSource(String),

    #[error("no extraction strategy for source '{0}'; set `strategy` in its config")]
    NoStrategy(String),
}

/// Page loading and retry settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Seconds to wait after navigation for dynamic content.
    #[serde(default = "default_settle_delay")]
    pub settle_delay_secs: f64,
    /// Fraction of the page height to scroll to.
    #[serde(default = "default_scroll_fraction")]
    pub scroll_fraction: f64,
    /// Seconds to wait after scrolling.
    #[serde(default = "default_scroll_settle")]
    pub scroll_settle_secs: f64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_min_delay")]
    pub retry_min_delay_secs: f64,
    #[serde(default = "default_retry_max_delay")]
    pub retry_max_delay_secs: f64,
}

fn default_settle_delay() -> f64 {
    8.0
}

fn default_scroll_fraction() -> f64 {
    0.5
}

fn default_scroll_settle() -> f64 {
    2.0
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_min_delay() -> f64 {
    2.0
}

fn default_retry_max_delay() -> f64 {
    10.0
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            settle_delay_secs: default_settle_delay(),
            scroll_fraction: default_scroll_fraction(),
            scroll_settle_secs: default_scroll_settle(),
            max_retries: default_max_retries(),
            retry_min_delay_secs: default_retry_min_delay(),
            retry_max_delay_secs: default_retry_max_delay(),
        }
    }
}

/// How multiple sources are run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Sources scraped at the same time.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Minimum pause in seconds after a run before the next one starts.
    #[serde(default = "default_min_interval")]
    pub min_interval_secs: f64,
}

fn default_workers() -> usize {
    1
}

fn default_min_interval() -> f64 {
    5.0
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            min_interval_secs: default_min_interval(),
        }
    }
}

/// A category given either as a bare path or with an explicit label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CategoryEntry {
    Path(String),
    Labeled { path: String, name: String },
}

impl CategoryEntry {
    pub fn to_category(&self) -> Category {
        match self {
            Self::Path(path) => Category::from_path(path),
            Self::Labeled { path, name } => Category::with_name(path, name),
        }
    }
}

/// One store to scrape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub base_url: String,
    /// Defaults to the built-in strategy matching `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<StrategyKind>,
    /// Overrides the global category list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<CategoryEntry>>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl SourceConfig {
    fn builtin(name: &str, base_url: &str) -> Self {
        Self {
            name: name.to_string(),
            base_url: base_url.to_string(),
            strategy: None,
            categories: None,
            enabled: true,
        }
    }
}

fn default_sources() -> Vec<SourceConfig> {
    vec![
        SourceConfig::builtin("Wong", "https://www.wong.pe"),
        SourceConfig::builtin("Metro", "https://www.metro.pe"),
        SourceConfig::builtin("Plaza Vea", "https://www.plazavea.com.pe"),
    ]
}

fn default_categories() -> Vec<CategoryEntry> {
    [
        "higiene-salud-y-belleza/salud",
        "higiene-salud-y-belleza/cuidado-personal",
        "bebes-y-ninos/alimentos-organicos",
    ]
    .into_iter()
    .map(|p| CategoryEntry::Path(p.to_string()))
    .collect()
}

/// Configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub browser: BrowserEngineConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
    /// Categories scraped on every source without its own list.
    #[serde(default = "default_categories")]
    pub categories: Vec<CategoryEntry>,
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceConfig>,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            fetch: FetchConfig::default(),
            browser: BrowserEngineConfig::default(),
            runner: RunnerConfig::default(),
            categories: default_categories(),
            sources: default_sources(),
            source_path: None,
        }
    }
}

fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.max(0.0)).unwrap_or(Duration::ZERO)
}

impl Config {
    /// Load from `path`, else `wongprime.toml` in the working directory,
    /// else defaults. Environment overrides are applied in every case.
    pub async fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load_from_path(path).await?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILENAME);
                if default_path.exists() {
                    Self::load_from_path(default_path).await?
                } else {
                    debug!("No config file found, using defaults");
                    Self::default()
                }
            }
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from a specific file path.
    /// Supports TOML and JSON based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");
        let mut config = Self::parse(&contents, ext).map_err(|(format, message)| {
            ConfigError::Parse {
                path: path.to_path_buf(),
                format,
                message,
            }
        })?;

        config.source_path = Some(path.to_path_buf());
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    fn parse(contents: &str, ext: &str) -> Result<Self, (&'static str, String)> {
        match ext {
            "json" => serde_json::from_str(contents).map_err(|e| ("JSON", e.to_string())),
            _ => toml::from_str(contents).map_err(|e| ("TOML", e.to_string())),
        }
    }

    /// Apply environment-style overrides through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("DATABASE_URL") {
            debug!("Using DATABASE_URL from environment");
            self.database_url = Some(url);
        }
        if let Some(url) = get("BROWSER_URL") {
            debug!("Using BROWSER_URL from environment: {}", url);
            self.browser.remote_url = Some(url);
        }
        if let Some(delay) = parse_env::<f64>("SCRAPING_DELAY", get("SCRAPING_DELAY")) {
            self.fetch.settle_delay_secs = delay;
        }
        if let Some(retries) = parse_env::<u32>("MAX_RETRIES", get("MAX_RETRIES")) {
            self.fetch.max_retries = retries;
        }
        if let Some(timeout) = parse_env::<u64>("TIMEOUT", get("TIMEOUT")) {
            self.browser.timeout = timeout;
        }
        if let Some(workers) = parse_env::<usize>("SCRAPE_WORKERS", get("SCRAPE_WORKERS")) {
            self.runner.workers = workers;
        }
    }

    pub fn database_url(&self) -> &str {
        self.database_url.as_deref().unwrap_or(DEFAULT_DATABASE_URL)
    }

    /// An attempt may use the full browser timeout plus both settle waits.
    pub fn retry_policy(&self) -> RetryPolicy {
        let timing = self.load_timing();
        RetryPolicy {
            max_attempts: self.fetch.max_retries,
            min_delay: secs(self.fetch.retry_min_delay_secs),
            max_delay: secs(self.fetch.retry_max_delay_secs),
            attempt_timeout: Duration::from_secs(self.browser.timeout)
                + timing.settle_delay
                + timing.scroll_settle_delay,
        }
    }

    pub fn load_timing(&self) -> LoadTiming {
        LoadTiming {
            settle_delay: secs(self.fetch.settle_delay_secs),
            scroll_fraction: self.fetch.scroll_fraction.clamp(0.0, 1.0),
            scroll_settle_delay: secs(self.fetch.scroll_settle_secs),
        }
    }

    pub fn min_run_interval(&self) -> Duration {
        secs(self.runner.min_interval_secs)
    }

    /// Find a source by name, ignoring case.
    pub fn source(&self, name: &str) -> Result<&SourceConfig, ConfigError> {
        self.sources
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| ConfigError::UnknownSource(name.to_string()))
    }

    pub fn enabled_sources(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter().filter(|s| s.enabled)
    }

    /// Categories for a source, in configured order.
    pub fn categories_for(&self, source: &SourceConfig) -> Vec<Category> {
        source
            .categories
            .as_ref()
            .unwrap_or(&self.categories)
            .iter()
            .map(CategoryEntry::to_category)
            .collect()
    }

    /// Every distinct category across sources, first occurrence wins.
    pub fn all_categories(&self) -> Vec<Category> {
        let mut seen: Vec<Category> = Vec::new();
        for source in &self.sources {
            for category in self.categories_for(source) {
                if !seen.iter().any(|c| c.path == category.path) {
                    seen.push(category);
                }
            }
        }
        seen
    }

    pub fn strategy_for(&self, source: &SourceConfig) -> Result<StrategyKind, ConfigError> {
        source
            .strategy
            .clone()
            .or_else(|| StrategyKind::for_source_name(&source.name))
            .ok_or_else(|| ConfigError::NoStrategy(source.name.clone()))
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: Option<String>) -> Option<T> {
    let value = value?;
    match value.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!("Ignoring invalid {}={}", key, value);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_cover_three_stores() {
        let config = Config::default();
        let names: Vec<_> = config.sources.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Wong", "Metro", "Plaza Vea"]);

        let wong = config.source("wong").unwrap();
        let categories = config.categories_for(wong);
        assert_eq!(categories.len(), 3);
        assert_eq!(categories[2].name, "Alimentos Organicos");
        assert_eq!(config.strategy_for(wong).unwrap(), StrategyKind::Wong);

        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.attempt_timeout, Duration::from_secs(40));
        assert_eq!(config.load_timing().settle_delay, Duration::from_secs(8));
        assert_eq!(config.database_url(), DEFAULT_DATABASE_URL);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("DATABASE_URL", "sqlite:/tmp/prices.db"),
            ("SCRAPING_DELAY", "1.5"),
            ("MAX_RETRIES", "5"),
            ("TIMEOUT", "45"),
            ("BROWSER_URL", "ws://localhost:9222"),
            ("SCRAPE_WORKERS", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.database_url(), "sqlite:/tmp/prices.db");
        assert_eq!(config.fetch.settle_delay_secs, 1.5);
        assert_eq!(config.fetch.max_retries, 5);
        assert_eq!(config.browser.timeout, 45);
        assert_eq!(
            config.browser.remote_url.as_deref(),
            Some("ws://localhost:9222")
        );
        assert_eq!(config.runner.workers, 1);
    }

    #[tokio::test]
    async fn test_load_toml_with_custom_source() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wongprime.toml");
        std::fs::write(
            &path,
            r#"
            database_url = "sqlite:prices.db"
            categories = ["higiene-salud-y-belleza/salud"]

            [fetch]
            settle_delay_secs = 3

            [runner]
            workers = 2

            [[sources]]
            name = "Tottus"
            base_url = "https://www.tottus.com.pe"
            categories = [{ path = "salud/farmacia", name = "Farmacia" }]

            [sources.strategy]
            kind = "custom"
            containers = ["div.product"]
            name = ["h3"]
            price = ["span.price"]

            [[sources]]
            name = "Wong"
            base_url = "https://www.wong.pe"
            enabled = false
            "#,
        )
        .unwrap();

        let config = Config::load_from_path(&path).await.unwrap();

        assert_eq!(config.source_path.as_deref(), Some(path.as_path()));
        assert_eq!(config.fetch.settle_delay_secs, 3.0);
        assert_eq!(config.fetch.max_retries, 3);
        assert_eq!(config.runner.workers, 2);

        let tottus = config.source("Tottus").unwrap();
        assert_eq!(
            config.categories_for(tottus),
            vec![Category::with_name("salud/farmacia", "Farmacia")]
        );
        assert_eq!(config.strategy_for(tottus).unwrap().label(), "custom");

        let enabled: Vec<_> = config.enabled_sources().map(|s| s.name.as_str()).collect();
        assert_eq!(enabled, vec!["Tottus"]);
        assert_eq!(config.all_categories().len(), 2);
    }

    #[tokio::test]
    async fn test_load_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"runner": {"min_interval_secs": 0}}"#).unwrap();

        let config = Config::load_from_path(&path).await.unwrap();
        assert_eq!(config.min_run_interval(), Duration::ZERO);
        assert_eq!(config.sources.len(), 3);
    }

    #[tokio::test]
    async fn test_parse_error_names_format() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "sources = 7").unwrap();

        let err = Config::load_from_path(&path).await.unwrap_err();
        assert!(matches!(err, ConfigError::Parse { format: "TOML", .. }));
    }

    #[test]
    fn test_unknown_source_without_strategy() {
        let mut config = Config::default();
        config
            .sources
            .push(SourceConfig::builtin("Tottus", "https://www.tottus.com.pe"));
        let tottus = config.source("tottus").unwrap();
        assert!(matches!(
            config.strategy_for(tottus),
            Err(ConfigError::NoStrategy(_))
        ));
        assert!(matches!(
            config.source("Vivanda"),
            Err(ConfigError::UnknownSource(_))
        ));
    }
}
