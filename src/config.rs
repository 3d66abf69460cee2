//! Configuration handling.
//!
//! Settings come from an optional `.testrail-relay.toml` file, overridden by
//! `TESTRAIL_*` environment variables (the prefix is configurable). Both are
//! resolved once into a [`Config`] that is passed to every collaborator.

use crate::models::ResultExtras;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Default config file name, looked up in the current directory.
pub const DEFAULT_CONFIG_FILE: &str = ".testrail-relay.toml";

/// Errors raised while resolving configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    Missing(String),

    #[error("{key} must be a positive integer, got {value:?}")]
    InvalidId { key: String, value: String },
}

/// Configuration as written in the TOML file. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    /// TestRail connection and run settings.
    #[serde(default)]
    pub testrail: TestRailSection,

    /// Custom result fields attached to every result.
    #[serde(default)]
    pub custom: BTreeMap<String, String>,
}

/// The `[testrail]` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestRailSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Prefer the environment for this one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suite_id: Option<u64>,

    /// A run ID, or `"latest"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<RunIdValue>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_all: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// A run ID as written in TOML: either a number or a string such as `"latest"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RunIdValue {
    Number(u64),
    Text(String),
}

impl fmt::Display for RunIdValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunIdValue::Number(n) => write!(f, "{}", n),
            RunIdValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl FileConfig {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: FileConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Generate the content of a starter configuration file.
    pub fn default_toml() -> String {
        let mut custom = BTreeMap::new();
        custom.insert("custom_environment".to_string(), "staging".to_string());

        let config = FileConfig {
            testrail: TestRailSection {
                domain: Some("example.testrail.io".to_string()),
                username: Some("qa@example.com".to_string()),
                api_key: None,
                project_id: Some(1),
                suite_id: None,
                run_id: None,
                version: None,
                include_all: Some(true),
                title: None,
            },
            custom,
        };
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

/// Which run the results are submitted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunSelector {
    /// Create a new run.
    New,
    /// Submit to an existing run.
    Existing(u64),
    /// Submit to the most recent run of the project.
    Latest,
}

/// Fully resolved configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    pub domain: String,
    pub username: String,
    pub api_key: String,
    pub project_id: u64,
    pub suite_id: Option<u64>,
    pub run: RunSelector,
    pub version: Option<String>,
    pub include_all: bool,
    pub title: Option<String>,
    pub custom: BTreeMap<String, String>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("domain", &self.domain)
            .field("username", &self.username)
            .field("api_key", &"<redacted>")
            .field("project_id", &self.project_id)
            .field("suite_id", &self.suite_id)
            .field("run", &self.run)
            .field("version", &self.version)
            .field("include_all", &self.include_all)
            .field("title", &self.title)
            .field("custom", &self.custom)
            .finish()
    }
}

impl Config {
    /// Resolve configuration from the process environment layered over `file`.
    pub fn from_env(file: FileConfig, prefix: &str) -> Result<Self, ConfigError> {
        Self::resolve(file, prefix, std::env::vars())
    }

    /// Resolve configuration from the given variables layered over `file`.
    ///
    /// Empty variables count as unset.
    pub fn resolve<I>(file: FileConfig, prefix: &str, vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let custom_prefix = format!("{}_CUSTOM_", prefix);
        let mut env = BTreeMap::new();
        let mut custom = file.custom;

        for (key, value) in vars {
            if value.is_empty() {
                continue;
            }
            if let Some(field) = key.strip_prefix(&custom_prefix) {
                if !field.is_empty() {
                    custom.insert(field.to_string(), value);
                }
                continue;
            }
            if let Some(name) = key.strip_prefix(prefix).and_then(|k| k.strip_prefix('_')) {
                env.insert(name.to_string(), value);
            }
        }

        let key = |name: &str| format!("{}_{}", prefix, name);
        let section = file.testrail;

        let domain = env
            .remove("DOMAIN")
            .or(section.domain)
            .ok_or_else(|| ConfigError::Missing(key("DOMAIN")))?;
        let username = env
            .remove("USERNAME")
            .or(section.username)
            .ok_or_else(|| ConfigError::Missing(key("USERNAME")))?;
        let api_key = env
            .remove("APIKEY")
            .or(section.api_key)
            .ok_or_else(|| ConfigError::Missing(key("APIKEY")))?;

        let project_id = match env.remove("PROJECTID") {
            Some(value) => parse_id(&key("PROJECTID"), &value)?,
            None => section
                .project_id
                .ok_or_else(|| ConfigError::Missing(key("PROJECTID")))?,
        };

        let suite_id = match env.remove("SUITEID") {
            Some(value) => Some(parse_id(&key("SUITEID"), &value)?),
            None => section.suite_id,
        };

        let run_value = env
            .remove("RUNID")
            .or_else(|| section.run_id.map(|v| v.to_string()));
        let run = match run_value {
            None => RunSelector::New,
            Some(value) if value.trim().eq_ignore_ascii_case("latest") => RunSelector::Latest,
            Some(value) => RunSelector::Existing(parse_id(&key("RUNID"), &value)?),
        };

        let include_all = match env.remove("INCLUDEALL") {
            Some(value) => parse_include_all(&value),
            None => section.include_all.unwrap_or(true),
        };

        Ok(Self {
            domain: domain.trim().trim_end_matches('/').to_string(),
            username,
            api_key,
            project_id,
            suite_id,
            run,
            version: env.remove("VERSION").or(section.version),
            include_all,
            title: env.remove("TITLE").or(section.title),
            custom,
        })
    }

    /// Base URL of the TestRail instance.
    pub fn base_url(&self) -> String {
        if self.domain.starts_with("http://") || self.domain.starts_with("https://") {
            self.domain.clone()
        } else {
            format!("https://{}", self.domain)
        }
    }

    /// Fields attached to every submitted result.
    pub fn result_extras(&self) -> ResultExtras {
        ResultExtras {
            version: self.version.clone(),
            custom: self.custom.clone(),
        }
    }
}

fn parse_id(key: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| ConfigError::InvalidId {
            key: key.to_string(),
            value: value.to_string(),
        })
}

/// Only an explicit `false` restricts a new run to the referenced cases.
fn parse_include_all(value: &str) -> bool {
    !value.trim().eq_ignore_ascii_case("false")
}
