use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_USER_AGENT: &str = "confluence-export/0.1";
pub const DEFAULT_CONFIG_FILENAME: &str = ".confluence-export.toml";

pub const USER_EMAIL_ENV: &str = "CONFL_USER_EMAIL";
pub const API_TOKEN_ENV: &str = "CONFL_API_TOKEN";

const SITE_URL_ENV: &str = "CONFLUENCE_SITE_URL";
const USER_AGENT_ENV: &str = "CONFLUENCE_USER_AGENT";
const TIMEOUT_ENV: &str = "CONFLUENCE_HTTP_TIMEOUT_MS";
const PANDOC_PATH_ENV: &str = "PANDOC_PATH";

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct ExportConfig {
    #[serde(default)]
    pub confluence: ConfluenceSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct ConfluenceSection {
    pub site_url: Option<String>,
    pub user_agent: Option<String>,
    pub timeout_ms: Option<u64>,
    pub pandoc_path: Option<String>,
}

/// Effective settings for one run after layering env > config file > defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSettings {
    pub site_url: String,
    pub user_agent: String,
    /// Whole-request timeout. `None` (unset or `0`) means requests never time out.
    pub timeout_ms: Option<u64>,
    pub pandoc_path: Option<PathBuf>,
}

impl ExportConfig {
    pub fn resolve(&self, account: &str) -> Result<ResolvedSettings, ConfigError> {
        self.resolve_with(account, |key| env::var(key).ok())
    }

    pub fn resolve_with<F>(&self, account: &str, lookup: F) -> Result<ResolvedSettings, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let override_value = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let site_url = match override_value(SITE_URL_ENV).or_else(|| self.confluence.site_url.clone())
        {
            Some(value) => normalize_site_url(&value)?,
            None => site_url_for_account(account)?,
        };

        let user_agent = override_value(USER_AGENT_ENV)
            .or_else(|| self.confluence.user_agent.clone())
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());

        let timeout_ms = match override_value(TIMEOUT_ENV) {
            Some(value) => parse_timeout_ms(&value)?,
            None => self.confluence.timeout_ms,
        }
        .filter(|value| *value > 0);

        let pandoc_path = override_value(PANDOC_PATH_ENV)
            .or_else(|| self.confluence.pandoc_path.clone())
            .map(PathBuf::from);

        Ok(ResolvedSettings {
            site_url,
            user_agent,
            timeout_ms,
            pandoc_path,
        })
    }
}

/// Load and parse an ExportConfig from a TOML file. Returns default if the file doesn't exist.
pub fn load_config(config_path: &Path) -> Result<ExportConfig, ConfigError> {
    if !config_path.exists() {
        return Ok(ExportConfig::default());
    }
    let content = fs::read_to_string(config_path).map_err(|source| ConfigError::Read {
        path: config_path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|error| ConfigError::Parse {
        path: config_path.to_path_buf(),
        message: error.to_string(),
    })
}

fn parse_timeout_ms(value: &str) -> Result<Option<u64>, ConfigError> {
    value
        .parse::<u64>()
        .map(Some)
        .map_err(|_| ConfigError::InvalidTimeout {
            value: value.to_string(),
        })
}

/// Site root for a hosted workspace, e.g. `https://acme.atlassian.net/wiki`.
pub fn site_url_for_account(account: &str) -> Result<String, ConfigError> {
    let trimmed = account.trim();
    let valid = !trimmed.is_empty()
        && !trimmed.starts_with('-')
        && !trimmed.ends_with('-')
        && trimmed
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-');
    if !valid {
        return Err(ConfigError::InvalidAccount {
            value: account.to_string(),
        });
    }
    Ok(format!("https://{}.atlassian.net/wiki", trimmed.to_ascii_lowercase()))
}

fn normalize_site_url(value: &str) -> Result<String, ConfigError> {
    let trimmed = value.trim().trim_end_matches('/');
    let parsed = Url::parse(trimmed).map_err(|error| ConfigError::InvalidUrl {
        value: value.to_string(),
        message: error.to_string(),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl {
            value: value.to_string(),
            message: format!("unsupported scheme `{}`", parsed.scheme()),
        });
    }
    Ok(trimmed.to_string())
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user_email: String,
    pub api_token: String,
}

impl Credentials {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |var: &'static str| {
            lookup(var)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .ok_or(ConfigError::MissingCredential { var })
        };
        Ok(Self {
            user_email: required(USER_EMAIL_ENV)?,
            api_token: required(API_TOKEN_ENV)?,
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user_email", &self.user_email)
            .field("api_token", &"<redacted>")
            .finish()
    }
}
