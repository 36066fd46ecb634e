use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{CollectError, Result};
use crate::platform::Platform;

#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding `credentials/`, `users/` and `data/`.
    pub root: PathBuf,
    pub platforms: Vec<Platform>,
    pub max_fetch_limit: usize,
    pub max_doublings: u32,
    pub limit_scope: LimitScope,
    pub request_timeout_secs: u64,
    pub reddit: ApiSettings,
    pub twitter: ApiSettings,
}

/// Whether a doubled fetch-limit carries over to the next account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitScope {
    Run,
    Account,
}

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub start_limit: usize,
    pub auth_url: String,
    pub api_url: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct PartialApiSettings {
    start_limit: Option<usize>,
    auth_url: Option<String>,
    api_url: Option<String>,
}

impl ApiSettings {
    pub fn defaults(platform: Platform) -> Self {
        let (auth_url, api_url) = match platform {
            Platform::Reddit => ("https://www.reddit.com", "https://oauth.reddit.com"),
            Platform::Twitter => ("https://api.twitter.com", "https://api.twitter.com"),
        };
        Self {
            start_limit: platform.default_start_limit(),
            auth_url: auth_url.to_string(),
            api_url: api_url.to_string(),
        }
    }

    fn merged(platform: Platform, partial: PartialApiSettings) -> Self {
        let base = Self::defaults(platform);
        Self {
            start_limit: partial.start_limit.unwrap_or(base.start_limit),
            auth_url: partial.auth_url.unwrap_or(base.auth_url),
            api_url: partial.api_url.unwrap_or(base.api_url),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            platforms: vec![Platform::Reddit],
            max_fetch_limit: 3200,
            max_doublings: 6,
            limit_scope: LimitScope::Run,
            request_timeout_secs: 30,
            reddit: ApiSettings::defaults(Platform::Reddit),
            twitter: ApiSettings::defaults(Platform::Twitter),
        }
    }
}

impl Config {
    pub fn api(&self, platform: Platform) -> &ApiSettings {
        match platform {
            Platform::Reddit => &self.reddit,
            Platform::Twitter => &self.twitter,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.platforms.is_empty() {
            return Err(CollectError::Config("no platforms selected".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(CollectError::Config("request_timeout_secs must be positive".into()));
        }
        for &platform in &self.platforms {
            let api = self.api(platform);
            if api.start_limit == 0 {
                return Err(CollectError::Config(format!(
                    "{platform}.start_limit must be positive"
                )));
            }
            if api.start_limit > self.max_fetch_limit {
                return Err(CollectError::Config(format!(
                    "{platform}.start_limit ({}) exceeds max_fetch_limit ({})",
                    api.start_limit, self.max_fetch_limit
                )));
            }
        }
        Ok(())
    }
}

// Per-platform sections fall back to that platform's own defaults, not a shared one.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawConfig {
    root: Option<PathBuf>,
    platforms: Option<Vec<Platform>>,
    max_fetch_limit: Option<usize>,
    max_doublings: Option<u32>,
    limit_scope: Option<LimitScope>,
    request_timeout_secs: Option<u64>,
    reddit: PartialApiSettings,
    twitter: PartialApiSettings,
}

impl From<RawConfig> for Config {
    fn from(raw: RawConfig) -> Self {
        let base = Config::default();
        Self {
            root: raw.root.unwrap_or(base.root),
            platforms: raw.platforms.unwrap_or(base.platforms),
            max_fetch_limit: raw.max_fetch_limit.unwrap_or(base.max_fetch_limit),
            max_doublings: raw.max_doublings.unwrap_or(base.max_doublings),
            limit_scope: raw.limit_scope.unwrap_or(base.limit_scope),
            request_timeout_secs: raw.request_timeout_secs.unwrap_or(base.request_timeout_secs),
            reddit: ApiSettings::merged(Platform::Reddit, raw.reddit),
            twitter: ApiSettings::merged(Platform::Twitter, raw.twitter),
        }
    }
}

pub fn parse(text: &str) -> std::result::Result<Config, serde_json::Error> {
    let raw: RawConfig = serde_json::from_str(text)?;
    Ok(raw.into())
}

pub fn load(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => {
            let text = fs::read_to_string(path).map_err(|source| CollectError::MissingFile {
                what: "configuration",
                path: path.to_path_buf(),
                source,
            })?;
            parse(&text).map_err(|source| CollectError::InvalidFile {
                path: path.to_path_buf(),
                source,
            })?
        }
        None => Config::default(),
    };
    config.validate()?;
    Ok(config)
}
