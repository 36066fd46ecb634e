use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::{CollectError, Result};
use crate::platform::Platform;

/// Flat key/value secrets for one platform.
#[derive(Debug, Clone)]
pub struct Credentials {
    platform: Platform,
    values: HashMap<String, String>,
}

impl Credentials {
    pub fn new(platform: Platform, values: HashMap<String, String>) -> Self {
        Self { platform, values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key).ok_or_else(|| CollectError::MissingCredential {
            platform: self.platform.name(),
            key: key.to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct AccountList {
    user_to_follow: Vec<String>,
}

pub fn load_credentials(root: &Path, platform: Platform) -> Result<Credentials> {
    let path = platform.credentials_path(root);
    let values: HashMap<String, String> = read_json(&path, "credentials")?;
    Ok(Credentials::new(platform, values))
}

pub fn load_accounts(root: &Path, platform: Platform) -> Result<Vec<String>> {
    let path = platform.accounts_path(root);
    let list: AccountList = read_json(&path, "users to follow")?;
    Ok(list.user_to_follow)
}

fn read_json<T: DeserializeOwned>(path: &Path, what: &'static str) -> Result<T> {
    let text = fs::read_to_string(path).map_err(|source| CollectError::MissingFile {
        what,
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| CollectError::InvalidFile {
        path: path.to_path_buf(),
        source,
    })
}
