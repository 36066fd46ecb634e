//! Platform adapters.
//!
//! Each platform knows how to authenticate, fetch the most recent items of an
//! account (newest first) and project one item into a table row. The adapter
//! is chosen once per run; everything downstream is generic over [`SocialApi`].

pub mod reddit;
pub mod twitter;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Local, NaiveDate, TimeZone};
use reqwest::{Client, Response};
use serde::Deserialize;
use url::Url;

use crate::error::{CollectError, Result};
use crate::table::Row;

pub use reddit::RedditApi;
pub use twitter::TwitterApi;

const REDDIT_COLUMNS: &[&str] = &["date", "username", "subreddit", "title", "text"];
const TWITTER_COLUMNS: &[&str] = &["date", "username", "text"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Reddit,
    Twitter,
}

impl Platform {
    pub fn name(self) -> &'static str {
        match self {
            Platform::Reddit => "reddit",
            Platform::Twitter => "twitter",
        }
    }

    pub fn columns(self) -> &'static [&'static str] {
        match self {
            Platform::Reddit => REDDIT_COLUMNS,
            Platform::Twitter => TWITTER_COLUMNS,
        }
    }

    pub fn default_start_limit(self) -> usize {
        match self {
            Platform::Reddit => 50,
            Platform::Twitter => 200,
        }
    }

    pub fn credentials_path(self, root: &Path) -> PathBuf {
        root.join("credentials")
            .join(format!("{}_credentials.json", self.name()))
    }

    pub fn accounts_path(self, root: &Path) -> PathBuf {
        root.join("users").join(format!("{}_users.json", self.name()))
    }

    pub fn table_path(self, root: &Path) -> PathBuf {
        root.join("data").join(format!("{}_df.csv", self.name()))
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Anything carrying a creation instant in UTC epoch seconds.
pub trait Timestamped {
    fn created_utc(&self) -> Result<i64>;
}

#[async_trait]
pub trait SocialApi: Send + Sync {
    type Item: Timestamped + Send;

    fn platform(&self) -> Platform;

    /// Up to `limit` most recent items of `account`, newest first.
    async fn fetch_recent(&self, account: &str, limit: usize) -> Result<Vec<Self::Item>>;

    fn project(&self, item: &Self::Item) -> Result<Row>;
}

pub(crate) fn http_client(user_agent: &str, timeout: Duration) -> Result<Client> {
    Ok(Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .build()?)
}

/// Joins `path` onto `base`, treating `base` as a directory.
pub(crate) fn endpoint(base: &str, path: &str) -> Result<Url> {
    let mut base = Url::parse(base)?;
    if !base.path().ends_with('/') {
        let dir = format!("{}/", base.path());
        base.set_path(&dir);
    }
    Ok(base.join(path.trim_start_matches('/'))?)
}

pub(crate) fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if !status.is_success() {
        return Err(CollectError::HttpStatus {
            status,
            url: response.url().to_string(),
        });
    }
    Ok(response)
}

/// Calendar date of a UTC epoch timestamp in the process's local timezone.
pub fn local_date(ts: i64) -> Result<NaiveDate> {
    Local
        .timestamp_opt(ts, 0)
        .single()
        .map(|dt| dt.date_naive())
        .ok_or_else(|| CollectError::Timestamp(ts.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_names_deserialize_lowercase() {
        let platforms: Vec<Platform> = serde_json::from_str(r#"["twitter", "reddit"]"#).unwrap();
        assert_eq!(platforms, [Platform::Twitter, Platform::Reddit]);
        assert!(serde_json::from_str::<Platform>(r#""Reddit""#).is_err());
    }

    #[test]
    fn file_layout_follows_platform_name() {
        let root = Path::new("/srv/collector");
        assert_eq!(
            Platform::Reddit.credentials_path(root),
            Path::new("/srv/collector/credentials/reddit_credentials.json")
        );
        assert_eq!(
            Platform::Twitter.accounts_path(root),
            Path::new("/srv/collector/users/twitter_users.json")
        );
        assert_eq!(
            Platform::Twitter.table_path(root),
            Path::new("/srv/collector/data/twitter_df.csv")
        );
    }

    #[test]
    fn endpoint_keeps_base_path() {
        let url = endpoint("http://127.0.0.1:8080/proxy", "/r/rust/new").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8080/proxy/r/rust/new");

        let url = endpoint("https://oauth.reddit.com", "r/rust/new").unwrap();
        assert_eq!(url.as_str(), "https://oauth.reddit.com/r/rust/new");
    }

    #[test]
    fn local_date_round_trips_local_noon() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let noon = Local
            .from_local_datetime(&day.and_hms_opt(12, 0, 0).unwrap())
            .single()
            .unwrap();
        assert_eq!(local_date(noon.timestamp()).unwrap(), day);
    }
}
