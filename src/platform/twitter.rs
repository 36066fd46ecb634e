use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::ApiSettings;
use crate::error::{CollectError, Result};
use crate::loader::Credentials;
use crate::platform::{
    Platform, SocialApi, Timestamped, check_status, endpoint, http_client, local_date,
};
use crate::table::Row;

// user_timeline returns at most 200 tweets per call.
const PAGE_SIZE: usize = 200;
const CREATED_AT_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";
const USER_AGENT: &str = concat!("social_collector/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token_type: String,
    access_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tweet {
    pub id: u64,
    /// e.g. `Wed Oct 10 20:19:24 +0000 2018`
    pub created_at: String,
    #[serde(default)]
    pub full_text: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    pub user: TweetUser,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TweetUser {
    pub name: String,
    pub screen_name: String,
}

impl Tweet {
    pub fn body(&self) -> &str {
        self.full_text
            .as_deref()
            .or(self.text.as_deref())
            .unwrap_or_default()
    }
}

impl Timestamped for Tweet {
    fn created_utc(&self) -> Result<i64> {
        DateTime::parse_from_str(&self.created_at, CREATED_AT_FORMAT)
            .map(|dt| dt.timestamp())
            .map_err(|e| CollectError::Timestamp(format!("{}: {e}", self.created_at)))
    }
}

/// App-only (bearer token) session against the Twitter v1.1 API.
pub struct TwitterApi {
    http: Client,
    bearer: String,
    api_url: String,
}

impl TwitterApi {
    /// Uses a `bearer_token` credential when present, otherwise exchanges the
    /// consumer key and secret for one.
    pub async fn authenticate(
        credentials: &Credentials,
        settings: &ApiSettings,
        timeout: Duration,
    ) -> Result<Self> {
        let http = http_client(USER_AGENT, timeout)?;

        let bearer = match credentials.get("bearer_token") {
            Some(token) => token.to_string(),
            None => {
                let consumer_key = credentials.require("consumer_key")?;
                let consumer_secret = credentials.require("consumer_secret")?;
                if credentials.get("access_token").is_some() {
                    debug!("User access token present; reads use the application token");
                }
                request_bearer(&http, &settings.auth_url, consumer_key, consumer_secret).await?
            }
        };

        info!("Authenticated with Twitter");

        Ok(Self {
            http,
            bearer,
            api_url: settings.api_url.clone(),
        })
    }
}

async fn request_bearer(http: &Client, auth_url: &str, key: &str, secret: &str) -> Result<String> {
    let url = endpoint(auth_url, "oauth2/token")?;
    let response = http
        .post(url)
        .basic_auth(key, Some(secret))
        .form(&[("grant_type", "client_credentials")])
        .send()
        .await?;
    let token: TokenResponse = check_status(response)?.json().await?;

    if !token.token_type.eq_ignore_ascii_case("bearer") {
        return Err(CollectError::Auth {
            platform: Platform::Twitter.name(),
            message: format!("unexpected token type {}", token.token_type),
        });
    }
    Ok(token.access_token)
}

#[async_trait]
impl SocialApi for TwitterApi {
    type Item = Tweet;

    fn platform(&self) -> Platform {
        Platform::Twitter
    }

    async fn fetch_recent(&self, screen_name: &str, limit: usize) -> Result<Vec<Tweet>> {
        let url = endpoint(&self.api_url, "1.1/statuses/user_timeline.json")?;
        let mut tweets: Vec<Tweet> = Vec::new();

        while tweets.len() < limit {
            let count = (limit - tweets.len()).min(PAGE_SIZE);
            let mut query = vec![
                ("screen_name", screen_name.to_string()),
                ("count", count.to_string()),
                ("tweet_mode", "extended".to_string()),
            ];
            if let Some(oldest) = tweets.last() {
                query.push(("max_id", oldest.id.saturating_sub(1).to_string()));
            }

            debug!("GET {url} screen_name={screen_name} count={count}");
            let response = self
                .http
                .get(url.clone())
                .bearer_auth(&self.bearer)
                .query(&query)
                .send()
                .await?;
            let page: Vec<Tweet> = check_status(response)?.json().await?;

            if page.is_empty() {
                break;
            }
            tweets.extend(page);
        }

        tweets.truncate(limit);
        Ok(tweets)
    }

    fn project(&self, tweet: &Tweet) -> Result<Row> {
        Ok(Row::new(vec![
            local_date(tweet.created_utc()?)?.to_string(),
            tweet.user.name.clone(),
            tweet.body().to_string(),
        ]))
    }
}
