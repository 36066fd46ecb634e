use std::time::Duration;

use async_trait::async_trait;
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

// Listing endpoints cap a page at 100 children.
const PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    children: Vec<ListingChild>,
    after: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListingChild {
    data: RedditPost,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedditPost {
    /// Fullname, e.g. `t3_abc123`.
    pub name: String,
    pub subreddit: String,
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    pub created_utc: f64,
}

impl Timestamped for RedditPost {
    fn created_utc(&self) -> Result<i64> {
        if self.created_utc.is_finite() {
            Ok(self.created_utc as i64)
        } else {
            Err(CollectError::Timestamp(format!(
                "{}: {}",
                self.name, self.created_utc
            )))
        }
    }
}

/// App-only session against the Reddit API.
pub struct RedditApi {
    http: Client,
    token: String,
    api_url: String,
}

impl RedditApi {
    pub async fn authenticate(
        credentials: &Credentials,
        settings: &ApiSettings,
        timeout: Duration,
    ) -> Result<Self> {
        let client_id = credentials.require("client_id")?;
        let client_secret = credentials.require("client_secret")?;
        let user_agent = credentials.require("user_agent")?;

        let http = http_client(user_agent, timeout)?;
        let url = endpoint(&settings.auth_url, "api/v1/access_token")?;

        let response = http
            .post(url)
            .basic_auth(client_id, Some(client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;
        let token: TokenResponse = check_status(response)?.json().await?;

        let token = match token {
            TokenResponse {
                access_token: Some(token),
                ..
            } => token,
            TokenResponse { error, .. } => {
                return Err(CollectError::Auth {
                    platform: Platform::Reddit.name(),
                    message: error.unwrap_or_else(|| "no access token returned".into()),
                });
            }
        };

        info!("Authenticated with Reddit as {client_id}");

        Ok(Self {
            http,
            token,
            api_url: settings.api_url.clone(),
        })
    }
}

#[async_trait]
impl SocialApi for RedditApi {
    type Item = RedditPost;

    fn platform(&self) -> Platform {
        Platform::Reddit
    }

    async fn fetch_recent(&self, subreddit: &str, limit: usize) -> Result<Vec<RedditPost>> {
        let url = endpoint(&self.api_url, &format!("r/{subreddit}/new"))?;
        let mut posts = Vec::new();
        let mut after: Option<String> = None;

        while posts.len() < limit {
            let page = (limit - posts.len()).min(PAGE_SIZE);
            let mut query = vec![("limit", page.to_string()), ("raw_json", "1".to_string())];
            if let Some(after) = &after {
                query.push(("after", after.clone()));
            }

            debug!("GET {url} limit={page} after={after:?}");
            let response = self
                .http
                .get(url.clone())
                .bearer_auth(&self.token)
                .query(&query)
                .send()
                .await?;
            let listing: Listing = check_status(response)?.json().await?;

            let received = listing.data.children.len();
            posts.extend(listing.data.children.into_iter().map(|c| c.data));
            after = listing.data.after;

            if received == 0 || after.is_none() {
                break;
            }
        }

        posts.truncate(limit);
        Ok(posts)
    }

    fn project(&self, post: &RedditPost) -> Result<Row> {
        Ok(Row::new(vec![
            local_date(post.created_utc()?)?.to_string(),
            post.name.clone(),
            post.subreddit.clone(),
            post.title.clone(),
            post.selftext.clone(),
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use std::collections::HashMap;
    use wiremock::matchers::{
        basic_auth, bearer_token, body_string_contains, method, path, query_param,
        query_param_is_missing,
    };
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credentials() -> Credentials {
        let values = HashMap::from([
            ("client_id".to_string(), "my-id".to_string()),
            ("client_secret".to_string(), "my-secret".to_string()),
            ("user_agent".to_string(), "collector/0.1".to_string()),
        ]);
        Credentials::new(Platform::Reddit, values)
    }

    fn settings(server: &MockServer) -> ApiSettings {
        ApiSettings {
            start_limit: 50,
            auth_url: server.uri(),
            api_url: server.uri(),
        }
    }

    fn listing(ids: std::ops::Range<u32>, after: Option<&str>) -> Value {
        let children: Vec<Value> = ids
            .map(|i| {
                json!({
                    "kind": "t3",
                    "data": {
                        "name": format!("t3_p{i}"),
                        "subreddit": "rust",
                        "title": format!("post {i}"),
                        "selftext": "",
                        "created_utc": 1_700_000_000.0 - f64::from(i),
                        "score": 1
                    }
                })
            })
            .collect();
        json!({ "kind": "Listing", "data": { "children": children, "after": after, "before": null } })
    }

    async fn mount_token(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/api/v1/access_token"))
            .and(basic_auth("my-id", "my-secret"))
            .and(body_string_contains("grant_type=client_credentials"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "tok",
                "token_type": "bearer",
                "expires_in": 86400,
                "scope": "*"
            })))
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn paginates_new_listing_up_to_limit() {
        let server = MockServer::start().await;
        mount_token(&server).await;

        Mock::given(method("GET"))
            .and(path("/r/rust/new"))
            .and(bearer_token("tok"))
            .and(query_param("limit", "100"))
            .and(query_param_is_missing("after"))
            .respond_with(ResponseTemplate::new(200).set_body_json(listing(0..100, Some("t3_p99"))))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/r/rust/new"))
            .and(query_param("limit", "50"))
            .and(query_param("after", "t3_p99"))
            .respond_with(ResponseTemplate::new(200).set_body_json(listing(100..150, Some("t3_p149"))))
            .expect(1)
            .mount(&server)
            .await;

        let api = RedditApi::authenticate(&credentials(), &settings(&server), Duration::from_secs(5))
            .await
            .unwrap();
        let posts = api.fetch_recent("rust", 150).await.unwrap();

        assert_eq!(posts.len(), 150);
        assert_eq!(posts[0].name, "t3_p0");
        assert_eq!(posts[149].name, "t3_p149");
    }

    #[tokio::test]
    async fn stops_when_listing_ends() {
        let server = MockServer::start().await;
        mount_token(&server).await;

        Mock::given(method("GET"))
            .and(path("/r/tiny/new"))
            .respond_with(ResponseTemplate::new(200).set_body_json(listing(0..7, None)))
            .expect(1)
            .mount(&server)
            .await;

        let api = RedditApi::authenticate(&credentials(), &settings(&server), Duration::from_secs(5))
            .await
            .unwrap();
        let posts = api.fetch_recent("tiny", 50).await.unwrap();
        assert_eq!(posts.len(), 7);
    }

    #[tokio::test]
    async fn status_errors_propagate() {
        let server = MockServer::start().await;
        mount_token(&server).await;

        Mock::given(method("GET"))
            .and(path("/r/private/new"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let api = RedditApi::authenticate(&credentials(), &settings(&server), Duration::from_secs(5))
            .await
            .unwrap();
        let err = api.fetch_recent("private", 50).await.unwrap_err();
        assert!(matches!(
            err,
            CollectError::HttpStatus { status, .. } if status == reqwest::StatusCode::FORBIDDEN
        ));
    }

    #[tokio::test]
    async fn rejected_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/access_token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "error": "invalid_grant" })),
            )
            .mount(&server)
            .await;

        let result =
            RedditApi::authenticate(&credentials(), &settings(&server), Duration::from_secs(5))
                .await;
        assert!(matches!(
            result,
            Err(CollectError::Auth { platform: "reddit", ref message }) if message == "invalid_grant"
        ));
    }

    #[tokio::test]
    async fn missing_user_agent_fails_before_request() {
        let server = MockServer::start().await;
        let values = HashMap::from([
            ("client_id".to_string(), "my-id".to_string()),
            ("client_secret".to_string(), "my-secret".to_string()),
        ]);
        let credentials = Credentials::new(Platform::Reddit, values);

        let result =
            RedditApi::authenticate(&credentials, &settings(&server), Duration::from_secs(5)).await;
        assert!(matches!(result, Err(CollectError::MissingCredential { .. })));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[test]
    fn projects_post_fields() {
        let post = RedditPost {
            name: "t3_xyz".into(),
            subreddit: "rust".into(),
            title: "Announcing Rust 1.80".into(),
            selftext: "body".into(),
            created_utc: 1_700_000_000.0,
        };
        let api = RedditApi {
            http: Client::new(),
            token: String::new(),
            api_url: String::new(),
        };

        let row = api.project(&post).unwrap();
        let date = local_date(1_700_000_000).unwrap().to_string();
        assert_eq!(
            row.values(),
            [date.as_str(), "t3_xyz", "rust", "Announcing Rust 1.80", "body"]
        );
        assert_eq!(api.project(&post).unwrap(), row);
    }
}
