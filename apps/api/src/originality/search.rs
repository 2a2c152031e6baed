//! Code Search Client: GitHub code search for a snippet, plus retrieval of
//! each candidate's content so it can be scored.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;
use crate::originality::models::{Language, SearchMatch};

/// Results requested per query.
pub const RESULTS_PER_QUERY: u32 = 3;
const MAX_RETRIES: u32 = 3;
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
const TEXT_MATCH_MEDIA_TYPE: &str = "application/vnd.github.text-match+json";
const RAW_MEDIA_TYPE: &str = "application/vnd.github.raw";

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("search API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("search API still throttled after {retries} attempts")]
    Throttled { retries: u32 },
}

/// Searches an external index for code resembling a snippet.
///
/// Carried by the pipeline as `Arc<dyn CodeSearch>`.
#[async_trait]
pub trait CodeSearch: Send + Sync {
    async fn search(
        &self,
        snippet: &str,
        language: Option<Language>,
    ) -> Result<Vec<SearchMatch>, SearchError>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    html_url: Option<String>,
    /// Contents API URL for the file.
    url: Option<String>,
    #[serde(default)]
    text_matches: Vec<TextMatch>,
}

#[derive(Debug, Deserialize)]
struct TextMatch {
    fragment: Option<String>,
}

/// GitHub REST `search/code` client.
#[derive(Clone)]
pub struct GithubCodeSearch {
    client: Client,
    api_url: String,
    token: Option<String>,
    backoff_base: Duration,
}

impl GithubCodeSearch {
    pub fn new(config: &Config) -> Result<Self, SearchError> {
        Ok(Self {
            client: Client::builder()
                .timeout(config.search_timeout)
                .user_agent(USER_AGENT)
                .build()?,
            api_url: config.github_api_url.trim_end_matches('/').to_string(),
            token: config.github_token.clone(),
            backoff_base: Duration::from_millis(500),
        })
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Sends a GET, retrying throttling and server errors with exponential backoff.
    async fn get_with_retry(
        &self,
        url: &str,
        query: &[(&str, String)],
        accept: &str,
    ) -> Result<Response, SearchError> {
        let mut last_error: Option<SearchError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay = self.backoff_base * (1 << (attempt - 1));
                warn!(
                    "Code search attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let request = self
                .client
                .get(url)
                .query(query)
                .header(header::ACCEPT, accept);
            let response = match self.authorized(request).send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(SearchError::Http(e));
                    continue;
                }
            };

            let status = response.status();
            if is_retryable(status, response.headers()) {
                let body = response.text().await.unwrap_or_default();
                warn!("Code search API returned {}: {}", status, body);
                last_error = Some(SearchError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(SearchError::Api {
                    status: status.as_u16(),
                    message: body,
                });
            }

            return Ok(response);
        }

        Err(last_error.unwrap_or(SearchError::Throttled {
            retries: MAX_RETRIES,
        }))
    }

    /// Raw file contents for a candidate, via its contents API URL.
    async fn fetch_content(&self, api_url: &str) -> Option<String> {
        match self.get_with_retry(api_url, &[], RAW_MEDIA_TYPE).await {
            Ok(response) => response.text().await.ok(),
            Err(e) => {
                debug!("Could not fetch candidate content {}: {}", api_url, e);
                None
            }
        }
    }
}

#[async_trait]
impl CodeSearch for GithubCodeSearch {
    async fn search(
        &self,
        snippet: &str,
        language: Option<Language>,
    ) -> Result<Vec<SearchMatch>, SearchError> {
        let url = format!("{}/search/code", self.api_url);
        let query = [
            ("q", build_query(snippet, language)),
            ("per_page", RESULTS_PER_QUERY.to_string()),
        ];

        let response = self
            .get_with_retry(&url, &query, TEXT_MATCH_MEDIA_TYPE)
            .await?;
        let body: SearchResponse = response.json().await?;

        let mut matches = Vec::with_capacity(body.items.len());
        for raw in body.items {
            let Ok(item) = serde_json::from_value::<SearchItem>(raw.clone()) else {
                continue;
            };
            let Some(html_url) = item.html_url else {
                continue;
            };

            let mut content = fragments_content(&item.text_matches);
            if content.is_none() {
                if let Some(api_url) = &item.url {
                    content = self.fetch_content(api_url).await;
                }
            }

            matches.push(SearchMatch {
                url: html_url,
                content,
                metadata: raw,
            });
        }

        debug!("Code search returned {} matches", matches.len());
        Ok(matches)
    }
}

/// `"<snippet>" language:<lang>`. Inner double quotes are dropped so the
/// phrase stays a single exact-match term.
pub fn build_query(snippet: &str, language: Option<Language>) -> String {
    let phrase: String = snippet.chars().filter(|c| *c != '"').collect();
    let mut q = format!("\"{phrase}\"");
    if let Some(language) = language {
        q.push_str(" language:");
        q.push_str(language.search_qualifier());
    }
    q
}

fn fragments_content(text_matches: &[TextMatch]) -> Option<String> {
    let joined = text_matches
        .iter()
        .filter_map(|m| m.fragment.as_deref())
        .collect::<Vec<_>>()
        .join("\n");
    if joined.trim().is_empty() {
        None
    } else {
        Some(joined)
    }
}

fn is_retryable(status: StatusCode, headers: &header::HeaderMap) -> bool {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        return true;
    }
    // GitHub signals primary rate-limit exhaustion with 403.
    status == StatusCode::FORBIDDEN
        && headers
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            == Some("0")
}
