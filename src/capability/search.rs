//! [`WebSearch`] backed by the Tavily search API.
//!
//! ## Retry Strategy
//!
//! Search backends return 429 / 5xx under bursty load, and the navigator
//! fires all of its queries at once. Transient failures are retried with
//! exponential backoff (`backoff_ms * 2^attempt`); 4xx other than 429 are
//! permanent and returned immediately. The navigator itself never retries:
//! a query that still fails here just leaves its result slot empty.

use super::{CapabilityError, SearchHit, WebSearch};
use crate::config::VerificationConfig;
use crate::error::PostcardError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Tavily search client.
pub struct TavilySearch {
    client: Client,
    api_key: String,
    endpoint: String,
    max_results: usize,
    max_retries: u32,
    backoff_ms: u64,
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    max_results: usize,
    search_depth: &'static str,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    url: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

impl From<TavilyResult> for SearchHit {
    fn from(r: TavilyResult) -> Self {
        SearchHit {
            url: r.url,
            title: r.title,
            snippet: r.content,
        }
    }
}

impl TavilySearch {
    pub fn new(api_key: impl Into<String>, endpoint: impl Into<String>) -> Result<Self, PostcardError> {
        let client = Client::builder()
            .build()
            .map_err(|e| PostcardError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            endpoint: endpoint.into(),
            max_results: 5,
            max_retries: 2,
            backoff_ms: 500,
        })
    }

    /// Build from config; the API key comes from the config or `TAVILY_API_KEY`.
    pub fn from_config(config: &VerificationConfig) -> Result<Self, PostcardError> {
        let api_key = match config.search_api_key {
            Some(ref key) if !key.is_empty() => key.clone(),
            _ => std::env::var("TAVILY_API_KEY")
                .ok()
                .filter(|k| !k.is_empty())
                .ok_or_else(|| PostcardError::CapabilityNotConfigured {
                    capability: "Web search".to_string(),
                    hint: "Set TAVILY_API_KEY or pass --search-api-key.".to_string(),
                })?,
        };
        let mut search = Self::new(api_key, config.search_endpoint.clone())?;
        search.max_results = config.max_results_per_query;
        search.max_retries = config.search_retries;
        search.backoff_ms = config.search_backoff_ms;
        Ok(search)
    }

    async fn search_once(&self, query: &str) -> Result<Vec<SearchHit>, CapabilityError> {
        let body = SearchRequest {
            query,
            max_results: self.max_results,
            search_depth: "basic",
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CapabilityError::Unavailable(format!("search request timed out: {e}"))
                } else {
                    CapabilityError::Unavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".into());
            return Err(CapabilityError::Http {
                status: status.as_u16(),
                detail,
            });
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| CapabilityError::Failed(format!("unreadable search response: {e}")))?;

        Ok(parsed.results.into_iter().map(SearchHit::from).collect())
    }
}

/// Whether a failure is worth another attempt.
fn is_transient(err: &CapabilityError) -> bool {
    match err {
        CapabilityError::Http { status, .. } => {
            *status == StatusCode::TOO_MANY_REQUESTS.as_u16() || *status >= 500
        }
        CapabilityError::Unavailable(_) | CapabilityError::Timeout { .. } => true,
        CapabilityError::Navigation(_) | CapabilityError::Failed(_) => false,
    }
}

#[async_trait]
impl WebSearch for TavilySearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, CapabilityError> {
        let mut attempt = 0;
        loop {
            match self.search_once(query).await {
                Ok(hits) => {
                    debug!("Search '{}': {} hits", query, hits.len());
                    return Ok(hits);
                }
                Err(e) if attempt < self.max_retries && is_transient(&e) => {
                    attempt += 1;
                    let backoff = self.backoff_ms * 2u64.pow(attempt - 1);
                    warn!(
                        "Search '{}': retry {}/{} after {}ms — {}",
                        query, attempt, self.max_retries, backoff, e
                    );
                    sleep(Duration::from_millis(backoff)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
