//! Navigator: postmark + transcript → candidate source URL.
//!
//! Three states, each one request to an external capability, always in
//! this order and never revisited:
//!
//! ```text
//! GenerateQueries ──▶ ExecuteSearch ──▶ ResolveUrl
//!   (inference)      (search × N,       (inference)
//!                     concurrent)
//! ```
//!
//! Nothing here is fatal. Query generation failing ends triangulation with
//! an empty result; a failed search leaves its slot empty; a failed or
//! unusable resolution leaves the URL absent but keeps the queries. Every
//! absorbed failure is logged as a [`StageError`] and reported to the
//! progress callback.

use crate::capability::{CapabilityError, Inference, InferenceRequest, SearchHit, WebSearch};
use crate::error::StageError;
use crate::output::{Postmark, TriangulationResult};
use crate::pipeline::fanout::scatter_gather;
use crate::pipeline::structured::parse_structured;
use crate::progress::{NoopProgressCallback, ProgressCallback, Stage};
use crate::prompts::{
    query_generation_prompt, resolution_prompt, NAVIGATOR_SYSTEM_PROMPT, QUERIES_SCHEMA,
    RESOLUTION_SCHEMA,
};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Navigator knobs taken from the verification config.
#[derive(Debug, Clone)]
pub struct NavigatorSettings {
    pub query_count: usize,
    pub query_excerpt_chars: usize,
    pub resolve_excerpt_chars: usize,
    pub inference_timeout: Duration,
    pub search_timeout: Duration,
}

impl Default for NavigatorSettings {
    fn default() -> Self {
        Self {
            query_count: 3,
            query_excerpt_chars: 1000,
            resolve_excerpt_chars: 500,
            inference_timeout: Duration::from_secs(60),
            search_timeout: Duration::from_secs(30),
        }
    }
}

/// The query generator may answer with a bare array or wrap it.
#[derive(Deserialize)]
#[serde(untagged)]
enum QueryList {
    Bare(Vec<String>),
    Wrapped { queries: Vec<String> },
}

impl QueryList {
    fn into_vec(self) -> Vec<String> {
        match self {
            QueryList::Bare(q) | QueryList::Wrapped { queries: q } => q,
        }
    }
}

#[derive(Deserialize)]
struct UrlDecision {
    #[serde(default)]
    url: Option<String>,
}

pub struct Navigator {
    inference: Arc<dyn Inference>,
    search: Arc<dyn WebSearch>,
    settings: NavigatorSettings,
    progress: ProgressCallback,
}

impl Navigator {
    pub fn new(
        inference: Arc<dyn Inference>,
        search: Arc<dyn WebSearch>,
        settings: NavigatorSettings,
    ) -> Self {
        Self {
            inference,
            search,
            settings,
            progress: Arc::new(NoopProgressCallback),
        }
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = progress;
        self
    }

    /// Run the three navigator states and return what was found.
    ///
    /// `queries` in the result lists exactly the searches that were issued.
    pub async fn triangulate(&self, postmark: &Postmark, transcript: &str) -> TriangulationResult {
        // ── GenerateQueries ──────────────────────────────────────────────
        self.progress.on_stage_start(Stage::GenerateQueries);
        let queries = match self.generate_queries(postmark, transcript).await {
            Ok(q) => {
                self.progress
                    .on_stage_complete(Stage::GenerateQueries, &format!("{} queries", q.len()));
                q
            }
            Err(e) => {
                self.degrade(&e);
                return TriangulationResult::empty();
            }
        };

        // ── ExecuteSearch ────────────────────────────────────────────────
        self.progress.on_stage_start(Stage::ExecuteSearch);
        let results = self.execute_search(&queries).await;
        let answered = results.iter().filter(|(_, hits)| !hits.is_empty()).count();
        self.progress.on_stage_complete(
            Stage::ExecuteSearch,
            &format!("{}/{} queries returned results", answered, queries.len()),
        );

        // ── ResolveUrl ───────────────────────────────────────────────────
        self.progress.on_stage_start(Stage::ResolveUrl);
        let candidate_url = match self.resolve(postmark, transcript, &results).await {
            Ok(Some(url)) => {
                info!("Candidate source URL: {}", url);
                self.progress.on_stage_complete(Stage::ResolveUrl, &url);
                Some(url)
            }
            Ok(None) => {
                info!("No high-confidence source URL found");
                self.progress
                    .on_stage_complete(Stage::ResolveUrl, "no high-confidence match");
                None
            }
            Err(e) => {
                self.degrade(&e);
                None
            }
        };

        TriangulationResult {
            candidate_url,
            queries,
        }
    }

    async fn generate_queries(
        &self,
        postmark: &Postmark,
        transcript: &str,
    ) -> Result<Vec<String>, StageError> {
        let excerpt = excerpt(transcript, self.settings.query_excerpt_chars);
        let prompt = query_generation_prompt(postmark, &excerpt, self.settings.query_count);
        let request = InferenceRequest::text(NAVIGATOR_SYSTEM_PROMPT, prompt, QUERIES_SCHEMA);

        let content = self
            .infer(request)
            .await
            .map_err(|detail| StageError::QueryGeneration { detail })?;
        let list: QueryList = parse_structured(&content)
            .map_err(|detail| StageError::QueryGeneration { detail })?;

        let queries = tidy_queries(list.into_vec(), self.settings.query_count);
        if queries.is_empty() {
            return Err(StageError::QueryGeneration {
                detail: "model returned no usable queries".to_string(),
            });
        }
        debug!("Generated queries: {:?}", queries);
        Ok(queries)
    }

    /// One concurrent search per query; slots align with `queries`.
    async fn execute_search(&self, queries: &[String]) -> Vec<(String, Vec<SearchHit>)> {
        let search = &self.search;
        let timeout = self.settings.search_timeout;

        let outcomes = scatter_gather(queries, queries.len(), |query| async move {
            let outcome = match tokio::time::timeout(timeout, search.search(query)).await {
                Ok(result) => result,
                Err(_) => Err(CapabilityError::Timeout {
                    secs: timeout.as_secs(),
                }),
            };
            (query, outcome)
        })
        .await;

        outcomes
            .into_iter()
            .map(|(query, outcome)| {
                let hits = match outcome {
                    Ok(hits) => hits,
                    Err(e) => {
                        self.degrade(&StageError::SearchQuery {
                            query: query.clone(),
                            detail: e.to_string(),
                        });
                        Vec::new()
                    }
                };
                (query.clone(), hits)
            })
            .collect()
    }

    async fn resolve(
        &self,
        postmark: &Postmark,
        transcript: &str,
        results: &[(String, Vec<SearchHit>)],
    ) -> Result<Option<String>, StageError> {
        let excerpt = excerpt(transcript, self.settings.resolve_excerpt_chars);
        let prompt = resolution_prompt(postmark, &excerpt, results);
        let request = InferenceRequest::text(NAVIGATOR_SYSTEM_PROMPT, prompt, RESOLUTION_SCHEMA);

        let content = self
            .infer(request)
            .await
            .map_err(|detail| StageError::Resolution { detail })?;
        let decision: UrlDecision =
            parse_structured(&content).map_err(|detail| StageError::Resolution { detail })?;

        Ok(decision.url.as_deref().and_then(web_url))
    }

    async fn infer(&self, request: InferenceRequest) -> Result<String, String> {
        let timeout = self.settings.inference_timeout;
        match tokio::time::timeout(timeout, self.inference.infer(request)).await {
            Ok(Ok(response)) => Ok(response.content),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("timed out after {}s", timeout.as_secs())),
        }
    }

    fn degrade(&self, error: &StageError) {
        warn!("{}", error);
        self.progress
            .on_stage_degraded(error.stage(), &error.to_string());
    }
}

/// First `max_chars` characters of `text`.
fn excerpt(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Trim, drop blanks and duplicates, keep at most `limit`.
fn tidy_queries(raw: Vec<String>, limit: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty() && seen.insert(q.clone()))
        .take(limit)
        .collect()
}

/// `candidate` if it is an absolute http(s) URL with a host.
fn web_url(candidate: &str) -> Option<String> {
    let trimmed = candidate.trim();
    match reqwest::Url::parse(trimmed) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host_str().is_some() => {
            Some(trimmed.to_string())
        }
        _ => {
            debug!("Discarding non-URL resolution answer: {:?}", candidate);
            None
        }
    }
}
