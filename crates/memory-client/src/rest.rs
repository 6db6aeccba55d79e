//! REST implementation of [`MemoryProvider`].
//!
//! `RestMemoryServiceClient` wraps a `reqwest::Client` and translates every
//! trait method into the corresponding HTTP call against a standalone
//! MemoryService, with automatic retry + exponential back-off on
//! transient (5xx / timeout) failures.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use art_domain::config::MemoryConfig;
use art_domain::error::{Error, Result};
use art_domain::trace::TraceEvent;
use uuid::Uuid;

use crate::provider::MemoryProvider;
use crate::types::{
    AddMemoryRequest, AddMemoryResponse, HealthResponse, MemoryRecord, ResetRequest,
    SearchRequest, SearchResponse, StatsResponse,
};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A REST-based client for a standalone MemoryService.
///
/// Created once and reused for the lifetime of the agent process.
/// The underlying `reqwest::Client` maintains a connection pool.
#[derive(Debug, Clone)]
pub struct RestMemoryServiceClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    workspace_id: Option<String>,
    timeout: Duration,
    max_retries: u32,
}

impl RestMemoryServiceClient {
    /// The configured request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Build a new client from the shared `MemoryConfig`.
    pub fn new(cfg: &MemoryConfig) -> Result<Self> {
        let timeout = Duration::from_millis(cfg.timeout_ms);
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        let base_url = cfg.base_url.trim_end_matches('/').to_owned();

        Ok(Self {
            http,
            base_url,
            api_key: cfg.api_key.clone(),
            workspace_id: cfg.workspace_id.clone(),
            timeout,
            max_retries: cfg.max_retries,
        })
    }

    // ── request helpers ──────────────────────────────────────────────

    /// Decorate a `RequestBuilder` with the standard AgentRuntime headers.
    fn decorate(&self, rb: RequestBuilder) -> RequestBuilder {
        let trace_id = Uuid::new_v4().to_string();
        let mut rb = rb
            .header("X-Client-Type", "art-gateway")
            .header("X-Trace-Id", &trace_id);

        if let Some(ref key) = self.api_key {
            rb = rb.header("X-Api-Key", key);
        }
        if let Some(ref ws) = self.workspace_id {
            rb = rb.header("X-Workspace-Id", ws);
        }
        rb
    }

    /// Build the full URL for a path like `/search`.
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ── retry engine ─────────────────────────────────────────────────

    /// Execute a request with retry + exponential back-off on transient errors.
    ///
    /// * Retries on 5xx status codes and on timeouts.
    /// * Does **not** retry on 4xx (client errors are permanent).
    /// * Emits a `TraceEvent::MemoryServiceCall` after every attempt.
    async fn execute_with_retry(
        &self,
        endpoint: &str,
        build_request: impl Fn() -> RequestBuilder,
    ) -> Result<Response> {
        let mut last_err: Option<Error> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = Duration::from_millis(100 * 2u64.pow(attempt - 1));
                tokio::time::sleep(backoff).await;
            }

            let start = Instant::now();
            let rb = self.decorate(build_request());
            let result = rb.send().await;
            let duration_ms = start.elapsed().as_millis() as u64;

            match result {
                Ok(resp) => {
                    let status = resp.status().as_u16();

                    TraceEvent::MemoryServiceCall {
                        endpoint: endpoint.to_owned(),
                        status,
                        duration_ms,
                    }
                    .emit();

                    if resp.status().is_server_error() {
                        // 5xx — transient, retry
                        let body = resp.text().await.unwrap_or_default();
                        last_err = Some(Error::MemoryService(format!(
                            "{endpoint} returned {status}: {body}"
                        )));
                        continue;
                    }

                    if resp.status().is_client_error() {
                        // 4xx — permanent, do NOT retry
                        let resp_status = resp.status();
                        let body = resp.text().await.unwrap_or_default();
                        if resp_status == StatusCode::UNAUTHORIZED
                            || resp_status == StatusCode::FORBIDDEN
                        {
                            return Err(Error::Auth(format!(
                                "{endpoint} auth failed ({status}): {body}"
                            )));
                        }
                        return Err(Error::MemoryService(format!(
                            "{endpoint} returned {status}: {body}"
                        )));
                    }

                    return Ok(resp);
                }
                Err(e) => {
                    let status = e.status().map(|s| s.as_u16()).unwrap_or(0);

                    TraceEvent::MemoryServiceCall {
                        endpoint: endpoint.to_owned(),
                        status,
                        duration_ms,
                    }
                    .emit();

                    last_err = Some(from_reqwest(e));
                    // Timeouts and connection errors are transient — retry
                    continue;
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| Error::MemoryService(format!("{endpoint}: all retries exhausted"))))
    }

    async fn parse<T: serde::de::DeserializeOwned>(resp: Response, what: &str) -> Result<T> {
        let body = resp.text().await.map_err(from_reqwest)?;
        serde_json::from_str(&body)
            .map_err(|e| Error::MemoryService(format!("failed to parse {what}: {e}: {body}")))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait]
impl MemoryProvider for RestMemoryServiceClient {
    async fn health(&self) -> Result<HealthResponse> {
        let url = self.url("/health");
        let resp = self
            .execute_with_retry("GET /health", || self.http.get(&url))
            .await?;
        Self::parse(resp, "health response").await
    }

    async fn add(&self, req: AddMemoryRequest) -> Result<AddMemoryResponse> {
        let url = self.url("/add");
        let resp = self
            .execute_with_retry("POST /add", || self.http.post(&url).json(&req))
            .await?;
        Self::parse(resp, "add response").await
    }

    async fn search(&self, req: SearchRequest) -> Result<SearchResponse> {
        let url = self.url("/search");
        let resp = self
            .execute_with_retry("POST /search", || self.http.post(&url).json(&req))
            .await?;
        Self::parse(resp, "search response").await
    }

    async fn list_user_memories(
        &self,
        user_id: &str,
        limit: Option<u32>,
    ) -> Result<Vec<MemoryRecord>> {
        let url = self.url(&format!("/memories/{user_id}"));
        let resp = self
            .execute_with_retry(&format!("GET /memories/{user_id}"), || {
                let rb = self.http.get(&url);
                match limit {
                    Some(l) => rb.query(&[("limit", l)]),
                    None => rb,
                }
            })
            .await?;
        Self::parse(resp, "memories response").await
    }

    async fn list_session_memories(&self, session_id: &str) -> Result<Vec<MemoryRecord>> {
        let url = self.url(&format!("/sessions/{session_id}/memories"));
        let resp = self
            .execute_with_retry(&format!("GET /sessions/{session_id}/memories"), || {
                self.http.get(&url)
            })
            .await?;
        Self::parse(resp, "session memories response").await
    }

    async fn delete_memory(&self, id: &str) -> Result<()> {
        let url = self.url(&format!("/memories/{id}"));
        self.execute_with_retry(&format!("DELETE /memories/{id}"), || self.http.delete(&url))
            .await?;
        Ok(())
    }

    async fn reset(&self, req: ResetRequest) -> Result<()> {
        let url = self.url("/reset");
        self.execute_with_retry("POST /reset", || self.http.post(&url).json(&req))
            .await?;
        Ok(())
    }

    async fn stats(&self) -> Result<StatsResponse> {
        let url = self.url("/stats");
        let resp = self
            .execute_with_retry("GET /stats", || self.http.get(&url))
            .await?;
        Self::parse(resp, "stats response").await
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Error conversion helper
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Convert a `reqwest::Error` into a domain `Error`.
///
/// Timeout errors become `Error::Timeout`; everything else becomes
/// `Error::Http`.
pub fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}
