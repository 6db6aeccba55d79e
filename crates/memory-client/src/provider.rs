//! The `MemoryProvider` trait defines the interface every MemoryService
//! backend implements against the spec's wire contract (REST against a
//! standalone service, or a self-hosted KV-backed implementation).

use async_trait::async_trait;
use art_domain::error::Result;

use crate::types::{
    AddMemoryRequest, AddMemoryResponse, HealthResponse, MemoryRecord, ResetRequest,
    SearchRequest, SearchResponse, StatsResponse,
};

/// Abstraction over the MemoryService API surface. All methods return
/// `art_domain::error::Result`; implementations degrade to empty
/// results/no-ops on transient backend errors rather than propagating,
/// per the runtime's storage-unavailable failure semantics.
#[async_trait]
pub trait MemoryProvider: Send + Sync {
    /// `GET /health`.
    async fn health(&self) -> Result<HealthResponse>;

    /// `POST /add`. Embeds `content`, and if cosine similarity against any
    /// of the user's last 50 memories exceeds the dedup threshold, merges
    /// into that memory in place instead of inserting a new one.
    async fn add(&self, req: AddMemoryRequest) -> Result<AddMemoryResponse>;

    /// `POST /search`. Empty/absent query returns the most recent `limit`
    /// memories; otherwise ranks by `0.7 * cosine + 0.3 * recency_decay`.
    async fn search(&self, req: SearchRequest) -> Result<SearchResponse>;

    /// `GET /memories/:userId` — most recent memories for a user.
    async fn list_user_memories(&self, user_id: &str, limit: Option<u32>) -> Result<Vec<MemoryRecord>>;

    /// `GET /sessions/:sessionId/memories` — memories linked to a session.
    async fn list_session_memories(&self, session_id: &str) -> Result<Vec<MemoryRecord>>;

    /// `DELETE /memories/:id` — delete a memory and its session links.
    async fn delete_memory(&self, id: &str) -> Result<()>;

    /// `POST /reset` — scoped (by user) or global reset.
    async fn reset(&self, req: ResetRequest) -> Result<()>;

    /// `GET /stats`.
    async fn stats(&self) -> Result<StatsResponse>;
}
