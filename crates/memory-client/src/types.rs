//! Wire DTOs for the MemoryService HTTP contract:
//! `GET /health`, `POST /add`, `POST /search`, `GET /memories/:userId`,
//! `GET /sessions/:sessionId/memories`, `DELETE /memories/:id`,
//! `POST /reset`, `GET /stats`.

use serde::{Deserialize, Serialize};

/// A stored memory item. Shared by the REST client's parsed responses and
/// the KV-backed provider's on-disk representation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(rename = "sessionId", default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
    #[serde(rename = "updatedAt")]
    pub updated_at: i64,
}

/// `POST /add` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddMemoryRequest {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    #[serde(rename = "sessionId", default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// `POST /add` response body. `deduplicated` is set when the content
/// merged into an existing memory (cosine similarity over threshold)
/// instead of creating a new one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddMemoryResponse {
    pub success: bool,
    pub id: String,
    #[serde(default)]
    pub deduplicated: bool,
}

/// `POST /search` request body. An empty/absent `query` returns the most
/// recent `limit` memories for the user instead of ranking by relevance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
}

/// One ranked result from `POST /search`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub score: f64,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
}

/// `POST /reset` request body. Omitting `userId` resets every user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResetRequest {
    #[serde(rename = "userId", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// `GET /health` response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub db: Option<String>,
}

/// `GET /stats` response body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatsResponse {
    #[serde(rename = "memoryCount", default)]
    pub memory_count: u64,
    #[serde(rename = "userCount", default)]
    pub user_count: u64,
    #[serde(rename = "sessionCount", default)]
    pub session_count: u64,
    #[serde(rename = "dbSizeBytes", default)]
    pub db_size_bytes: u64,
}
