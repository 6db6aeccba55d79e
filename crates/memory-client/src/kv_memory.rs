//! KV-backed implementation of [`MemoryProvider`].
//!
//! Used when no standalone MemoryService is deployed: memories are
//! persisted directly through [`art_kv::KvClient`] and the dedup/search
//! scoring the spec assigns to the MemoryService run in-process here
//! instead of over HTTP.
//!
//! Storage layout (all under the `memory:` namespace, distinct from the
//! core runtime's `core:*` keys):
//!
//! * `memory:record:{id}`        — JSON-encoded [`MemoryRecord`]
//! * `memory:user:{userId}`      — JSON array of memory ids, most-recent-first
//! * `memory:session:{sessionId}` — JSON array of memory ids
//! * `memory:users`              — JSON array of every user id seen
//! * `memory:sessions`           — JSON array of every session id seen
//!
//! Per the runtime's storage-unavailable failure semantics, read failures
//! degrade to empty results rather than propagating errors; writes still
//! surface errors (the underlying `KvClient` buffers and replays them on
//! reconnect).

use std::sync::Arc;

use async_trait::async_trait;
use art_domain::config::MemoryConfig;
use art_domain::error::Result;
use art_kv::KvClient;
use uuid::Uuid;

use crate::provider::MemoryProvider;
use crate::types::{
    AddMemoryRequest, AddMemoryResponse, HealthResponse, MemoryRecord, ResetRequest,
    SearchRequest, SearchResponse, SearchResult, StatsResponse,
};

const EMBED_DIMS: usize = 128;

/// Deterministic bag-of-words embedding: hashes each lowercased token into
/// one of `EMBED_DIMS` buckets and L2-normalizes the result. Good enough
/// for near-duplicate detection and lexical-overlap ranking without an
/// external embedding provider.
fn embed(text: &str) -> Vec<f32> {
    let mut v = vec![0f32; EMBED_DIMS];
    for token in text.to_lowercase().split_whitespace() {
        let mut hash: u64 = 0xcbf29ce484222325;
        for b in token.bytes() {
            hash ^= b as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }
        let bucket = (hash as usize) % EMBED_DIMS;
        let sign = if (hash >> 63) & 1 == 0 { 1.0 } else { -1.0 };
        v[bucket] += sign;
    }
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
    v
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// `0.5^(ageDays / halfLife)`.
fn decay(age_days: f64, half_life_days: f64) -> f64 {
    if half_life_days <= 0.0 {
        return 0.0;
    }
    0.5f64.powf(age_days / half_life_days)
}

pub struct KvMemoryProvider {
    kv: Arc<KvClient>,
    dedup_threshold: f32,
    decay_half_life_days: f64,
    dedup_scan_limit: usize,
}

impl KvMemoryProvider {
    pub fn new(kv: Arc<KvClient>, cfg: &MemoryConfig) -> Self {
        Self {
            kv,
            dedup_threshold: cfg.dedup_cosine_threshold,
            decay_half_life_days: cfg.decay_half_life_days,
            dedup_scan_limit: cfg.dedup_scan_limit,
        }
    }

    fn record_key(id: &str) -> String {
        format!("memory:record:{id}")
    }
    fn user_index_key(user_id: &str) -> String {
        format!("memory:user:{user_id}")
    }
    fn session_index_key(session_id: &str) -> String {
        format!("memory:session:{session_id}")
    }

    /// Read a JSON-array-of-ids index, degrading to empty on storage
    /// errors or missing/corrupt data.
    async fn read_index(&self, key: &str) -> Vec<String> {
        match self.kv.get(key).await {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_default(),
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(key, error = %e, "memory index read failed, treating as empty");
                Vec::new()
            }
        }
    }

    async fn write_index(&self, key: &str, ids: &[String]) -> Result<()> {
        let raw = serde_json::to_string(ids)?;
        self.kv.set(key, &raw, None).await
    }

    async fn read_record(&self, id: &str) -> Option<MemoryRecord> {
        match self.kv.get(&Self::record_key(id)).await {
            Ok(Some(raw)) => serde_json::from_str(&raw).ok(),
            _ => None,
        }
    }

    async fn write_record(&self, record: &MemoryRecord) -> Result<()> {
        let raw = serde_json::to_string(record)?;
        self.kv.set(&Self::record_key(&record.id), &raw, None).await
    }

    async fn track_global(&self, index_key: &str, id: &str) {
        let mut ids = self.read_index(index_key).await;
        if !ids.iter().any(|x| x == id) {
            ids.push(id.to_owned());
            let _ = self.write_index(index_key, &ids).await;
        }
    }

    async fn load_user_records(&self, user_id: &str, limit: Option<usize>) -> Vec<MemoryRecord> {
        let ids = self.read_index(&Self::user_index_key(user_id)).await;
        let take = limit.unwrap_or(ids.len());
        let mut out = Vec::with_capacity(take.min(ids.len()));
        for id in ids.iter().take(take) {
            if let Some(r) = self.read_record(id).await {
                out.push(r);
            }
        }
        out
    }
}

#[async_trait]
impl MemoryProvider for KvMemoryProvider {
    async fn health(&self) -> Result<HealthResponse> {
        // A single roundtrip against a well-known key doubles as a
        // connectivity probe; the breaker inside `KvClient` short-circuits
        // this quickly when storage is down.
        match self.kv.get("memory:users").await {
            Ok(_) => Ok(HealthResponse {
                status: "ok".into(),
                version: Some(env!("CARGO_PKG_VERSION").into()),
                db: Some("kv".into()),
            }),
            Err(e) => Ok(HealthResponse {
                status: format!("degraded: {e}"),
                version: Some(env!("CARGO_PKG_VERSION").into()),
                db: Some("kv".into()),
            }),
        }
    }

    async fn add(&self, req: AddMemoryRequest) -> Result<AddMemoryResponse> {
        let now = chrono::Utc::now().timestamp_millis();
        let embedding = embed(&req.content);

        let scan = self
            .load_user_records(&req.user_id, Some(self.dedup_scan_limit))
            .await;

        let dedup_target = scan.iter().find(|r| {
            r.embedding
                .as_ref()
                .map(|e| cosine(e, &embedding) >= self.dedup_threshold)
                .unwrap_or(false)
        });

        if let Some(existing) = dedup_target {
            let merged_content = format!("{}\n{}", existing.content, req.content);
            let merged_embedding = embed(&merged_content);
            let merged = MemoryRecord {
                id: existing.id.clone(),
                user_id: existing.user_id.clone(),
                content: merged_content,
                embedding: Some(merged_embedding),
                metadata: req.metadata.unwrap_or_else(|| existing.metadata.clone()),
                session_id: req.session_id.or_else(|| existing.session_id.clone()),
                created_at: existing.created_at,
                updated_at: now,
            };
            self.write_record(&merged).await?;
            return Ok(AddMemoryResponse {
                success: true,
                id: merged.id,
                deduplicated: true,
            });
        }

        let id = Uuid::new_v4().to_string();
        let record = MemoryRecord {
            id: id.clone(),
            user_id: req.user_id.clone(),
            content: req.content,
            embedding: Some(embedding),
            metadata: req.metadata.unwrap_or(serde_json::Value::Null),
            session_id: req.session_id.clone(),
            created_at: now,
            updated_at: now,
        };
        self.write_record(&record).await?;

        let user_key = Self::user_index_key(&req.user_id);
        let mut ids = self.read_index(&user_key).await;
        ids.insert(0, id.clone());
        self.write_index(&user_key, &ids).await?;
        self.track_global("memory:users", &req.user_id).await;

        if let Some(ref session_id) = req.session_id {
            let session_key = Self::session_index_key(session_id);
            let mut sids = self.read_index(&session_key).await;
            sids.insert(0, id.clone());
            self.write_index(&session_key, &sids).await?;
            self.track_global("memory:sessions", session_id).await;
        }

        Ok(AddMemoryResponse {
            success: true,
            id,
            deduplicated: false,
        })
    }

    async fn search(&self, req: SearchRequest) -> Result<SearchResponse> {
        let limit = req.limit.unwrap_or(10) as usize;
        let records = self.load_user_records(&req.user_id, None).await;
        let now = chrono::Utc::now().timestamp_millis();

        let mut scored: Vec<(f64, MemoryRecord)> = match req.query.as_deref() {
            None | Some("") => records
                .into_iter()
                .map(|r| {
                    let age_days = (now - r.created_at) as f64 / 86_400_000.0;
                    (decay(age_days, self.decay_half_life_days), r)
                })
                .collect(),
            Some(query) => {
                let q_embedding = embed(query);
                records
                    .into_iter()
                    .map(|r| {
                        let age_days = (now - r.created_at) as f64 / 86_400_000.0;
                        let d = decay(age_days, self.decay_half_life_days);
                        let sim = r
                            .embedding
                            .as_ref()
                            .map(|e| cosine(e, &q_embedding) as f64)
                            .unwrap_or(0.0);
                        (0.7 * sim + 0.3 * d, r)
                    })
                    .collect()
            }
        };

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        let results = scored
            .into_iter()
            .map(|(score, r)| SearchResult {
                id: r.id,
                content: r.content,
                metadata: r.metadata,
                score,
                created_at: r.created_at,
            })
            .collect();

        Ok(SearchResponse { results })
    }

    async fn list_user_memories(
        &self,
        user_id: &str,
        limit: Option<u32>,
    ) -> Result<Vec<MemoryRecord>> {
        Ok(self
            .load_user_records(user_id, Some(limit.unwrap_or(50) as usize))
            .await)
    }

    async fn list_session_memories(&self, session_id: &str) -> Result<Vec<MemoryRecord>> {
        let ids = self.read_index(&Self::session_index_key(session_id)).await;
        let mut out = Vec::with_capacity(ids.len());
        for id in &ids {
            if let Some(r) = self.read_record(id).await {
                out.push(r);
            }
        }
        Ok(out)
    }

    async fn delete_memory(&self, id: &str) -> Result<()> {
        let Some(record) = self.read_record(id).await else {
            return Ok(());
        };

        let user_key = Self::user_index_key(&record.user_id);
        let mut ids = self.read_index(&user_key).await;
        ids.retain(|x| x != id);
        self.write_index(&user_key, &ids).await?;

        if let Some(ref session_id) = record.session_id {
            let session_key = Self::session_index_key(session_id);
            let mut sids = self.read_index(&session_key).await;
            sids.retain(|x| x != id);
            self.write_index(&session_key, &sids).await?;
        }

        self.kv.del(&Self::record_key(id)).await
    }

    async fn reset(&self, req: ResetRequest) -> Result<()> {
        let scoped = req.user_id.is_some();
        let user_ids = match req.user_id {
            Some(user_id) => vec![user_id],
            None => self.read_index("memory:users").await,
        };

        for user_id in &user_ids {
            let user_key = Self::user_index_key(user_id);
            let ids = self.read_index(&user_key).await;
            for id in &ids {
                let _ = self.kv.del(&Self::record_key(id)).await;
            }
            self.kv.del(&user_key).await?;
        }

        if scoped {
            let mut remaining = self.read_index("memory:users").await;
            remaining.retain(|u| !user_ids.contains(u));
            self.write_index("memory:users", &remaining).await?;
        } else {
            self.kv.del("memory:users").await?;
            self.kv.del("memory:sessions").await?;
        }

        Ok(())
    }

    async fn stats(&self) -> Result<StatsResponse> {
        let user_ids = self.read_index("memory:users").await;
        let session_ids = self.read_index("memory:sessions").await;

        let mut memory_count: u64 = 0;
        for user_id in &user_ids {
            memory_count += self.read_index(&Self::user_index_key(user_id)).await.len() as u64;
        }

        Ok(StatsResponse {
            memory_count,
            user_count: user_ids.len() as u64,
            session_count: session_ids.len() as u64,
            // Not measurable through the KV client's key-value surface.
            db_size_bytes: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embed_is_deterministic_and_normalized() {
        let a = embed("the quick brown fox");
        let b = embed("the quick brown fox");
        assert_eq!(a, b);
        let norm = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4 || norm == 0.0);
    }

    #[test]
    fn near_duplicate_text_scores_above_dedup_threshold() {
        let a = embed("the user prefers dark mode in the editor");
        let b = embed("the user prefers dark mode in the editor UI");
        assert!(cosine(&a, &b) > 0.8);
    }

    #[test]
    fn unrelated_text_scores_low() {
        let a = embed("favorite programming language is rust");
        let b = embed("weather forecast for tomorrow is rain");
        assert!(cosine(&a, &b) < 0.5);
    }

    #[test]
    fn decay_halves_at_half_life() {
        assert!((decay(30.0, 30.0) - 0.5).abs() < 1e-9);
        assert!((decay(0.0, 30.0) - 1.0).abs() < 1e-9);
    }
}
