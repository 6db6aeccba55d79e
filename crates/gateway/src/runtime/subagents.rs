//! Sub-agent Registry (C9): CRUD over sub-agent records in the KV store.
//!
//! Storage layout: one hash per sub-agent at `core:subagent:{id}`; an index
//! recorded as a JSON array under `core:subagent:index` (the KV client only
//! exposes the operations listed in the key-value contract — GET/SET/HSET/
//! HGETALL/DEL — so the index is a read-modify-write JSON value rather than
//! a native set).

use std::sync::Arc;

use art_domain::config::{AgentLimits, MemoryMode, ToolPolicy};
use art_domain::error::{Error, Result};
use art_kv::KvClient;
use serde::{Deserialize, Serialize};

const ID_PATTERN_MAX_LEN: usize = 64;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubAgentRecord {
    pub id: String,
    pub purpose: String,
    pub tools: Vec<String>,
    #[serde(default)]
    pub tool_policy: ToolPolicy,
    #[serde(default)]
    pub limits: AgentLimits,
    #[serde(default)]
    pub memory_mode: MemoryMode,
    pub status: SubAgentStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubAgentStatus {
    Active,
    Disabled,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubAgentSummary {
    pub id: String,
    pub status: SubAgentStatus,
    pub purpose: String,
}

pub struct SubAgentRegistry {
    kv: Arc<KvClient>,
}

fn valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= ID_PATTERN_MAX_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

impl SubAgentRegistry {
    pub fn new(kv: Arc<KvClient>) -> Self {
        Self { kv }
    }

    fn record_key(id: &str) -> String {
        format!("core:subagent:{id}")
    }

    const INDEX_KEY: &'static str = "core:subagent:index";

    async fn read_index(&self) -> Result<Vec<String>> {
        match self.kv.get(Self::INDEX_KEY).await? {
            Some(raw) => Ok(serde_json::from_str(&raw).unwrap_or_default()),
            None => Ok(Vec::new()),
        }
    }

    async fn write_index(&self, ids: &[String]) -> Result<()> {
        let raw = serde_json::to_string(ids)?;
        self.kv.set(Self::INDEX_KEY, &raw, None).await
    }

    /// Validate `id` matches `[a-z0-9-]{1,64}` and that `tools` is a subset
    /// of `registered_tools`, then persist the record.
    pub async fn create(
        &self,
        record: SubAgentRecord,
        registered_tools: &[String],
    ) -> Result<SubAgentRecord> {
        if !valid_id(&record.id) {
            return Err(Error::InvalidArguments(format!(
                "sub-agent id \"{}\" must match [a-z0-9-]{{1,64}}",
                record.id
            )));
        }
        let unknown: Vec<&String> = record
            .tools
            .iter()
            .filter(|t| !registered_tools.contains(t))
            .collect();
        if !unknown.is_empty() {
            return Err(Error::InvalidArguments(format!(
                "unknown tools in sub-agent \"{}\": {:?}",
                record.id, unknown
            )));
        }

        let key = Self::record_key(&record.id);
        let json = serde_json::to_string(&record)?;
        self.kv.hset(&key, "record", &json).await?;

        let mut index = self.read_index().await?;
        if !index.contains(&record.id) {
            index.push(record.id.clone());
            self.write_index(&index).await?;
        }
        Ok(record)
    }

    pub async fn get(&self, id: &str) -> Result<Option<SubAgentRecord>> {
        let key = Self::record_key(id);
        match self.kv.hget(&key, "record").await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn list(&self) -> Result<Vec<SubAgentSummary>> {
        let index = self.read_index().await?;
        let mut out = Vec::with_capacity(index.len());
        for id in index {
            if let Some(record) = self.get(&id).await? {
                out.push(SubAgentSummary {
                    id: record.id,
                    status: record.status,
                    purpose: record.purpose,
                });
            }
        }
        Ok(out)
    }

    /// Remove the sub-agent and any attached schedules (caller passes a
    /// callback since schedule storage lives in a separate store).
    pub async fn delete<F, Fut>(&self, id: &str, remove_schedules: F) -> Result<bool>
    where
        F: FnOnce(String) -> Fut,
        Fut: std::future::Future<Output = Result<()>>,
    {
        let key = Self::record_key(id);
        let existed = self.get(id).await?.is_some();
        if !existed {
            return Ok(false);
        }
        self.kv.del(&key).await?;
        let mut index = self.read_index().await?;
        index.retain(|existing| existing != id);
        self.write_index(&index).await?;
        remove_schedules(id.to_string()).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_id_accepts_lowercase_alnum_dash() {
        assert!(valid_id("research-bot-1"));
        assert!(!valid_id("Research"));
        assert!(!valid_id(""));
        assert!(!valid_id(&"a".repeat(65)));
    }
}
