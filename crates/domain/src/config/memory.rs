use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// MemoryService connection
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "d_sm_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "d_sm_transport")]
    pub transport: SmTransport,
    #[serde(default)]
    pub workspace_id: Option<String>,
    #[serde(default = "d_8000")]
    pub timeout_ms: u64,
    #[serde(default = "d_3")]
    pub max_retries: u32,
    #[serde(default = "d_user")]
    pub default_user_id: String,
    /// Cosine similarity above which `POST /add` merges into an existing
    /// memory instead of inserting a new one.
    #[serde(default = "d_dedup_threshold")]
    pub dedup_cosine_threshold: f32,
    /// Half-life, in days, of the recency term in search scoring
    /// (`decay = 0.5^(ageDays / half_life)`).
    #[serde(default = "d_decay_half_life")]
    pub decay_half_life_days: f64,
    /// How many of a user's most-recent memories `POST /add` scans for a
    /// dedup match. Bounded to keep add latency roughly constant.
    #[serde(default = "d_dedup_scan_limit")]
    pub dedup_scan_limit: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmTransport {
    /// Talk to a standalone MemoryService over HTTP.
    Rest,
    /// Persist memories directly in the runtime's own KV store, computing
    /// embeddings/dedup/scoring in-process. Used when no standalone
    /// MemoryService is deployed.
    Kv,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            base_url: d_sm_url(),
            api_key: None,
            transport: SmTransport::Rest,
            workspace_id: None,
            timeout_ms: 8000,
            max_retries: 3,
            default_user_id: d_user(),
            dedup_cosine_threshold: d_dedup_threshold(),
            decay_half_life_days: d_decay_half_life(),
            dedup_scan_limit: d_dedup_scan_limit(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_sm_url() -> String {
    "http://localhost:5000".into()
}
fn d_sm_transport() -> SmTransport {
    SmTransport::Rest
}
fn d_8000() -> u64 {
    8000
}
fn d_3() -> u32 {
    3
}
fn d_user() -> String {
    "default_user".into()
}
fn d_dedup_threshold() -> f32 {
    0.92
}
fn d_decay_half_life() -> f64 {
    30.0
}
fn d_dedup_scan_limit() -> usize {
    50
}
