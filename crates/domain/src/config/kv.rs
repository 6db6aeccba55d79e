use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// KV / pub-sub store connection
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Connection settings for the KV & pub/sub backing store (C3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KvConfig {
    #[serde(default = "d_kv_url")]
    pub url: String,
    /// Connection timeout before the circuit breaker records a failure.
    #[serde(default = "d_2000")]
    pub connect_timeout_ms: u64,
    /// Backoff profile name used for reconnect attempts (`storage` by default).
    #[serde(default = "d_storage")]
    pub backoff_profile: String,
}

impl Default for KvConfig {
    fn default() -> Self {
        Self {
            url: d_kv_url(),
            connect_timeout_ms: 2000,
            backoff_profile: d_storage(),
        }
    }
}

fn d_kv_url() -> String {
    "redis://127.0.0.1:6379".into()
}
fn d_2000() -> u64 {
    2000
}
fn d_storage() -> String {
    "storage".into()
}
