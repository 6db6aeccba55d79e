//! `art-memory` — MemoryService client crate for AgentRuntime.
//!
//! Provides the [`MemoryProvider`] trait over the MemoryService wire
//! contract (`/health`, `/add`, `/search`, per-user/session listing,
//! `/reset`, `/stats`), a REST implementation against a standalone
//! service ([`RestMemoryServiceClient`]), a self-hosted implementation
//! backed directly by this runtime's KV store ([`KvMemoryProvider`]), and
//! a [`UserFactsBuilder`] that assembles the memory-consult context
//! section the agent loop injects before acting.
//!
//! # Transport selection
//!
//! Use [`create_provider`] to build the right implementation based on
//! the `memory_service.transport` config field:
//!
//! | Transport | Implementation            | Best for                              |
//! |-----------|----------------------------|----------------------------------------|
//! | `rest`    | `RestMemoryServiceClient`  | A standalone MemoryService deployment |
//! | `kv`      | `KvMemoryProvider`         | No standalone service; embed/dedup/score in-process |
//!
//! # Quick start
//!
//! ```rust,no_run
//! use art_domain::config::MemoryConfig;
//! use art_memory::{RestMemoryServiceClient, MemoryProvider, SearchRequest};
//!
//! # async fn example() -> art_domain::error::Result<()> {
//! let cfg = MemoryConfig::default();
//! let client = RestMemoryServiceClient::new(&cfg)?;
//!
//! let results = client
//!     .search(SearchRequest {
//!         user_id: "default_user".into(),
//!         query: Some("user's favourite language".into()),
//!         limit: Some(5),
//!     })
//!     .await?;
//!
//! println!("found {} memories", results.results.len());
//! # Ok(())
//! # }
//! ```

pub mod kv_memory;
pub mod provider;
pub mod rest;
pub mod types;
pub mod user_facts;

// ── Re-exports for ergonomic imports ─────────────────────────────────

pub use kv_memory::KvMemoryProvider;
pub use provider::MemoryProvider;
pub use rest::{from_reqwest, RestMemoryServiceClient};
pub use types::{
    AddMemoryRequest, AddMemoryResponse, HealthResponse, MemoryRecord, ResetRequest,
    SearchRequest, SearchResponse, SearchResult, StatsResponse,
};
pub use user_facts::UserFactsBuilder;

use std::sync::Arc;

use art_domain::config::{MemoryConfig, SmTransport};
use art_domain::error::Result;
use art_kv::KvClient;

/// Create the appropriate [`MemoryProvider`] based on the transport
/// config.
///
/// | `transport` | Result                                            |
/// |-------------|----------------------------------------------------|
/// | `rest`      | [`RestMemoryServiceClient`]                        |
/// | `kv`        | [`KvMemoryProvider`] over the shared `kv` client   |
pub fn create_provider(cfg: &MemoryConfig, kv: Arc<KvClient>) -> Result<Arc<dyn MemoryProvider>> {
    match cfg.transport {
        SmTransport::Rest => {
            let client = RestMemoryServiceClient::new(cfg)?;
            Ok(Arc::new(client))
        }
        SmTransport::Kv => {
            tracing::info!("using KV-backed MemoryProvider (no standalone MemoryService)");
            Ok(Arc::new(KvMemoryProvider::new(kv, cfg)))
        }
    }
}
