//! `UserFactsBuilder` — runs the Memory Service search this runtime's agent
//! loop consults before acting (spec's memory-first step: up to 5 items,
//! injected as context/observation) and formats the results as a compact
//! Markdown string suitable for injection into the system prompt.
//!
//! Gracefully degrades: if MemoryService is unreachable or returns errors,
//! the builder returns an empty string rather than propagating the failure.

use art_domain::trace::TraceEvent;
use tracing::warn;

use crate::provider::MemoryProvider;
use crate::types::SearchRequest;

const MAX_RESULTS_PER_QUERY: u32 = 5;

/// Builds the `USER_FACTS` section injected into the context pack.
pub struct UserFactsBuilder<'a> {
    provider: &'a dyn MemoryProvider,
    user_id: String,
    max_chars: usize,
    search_queries: Vec<String>,
}

impl<'a> UserFactsBuilder<'a> {
    /// Create a new builder.
    ///
    /// * `provider`       — any implementation of `MemoryProvider`
    /// * `user_id`        — user identifier the search is scoped to
    /// * `max_chars`      — hard cap on the resulting string length
    pub fn new(
        provider: &'a dyn MemoryProvider,
        user_id: impl Into<String>,
        max_chars: usize,
    ) -> Self {
        Self {
            provider,
            user_id: user_id.into(),
            max_chars,
            search_queries: Vec::new(),
        }
    }

    /// Add a contextual search query used to retrieve relevant memories.
    /// With no queries added, `build` falls back to the user's most recent
    /// memories (empty-query search).
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.search_queries.push(query.into());
        self
    }

    /// Add multiple contextual search queries.
    pub fn with_queries(mut self, queries: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.search_queries.extend(queries.into_iter().map(|q| q.into()));
        self
    }

    /// Fetch matching memories and assemble the USER_FACTS string.
    ///
    /// Never fails — returns an empty string on error.
    pub async fn build(&self) -> String {
        let queries: Vec<Option<String>> = if self.search_queries.is_empty() {
            vec![None]
        } else {
            self.search_queries.iter().cloned().map(Some).collect()
        };

        let mut retrieved_facts = Vec::new();
        let mut search_count: usize = 0;

        for query in &queries {
            match self
                .provider
                .search(SearchRequest {
                    user_id: self.user_id.clone(),
                    query: query.clone(),
                    limit: Some(MAX_RESULTS_PER_QUERY),
                })
                .await
            {
                Ok(resp) => {
                    search_count += resp.results.len();
                    for result in resp.results {
                        let content = result.content.trim().to_owned();
                        if !content.is_empty() {
                            retrieved_facts.push(content);
                        }
                    }
                }
                Err(e) => {
                    warn!(
                        user_id = %self.user_id,
                        query = ?query,
                        error = %e,
                        "MemoryService search failed while building user facts"
                    );
                }
            }
        }

        let mut sections: Vec<(&str, String)> = Vec::new();
        if !retrieved_facts.is_empty() {
            // De-duplicate (stable order)
            let mut seen = std::collections::HashSet::new();
            let mut unique = Vec::new();
            for fact in &retrieved_facts {
                if seen.insert(fact.clone()) {
                    unique.push(fact.clone());
                }
            }
            let body = unique
                .iter()
                .map(|f| format!("- {f}"))
                .collect::<Vec<_>>()
                .join("\n");
            sections.push(("Retrieved Memories", body));
        }

        let assembled = self.assemble_markdown(&sections);

        TraceEvent::UserFactsFetched {
            user_id: self.user_id.clone(),
            facts_chars: assembled.len(),
            pinned_count: 0,
            search_count,
        }
        .emit();

        assembled
    }

    // ── internal helpers ─────────────────────────────────────────────

    /// Assemble titled sections into final markdown, respecting `max_chars`.
    fn assemble_markdown(&self, sections: &[(&str, String)]) -> String {
        if sections.is_empty() {
            return String::new();
        }

        let mut output = String::new();

        for (heading, body) in sections {
            let section_block = format!("### {heading}\n{body}\n\n");

            if output.len() + section_block.len() > self.max_chars {
                // Try to fit a partial section
                let remaining = self.max_chars.saturating_sub(output.len());
                if remaining > 30 {
                    // Enough room for at least a heading + truncation marker
                    let truncated = &section_block[..section_block
                        .char_indices()
                        .take_while(|(i, _)| *i < remaining.saturating_sub(25))
                        .last()
                        .map(|(i, c)| i + c.len_utf8())
                        .unwrap_or(0)];
                    output.push_str(truncated);
                    output.push_str("\n[USER_FACTS_TRUNCATED]\n");
                } else {
                    output.push_str("[USER_FACTS_TRUNCATED]\n");
                }
                return output;
            }

            output.push_str(&section_block);
        }

        // Final length check (defensive)
        if output.len() > self.max_chars {
            let cut = output
                .char_indices()
                .take_while(|(i, _)| *i < self.max_chars.saturating_sub(25))
                .last()
                .map(|(i, c)| i + c.len_utf8())
                .unwrap_or(0);
            output.truncate(cut);
            output.push_str("\n[USER_FACTS_TRUNCATED]\n");
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MemoryProvider;
    use crate::types::*;
    use async_trait::async_trait;

    struct StubProvider {
        results: Vec<SearchResult>,
    }

    #[async_trait]
    impl MemoryProvider for StubProvider {
        async fn health(&self) -> art_domain::error::Result<HealthResponse> {
            unimplemented!()
        }
        async fn add(&self, _req: AddMemoryRequest) -> art_domain::error::Result<AddMemoryResponse> {
            unimplemented!()
        }
        async fn search(&self, _req: SearchRequest) -> art_domain::error::Result<SearchResponse> {
            Ok(SearchResponse {
                results: self.results.clone(),
            })
        }
        async fn list_user_memories(
            &self,
            _user_id: &str,
            _limit: Option<u32>,
        ) -> art_domain::error::Result<Vec<MemoryRecord>> {
            unimplemented!()
        }
        async fn list_session_memories(
            &self,
            _session_id: &str,
        ) -> art_domain::error::Result<Vec<MemoryRecord>> {
            unimplemented!()
        }
        async fn delete_memory(&self, _id: &str) -> art_domain::error::Result<()> {
            unimplemented!()
        }
        async fn reset(&self, _req: ResetRequest) -> art_domain::error::Result<()> {
            unimplemented!()
        }
        async fn stats(&self) -> art_domain::error::Result<StatsResponse> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn build_formats_retrieved_memories_as_bullets() {
        let provider = StubProvider {
            results: vec![SearchResult {
                id: "m1".into(),
                content: "likes dark mode".into(),
                metadata: serde_json::Value::Null,
                score: 0.9,
                created_at: 0,
            }],
        };
        let builder = UserFactsBuilder::new(&provider, "u1", 4096).with_query("editor preferences");
        let out = builder.build().await;
        assert!(out.contains("Retrieved Memories"));
        assert!(out.contains("likes dark mode"));
    }

    #[tokio::test]
    async fn build_is_empty_when_no_results() {
        let provider = StubProvider { results: Vec::new() };
        let builder = UserFactsBuilder::new(&provider, "u1", 4096);
        assert_eq!(builder.build().await, "");
    }
}
