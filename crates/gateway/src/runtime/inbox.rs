//! Inbox Dispatcher (C11): blocking pop from the external task list,
//! routed to a matching skill or the main Agent Loop.
//!
//! `core:inbox` is a single sorted set of JSON-encoded [`InboxTask`]s.
//! Producers `ZADD` with [`inbox_score`] as the score; the dispatcher
//! `BZPOPMIN`s it, so priority 1 always comes out before priority 2, and
//! priority 2 before 3, with FIFO order preserved within a priority via
//! the timestamp packed into the score's fractional part.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::state::AppState;

use super::agent::AgentContext;
use super::turn::{run_turn, TurnEvent, TurnInput};

const ANSWER_TTL_MS: u64 = 3_600_000;

const INBOX_KEY: &str = "core:inbox";

/// Score for a sorted-set priority queue: the integer part is the
/// priority (lower sorts first), the fractional part is the timestamp
/// scaled down far enough that it never carries into the next priority
/// band but still orders same-priority entries by arrival.
fn inbox_score(priority: u8, created_at: chrono::DateTime<Utc>) -> f64 {
    priority as f64 + (created_at.timestamp_millis().max(0) as f64) / 1e15
}

/// Where a task entered the system from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskSource {
    Mcp,
    Chat,
    Schedule,
    Ws,
    Api,
}

/// An inbound task popped from `core:inbox`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboxTask {
    pub id: Uuid,
    pub message: String,
    #[serde(default)]
    pub params: HashMap<String, Value>,
    pub source: TaskSource,
    pub request_id: String,
    #[serde(default = "default_priority")]
    pub priority: u8,
    #[serde(default = "Utc::now")]
    pub created_at: chrono::DateTime<Utc>,
}

fn default_priority() -> u8 {
    2
}

/// Blocking-pop loop plus one handler task per popped message.
pub struct InboxDispatcher {
    state: AppState,
}

impl InboxDispatcher {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Runs forever: blocks on `core:inbox` and always wakes with the
    /// lowest-priority-number (i.e. most urgent) entry currently queued.
    /// Never returns; intended to be spawned as its own task.
    pub async fn run(self) {
        loop {
            if let Some(raw) = self.pop_any().await {
                let task: InboxTask = match serde_json::from_str(&raw) {
                    Ok(t) => t,
                    Err(e) => {
                        tracing::warn!(error = %e, raw, "dropping unparseable inbox entry");
                        continue;
                    }
                };
                let state = self.state.clone();
                tokio::spawn(async move {
                    handle_task(state, task).await;
                });
            }
        }
    }

    async fn pop_any(&self) -> Option<String> {
        match self.state.kv.bzpopmin(INBOX_KEY, 2.0).await {
            Ok(item) => item,
            Err(e) => {
                tracing::warn!(error = %e, "inbox poll failed");
                tokio::time::sleep(Duration::from_millis(500)).await;
                None
            }
        }
    }
}

/// Push a task onto the inbox sorted set, scored for strict priority
/// ordering. Exposed so producers in-process (e.g. the schedule runner,
/// the chat/WS/API entry points) can enqueue through the same contract
/// external producers use.
pub async fn enqueue(state: &AppState, task: &InboxTask) -> art_domain::error::Result<()> {
    let payload = serde_json::to_string(task)?;
    state.kv.zadd(INBOX_KEY, &payload, inbox_score(task.priority, task.created_at)).await
}

async fn handle_task(state: AppState, task: InboxTask) {
    tracing::info!(
        task_id = %task.id,
        request_id = %task.request_id,
        priority = task.priority,
        source = ?task.source,
        "dispatching inbox task"
    );

    let skill = resolve_skill(&state, &task);
    let answer = match skill {
        Some(skill) => run_skill(&state, &task, &skill).await,
        None => run_main_loop(&state, &task).await,
    };

    write_answer(&state, &task, &answer).await;
}

/// `params.skill` takes precedence over trigger matching.
fn resolve_skill(state: &AppState, task: &InboxTask) -> Option<art_skills::types::SkillEntry> {
    if let Some(Value::String(name)) = task.params.get("skill") {
        if let Some(entry) = state.skills.find_by_name(name) {
            return Some(entry);
        }
        tracing::warn!(skill = %name, "params.skill named an unknown or unready skill, falling back to triggers");
    }
    state.skills.find_by_trigger(&task.message)
}

async fn run_skill(state: &AppState, task: &InboxTask, skill: &art_skills::types::SkillEntry) -> String {
    let doc = state.skills.read_doc(&skill.name).unwrap_or_default();
    let user_message = if doc.is_empty() {
        task.message.clone()
    } else {
        format!("{doc}\n\n---\n\n{}", task.message)
    };

    let tool_policy = art_domain::config::ToolPolicy {
        allow: skill.tools.clone(),
        deny: Vec::new(),
    };
    let agent = AgentContext {
        agent_id: format!("skill:{}", skill.name),
        workspace: Arc::new(crate::workspace::files::WorkspaceReader::new(
            state.config.workspace.path.clone(),
        )),
        skills: state.skills.clone(),
        tool_policy,
        models: HashMap::new(),
        cancel_group: None,
        depth: 0,
        max_depth: art_domain::config::AgentLimits::default().max_depth,
        compaction_enabled: state.config.compaction.auto,
    };

    run_turn_and_collect(state, task, user_message, Some(agent)).await
}

async fn run_main_loop(state: &AppState, task: &InboxTask) -> String {
    run_turn_and_collect(state, task, task.message.clone(), None).await
}

async fn run_turn_and_collect(
    state: &AppState,
    task: &InboxTask,
    user_message: String,
    agent: Option<AgentContext>,
) -> String {
    let session_key = format!("inbox:{}", task.request_id);
    let session_id = format!("inbox-{}-{}", task.id, Utc::now().format("%Y%m%d%H%M%S"));

    let input = TurnInput {
        session_key,
        session_id,
        user_message,
        model: None,
        response_format: None,
        agent,
    };

    let (_run_id, mut rx) = run_turn(state.clone(), input);

    let mut answer = String::new();
    while let Some(event) = rx.recv().await {
        match event {
            TurnEvent::Final { content } | TurnEvent::Stopped { content } => {
                answer = content;
            }
            TurnEvent::Error { message } => {
                answer = format!("error: {message}");
            }
            _ => {}
        }
    }
    answer
}

async fn write_answer(state: &AppState, task: &InboxTask, answer: &str) {
    let key = format!("core:answer:{}", task.request_id);
    if let Err(e) = state.kv.set(&key, answer, Some(ANSWER_TTL_MS)).await {
        tracing::warn!(error = %e, request_id = %task.request_id, "failed to write inbox answer");
    }
    state
        .notify
        .publish(
            "inbox",
            "inbox.answered",
            serde_json::json!({ "requestId": task.request_id, "taskId": task.id }),
        )
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbox_score_orders_by_priority_first() {
        let t = Utc::now();
        assert!(inbox_score(1, t) < inbox_score(2, t));
        assert!(inbox_score(2, t) < inbox_score(3, t));
    }

    #[test]
    fn inbox_score_breaks_ties_by_arrival_within_priority() {
        let earlier = Utc::now();
        let later = earlier + chrono::Duration::seconds(5);
        assert!(inbox_score(2, earlier) < inbox_score(2, later));
        // A later arrival at the same priority never crosses into the next band.
        assert!(inbox_score(2, later) < inbox_score(3, earlier));
    }

    #[test]
    fn inbox_task_deserializes_with_defaults() {
        let raw = r#"{"id":"4b1f6e2a-5b2b-4a3e-9f0a-000000000000","message":"hello","source":"chat","requestId":"req-1"}"#;
        let task: InboxTask = serde_json::from_str(raw).unwrap();
        assert_eq!(task.priority, 2);
        assert_eq!(task.source, TaskSource::Chat);
        assert!(task.params.is_empty());
    }

    #[test]
    fn inbox_task_respects_explicit_priority_and_params() {
        let raw = r#"{
            "id":"4b1f6e2a-5b2b-4a3e-9f0a-000000000001",
            "message":"run backup",
            "params":{"skill":"backup-runner"},
            "source":"schedule",
            "requestId":"req-2",
            "priority":1
        }"#;
        let task: InboxTask = serde_json::from_str(raw).unwrap();
        assert_eq!(task.priority, 1);
        assert_eq!(
            task.params.get("skill").and_then(|v| v.as_str()),
            Some("backup-runner")
        );
    }
}
