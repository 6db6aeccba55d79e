//! Tool registry for the runtime — builds tool definitions for the LLM and
//! dispatches tool calls to local handlers, connected nodes, or stubs.

use serde_json::Value;

use art_domain::config::{ApprovalPolicy, ToolPolicy};
use art_domain::tool::ToolDefinition;
use art_tools::exec::{self, ExecRequest};
use art_tools::process::{self, ProcessRequest};

use super::agent::AgentContext;
use super::approval::{ApprovalDecision, PendingApproval};
use super::tool_guard;
use crate::nodes::router::{LocalTool, ToolDestination};
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool definitions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Build the set of tool definitions exposed to the LLM.
///
/// When `tool_policy` is `Some`, definitions are filtered through it so that
/// sub-agents only see tools their config permits.
pub fn build_tool_definitions(
    state: &AppState,
    tool_policy: Option<&ToolPolicy>,
) -> Vec<ToolDefinition> {
    let mut defs = Vec::new();

    // ── Built-in local tools ──────────────────────────────────────
    defs.push(ToolDefinition::new(
        "exec",
        "Run a shell command. Returns output or a background session ID.",
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": { "type": "string", "description": "Shell command to execute" },
                "background": { "type": "boolean", "description": "Run in background" },
                "workdir": { "type": "string", "description": "Working directory" },
                "timeout_sec": { "type": "integer", "description": "Hard timeout in seconds" }
            },
            "required": ["command"]
        }),
    ).requiring_approval());

    defs.push(ToolDefinition::new(
        "process",
        "Manage background processes: list, poll, log, write, kill, remove.",
        serde_json::json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["list", "poll", "log", "write", "kill", "clear", "remove"],
                    "description": "Action to perform"
                },
                "session_id": { "type": "string", "description": "Process session ID" },
                "data": { "type": "string", "description": "Data to write to stdin" }
            },
            "required": ["action"]
        }),
    ));

    // ── Skill tools ───────────────────────────────────────────────
    defs.push(ToolDefinition::new(
        "skill.read_doc",
        "Read the full documentation (SKILL.md) for a skill.",
        serde_json::json!({
            "type": "object",
            "properties": {
                "name": { "type": "string", "description": "Skill name (e.g. 'apple-notes')" }
            },
            "required": ["name"]
        }),
    ));

    defs.push(ToolDefinition::new(
        "skill.read_resource",
        "Read a bundled resource from a skill (references/, scripts/, assets/).",
        serde_json::json!({
            "type": "object",
            "properties": {
                "name": { "type": "string", "description": "Skill name" },
                "path": { "type": "string", "description": "Resource path (e.g. 'references/api.md')" }
            },
            "required": ["name", "path"]
        }),
    ));

    // ── MemoryService tools ────────────────────────────────────────
    defs.push(ToolDefinition::new(
        "memory.search",
        "Search long-term memory for relevant facts, notes, and session history.",
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Search query" },
                "limit": { "type": "integer", "description": "Max results (default 10)" }
            },
            "required": ["query"]
        }),
    ));

    defs.push(ToolDefinition::new(
        "memory.add",
        "Store a fact or note in long-term memory.",
        serde_json::json!({
            "type": "object",
            "properties": {
                "content": { "type": "string", "description": "Content to store" }
            },
            "required": ["content"]
        }),
    ));

    // ── Stub tools (common aliases that aren't wired yet) ─────────
    defs.push(ToolDefinition::new(
        "web.search",
        "Search the web (SERP). Currently unavailable — returns an error with alternatives.",
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Search query" }
            },
            "required": ["query"]
        }),
    ));

    defs.push(ToolDefinition::new(
        "http.request",
        "Make an HTTP request. Currently unavailable — returns an error with alternatives.",
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": { "type": "string", "description": "URL to fetch" },
                "method": { "type": "string", "description": "HTTP method (GET, POST, etc.)" }
            },
            "required": ["url"]
        }),
    ));

    // ── Agent delegation tools ──────────────────────────────────────
    // Only expose these if agents are configured.
    if let Some(ref agents) = state.agents {
        if !agents.is_empty() {
            defs.push(ToolDefinition::new(
                "agent.run",
                "Delegate a task to a specialist sub-agent. The sub-agent runs in its own session with scoped tools and skills. Returns the agent's final answer.",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "agent_id": { "type": "string", "description": "ID of the agent to run (from agent.list)" },
                        "task": { "type": "string", "description": "The task or question to give the agent" },
                        "model": { "type": "string", "description": "Optional model override (e.g. 'openai/gpt-4o')" }
                    },
                    "required": ["agent_id", "task"]
                }),
            ));

            defs.push(ToolDefinition::new(
                "agent.list",
                "List all available sub-agents and their capabilities.",
                serde_json::json!({
                    "type": "object",
                    "properties": {}
                }),
            ));
        }
    }

    // ── Node-advertised tools ─────────────────────────────────────
    // Add definitions for capabilities advertised by connected nodes.
    for node_info in state.nodes.list() {
        for cap in &node_info.capabilities {
            // Don't duplicate tools we already defined.
            if defs.iter().any(|d| d.name == cap.name) {
                continue;
            }
            defs.push(ToolDefinition::new(
                cap.name.clone(),
                cap.description.clone(),
                serde_json::json!({
                    "type": "object",
                    "properties": {},
                    "additionalProperties": true
                }),
            ));
        }
    }

    // ── Apply tool policy filter ─────────────────────────────────
    if let Some(policy) = tool_policy {
        defs.retain(|d| policy.allows(&d.name));
    }

    defs
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool dispatch
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Dispatch a single tool call: enforces the caller's tool policy, validates
/// and (once) repairs arguments against the tool's JSON Schema, runs the
/// call under a per-tool timeout, and caps its output to 10 KiB.
///
/// `agent` is `Some` when the call comes from a sub-agent turn — its
/// `tool_policy` scopes which tools it may invoke; `None` callers (the
/// top-level agent, admin invoke) are unrestricted.
pub async fn dispatch_tool(
    state: &AppState,
    tool_name: &str,
    arguments: &Value,
    session_key: Option<&str>,
    agent: Option<&AgentContext>,
) -> (String, bool) {
    if let Some(ctx) = agent {
        if !ctx.tool_policy.allows(tool_name) {
            return (
                format!("tool \"{tool_name}\" is not permitted by this agent's tool policy"),
                true,
            );
        }
    }

    let defs = build_tool_definitions(state, agent.map(|a| &a.tool_policy));
    let arguments = match defs.iter().find(|d| d.name == tool_name) {
        Some(def) => match tool_guard::validate_and_repair(def, arguments) {
            Ok(repaired) => repaired,
            Err(e) => return (e.to_string(), true),
        },
        // Not one of ours (e.g. a node capability not yet advertised) —
        // dispatch with the arguments as given.
        None => arguments.clone(),
    };

    let timeout_ms = defs
        .iter()
        .find(|d| d.name == tool_name)
        .map(tool_guard::timeout_ms)
        .unwrap_or(tool_guard::DEFAULT_TOOL_TIMEOUT_MS);

    let def = defs.iter().find(|d| d.name == tool_name);
    if needs_approval(state, tool_name, def, &arguments) {
        match await_approval(state, tool_name, &arguments, session_key).await {
            Ok(()) => {}
            Err(reason) => return (reason, true),
        }
    }

    let call = dispatch_inner(state, tool_name, &arguments, session_key, agent);
    let (content, is_error) =
        match tokio::time::timeout(std::time::Duration::from_millis(timeout_ms), call).await {
            Ok(result) => result,
            Err(_) => (format!("tool \"{tool_name}\" timed out after {timeout_ms}ms"), true),
        };

    let (content, truncated) = tool_guard::cap_output(content);
    if truncated {
        tracing::debug!(tool_name, "tool output truncated to 10 KiB cap");
    }
    (content, is_error)
}

/// Whether `tool_name`/`arguments` must be approved by a human before
/// running, per the configured approval policy.
fn needs_approval(
    state: &AppState,
    tool_name: &str,
    def: Option<&ToolDefinition>,
    arguments: &Value,
) -> bool {
    match state.config.tools.exec_security.approval_policy {
        ApprovalPolicy::None => false,
        ApprovalPolicy::All => true,
        ApprovalPolicy::Destructive => {
            if def.map(|d| d.requires_approval).unwrap_or(false) {
                return true;
            }
            if tool_name == "exec" {
                let command = arguments.get("command").and_then(|v| v.as_str()).unwrap_or("");
                return state.approval_command_set.is_match(command);
            }
            false
        }
    }
}

/// How often to poll `core:approval:{correlationId}` while an approval is
/// outstanding, per spec §4.7.
const APPROVAL_POLL_INTERVAL_MS: u64 = 500;

/// KV key an approver's `approve`/`deny` answer is written to.
fn approval_key(id: &uuid::Uuid) -> String {
    format!("core:approval:{id}")
}

/// Publish an `approval_request` notification, then poll
/// `core:approval:{id}` until a human answers it or the approval store's
/// timeout elapses (deny). The KV key, not any in-process channel, is the
/// source of truth — REST handlers, a WS client, or an external operator
/// script can all resolve the request by writing it directly.
async fn await_approval(
    state: &AppState,
    tool_name: &str,
    arguments: &Value,
    session_key: Option<&str>,
) -> Result<(), String> {
    let id = uuid::Uuid::new_v4();
    let summary = format!("{tool_name} {arguments}");
    let pending = PendingApproval {
        id,
        command: summary.clone(),
        session_key: session_key.unwrap_or("anonymous").to_string(),
        created_at: chrono::Utc::now(),
    };
    state.approval_store.insert(pending);

    state
        .notify
        .publish(
            "approval",
            "approval_request",
            serde_json::json!({
                "id": id,
                "tool": tool_name,
                "arguments": arguments,
                "sessionKey": session_key,
            }),
        )
        .await;

    let timeout = state.approval_store.timeout();
    let key = approval_key(&id);
    let deadline = tokio::time::Instant::now() + timeout;

    let decision = loop {
        if let Ok(Some(raw)) = state.kv.get(&key).await {
            break Some(ApprovalDecision::parse(&raw));
        }
        if tokio::time::Instant::now() >= deadline {
            break None;
        }
        tokio::time::sleep(std::time::Duration::from_millis(APPROVAL_POLL_INTERVAL_MS)).await;
    };

    state.approval_store.remove(&id);
    let _ = state.kv.del(&key).await;

    match decision {
        Some(ApprovalDecision::Approved) => Ok(()),
        Some(ApprovalDecision::Denied { reason }) => Err(format!(
            "tool call denied by approver{}",
            reason.map(|r| format!(": {r}")).unwrap_or_default()
        )),
        None => Err(format!(
            "approval request timed out after {}s — denied",
            timeout.as_secs()
        )),
    }
}

async fn dispatch_inner(
    state: &AppState,
    tool_name: &str,
    arguments: &Value,
    session_key: Option<&str>,
    agent: Option<&AgentContext>,
) -> (String, bool) {
    // Handle our built-in tools first.
    match tool_name {
        "exec" => dispatch_exec(state, arguments).await,
        "process" => dispatch_process(state, arguments).await,
        "skill.read_doc" => dispatch_skill_read_doc(state, arguments),
        "skill.read_resource" => dispatch_skill_read_resource(state, arguments),
        "memory.search" => dispatch_memory_search(state, arguments).await,
        "memory.add" => dispatch_memory_add(state, arguments).await,
        "agent.run" => dispatch_agent_run(state, arguments, session_key, agent).await,
        "agent.list" => dispatch_agent_list(state),
        "web.search" => stub_tool("web.search", "Web search is not yet configured. Use exec with curl or a search CLI tool as an alternative."),
        "http.request" => stub_tool("http.request", "HTTP requests are not yet configured. Use exec with curl as an alternative."),
        _ => {
            // Try routing to a connected node via ToolRouter.
            dispatch_to_node(state, tool_name, arguments, session_key).await
        }
    }
}

async fn dispatch_exec(state: &AppState, arguments: &Value) -> (String, bool) {
    let req: ExecRequest = match serde_json::from_value(arguments.clone()) {
        Ok(r) => r,
        Err(e) => return (format!("invalid exec arguments: {e}"), true),
    };
    let resp = exec::exec(&state.processes, req).await;
    let json = serde_json::to_string_pretty(&resp).unwrap_or_default();
    (json, false)
}

async fn dispatch_process(state: &AppState, arguments: &Value) -> (String, bool) {
    let req: ProcessRequest = match serde_json::from_value(arguments.clone()) {
        Ok(r) => r,
        Err(e) => return (format!("invalid process arguments: {e}"), true),
    };
    let resp = process::handle_process(&state.processes, req).await;
    let json = serde_json::to_string_pretty(&resp).unwrap_or_default();
    (json, false)
}

fn dispatch_skill_read_doc(state: &AppState, arguments: &Value) -> (String, bool) {
    let name = arguments
        .get("name")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    match state.skills.read_doc(name) {
        Ok(doc) => (doc, false),
        Err(e) => (format!("skill doc error: {e}"), true),
    }
}

fn dispatch_skill_read_resource(state: &AppState, arguments: &Value) -> (String, bool) {
    let name = arguments
        .get("name")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    let path = arguments
        .get("path")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    match state.skills.read_resource(name, path) {
        Ok(content) => (content, false),
        Err(e) => (format!("resource error: {e}"), true),
    }
}

async fn dispatch_memory_search(state: &AppState, arguments: &Value) -> (String, bool) {
    let query = arguments
        .get("query")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    let limit = arguments
        .get("limit")
        .and_then(|v| v.as_u64())
        .map(|v| v as u32);

    let req = art_memory::SearchRequest {
        user_id: state.config.memory_service.default_user_id.clone(),
        query: if query.is_empty() { None } else { Some(query) },
        limit,
    };

    match state.memory.search(req).await {
        Ok(results) => {
            let json = serde_json::to_string_pretty(&results).unwrap_or_default();
            (json, false)
        }
        Err(e) => (format!("memory search error: {e}"), true),
    }
}

async fn dispatch_memory_add(state: &AppState, arguments: &Value) -> (String, bool) {
    let content = arguments
        .get("content")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    let req = art_memory::AddMemoryRequest {
        user_id: state.config.memory_service.default_user_id.clone(),
        content,
        metadata: None,
        session_id: None,
    };

    match state.memory.add(req).await {
        Ok(resp) => {
            let json = serde_json::to_string_pretty(&resp).unwrap_or_default();
            (json, false)
        }
        Err(e) => (format!("memory add error: {e}"), true),
    }
}

async fn dispatch_agent_run(
    state: &AppState,
    arguments: &Value,
    session_key: Option<&str>,
    agent: Option<&AgentContext>,
) -> (String, bool) {
    let agent_id = match arguments.get("agent_id").and_then(|v| v.as_str()) {
        Some(id) => id,
        None => return ("missing required argument: agent_id".into(), true),
    };
    let task = match arguments.get("task").and_then(|v| v.as_str()) {
        Some(t) => t,
        None => return ("missing required argument: task".into(), true),
    };
    let model = arguments
        .get("model")
        .and_then(|v| v.as_str())
        .map(String::from);

    let parent_key = session_key.unwrap_or("anonymous");
    let parent_depth = agent.map(|a| a.depth).unwrap_or(0);

    super::agent::run_agent(state, agent_id, task, model, parent_key, parent_depth).await
}

fn dispatch_agent_list(state: &AppState) -> (String, bool) {
    let manager = match &state.agents {
        Some(m) => m,
        None => {
            return (
                serde_json::json!({ "agents": [], "count": 0 }).to_string(),
                false,
            );
        }
    };

    let agents: Vec<_> = manager
        .list()
        .into_iter()
        .map(|id| {
            let runtime = manager.get(&id);
            match runtime {
                Some(r) => serde_json::json!({
                    "id": id,
                    "tools_allow": r.config.tool_policy.allow,
                    "tools_deny": r.config.tool_policy.deny,
                    "models": r.config.models,
                    "memory_mode": r.config.memory_mode,
                }),
                None => serde_json::json!({ "id": id }),
            }
        })
        .collect();

    (
        serde_json::json!({
            "agents": agents,
            "count": agents.len(),
        })
        .to_string(),
        false,
    )
}

fn stub_tool(name: &str, message: &str) -> (String, bool) {
    (
        serde_json::json!({
            "error": format!("Tool '{name}' is not available"),
            "message": message,
            "suggestion": "Use the 'exec' tool with appropriate CLI commands as a workaround."
        })
        .to_string(),
        true,
    )
}

async fn dispatch_to_node(
    state: &AppState,
    tool_name: &str,
    arguments: &Value,
    session_key: Option<&str>,
) -> (String, bool) {
    match state.tool_router.resolve(tool_name) {
        ToolDestination::Node { node_id } => {
            let result = state
                .tool_router
                .dispatch_to_node(
                    &node_id,
                    tool_name,
                    arguments.clone(),
                    session_key.map(String::from),
                )
                .await;
            if result.success {
                (result.result.to_string(), false)
            } else {
                let err_msg = result
                    .error
                    .unwrap_or_else(|| "unknown node error".into());
                (err_msg, true)
            }
        }
        ToolDestination::Local { tool_type } => {
            // Shouldn't reach here since we handle exec/process above,
            // but handle gracefully.
            match tool_type {
                LocalTool::Exec => dispatch_exec(state, arguments).await,
                LocalTool::Process => dispatch_process(state, arguments).await,
            }
        }
        ToolDestination::Unknown => (
            serde_json::json!({
                "error": format!("Unknown tool: '{tool_name}'"),
                "message": "This tool is not registered. Check available tools.",
            })
            .to_string(),
            true,
        ),
    }
}
