//! Admin/debug HTTP surface over the MemoryService client (C6).
//!
//! These routes are a thin pass-through onto [`art_memory::MemoryProvider`]
//! for operators and the dashboard — the agent loop itself talks to the
//! provider directly via [`art_memory::UserFactsBuilder`].

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Json};
use serde::Deserialize;

use art_memory::{AddMemoryRequest, ResetRequest, SearchRequest};

use crate::state::AppState;

fn bad_gateway(e: art_domain::error::Error) -> impl IntoResponse {
    (
        axum::http::StatusCode::BAD_GATEWAY,
        Json(serde_json::json!({ "error": e.to_string() })),
    )
}

#[derive(Debug, Deserialize)]
pub struct SearchBody {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
}

pub async fn search(
    State(state): State<AppState>,
    Json(body): Json<SearchBody>,
) -> impl IntoResponse {
    let req = SearchRequest {
        user_id: body.user_id.unwrap_or_else(|| state.config.memory_service.default_user_id.clone()),
        query: body.query,
        limit: body.limit,
    };

    match state.memory.search(req).await {
        Ok(resp) => Json(resp).into_response(),
        Err(e) => bad_gateway(e).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct AddBody {
    #[serde(default)]
    pub user_id: Option<String>,
    pub content: String,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub session_id: Option<String>,
}

pub async fn add(State(state): State<AppState>, Json(body): Json<AddBody>) -> impl IntoResponse {
    let req = AddMemoryRequest {
        user_id: body.user_id.unwrap_or_else(|| state.config.memory_service.default_user_id.clone()),
        content: body.content,
        metadata: body.metadata,
        session_id: body.session_id,
    };

    match state.memory.add(req).await {
        Ok(resp) => Json(resp).into_response(),
        Err(e) => bad_gateway(e).into_response(),
    }
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match state.memory.health().await {
        Ok(h) => Json(h).into_response(),
        Err(e) => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

pub async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    match state.memory.stats().await {
        Ok(s) => Json(s).into_response(),
        Err(e) => bad_gateway(e).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub limit: Option<u32>,
}

pub async fn list_user_memories(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(q): Query<ListQuery>,
) -> impl IntoResponse {
    match state.memory.list_user_memories(&user_id, q.limit).await {
        Ok(records) => Json(records).into_response(),
        Err(e) => bad_gateway(e).into_response(),
    }
}

pub async fn list_session_memories(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    match state.memory.list_session_memories(&session_id).await {
        Ok(records) => Json(records).into_response(),
        Err(e) => bad_gateway(e).into_response(),
    }
}

pub async fn delete_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.memory.delete_memory(&id).await {
        Ok(()) => Json(serde_json::json!({ "deleted": true })).into_response(),
        Err(e) => bad_gateway(e).into_response(),
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct ResetBody {
    #[serde(default)]
    pub user_id: Option<String>,
}

pub async fn reset(
    State(state): State<AppState>,
    Json(body): Json<ResetBody>,
) -> impl IntoResponse {
    let req = ResetRequest {
        user_id: body.user_id,
    };

    match state.memory.reset(req).await {
        Ok(()) => Json(serde_json::json!({ "reset": true })).into_response(),
        Err(e) => bad_gateway(e).into_response(),
    }
}
