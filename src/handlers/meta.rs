use axum::{Json, extract::State};
use serde_json::{Value, json};

use crate::{LiveAgentError, router::LiveAgentState};

pub async fn root_handler() -> Json<Value> {
    Json(json!({
        "message": "Live Agent API",
        "status": "running",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Liveness plus a storage round trip and the actor's session count.
pub async fn health_handler(
    State(state): State<LiveAgentState>,
) -> Result<Json<Value>, LiveAgentError> {
    let documents = state.storage.count_documents().await?;
    let avatar_sessions = state.avatars.active_count().await?;
    Ok(Json(json!({
        "status": "healthy",
        "documents": documents,
        "avatar_sessions": avatar_sessions,
    })))
}
