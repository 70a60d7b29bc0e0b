use axum::{Json, body::Bytes, extract::State};

use crate::types::api::{AckResponse, AvatarCommandRequest, AvatarSessionInfo, AvatarSessionRequest};
use crate::{LiveAgentError, router::LiveAgentState};

/// POST /api/simli/session -> new LiveKit room session; the agent worker is
/// dispatched in the background.
pub async fn create_session_handler(
    State(state): State<LiveAgentState>,
    body: Bytes,
) -> Result<Json<AvatarSessionInfo>, LiveAgentError> {
    let AvatarSessionRequest {
        room_name,
        instructions,
    } = parse_optional_body(&body)?;

    let info = state.avatars.create(room_name, instructions).await?;
    state
        .avatars
        .dispatch_agent(info.room_name.clone(), info.instructions.clone());
    Ok(Json(info))
}

/// POST /api/simli/speak
pub async fn speak_handler(
    State(state): State<LiveAgentState>,
    Json(req): Json<AvatarCommandRequest>,
) -> Result<Json<AckResponse>, LiveAgentError> {
    let (Some(session_id), Some(text)) = (non_empty(req.session_id), non_empty(req.text)) else {
        return Err(LiveAgentError::BadRequest(
            "session_id and text are required".into(),
        ));
    };
    let ack = state.avatars.speak(session_id, text).await?;
    Ok(Json(ack))
}

/// POST /api/simli/stop
pub async fn stop_handler(
    State(state): State<LiveAgentState>,
    Json(req): Json<AvatarCommandRequest>,
) -> Result<Json<AckResponse>, LiveAgentError> {
    let Some(session_id) = non_empty(req.session_id) else {
        return Err(LiveAgentError::BadRequest("session_id is required".into()));
    };
    state.avatars.stop(session_id).await?;
    Ok(Json(AckResponse {
        success: true,
        message: "Session stopped".to_string(),
    }))
}

/// Empty body and `null` both mean "use defaults".
fn parse_optional_body(body: &[u8]) -> Result<AvatarSessionRequest, LiveAgentError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(AvatarSessionRequest::default());
    }
    let parsed: Option<AvatarSessionRequest> = serde_json::from_slice(body)
        .map_err(|e| LiveAgentError::BadRequest(format!("invalid session request: {e}")))?;
    Ok(parsed.unwrap_or_default())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
