use axum::{
    Json,
    extract::{Path, State},
};

use crate::types::api::{StreamingTokenResponse, VideoStatusResponse};
use crate::{LiveAgentError, router::LiveAgentState};

/// POST /api/heygen/streaming-token
pub async fn streaming_token_handler(
    State(state): State<LiveAgentState>,
) -> Result<Json<StreamingTokenResponse>, LiveAgentError> {
    let token = state.heygen.streaming_token().await?;
    Ok(Json(StreamingTokenResponse {
        success: true,
        token,
    }))
}

/// GET /api/heygen/video/{video_id}
pub async fn video_status_handler(
    State(state): State<LiveAgentState>,
    Path(video_id): Path<String>,
) -> Result<Json<VideoStatusResponse>, LiveAgentError> {
    Ok(Json(state.heygen.video_status(&video_id).await?))
}
