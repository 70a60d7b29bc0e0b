use axum::{
    Json,
    extract::{FromRequest, Request},
};

use crate::error::LiveAgentError;
use crate::types::api::QueryRequest;

/// Validated chat request: JSON parsed, `query` and `session_id` trimmed and non-empty.
pub struct ChatPreprocess(pub QueryRequest);

impl<S> FromRequest<S> for ChatPreprocess
where
    S: Send + Sync,
{
    type Rejection = LiveAgentError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        // rejection keeps its own status (413, 415, 422, ...)
        let Json(mut body) = Json::<QueryRequest>::from_request(req, state).await?;

        body.query = body.query.trim().to_string();
        body.session_id = body.session_id.trim().to_string();

        if body.query.is_empty() {
            return Err(LiveAgentError::BadRequest("query must not be empty".into()));
        }
        if body.session_id.is_empty() {
            return Err(LiveAgentError::BadRequest(
                "session_id must not be empty".into(),
            ));
        }
        Ok(ChatPreprocess(body))
    }
}
