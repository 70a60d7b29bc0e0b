use axum::{
    Json,
    extract::{Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::{Stream, StreamExt};
use serde_json::json;
use std::convert::Infallible;
use tracing::{info, warn};

use crate::db::NewConversation;
use crate::middleware::chat_request::ChatPreprocess;
use crate::service::workflow::{Intent, WorkflowState};
use crate::types::api::{
    ConversationEntry, ConversationHistoryResponse, HistoryQuery, NewSessionResponse,
    QueryResponse,
};
use crate::{LiveAgentError, router::LiveAgentState};

/// POST /api/chat -> runs the workflow and records the turn.
pub async fn chat_handler(
    State(state): State<LiveAgentState>,
    ChatPreprocess(req): ChatPreprocess,
) -> Result<Json<QueryResponse>, LiveAgentError> {
    let result = state.workflow.run(&req.query, &req.session_id).await?;
    let response = result.response.clone();
    state
        .storage
        .insert_conversation(conversation_record(&result, response.clone()))
        .await?;

    Ok(Json(QueryResponse {
        response,
        intent: result.intent.map(|i| i.to_string()),
        context_used: result.context_used(),
        session_id: req.session_id,
    }))
}

/// POST /api/chat/stream -> same workflow, generation streamed as SSE.
///
/// Events: `intent` once, `delta` per text fragment, then `done` or `error`.
/// `error` carries the same body as an HTTP error response.
/// The turn is recorded only when the stream completes.
pub async fn chat_stream_handler(
    State(state): State<LiveAgentState>,
    ChatPreprocess(req): ChatPreprocess,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, LiveAgentError> {
    let prepared = state.workflow.prepare(&req.query, &req.session_id).await?;
    let mut deltas = state.workflow.generate_stream(&prepared).await?;
    let storage = state.storage.clone();

    let stream = async_stream::stream! {
        let intent = prepared.intent.unwrap_or(Intent::Rag);
        let head = json!({ "intent": intent, "context_used": prepared.context_used() });
        yield Ok::<_, Infallible>(Event::default().event("intent").data(head.to_string()));

        let mut full_response = String::new();
        let mut had_error = false;
        while let Some(delta) = deltas.next().await {
            match delta {
                Ok(text) => {
                    full_response.push_str(&text);
                    let data = json!({ "text": text });
                    yield Ok(Event::default().event("delta").data(data.to_string()));
                }
                Err(e) => {
                    warn!(session_id = %prepared.session_id, error = %e, "chat stream failed");
                    let (_, body) = e.api_error();
                    let data = serde_json::to_string(&body).unwrap_or_default();
                    yield Ok(Event::default().event("error").data(data));
                    had_error = true;
                    break;
                }
            }
        }

        if !had_error {
            if let Err(e) = storage
                .insert_conversation(conversation_record(&prepared, full_response))
                .await
            {
                warn!(session_id = %prepared.session_id, error = %e, "failed to record streamed turn");
            }
            yield Ok(Event::default().event("done").data("{}"));
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// GET /api/history/{session_id}?limit=N -> chronological turns of a session.
pub async fn history_handler(
    State(state): State<LiveAgentState>,
    Path(session_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<ConversationHistoryResponse>, LiveAgentError> {
    let limit = query
        .limit
        .filter(|l| *l > 0)
        .unwrap_or(state.config.history_limit);
    let conversations: Vec<ConversationEntry> = state
        .storage
        .history(&session_id, limit)
        .await?
        .into_iter()
        .map(ConversationEntry::from)
        .collect();
    Ok(Json(ConversationHistoryResponse {
        session_id,
        count: conversations.len(),
        conversations,
    }))
}

/// POST /api/session/new
pub async fn new_session_handler() -> Json<NewSessionResponse> {
    let session_id = uuid::Uuid::new_v4().to_string();
    info!(session_id = %session_id, "new chat session");
    Json(NewSessionResponse { session_id })
}

fn conversation_record(state: &WorkflowState, response: String) -> NewConversation {
    NewConversation {
        session_id: state.session_id.clone(),
        user_message: state.query.clone(),
        assistant_message: response,
        intent: state.intent.map(|i| i.to_string()),
        retrieval_context: json!({ "docs": state.context_docs }),
    }
}
