use axum::{Json, extract::State};

use crate::types::api::{DocumentIngestRequest, DocumentIngestResponse};
use crate::{LiveAgentError, router::LiveAgentState};

/// POST /api/ingest -> chunk, embed and store documents.
pub async fn ingest_handler(
    State(state): State<LiveAgentState>,
    Json(req): Json<DocumentIngestRequest>,
) -> Result<Json<DocumentIngestResponse>, LiveAgentError> {
    let document_ids = state
        .workflow
        .rag()
        .ingest(&req.texts, req.metadatas.unwrap_or_default())
        .await?;
    Ok(Json(DocumentIngestResponse {
        success: true,
        message: format!("Successfully ingested {} documents", document_ids.len()),
        document_ids,
    }))
}
