use crate::db::models::DbConversation;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of `/api/chat` and `/api/chat/stream`.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub response: String,
    pub intent: Option<String>,
    pub context_used: bool,
    pub session_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentIngestRequest {
    pub texts: Vec<String>,
    /// Absent and `null` both mean "no metadata".
    #[serde(default)]
    pub metadatas: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentIngestResponse {
    pub success: bool,
    pub document_ids: Vec<i64>,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct HistoryQuery {
    #[serde(default)]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub id: i64,
    pub user_message: String,
    pub assistant_message: String,
    pub intent: Option<String>,
    pub created_at: String,
}

impl From<DbConversation> for ConversationEntry {
    fn from(c: DbConversation) -> Self {
        Self {
            id: c.id,
            user_message: c.user_message,
            assistant_message: c.assistant_message,
            intent: c.intent,
            created_at: c.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationHistoryResponse {
    pub session_id: String,
    pub conversations: Vec<ConversationEntry>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSessionResponse {
    pub session_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AvatarSessionRequest {
    #[serde(default)]
    pub room_name: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
}

/// Shared body for `/api/simli/speak` and `/api/simli/stop`; presence is
/// checked by the handler so missing fields produce a 400 with a message.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AvatarCommandRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvatarSessionInfo {
    pub success: bool,
    pub room_name: String,
    pub room_url: String,
    pub access_token: String,
    pub session_id: String,
    pub instructions: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingTokenResponse {
    pub success: bool,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoStatusResponse {
    pub video_id: String,
    pub status: String,
    pub video_url: Option<String>,
    pub duration: Option<f64>,
    pub metadata: Option<Value>,
}
