use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A stored document chunk with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DbDocument {
    pub id: i64,
    pub content: String,
    pub metadata: Value,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDocument {
    pub content: String,
    pub metadata: Value,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DbConversation {
    pub id: i64,
    pub session_id: String,
    pub user_message: String,
    pub assistant_message: String,
    pub intent: Option<String>,
    pub retrieval_context: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewConversation {
    pub session_id: String,
    pub user_message: String,
    pub assistant_message: String,
    pub intent: Option<String>,
    pub retrieval_context: Value,
}

/// Cached HeyGen video metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DbAvatarVideo {
    pub id: i64,
    pub video_id: String,
    pub video_url: Option<String>,
    pub status: String,
    pub duration: Option<f64>,
    pub query_context: Option<String>,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}
