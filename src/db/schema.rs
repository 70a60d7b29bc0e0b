//! SQL DDL for the agent's storage.

/// SQLite schema with:
/// - `documents`: chunk text, JSON metadata and the embedding as a JSON float array
/// - `conversations`: one row per chat turn, indexed by `session_id`
/// - `avatar_videos`: cached HeyGen video status, `video_id` UNIQUE
///
/// Timestamps are RFC3339 text written by the application.
pub const SQLITE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    content TEXT NOT NULL,
    metadata TEXT NOT NULL DEFAULT '{}',
    embedding TEXT NOT NULL, -- JSON array of f32
    created_at TEXT NOT NULL,
    updated_at TEXT NULL
);

CREATE TABLE IF NOT EXISTS conversations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    user_message TEXT NOT NULL,
    assistant_message TEXT NOT NULL,
    intent TEXT NULL,
    retrieval_context TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_conversations_session_id ON conversations(session_id);

CREATE TABLE IF NOT EXISTS avatar_videos (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    video_id TEXT NOT NULL UNIQUE,
    video_url TEXT NULL,
    status TEXT NOT NULL, -- pending, processing, completed, failed
    duration REAL NULL,
    query_context TEXT NULL,
    metadata TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL,
    updated_at TEXT NULL
);
"#;
