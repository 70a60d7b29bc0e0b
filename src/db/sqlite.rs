use crate::db::models::{DbAvatarVideo, DbConversation, DbDocument, NewConversation, NewDocument};
use crate::db::schema::SQLITE_INIT;
use crate::error::LiveAgentError;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use std::str::FromStr;
use tracing::info;

pub type SqlitePool = Pool<Sqlite>;

#[derive(Clone)]
pub struct AgentStorage {
    pool: SqlitePool,
}

impl AgentStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if missing) the database at `database_url` and apply the schema.
    pub async fn connect(database_url: &str) -> Result<Self, LiveAgentError> {
        let connect_opts = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_opts)
            .await?;
        let storage = Self::new(pool);
        storage.init_schema().await?;
        info!(database_url, "storage initialized");
        Ok(storage)
    }

    /// Initialize the schema by executing the bundled DDL.
    pub async fn init_schema(&self) -> Result<(), LiveAgentError> {
        // sqlx::query runs one statement at a time
        for stmt in SQLITE_INIT.split(';') {
            let s = stmt.trim();
            if s.is_empty() {
                continue;
            }
            sqlx::query(s).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Insert chunks in a single transaction. Returns ids in input order.
    pub async fn insert_documents(&self, docs: Vec<NewDocument>) -> Result<Vec<i64>, LiveAgentError> {
        let mut tx = self.pool.begin().await?;
        let mut ids = Vec::with_capacity(docs.len());
        let now = Utc::now().to_rfc3339();

        for doc in docs {
            let metadata = serde_json::to_string(&doc.metadata)?;
            let embedding = serde_json::to_string(&doc.embedding)?;
            let id = sqlx::query(
                r#"INSERT INTO documents (content, metadata, embedding, created_at)
                   VALUES (?, ?, ?, ?)"#,
            )
            .bind(doc.content)
            .bind(metadata)
            .bind(embedding)
            .bind(&now)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();
            ids.push(id);
        }

        tx.commit().await?;
        Ok(ids)
    }

    pub async fn all_documents(&self) -> Result<Vec<DbDocument>, LiveAgentError> {
        let rows = sqlx::query(
            r#"SELECT id, content, metadata, embedding, created_at
               FROM documents ORDER BY id"#,
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::row_to_document).collect()
    }

    pub async fn count_documents(&self) -> Result<i64, LiveAgentError> {
        let rec: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await?;
        Ok(rec.0)
    }

    pub async fn insert_conversation(&self, conv: NewConversation) -> Result<i64, LiveAgentError> {
        let retrieval_context = serde_json::to_string(&conv.retrieval_context)?;
        let id = sqlx::query(
            r#"INSERT INTO conversations (
                session_id, user_message, assistant_message, intent,
                retrieval_context, created_at
            ) VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(conv.session_id)
        .bind(conv.user_message)
        .bind(conv.assistant_message)
        .bind(conv.intent)
        .bind(retrieval_context)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?
        .last_insert_rowid();
        Ok(id)
    }

    /// Newest `limit` turns of a session, returned oldest first.
    pub async fn history(
        &self,
        session_id: &str,
        limit: u32,
    ) -> Result<Vec<DbConversation>, LiveAgentError> {
        let rows = sqlx::query(
            r#"SELECT id, session_id, user_message, assistant_message, intent,
               retrieval_context, created_at
               FROM conversations WHERE session_id = ?
               ORDER BY id DESC LIMIT ?"#,
        )
        .bind(session_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        let mut convs = rows
            .into_iter()
            .map(Self::row_to_conversation)
            .collect::<Result<Vec<_>, _>>()?;
        convs.reverse();
        Ok(convs)
    }

    /// Upsert by unique video_id. Returns the row id.
    pub async fn upsert_video(
        &self,
        video_id: &str,
        status: &str,
        video_url: Option<&str>,
        duration: Option<f64>,
        metadata: &Value,
    ) -> Result<i64, LiveAgentError> {
        let now = Utc::now().to_rfc3339();
        let metadata = serde_json::to_string(metadata)?;
        sqlx::query(
            r#"
            INSERT INTO avatar_videos (
                video_id, video_url, status, duration, metadata, created_at
            ) VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(video_id) DO UPDATE SET
                video_url=excluded.video_url,
                status=excluded.status,
                duration=excluded.duration,
                metadata=excluded.metadata,
                updated_at=excluded.created_at
            "#,
        )
        .bind(video_id)
        .bind(video_url)
        .bind(status)
        .bind(duration)
        .bind(metadata)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let rec: (i64,) = sqlx::query_as("SELECT id FROM avatar_videos WHERE video_id = ?")
            .bind(video_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(rec.0)
    }

    pub async fn get_video(&self, video_id: &str) -> Result<Option<DbAvatarVideo>, LiveAgentError> {
        let row = sqlx::query(
            r#"SELECT id, video_id, video_url, status, duration, query_context,
               metadata, created_at, updated_at
               FROM avatar_videos WHERE video_id = ?"#,
        )
        .bind(video_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_video).transpose()
    }

    fn row_to_document(row: SqliteRow) -> Result<DbDocument, LiveAgentError> {
        let metadata: String = row.try_get("metadata")?;
        let embedding: String = row.try_get("embedding")?;
        let created_at: String = row.try_get("created_at")?;
        Ok(DbDocument {
            id: row.try_get("id")?,
            content: row.try_get("content")?,
            metadata: decode_json(&metadata)?,
            embedding: decode_json(&embedding)?,
            created_at: parse_ts(&created_at)?,
        })
    }

    fn row_to_conversation(row: SqliteRow) -> Result<DbConversation, LiveAgentError> {
        let retrieval_context: String = row.try_get("retrieval_context")?;
        let created_at: String = row.try_get("created_at")?;
        Ok(DbConversation {
            id: row.try_get("id")?,
            session_id: row.try_get("session_id")?,
            user_message: row.try_get("user_message")?,
            assistant_message: row.try_get("assistant_message")?,
            intent: row.try_get("intent")?,
            retrieval_context: decode_json(&retrieval_context)?,
            created_at: parse_ts(&created_at)?,
        })
    }

    fn row_to_video(row: SqliteRow) -> Result<DbAvatarVideo, LiveAgentError> {
        let metadata: String = row.try_get("metadata")?;
        let created_at: String = row.try_get("created_at")?;
        let updated_at: Option<String> = row.try_get("updated_at")?;
        Ok(DbAvatarVideo {
            id: row.try_get("id")?,
            video_id: row.try_get("video_id")?,
            video_url: row.try_get("video_url")?,
            status: row.try_get("status")?,
            duration: row.try_get("duration")?,
            query_context: row.try_get("query_context")?,
            metadata: decode_json(&metadata)?,
            created_at: parse_ts(&created_at)?,
            updated_at: updated_at.as_deref().map(parse_ts).transpose()?,
        })
    }
}

fn decode_json<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T, LiveAgentError> {
    serde_json::from_str(raw).map_err(|e| sqlx::Error::Decode(Box::new(e)).into())
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>, LiveAgentError> {
    let ts = DateTime::parse_from_rfc3339(raw)
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))?
        .with_timezone(&Utc);
    Ok(ts)
}
