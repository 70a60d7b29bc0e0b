//! Retrieval over stored document chunks.
//!
//! Ingestion splits texts into overlapping chunks, embeds them in one batch and
//! stores them with their vectors. Retrieval embeds the query and ranks every
//! stored chunk by cosine similarity in process.

use crate::config::Config;
use crate::db::{AgentStorage, NewDocument};
use crate::error::LiveAgentError;
use crate::service::llm::{ChatModel, Embedder, TextStream};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use text_splitter::{Characters, ChunkConfig, TextSplitter};
use tracing::{debug, info};

/// A chunk returned by [`RagService::retrieve`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedDoc {
    pub id: i64,
    pub content: String,
    pub metadata: Value,
    pub similarity: f32,
}

pub struct RagService {
    storage: AgentStorage,
    embedder: Arc<dyn Embedder>,
    chat: Arc<dyn ChatModel>,
    splitter: TextSplitter<Characters>,
    top_k: usize,
}

impl RagService {
    pub fn new(
        cfg: &Config,
        storage: AgentStorage,
        embedder: Arc<dyn Embedder>,
        chat: Arc<dyn ChatModel>,
    ) -> Result<Self, LiveAgentError> {
        let chunk_config = ChunkConfig::new(cfg.chunk_size)
            .with_overlap(cfg.chunk_overlap)
            .map_err(|e| LiveAgentError::Config(e.to_string()))?;
        Ok(Self {
            storage,
            embedder,
            chat,
            splitter: TextSplitter::new(chunk_config),
            top_k: cfg.retrieval_top_k,
        })
    }

    pub fn storage(&self) -> &AgentStorage {
        &self.storage
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.splitter
            .chunks(text)
            .filter(|c| !c.trim().is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Split, embed and store `texts`. Missing metadata entries default to `{}`.
    pub async fn ingest(
        &self,
        texts: &[String],
        metadatas: Vec<Value>,
    ) -> Result<Vec<i64>, LiveAgentError> {
        if texts.is_empty() {
            return Err(LiveAgentError::BadRequest("texts must not be empty".into()));
        }
        let mut metadatas = metadatas.into_iter();

        let mut chunks = Vec::new();
        for text in texts {
            let metadata = metadatas
                .next()
                .filter(|m| !m.is_null())
                .unwrap_or_else(|| Value::Object(Map::new()));
            for chunk in self.split_text(text) {
                chunks.push((chunk, metadata.clone()));
            }
        }
        if chunks.is_empty() {
            return Err(LiveAgentError::BadRequest(
                "texts contain no ingestible content".into(),
            ));
        }

        let contents: Vec<String> = chunks.iter().map(|(c, _)| c.clone()).collect();
        let embeddings = self.embedder.embed_documents(&contents).await?;

        let docs = chunks
            .into_iter()
            .zip(embeddings)
            .map(|((content, metadata), embedding)| NewDocument {
                content,
                metadata,
                embedding,
            })
            .collect();
        let ids = self.storage.insert_documents(docs).await?;
        info!(texts = texts.len(), chunks = ids.len(), "documents ingested");
        Ok(ids)
    }

    /// Top `top_k` chunks (configured default when `None`) by cosine similarity.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: Option<usize>,
    ) -> Result<Vec<RetrievedDoc>, LiveAgentError> {
        let top_k = top_k.unwrap_or(self.top_k);
        let query_vec = self.embedder.embed_query(query).await?;
        let docs = self.storage.all_documents().await?;

        let mut scored: Vec<RetrievedDoc> = docs
            .into_iter()
            .map(|d| RetrievedDoc {
                similarity: cosine_similarity(&query_vec, &d.embedding),
                id: d.id,
                content: d.content,
                metadata: d.metadata,
            })
            .collect();
        scored.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        scored.truncate(top_k);
        debug!(returned = scored.len(), top_k, "retrieval finished");
        Ok(scored)
    }

    pub async fn generate(
        &self,
        query: &str,
        docs: &[RetrievedDoc],
    ) -> Result<String, LiveAgentError> {
        self.chat.complete(&context_prompt(query, docs)).await
    }

    pub async fn generate_stream(
        &self,
        query: &str,
        docs: &[RetrievedDoc],
    ) -> Result<TextStream, LiveAgentError> {
        self.chat.stream(&context_prompt(query, docs)).await
    }
}

/// Cosine similarity; 0 for mismatched dimensions or zero-norm vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let (mut dot, mut na, mut nb) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}

pub fn context_prompt(query: &str, docs: &[RetrievedDoc]) -> String {
    let context = docs
        .iter()
        .map(|d| d.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    format!(
        "You are a helpful AI assistant. Answer the user's question based on the provided context.\n\
         If the context doesn't contain relevant information, use your general knowledge but mention that.\n\
         \n\
         Context:\n\
         {context}\n\
         \n\
         User Question: {query}\n\
         \n\
         Answer:"
    )
}
