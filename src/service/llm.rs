use crate::api::openai::OpenAiApi;
use crate::api::{default_retry_policy, endpoint};
use crate::config::Config;
use crate::error::LiveAgentError;
use crate::types::openai::{ChatCompletionRequest, ChatMessage, EmbeddingRequest};
use async_trait::async_trait;
use futures::stream::BoxStream;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Incremental text produced by a streaming completion.
pub type TextStream = BoxStream<'static, Result<String, LiveAgentError>>;

/// A single-turn text completion model.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, LiveAgentError>;

    async fn stream(&self, prompt: &str) -> Result<TextStream, LiveAgentError>;
}

/// Turns text into dense vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LiveAgentError>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, LiveAgentError> {
        let mut vectors = self.embed_documents(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| LiveAgentError::OpenAi("empty embedding response".to_string()))
    }
}

/// OpenAI-backed [`ChatModel`] and [`Embedder`], rate limited per process.
#[derive(Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
    chat_url: Url,
    embeddings_url: Url,
    model: String,
    embedding_model: String,
    temperature: f32,
    limiter: Arc<DefaultDirectRateLimiter>,
}

impl OpenAiClient {
    pub fn new(client: reqwest::Client, cfg: &Config) -> Result<Self, LiveAgentError> {
        let per_minute = NonZeroU32::new(cfg.openai_rate_limit_per_minute).ok_or_else(|| {
            LiveAgentError::Config("openai_rate_limit_per_minute must be positive".into())
        })?;
        Ok(Self {
            client,
            api_key: cfg.openai_api_key.clone(),
            chat_url: endpoint(&cfg.openai_api_base, "chat/completions")?,
            embeddings_url: endpoint(&cfg.openai_api_base, "embeddings")?,
            model: cfg.openai_model.clone(),
            embedding_model: cfg.openai_embedding_model.clone(),
            temperature: cfg.temperature,
            limiter: Arc::new(RateLimiter::direct(Quota::per_minute(per_minute))),
        })
    }

    fn request<'a>(&'a self, prompt: &str, stream: bool) -> ChatCompletionRequest<'a> {
        ChatCompletionRequest {
            model: &self.model,
            messages: vec![ChatMessage::user(prompt)],
            temperature: self.temperature,
            stream,
        }
    }
}

#[async_trait]
impl ChatModel for OpenAiClient {
    async fn complete(&self, prompt: &str) -> Result<String, LiveAgentError> {
        self.limiter.until_ready().await;
        let body = self.request(prompt, false);
        let resp = OpenAiApi::chat_completion(
            self.client.clone(),
            self.chat_url.clone(),
            &self.api_key,
            default_retry_policy(),
            &body,
        )
        .await?;
        let text = resp.into_text();
        debug!(model = %self.model, chars = text.len(), "chat completion finished");
        Ok(text)
    }

    async fn stream(&self, prompt: &str) -> Result<TextStream, LiveAgentError> {
        self.limiter.until_ready().await;
        let body = self.request(prompt, true);
        let stream: TextStream = OpenAiApi::chat_completion_stream(
            self.client.clone(),
            self.chat_url.clone(),
            &self.api_key,
            default_retry_policy(),
            &body,
        )
        .await?;
        Ok(stream)
    }
}

#[async_trait]
impl Embedder for OpenAiClient {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LiveAgentError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.limiter.until_ready().await;
        let body = EmbeddingRequest {
            model: &self.embedding_model,
            input: texts,
        };
        let resp = OpenAiApi::embeddings(
            self.client.clone(),
            self.embeddings_url.clone(),
            &self.api_key,
            default_retry_policy(),
            &body,
        )
        .await?;
        let vectors = resp.into_ordered();
        if vectors.len() != texts.len() {
            return Err(LiveAgentError::OpenAi(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                vectors.len()
            )));
        }
        Ok(vectors)
    }
}
