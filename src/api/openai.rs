use crate::error::{LiveAgentError, OpenAiError};
use crate::types::openai::{
    ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, EmbeddingRequest,
    EmbeddingResponse,
};
use backon::{ExponentialBuilder, Retryable};
use eventsource_stream::Eventsource;
use futures::StreamExt;
use futures::stream::BoxStream;
use std::time::Duration;
use tracing::warn;
use url::Url;

pub struct OpenAiApi;

impl OpenAiApi {
    pub async fn chat_completion(
        client: reqwest::Client,
        url: Url,
        api_key: &str,
        retry_policy: ExponentialBuilder,
        body: &ChatCompletionRequest<'_>,
    ) -> Result<ChatCompletionResponse, LiveAgentError> {
        let resp = Self::try_post(client, url, api_key, retry_policy, body).await?;
        let resp = Self::check_status(resp).await?;
        Ok(resp.json::<ChatCompletionResponse>().await?)
    }

    /// Streamed completion as text deltas; ends at the `[DONE]` sentinel.
    pub async fn chat_completion_stream(
        client: reqwest::Client,
        url: Url,
        api_key: &str,
        retry_policy: ExponentialBuilder,
        body: &ChatCompletionRequest<'_>,
    ) -> Result<BoxStream<'static, Result<String, LiveAgentError>>, LiveAgentError> {
        let resp = Self::try_post(client, url, api_key, retry_policy, body).await?;
        let resp = Self::check_status(resp).await?;
        let mut events = Box::pin(resp.bytes_stream().eventsource());

        Ok(async_stream::try_stream! {
            while let Some(event) = events.next().await {
                let event = event.map_err(|e| LiveAgentError::Stream(e.to_string()))?;
                if event.data.trim() == "[DONE]" {
                    break;
                }
                let chunk: ChatCompletionChunk = serde_json::from_str(&event.data)?;
                if let Some(text) = chunk.delta_text() {
                    yield text.to_string();
                }
            }
        }
        .boxed())
    }

    pub async fn embeddings(
        client: reqwest::Client,
        url: Url,
        api_key: &str,
        retry_policy: ExponentialBuilder,
        body: &EmbeddingRequest<'_>,
    ) -> Result<EmbeddingResponse, LiveAgentError> {
        let resp = Self::try_post(client, url, api_key, retry_policy, body).await?;
        let resp = Self::check_status(resp).await?;
        Ok(resp.json::<EmbeddingResponse>().await?)
    }

    async fn try_post<T>(
        client: reqwest::Client,
        url: Url,
        api_key: &str,
        retry_policy: ExponentialBuilder,
        body: &T,
    ) -> Result<reqwest::Response, LiveAgentError>
    where
        T: serde::Serialize,
    {
        (|| async {
            let resp = client
                .post(url.clone())
                .bearer_auth(api_key)
                .json(body)
                .send()
                .await?;
            let status = resp.status();
            if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Err(LiveAgentError::UpstreamStatus(status));
            }
            Ok(resp)
        })
        .retry(retry_policy)
        .when(|e: &LiveAgentError| e.is_retryable())
        .notify(|err, dur: Duration| {
            warn!("OpenAI request retrying after error {}, sleeping {:?}", err, dur);
        })
        .await
    }

    async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, LiveAgentError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.bytes().await.unwrap_or_default();
        match serde_json::from_slice::<OpenAiError>(&body) {
            Ok(err) => Err(LiveAgentError::OpenAi(err.error.message)),
            Err(_) => Err(LiveAgentError::UpstreamStatus(status)),
        }
    }
}
