use crate::error::LiveAgentError;
use crate::types::heygen::{HeyGenEnvelope, StreamingTokenData, VideoStatusData};
use backon::{ExponentialBuilder, Retryable};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::warn;
use url::Url;

pub struct HeyGenApi;

impl HeyGenApi {
    /// `POST /v1/streaming.create_token`
    pub async fn create_streaming_token(
        client: reqwest::Client,
        base: &Url,
        api_key: &str,
        retry_policy: ExponentialBuilder,
    ) -> Result<StreamingTokenData, LiveAgentError> {
        let url = super::endpoint(base, "v1/streaming.create_token")?;
        let resp = (|| async {
            let resp = client
                .post(url.clone())
                .header("X-Api-Key", api_key)
                .header("Accept", "application/json")
                .send()
                .await?;
            Self::retryable_status(resp)
        })
        .retry(retry_policy)
        .when(|e: &LiveAgentError| e.is_retryable())
        .notify(|err, dur: Duration| {
            warn!("HeyGen streaming token retrying after error {}, sleeping {:?}", err, dur);
        })
        .await?;
        Self::unwrap_envelope(resp).await
    }

    /// `GET /v1/video_status.get?video_id=...`
    pub async fn video_status(
        client: reqwest::Client,
        base: &Url,
        api_key: &str,
        video_id: &str,
        retry_policy: ExponentialBuilder,
    ) -> Result<VideoStatusData, LiveAgentError> {
        let mut url = super::endpoint(base, "v1/video_status.get")?;
        url.query_pairs_mut().append_pair("video_id", video_id);
        let resp = (|| async {
            let resp = client
                .get(url.clone())
                .header("X-Api-Key", api_key)
                .header("Accept", "application/json")
                .send()
                .await?;
            Self::retryable_status(resp)
        })
        .retry(retry_policy)
        .when(|e: &LiveAgentError| e.is_retryable())
        .notify(|err, dur: Duration| {
            warn!("HeyGen video status retrying after error {}, sleeping {:?}", err, dur);
        })
        .await?;
        Self::unwrap_envelope(resp).await
    }

    fn retryable_status(resp: reqwest::Response) -> Result<reqwest::Response, LiveAgentError> {
        let status = resp.status();
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LiveAgentError::UpstreamStatus(status));
        }
        Ok(resp)
    }

    async fn unwrap_envelope<T: DeserializeOwned>(
        resp: reqwest::Response,
    ) -> Result<T, LiveAgentError> {
        let status = resp.status();
        let body = resp.bytes().await?;
        let envelope: HeyGenEnvelope<T> = match serde_json::from_slice(&body) {
            Ok(env) => env,
            Err(_) if !status.is_success() => return Err(LiveAgentError::UpstreamStatus(status)),
            Err(e) => return Err(e.into()),
        };
        match envelope.data {
            Some(data) if status.is_success() => Ok(data),
            _ => {
                let msg = envelope
                    .message
                    .or_else(|| envelope.error.map(|e| e.to_string()))
                    .unwrap_or_else(|| format!("unexpected response status {status}"));
                Err(LiveAgentError::HeyGen(msg))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{no_retry, serve_local};
    use axum::http::{HeaderMap, StatusCode};
    use axum::{Json, Router, routing::post};
    use serde_json::json;

    async fn create_token(headers: HeaderMap) -> (StatusCode, Json<serde_json::Value>) {
        match headers.get("x-api-key").and_then(|v| v.to_str().ok()) {
            Some("hg-key") => (
                StatusCode::OK,
                Json(json!({"error": null, "data": {"token": "stream-token"}})),
            ),
            _ => (
                StatusCode::UNAUTHORIZED,
                Json(json!({"code": 400112, "message": "Unauthorized", "data": null})),
            ),
        }
    }

    #[tokio::test]
    async fn token_is_unwrapped_from_envelope() {
        let base = serve_local(Router::new().route("/v1/streaming.create_token", post(create_token))).await;

        let data = HeyGenApi::create_streaming_token(reqwest::Client::new(), &base, "hg-key", no_retry())
            .await
            .unwrap();
        assert_eq!(data.token, "stream-token");

        let err = HeyGenApi::create_streaming_token(reqwest::Client::new(), &base, "wrong", no_retry())
            .await
            .unwrap_err();
        assert!(matches!(err, LiveAgentError::HeyGen(ref m) if m == "Unauthorized"));
    }

    #[tokio::test]
    async fn envelope_without_data_reports_error_object() {
        let router = Router::new().route(
            "/v1/streaming.create_token",
            post(|| async { Json(json!({"data": null, "error": {"code": "quota_exceeded"}})) }),
        );
        let base = serve_local(router).await;
        let err = HeyGenApi::create_streaming_token(reqwest::Client::new(), &base, "k", no_retry())
            .await
            .unwrap_err();
        assert!(matches!(err, LiveAgentError::HeyGen(ref m) if m.contains("quota_exceeded")));
    }

    #[tokio::test]
    async fn non_json_failure_keeps_upstream_status() {
        let router = Router::new().route(
            "/v1/streaming.create_token",
            post(|| async { (StatusCode::FORBIDDEN, "<html>denied</html>") }),
        );
        let base = serve_local(router).await;
        let err = HeyGenApi::create_streaming_token(reqwest::Client::new(), &base, "k", no_retry())
            .await
            .unwrap_err();
        assert!(matches!(err, LiveAgentError::UpstreamStatus(StatusCode::FORBIDDEN)));
    }
}
