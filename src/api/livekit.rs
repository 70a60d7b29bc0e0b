use crate::error::LiveAgentError;
use crate::types::livekit::{AgentDispatch, CreateDispatchRequest};
use backon::{ExponentialBuilder, Retryable};
use std::time::Duration;
use tracing::warn;
use url::Url;

const CREATE_DISPATCH_PATH: &str = "twirp/livekit.AgentDispatchService/CreateDispatch";

pub struct LiveKitApi;

impl LiveKitApi {
    /// Ask the LiveKit server to send the named agent worker into `room`.
    /// `admin_token` must carry a `roomAdmin` grant for that room.
    pub async fn create_dispatch(
        client: reqwest::Client,
        http_base: &Url,
        admin_token: &str,
        retry_policy: ExponentialBuilder,
        body: &CreateDispatchRequest<'_>,
    ) -> Result<AgentDispatch, LiveAgentError> {
        let url = super::endpoint(http_base, CREATE_DISPATCH_PATH)?;
        let resp = (|| async {
            let resp = client
                .post(url.clone())
                .bearer_auth(admin_token)
                .json(body)
                .send()
                .await?;
            let status = resp.status();
            if status.is_server_error() {
                return Err(LiveAgentError::UpstreamStatus(status));
            }
            Ok(resp)
        })
        .retry(retry_policy)
        .when(|e: &LiveAgentError| e.is_retryable())
        .notify(|err, dur: Duration| {
            warn!("LiveKit dispatch retrying after error {}, sleeping {:?}", err, dur);
        })
        .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(LiveAgentError::UpstreamStatus(status));
        }
        Ok(resp.json::<AgentDispatch>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{no_retry, serve_local};
    use axum::http::{HeaderMap, StatusCode};
    use axum::{Json, Router, routing::post};
    use serde_json::{Value, json};

    async fn create_dispatch(headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
        let authorized = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == "Bearer admin-token");
        if !authorized {
            return (StatusCode::UNAUTHORIZED, Json(json!({"code": "unauthenticated"})));
        }
        (
            StatusCode::OK,
            Json(json!({
                "id": "AD_123",
                "agent_name": body["agent_name"],
                "room": body["room"],
                "metadata": body["metadata"],
            })),
        )
    }

    fn router() -> Router {
        Router::new().route(&format!("/{CREATE_DISPATCH_PATH}"), post(create_dispatch))
    }

    #[tokio::test]
    async fn dispatch_posts_room_agent_and_instructions() {
        let base = serve_local(router()).await;
        let body = CreateDispatchRequest {
            room: "room-1",
            agent_name: "simli-avatar-agent",
            metadata: "Be brief.",
        };
        let dispatch =
            LiveKitApi::create_dispatch(reqwest::Client::new(), &base, "admin-token", no_retry(), &body)
                .await
                .unwrap();
        assert_eq!(dispatch.id, "AD_123");
        assert_eq!(dispatch.agent_name, "simli-avatar-agent");
        assert_eq!(dispatch.room, "room-1");
    }

    #[tokio::test]
    async fn rejected_dispatch_surfaces_status() {
        let base = serve_local(router()).await;
        let body = CreateDispatchRequest {
            room: "room-1",
            agent_name: "simli-avatar-agent",
            metadata: "",
        };
        let err = LiveKitApi::create_dispatch(reqwest::Client::new(), &base, "bad", no_retry(), &body)
            .await
            .unwrap_err();
        assert!(matches!(err, LiveAgentError::UpstreamStatus(StatusCode::UNAUTHORIZED)));
    }
}
