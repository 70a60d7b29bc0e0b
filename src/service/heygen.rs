use crate::api::default_retry_policy;
use crate::api::heygen::HeyGenApi;
use crate::config::Config;
use crate::db::AgentStorage;
use crate::error::LiveAgentError;
use crate::types::api::VideoStatusResponse;
use crate::types::heygen::VideoState;
use serde_json::json;
use tracing::{debug, info};
use url::Url;

/// HeyGen streaming tokens and video status, with status cached in storage.
#[derive(Clone)]
pub struct HeyGenService {
    client: reqwest::Client,
    base: Url,
    api_key: String,
    storage: AgentStorage,
}

impl HeyGenService {
    pub fn new(cfg: &Config, client: reqwest::Client, storage: AgentStorage) -> Self {
        Self {
            client,
            base: cfg.heygen_api_base.clone(),
            api_key: cfg.heygen_api_key.clone(),
            storage,
        }
    }

    fn api_key(&self) -> Result<&str, LiveAgentError> {
        if self.api_key.is_empty() {
            return Err(LiveAgentError::Config("heygen_api_key is not configured".into()));
        }
        Ok(&self.api_key)
    }

    pub async fn streaming_token(&self) -> Result<String, LiveAgentError> {
        let key = self.api_key()?;
        let data =
            HeyGenApi::create_streaming_token(self.client.clone(), &self.base, key, default_retry_policy())
                .await?;
        info!("HeyGen streaming token issued");
        Ok(data.token)
    }

    /// Terminal statuses are served from cache; anything else is refreshed upstream.
    pub async fn video_status(&self, video_id: &str) -> Result<VideoStatusResponse, LiveAgentError> {
        let cached = self
            .storage
            .get_video(video_id)
            .await?
            .filter(|v| VideoState::parse(&v.status).is_some_and(VideoState::is_terminal));
        if let Some(cached) = cached {
            debug!(video_id, status = %cached.status, "video status served from cache");
            return Ok(VideoStatusResponse {
                video_id: cached.video_id,
                status: cached.status,
                video_url: cached.video_url,
                duration: cached.duration,
                metadata: Some(cached.metadata),
            });
        }

        let key = self.api_key()?;
        let data = HeyGenApi::video_status(
            self.client.clone(),
            &self.base,
            key,
            video_id,
            default_retry_policy(),
        )
        .await?;

        let metadata = json!({
            "thumbnail_url": data.thumbnail_url,
            "error": data.error,
        });
        self.storage
            .upsert_video(
                video_id,
                &data.status,
                data.video_url.as_deref(),
                data.duration,
                &metadata,
            )
            .await?;
        info!(video_id, status = %data.status, "video status refreshed");

        Ok(VideoStatusResponse {
            video_id: video_id.to_string(),
            status: data.status,
            video_url: data.video_url,
            duration: data.duration,
            metadata: Some(metadata),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::serve_local;
    use axum::extract::{Query, State};
    use axum::{Json, Router, routing::get};
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn service(api_key: &str) -> (tempfile::TempDir, HeyGenService) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("heygen.db").display());
        let storage = AgentStorage::connect(&url).await.unwrap();
        let cfg = Config {
            heygen_api_key: api_key.to_string(),
            // unroutable; any upstream call in these tests is a bug
            heygen_api_base: Url::parse("http://127.0.0.1:9/").unwrap(),
            ..Config::default()
        };
        (dir, HeyGenService::new(&cfg, reqwest::Client::new(), storage))
    }

    #[tokio::test]
    async fn completed_video_is_served_from_cache() {
        let (_dir, svc) = service("").await;
        svc.storage
            .upsert_video("v1", "completed", Some("https://cdn.test/v1.mp4"), Some(4.0), &json!({}))
            .await
            .unwrap();
        let status = svc.video_status("v1").await.unwrap();
        assert_eq!(status.status, "completed");
        assert_eq!(status.video_url.as_deref(), Some("https://cdn.test/v1.mp4"));
    }

    async fn video_status_upstream(
        State(calls): State<Arc<AtomicUsize>>,
        Query(q): Query<HashMap<String, String>>,
    ) -> Json<serde_json::Value> {
        calls.fetch_add(1, Ordering::SeqCst);
        let id = q.get("video_id").cloned().unwrap_or_default();
        let status = if id.starts_with("done") { "completed" } else { "processing" };
        Json(json!({
            "code": 100,
            "data": {
                "id": id.clone(),
                "status": status,
                "video_url": (status == "completed").then(|| format!("https://cdn.test/{id}.mp4")),
                "duration": (status == "completed").then_some(8.5),
                "thumbnail_url": null,
            },
            "message": "Success",
        }))
    }

    async fn service_with_upstream() -> (tempfile::TempDir, HeyGenService, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let router = Router::new()
            .route("/v1/video_status.get", get(video_status_upstream))
            .with_state(calls.clone());
        let base = serve_local(router).await;

        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("heygen.db").display());
        let storage = AgentStorage::connect(&url).await.unwrap();
        let cfg = Config {
            heygen_api_key: "hg-key".to_string(),
            heygen_api_base: base,
            ..Config::default()
        };
        (dir, HeyGenService::new(&cfg, reqwest::Client::new(), storage), calls)
    }

    #[tokio::test]
    async fn pending_status_is_refreshed_and_upserted_each_time() {
        let (_dir, svc, calls) = service_with_upstream().await;

        let first = svc.video_status("v-render").await.unwrap();
        assert_eq!(first.status, "processing");
        let cached = svc.storage.get_video("v-render").await.unwrap().unwrap();
        assert_eq!(cached.status, "processing");

        svc.video_status("v-render").await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn completed_status_is_fetched_once_then_cached() {
        let (_dir, svc, calls) = service_with_upstream().await;
        svc.storage
            .upsert_video("done-1", "processing", None, None, &json!({}))
            .await
            .unwrap();

        let fresh = svc.video_status("done-1").await.unwrap();
        assert_eq!(fresh.status, "completed");
        assert_eq!(fresh.duration, Some(8.5));

        let again = svc.video_status("done-1").await.unwrap();
        assert_eq!(again.video_url.as_deref(), Some("https://cdn.test/done-1.mp4"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let row = svc.storage.get_video("done-1").await.unwrap().unwrap();
        assert_eq!(row.status, "completed");
        assert!(row.updated_at.is_some());
    }

    #[tokio::test]
    async fn missing_key_is_a_config_error() {
        let (_dir, svc) = service("").await;
        assert!(matches!(
            svc.streaming_token().await,
            Err(LiveAgentError::Config(_))
        ));
        assert!(matches!(
            svc.video_status("uncached").await,
            Err(LiveAgentError::Config(_))
        ));
    }
}
