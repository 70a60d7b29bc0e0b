use crate::api::build_http_client;
use crate::config::Config;
use crate::db::AgentStorage;
use crate::error::LiveAgentError;
use crate::handlers::{avatar, chat, heygen, ingest, meta};
use crate::middleware::auth::RequireKeyAuth;
use crate::service::avatar_actor::{self, AvatarSessionsHandle};
use crate::service::heygen::HeyGenService;
use crate::service::llm::{ChatModel, Embedder, OpenAiClient};
use crate::service::rag::RagService;
use crate::service::workflow::Workflow;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware::from_extractor_with_state,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

/// Request bodies above this size are rejected with 413.
const BODY_LIMIT: usize = 16 * 1024 * 1024;

#[derive(Clone)]
pub struct LiveAgentState {
    pub config: Arc<Config>,
    pub storage: AgentStorage,
    pub workflow: Arc<Workflow>,
    pub avatars: AvatarSessionsHandle,
    pub heygen: HeyGenService,
}

impl LiveAgentState {
    /// Wire services around the given models. Storage is opened from `config.database_url`.
    pub async fn build(
        config: Arc<Config>,
        client: reqwest::Client,
        chat: Arc<dyn ChatModel>,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, LiveAgentError> {
        let storage = AgentStorage::connect(&config.database_url).await?;
        let rag = RagService::new(&config, storage.clone(), embedder, chat.clone())?;
        let workflow = Arc::new(Workflow::new(Arc::new(rag), chat));
        let avatars = avatar_actor::spawn(&config, client.clone()).await?;
        let heygen = HeyGenService::new(&config, client, storage.clone());
        Ok(Self {
            config,
            storage,
            workflow,
            avatars,
            heygen,
        })
    }

    /// Production wiring: OpenAI for both chat and embeddings.
    pub async fn from_config(config: Arc<Config>) -> Result<Self, LiveAgentError> {
        let client = build_http_client(config.proxy.as_ref())?;
        let openai = Arc::new(OpenAiClient::new(client.clone(), &config)?);
        Self::build(config, client, openai.clone(), openai).await
    }
}

pub fn live_agent_router(state: LiveAgentState) -> Router {
    let api = Router::new()
        .route("/chat", post(chat::chat_handler))
        .route("/chat/stream", post(chat::chat_stream_handler))
        .route("/ingest", post(ingest::ingest_handler))
        .route("/history/{session_id}", get(chat::history_handler))
        .route("/session/new", post(chat::new_session_handler))
        .route("/simli/session", post(avatar::create_session_handler))
        .route("/simli/speak", post(avatar::speak_handler))
        .route("/simli/stop", post(avatar::stop_handler))
        .route("/heygen/streaming-token", post(heygen::streaming_token_handler))
        .route("/heygen/video/{video_id}", get(heygen::video_status_handler))
        .route_layer(from_extractor_with_state::<RequireKeyAuth, _>(state.clone()));

    Router::new()
        .route("/", get(meta::root_handler))
        .route("/health", get(meta::health_handler))
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(cfg: &Config) -> CorsLayer {
    let list = cfg.cors_origin_list();
    let allow_origin = if list.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = list
            .into_iter()
            .filter_map(|origin| {
                HeaderValue::from_str(&origin)
                    .inspect_err(|e| warn!(origin = %origin, error = %e, "ignoring invalid CORS origin"))
                    .ok()
            })
            .collect();
        AllowOrigin::list(origins)
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}
