use crate::error::LiveAgentError;
use figment::{
    Figment,
    providers::{Env, Serialized},
};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use url::Url;

/// Environment keys read into [`Config`]. Matching is case-insensitive.
/// Upper bound for `livekit_token_ttl_secs` (30 days).
pub const MAX_TOKEN_TTL_SECS: u64 = 30 * 24 * 60 * 60;

const ENV_KEYS: &[&str] = &[
    "openai_api_key",
    "openai_api_base",
    "openai_model",
    "openai_embedding_model",
    "temperature",
    "openai_rate_limit_per_minute",
    "heygen_api_key",
    "heygen_api_base",
    "simli_api_key",
    "simli_face_id",
    "livekit_url",
    "livekit_api_key",
    "livekit_api_secret",
    "livekit_agent_name",
    "livekit_dispatch",
    "livekit_token_ttl_secs",
    "database_url",
    "host",
    "port",
    "loglevel",
    "proxy",
    "cors_origins",
    "service_key",
    "chunk_size",
    "chunk_overlap",
    "retrieval_top_k",
    "history_limit",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub openai_api_key: String,
    pub openai_api_base: Url,
    pub openai_model: String,
    pub openai_embedding_model: String,
    pub temperature: f32,
    pub openai_rate_limit_per_minute: u32,

    pub heygen_api_key: String,
    pub heygen_api_base: Url,

    pub simli_api_key: String,
    pub simli_face_id: String,

    pub livekit_url: Url,
    pub livekit_api_key: String,
    pub livekit_api_secret: String,
    pub livekit_agent_name: String,
    pub livekit_dispatch: bool,
    pub livekit_token_ttl_secs: u64,

    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub loglevel: String,
    pub proxy: Option<Url>,
    /// Comma-separated list, see [`Config::cors_origin_list`].
    pub cors_origins: String,
    /// Shared secret guarding `/api`. Empty disables the check.
    pub service_key: String,

    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub retrieval_top_k: usize,
    pub history_limit: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            openai_api_base: Url::parse("https://api.openai.com/v1/").expect("static url"),
            openai_model: "gpt-4o-mini".to_string(),
            openai_embedding_model: "text-embedding-3-small".to_string(),
            temperature: 0.7,
            openai_rate_limit_per_minute: 60,
            heygen_api_key: String::new(),
            heygen_api_base: Url::parse("https://api.heygen.com/").expect("static url"),
            simli_api_key: String::new(),
            simli_face_id: String::new(),
            livekit_url: Url::parse("ws://localhost:7880").expect("static url"),
            livekit_api_key: "devkey".to_string(),
            livekit_api_secret: "secret".to_string(),
            livekit_agent_name: "simli-avatar-agent".to_string(),
            livekit_dispatch: true,
            livekit_token_ttl_secs: 6 * 60 * 60,
            database_url: "sqlite://live-agent.db".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8000,
            loglevel: "info".to_string(),
            proxy: None,
            cors_origins: "http://localhost:3000,http://localhost:5173".to_string(),
            service_key: String::new(),
            chunk_size: 1000,
            chunk_overlap: 200,
            retrieval_top_k: 4,
            history_limit: 50,
        }
    }
}

impl Config {
    /// Defaults overlaid with process environment (call `dotenvy::dotenv()` first).
    pub fn load() -> Result<Self, LiveAgentError> {
        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Env::raw().only(ENV_KEYS));
        Self::from_figment(figment)
    }

    pub fn from_figment(figment: Figment) -> Result<Self, LiveAgentError> {
        let cfg: Config = figment
            .extract()
            .map_err(|e| LiveAgentError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), LiveAgentError> {
        if self.chunk_size == 0 {
            return Err(LiveAgentError::Config("chunk_size must be positive".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(LiveAgentError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.livekit_token_ttl_secs == 0 || self.livekit_token_ttl_secs > MAX_TOKEN_TTL_SECS {
            return Err(LiveAgentError::Config(format!(
                "livekit_token_ttl_secs must be between 1 and {MAX_TOKEN_TTL_SECS}"
            )));
        }
        if self.retrieval_top_k == 0 {
            return Err(LiveAgentError::Config(
                "retrieval_top_k must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn cors_origin_list(&self) -> Vec<String> {
        self.cors_origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// HTTP(S) base for LiveKit server APIs, derived from the websocket URL.
    pub fn livekit_http_url(&self) -> Url {
        let mut url = self.livekit_url.clone();
        let scheme = match url.scheme() {
            "ws" => Some("http"),
            "wss" => Some("https"),
            _ => None,
        };
        if let Some(scheme) = scheme {
            // ws/wss -> http/https are both "special" schemes, so this cannot fail.
            let _ = url.set_scheme(scheme);
        }
        url
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

pub static CONFIG: LazyLock<Config> =
    LazyLock::new(|| Config::load().expect("FATAL: invalid live-agent configuration"));
