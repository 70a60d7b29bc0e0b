use crate::api::default_retry_policy;
use crate::api::livekit::LiveKitApi;
use crate::config::Config;
use crate::error::LiveAgentError;
use crate::service::livekit_token::LiveKitTokenBuilder;
use crate::types::api::{AckResponse, AvatarSessionInfo};
use crate::types::livekit::{CreateDispatchRequest, VideoGrants};
use chrono::{DateTime, Utc};
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

pub const DEFAULT_INSTRUCTIONS: &str = "You are a helpful AI assistant. Talk to me!";

/// Public messages handled by the avatar sessions actor.
#[derive(Debug)]
pub enum AvatarSessionsMessage {
    /// Create a session for an optional room name and instructions.
    Create(
        Option<String>,
        Option<String>,
        RpcReplyPort<Result<AvatarSessionInfo, LiveAgentError>>,
    ),
    /// Queue text for the avatar in an existing session.
    Speak(
        String,
        String,
        RpcReplyPort<Result<AckResponse, LiveAgentError>>,
    ),
    /// Forget a session. Replies whether it existed.
    Stop(String, RpcReplyPort<bool>),
    ActiveCount(RpcReplyPort<usize>),
}

/// Token and endpoint settings the actor needs; taken from [`Config`].
#[derive(Debug, Clone)]
pub struct AvatarSettings {
    pub livekit_url: Url,
    pub livekit_http_url: Url,
    pub api_key: String,
    pub api_secret: String,
    pub token_ttl: Duration,
    pub agent_name: String,
    pub dispatch: bool,
}

impl From<&Config> for AvatarSettings {
    fn from(cfg: &Config) -> Self {
        Self {
            livekit_url: cfg.livekit_url.clone(),
            livekit_http_url: cfg.livekit_http_url(),
            api_key: cfg.livekit_api_key.clone(),
            api_secret: cfg.livekit_api_secret.clone(),
            token_ttl: Duration::from_secs(cfg.livekit_token_ttl_secs),
            agent_name: cfg.livekit_agent_name.clone(),
            dispatch: cfg.livekit_dispatch,
        }
    }
}

/// Handle for interacting with the avatar sessions actor.
#[derive(Clone)]
pub struct AvatarSessionsHandle {
    actor: ActorRef<AvatarSessionsMessage>,
    settings: AvatarSettings,
    client: reqwest::Client,
}

impl AvatarSessionsHandle {
    pub async fn create(
        &self,
        room_name: Option<String>,
        instructions: Option<String>,
    ) -> Result<AvatarSessionInfo, LiveAgentError> {
        ractor::call!(
            self.actor,
            AvatarSessionsMessage::Create,
            room_name,
            instructions
        )
        .map_err(|e| LiveAgentError::RactorError(format!("Create RPC failed: {e}")))?
    }

    pub async fn speak(
        &self,
        session_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Result<AckResponse, LiveAgentError> {
        ractor::call!(
            self.actor,
            AvatarSessionsMessage::Speak,
            session_id.into(),
            text.into()
        )
        .map_err(|e| LiveAgentError::RactorError(format!("Speak RPC failed: {e}")))?
    }

    pub async fn stop(&self, session_id: impl Into<String>) -> Result<bool, LiveAgentError> {
        ractor::call!(self.actor, AvatarSessionsMessage::Stop, session_id.into())
            .map_err(|e| LiveAgentError::RactorError(format!("Stop RPC failed: {e}")))
    }

    pub async fn active_count(&self) -> Result<usize, LiveAgentError> {
        ractor::call!(self.actor, AvatarSessionsMessage::ActiveCount)
            .map_err(|e| LiveAgentError::RactorError(format!("ActiveCount RPC failed: {e}")))
    }

    /// Fire-and-forget dispatch of the agent worker into `room`. Failures are logged.
    pub fn dispatch_agent(&self, room: String, instructions: String) {
        if !self.settings.dispatch {
            debug!(room = %room, "agent dispatch disabled");
            return;
        }
        let settings = self.settings.clone();
        let client = self.client.clone();
        tokio::spawn(async move {
            match dispatch_agent_inner(client, &settings, &room, &instructions).await {
                Ok(dispatch_id) => info!(room = %room, dispatch_id = %dispatch_id, agent = %settings.agent_name, "agent dispatched"),
                Err(e) => warn!(room = %room, error = %e, "agent dispatch failed"),
            }
        });
    }
}

async fn dispatch_agent_inner(
    client: reqwest::Client,
    settings: &AvatarSettings,
    room: &str,
    instructions: &str,
) -> Result<String, LiveAgentError> {
    let admin_token = LiveKitTokenBuilder::new(&settings.api_key, &settings.api_secret)
        .with_grants(VideoGrants::admin(room))
        .with_ttl(Duration::from_secs(60))
        .to_jwt()?;
    let body = CreateDispatchRequest {
        room,
        agent_name: &settings.agent_name,
        metadata: instructions,
    };
    let dispatch = LiveKitApi::create_dispatch(
        client,
        &settings.livekit_http_url,
        &admin_token,
        default_retry_policy(),
        &body,
    )
    .await?;
    Ok(dispatch.id)
}

struct AvatarSession {
    info: AvatarSessionInfo,
    last_utterance: Option<String>,
    created_at: DateTime<Utc>,
}

struct AvatarSessionsState {
    settings: AvatarSettings,
    sessions: HashMap<String, AvatarSession>,
}

struct AvatarSessionsActor;

#[ractor::async_trait]
impl Actor for AvatarSessionsActor {
    type Msg = AvatarSessionsMessage;
    type State = AvatarSessionsState;
    type Arguments = AvatarSettings;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        settings: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        info!(
            livekit_url = %settings.livekit_url,
            api_key = %key_prefix(&settings.api_key),
            "AvatarSessionsActor started"
        );
        Ok(AvatarSessionsState {
            settings,
            sessions: HashMap::new(),
        })
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            AvatarSessionsMessage::Create(room_name, instructions, rp) => {
                let _ = rp.send(self.handle_create(state, room_name, instructions));
            }
            AvatarSessionsMessage::Speak(session_id, text, rp) => {
                let _ = rp.send(self.handle_speak(state, session_id, text));
            }
            AvatarSessionsMessage::Stop(session_id, rp) => {
                let removed = state.sessions.remove(&session_id);
                if let Some(session) = &removed {
                    let age = Utc::now() - session.created_at;
                    info!(session_id = %session_id, age_secs = age.num_seconds(), "avatar session stopped");
                }
                let _ = rp.send(removed.is_some());
            }
            AvatarSessionsMessage::ActiveCount(rp) => {
                let _ = rp.send(state.sessions.len());
            }
        }
        Ok(())
    }
}

impl AvatarSessionsActor {
    fn handle_create(
        &self,
        state: &mut AvatarSessionsState,
        room_name: Option<String>,
        instructions: Option<String>,
    ) -> Result<AvatarSessionInfo, LiveAgentError> {
        let room_name = room_name
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| format!("room-{}", uuid::Uuid::new_v4()));
        let instructions = instructions
            .filter(|i| !i.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_INSTRUCTIONS.to_string());

        let expired = prune_expired(&mut state.sessions, state.settings.token_ttl, Utc::now());
        if expired > 0 {
            info!(expired, "dropped avatar sessions with expired tokens");
        }

        let access_token = LiveKitTokenBuilder::new(&state.settings.api_key, &state.settings.api_secret)
            .with_identity("user")
            .with_name("User")
            .with_metadata(instructions.clone())
            .with_grants(VideoGrants::participant(room_name.clone()))
            .with_ttl(state.settings.token_ttl)
            .to_jwt()?;

        let info = AvatarSessionInfo {
            success: true,
            room_name: room_name.clone(),
            room_url: state.settings.livekit_url.to_string(),
            access_token,
            session_id: room_name.clone(),
            instructions,
        };
        let replaced = state
            .sessions
            .insert(
                room_name.clone(),
                AvatarSession {
                    info: info.clone(),
                    last_utterance: None,
                    created_at: Utc::now(),
                },
            )
            .is_some();
        info!(room = %room_name, replaced, active = state.sessions.len(), "avatar session created");
        Ok(info)
    }

    fn handle_speak(
        &self,
        state: &mut AvatarSessionsState,
        session_id: String,
        text: String,
    ) -> Result<AckResponse, LiveAgentError> {
        let Some(session) = state.sessions.get_mut(&session_id) else {
            return Err(LiveAgentError::SessionNotFound(session_id));
        };
        debug!(
            session_id = %session_id,
            room = %session.info.room_name,
            preview = %text.chars().take(50).collect::<String>(),
            "queueing avatar utterance"
        );
        session.last_utterance = Some(text);
        Ok(AckResponse {
            success: true,
            message: "Message queued for avatar".to_string(),
        })
    }
}

/// Remove sessions whose user token has expired at `now`. Returns how many were dropped.
fn prune_expired(
    sessions: &mut HashMap<String, AvatarSession>,
    token_ttl: Duration,
    now: DateTime<Utc>,
) -> usize {
    let ttl = chrono::Duration::from_std(token_ttl).unwrap_or(chrono::Duration::MAX);
    let before = sessions.len();
    sessions.retain(|_, s| now.signed_duration_since(s.created_at) < ttl);
    before - sessions.len()
}

fn key_prefix(key: &str) -> String {
    let prefix: String = key.chars().take(6).collect();
    format!("{prefix}...")
}

/// Spawn the avatar sessions actor and return a handle.
pub async fn spawn(
    cfg: &Config,
    client: reqwest::Client,
) -> Result<AvatarSessionsHandle, LiveAgentError> {
    let settings = AvatarSettings::from(cfg);
    let (actor, _jh) = Actor::spawn(None, AvatarSessionsActor, settings.clone())
        .await
        .map_err(|e| LiveAgentError::RactorError(format!("spawn AvatarSessionsActor failed: {e}")))?;
    Ok(AvatarSessionsHandle {
        actor,
        settings,
        client,
    })
}
