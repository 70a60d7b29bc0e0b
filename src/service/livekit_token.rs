use crate::error::LiveAgentError;
use crate::types::livekit::{LiveKitClaims, VideoGrants};
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use std::time::Duration;

/// Builder for LiveKit access tokens (HS256 JWT signed with the API secret).
#[derive(Debug, Clone)]
pub struct LiveKitTokenBuilder {
    api_key: String,
    api_secret: String,
    identity: String,
    name: Option<String>,
    metadata: Option<String>,
    grants: VideoGrants,
    ttl: Duration,
}

impl LiveKitTokenBuilder {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            identity: String::new(),
            name: None,
            metadata: None,
            grants: VideoGrants::default(),
            ttl: Duration::from_secs(6 * 60 * 60),
        }
    }

    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = identity.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_metadata(mut self, metadata: impl Into<String>) -> Self {
        self.metadata = Some(metadata.into());
        self
    }

    pub fn with_grants(mut self, grants: VideoGrants) -> Self {
        self.grants = grants;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn claims(&self) -> Result<LiveKitClaims, LiveAgentError> {
        let now = Utc::now().timestamp();
        let exp = i64::try_from(self.ttl.as_secs())
            .ok()
            .and_then(|ttl| now.checked_add(ttl))
            .ok_or_else(|| {
                LiveAgentError::Config(format!("token ttl {:?} is out of range", self.ttl))
            })?;
        Ok(LiveKitClaims {
            iss: self.api_key.clone(),
            sub: self.identity.clone(),
            nbf: now,
            exp,
            name: self.name.clone(),
            metadata: self.metadata.clone(),
            video: self.grants.clone(),
        })
    }

    pub fn to_jwt(&self) -> Result<String, LiveAgentError> {
        if self.api_key.is_empty() || self.api_secret.is_empty() {
            return Err(LiveAgentError::Config(
                "livekit_api_key and livekit_api_secret must be set".into(),
            ));
        }
        // joining a room requires an identity; admin tokens may omit it
        if self.grants.room_join && self.identity.is_empty() {
            return Err(LiveAgentError::BadRequest(
                "identity is required for room_join tokens".into(),
            ));
        }
        let token = encode(
            &Header::new(Algorithm::HS256),
            &self.claims()?,
            &EncodingKey::from_secret(self.api_secret.as_bytes()),
        )?;
        Ok(token)
    }
}
