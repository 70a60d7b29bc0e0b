use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Envelope used by most HeyGen v1 endpoints.
#[derive(Debug, Deserialize)]
pub struct HeyGenEnvelope<T> {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<Value>,
    pub data: Option<T>,
}

#[derive(Debug, Deserialize)]
pub struct StreamingTokenData {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct VideoStatusData {
    #[serde(default)]
    pub id: Option<String>,
    pub status: String,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub error: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoState {
    Pending,
    Waiting,
    Processing,
    Completed,
    Failed,
}

impl VideoState {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "waiting" => Some(Self::Waiting),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Terminal states never change again, so a cached copy is authoritative.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_status_envelope_parses() {
        let raw = r#"{"code":100,"data":{"id":"abc","status":"completed",
            "video_url":"https://cdn.test/v.mp4","duration":12.5},"message":"Success"}"#;
        let env: HeyGenEnvelope<VideoStatusData> = serde_json::from_str(raw).unwrap();
        let data = env.data.unwrap();
        assert_eq!(data.status, "completed");
        assert_eq!(data.duration, Some(12.5));
        assert!(VideoState::parse(&data.status).unwrap().is_terminal());
    }

    #[test]
    fn processing_is_not_terminal() {
        assert!(!VideoState::parse("Processing").unwrap().is_terminal());
        assert_eq!(VideoState::parse("unknown"), None);
    }
}
