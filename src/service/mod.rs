pub mod avatar_actor;
pub mod heygen;
pub mod livekit_token;
pub mod llm;
pub mod rag;
pub mod workflow;
