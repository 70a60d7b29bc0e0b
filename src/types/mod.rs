//! Wire types shared by handlers and upstream clients.
//!
//! Layout:
//! - `openai.rs`: chat completion and embedding payloads
//! - `heygen.rs`: HeyGen streaming token and video status envelopes
//! - `livekit.rs`: LiveKit JWT claims and agent dispatch request
//! - `api.rs`: request/response bodies of this service's own HTTP surface

pub mod api;
pub mod heygen;
pub mod livekit;
pub mod openai;
