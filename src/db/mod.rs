//! Database module: models and schema for persistent storage.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring DB rows
//! - `schema.rs`: SQL DDL for initializing the database (SQLite)
//! - `sqlite.rs`: `AgentStorage`, the query layer used by services

pub mod models;
pub mod schema;
pub mod sqlite;

pub use models::{DbAvatarVideo, DbConversation, DbDocument, NewConversation, NewDocument};
pub use schema::SQLITE_INIT;
pub use sqlite::{AgentStorage, SqlitePool};
