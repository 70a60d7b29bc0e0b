pub mod avatar;
pub mod chat;
pub mod heygen;
pub mod ingest;
pub mod meta;
