pub mod auth;
pub mod chat_request;
