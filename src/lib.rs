pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod service;
pub mod types;

pub use error::LiveAgentError;
pub use router::{LiveAgentState, live_agent_router};
pub use service::workflow::{Intent, Workflow, WorkflowState};
