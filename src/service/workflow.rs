//! Chat orchestration as a small node graph.
//!
//! ```text
//! ClassifyIntent --rag--> RetrieveContext --> GenerateResponse --> end
//!       \---------direct---------------------/
//! ```

use crate::error::LiveAgentError;
use crate::service::llm::{ChatModel, TextStream};
use crate::service::rag::{RagService, RetrievedDoc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    /// Needs context retrieval.
    Rag,
    /// Can be answered directly.
    Direct,
}

impl Intent {
    /// Total parse of a classifier reply; anything unrecognized is `Rag`.
    pub fn from_reply(reply: &str) -> Self {
        let cleaned: String = reply
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        match cleaned.as_str() {
            "direct" => Intent::Direct,
            _ => Intent::Rag,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Intent::Rag => "rag",
            Intent::Direct => "direct",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node {
    ClassifyIntent,
    RetrieveContext,
    GenerateResponse,
}

impl Node {
    pub const ENTRY: Node = Node::ClassifyIntent;

    /// Successor of `self` given the state it produced; `None` ends the run.
    pub fn next(self, state: &WorkflowState) -> Option<Node> {
        match self {
            Node::ClassifyIntent => match state.intent.unwrap_or(Intent::Rag) {
                Intent::Rag => Some(Node::RetrieveContext),
                Intent::Direct => Some(Node::GenerateResponse),
            },
            Node::RetrieveContext => Some(Node::GenerateResponse),
            Node::GenerateResponse => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkflowState {
    pub query: String,
    pub session_id: String,
    pub intent: Option<Intent>,
    pub context_docs: Vec<RetrievedDoc>,
    pub response: String,
}

impl WorkflowState {
    pub fn new(query: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            session_id: session_id.into(),
            ..Self::default()
        }
    }

    pub fn context_used(&self) -> bool {
        !self.context_docs.is_empty()
    }
}

pub struct Workflow {
    rag: Arc<RagService>,
    chat: Arc<dyn ChatModel>,
}

impl Workflow {
    pub fn new(rag: Arc<RagService>, chat: Arc<dyn ChatModel>) -> Self {
        Self { rag, chat }
    }

    pub fn rag(&self) -> &Arc<RagService> {
        &self.rag
    }

    /// Walk the graph from the entry node to completion.
    pub async fn run(
        &self,
        query: &str,
        session_id: &str,
    ) -> Result<WorkflowState, LiveAgentError> {
        let mut state = WorkflowState::new(query, session_id);
        let mut node = Some(Node::ENTRY);
        while let Some(current) = node {
            debug!(session_id, node = ?current, "workflow step");
            self.execute(current, &mut state).await?;
            node = current.next(&state);
        }
        info!(
            session_id,
            intent = %state.intent.unwrap_or(Intent::Rag),
            docs = state.context_docs.len(),
            "workflow finished"
        );
        Ok(state)
    }

    /// Run every node before `GenerateResponse`, leaving generation to the caller.
    pub async fn prepare(
        &self,
        query: &str,
        session_id: &str,
    ) -> Result<WorkflowState, LiveAgentError> {
        let mut state = WorkflowState::new(query, session_id);
        let mut node = Some(Node::ENTRY);
        while let Some(current) = node {
            if current == Node::GenerateResponse {
                break;
            }
            self.execute(current, &mut state).await?;
            node = current.next(&state);
        }
        Ok(state)
    }

    /// Streamed counterpart of the `GenerateResponse` node.
    pub async fn generate_stream(&self, state: &WorkflowState) -> Result<TextStream, LiveAgentError> {
        if state.context_used() {
            self.rag.generate_stream(&state.query, &state.context_docs).await
        } else {
            self.chat.stream(&direct_prompt(&state.query)).await
        }
    }

    async fn execute(&self, node: Node, state: &mut WorkflowState) -> Result<(), LiveAgentError> {
        match node {
            Node::ClassifyIntent => {
                let reply = self.chat.complete(&classify_prompt(&state.query)).await?;
                state.intent = Some(Intent::from_reply(&reply));
            }
            Node::RetrieveContext => {
                state.context_docs = self.rag.retrieve(&state.query, None).await?;
            }
            Node::GenerateResponse => {
                state.response = if state.context_used() {
                    self.rag.generate(&state.query, &state.context_docs).await?
                } else {
                    self.chat.complete(&direct_prompt(&state.query)).await?
                };
            }
        }
        Ok(())
    }
}

pub fn classify_prompt(query: &str) -> String {
    format!(
        "Classify the user's intent for the following query.\n\
         Choose one of: 'rag' (needs context retrieval), 'direct' (can answer directly).\n\
         \n\
         Query: {query}\n\
         \n\
         Intent (respond with just 'rag' or 'direct'):"
    )
}

pub fn direct_prompt(query: &str) -> String {
    format!(
        "You are a helpful AI assistant. Answer the user's question naturally and conversationally.\n\
         \n\
         User Question: {query}\n\
         \n\
         Answer:"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::AgentStorage;
    use crate::service::llm::fakes::{KeywordEmbedder, ScriptedChat};
    use futures::StreamExt;

    async fn workflow(intent_reply: &str) -> (tempfile::TempDir, Arc<ScriptedChat>, Workflow) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("wf.db").display());
        let storage = AgentStorage::connect(&url).await.unwrap();
        let chat = Arc::new(ScriptedChat::new(intent_reply, "final answer"));
        let embedder = Arc::new(KeywordEmbedder {
            vocab: vec!["rag", "vector"],
        });
        let rag = RagService::new(&Config::default(), storage, embedder, chat.clone()).unwrap();
        let wf = Workflow::new(Arc::new(rag), chat.clone());
        (dir, chat, wf)
    }

    #[test]
    fn intent_parsing_is_total() {
        assert_eq!(Intent::from_reply("direct"), Intent::Direct);
        assert_eq!(Intent::from_reply("  'Direct'.\n"), Intent::Direct);
        assert_eq!(Intent::from_reply("RAG"), Intent::Rag);
        assert_eq!(Intent::from_reply("I think it needs retrieval"), Intent::Rag);
        assert_eq!(Intent::from_reply(""), Intent::Rag);
    }

    #[test]
    fn transitions_follow_intent() {
        let mut state = WorkflowState::new("q", "s");
        state.intent = Some(Intent::Direct);
        assert_eq!(Node::ClassifyIntent.next(&state), Some(Node::GenerateResponse));
        state.intent = Some(Intent::Rag);
        assert_eq!(Node::ClassifyIntent.next(&state), Some(Node::RetrieveContext));
        assert_eq!(Node::RetrieveContext.next(&state), Some(Node::GenerateResponse));
        assert_eq!(Node::GenerateResponse.next(&state), None);
    }

    #[tokio::test]
    async fn direct_intent_skips_retrieval() {
        let (_dir, chat, wf) = workflow("direct").await;
        wf.rag()
            .ingest(&["rag rag rag".to_string()], Vec::new())
            .await
            .unwrap();

        let state = wf.run("hello there", "s1").await.unwrap();
        assert_eq!(state.intent, Some(Intent::Direct));
        assert!(!state.context_used());
        assert_eq!(state.response, "final answer");
        let prompts = chat.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[1].starts_with("You are a helpful AI assistant. Answer the user's question naturally"));
    }

    #[tokio::test]
    async fn rag_intent_uses_context_prompt() {
        let (_dir, chat, wf) = workflow("rag").await;
        wf.rag()
            .ingest(&["RAG combines retrieval with generation.".to_string()], Vec::new())
            .await
            .unwrap();

        let state = wf.run("explain rag", "s1").await.unwrap();
        assert_eq!(state.intent, Some(Intent::Rag));
        assert_eq!(state.context_docs.len(), 1);
        let prompts = chat.prompts();
        assert!(prompts[1].contains("Context:\nRAG combines retrieval with generation."));
    }

    #[tokio::test]
    async fn rag_with_empty_store_falls_back_to_direct_prompt() {
        let (_dir, chat, wf) = workflow("rag").await;
        let state = wf.run("anything", "s1").await.unwrap();
        assert_eq!(state.intent, Some(Intent::Rag));
        assert!(!state.context_used());
        assert!(chat.prompts()[1].contains("naturally and conversationally"));
    }

    #[tokio::test]
    async fn prepare_stops_before_generation() {
        let (_dir, chat, wf) = workflow("direct").await;
        let state = wf.prepare("hi", "s1").await.unwrap();
        assert!(state.response.is_empty());
        assert_eq!(chat.prompts().len(), 1);

        let text: Vec<String> = wf
            .generate_stream(&state)
            .await
            .unwrap()
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(text.concat(), "final answer");
    }
}
