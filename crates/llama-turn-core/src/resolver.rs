//! Client-side resolution of tool calls
//!
//! When a turn pauses awaiting input, the driver hands the pending calls to
//! a [`ToolResolver`]. [`RagToolResolver`] answers retrieval calls by running
//! the query against the RAG tool runtime and replying with the first piece
//! of retrieved text.

use std::sync::Arc;

use async_trait::async_trait;
use llama_turn_types::{QueryConfig, RagQueryRequest, ToolArguments, ToolCall, ToolResponse};

use crate::client::StackApi;
use crate::config::{RagConfig, EMPTY_RAG_RESULT};
use crate::errors::Result;
use crate::observer::{LogObserver, TurnObserver};

/// Maps pending tool calls to the responses sent back on resume.
#[async_trait]
pub trait ToolResolver: Send + Sync {
    /// Resolve the calls it can answer. Calls it cannot answer are skipped,
    /// so the result may be shorter than `calls`.
    async fn resolve(&self, calls: &[ToolCall]) -> Result<Vec<ToolResponse>>;
}

pub struct RagToolResolver {
    api: Arc<dyn StackApi>,
    vector_db_ids: Vec<String>,
    markers: Vec<String>,
    empty_result_text: String,
    query_config: Option<QueryConfig>,
    observer: Arc<dyn TurnObserver>,
}

impl RagToolResolver {
    pub fn new(api: Arc<dyn StackApi>, vector_db_ids: Vec<String>) -> Self {
        Self {
            api,
            vector_db_ids,
            markers: vec!["rag".to_string(), "knowledge_search".to_string()],
            empty_result_text: EMPTY_RAG_RESULT.to_string(),
            query_config: None,
            observer: Arc::new(LogObserver),
        }
    }

    pub fn from_config(api: Arc<dyn StackApi>, config: &RagConfig) -> Self {
        Self {
            api,
            vector_db_ids: config.vector_db_ids.clone(),
            markers: config.tool_markers.clone(),
            empty_result_text: config.empty_result_text.clone(),
            query_config: config.query_config.clone(),
            observer: Arc::new(LogObserver),
        }
    }

    pub fn with_markers(mut self, markers: Vec<String>) -> Self {
        self.markers = markers;
        self
    }

    pub fn with_empty_result_text(mut self, text: impl Into<String>) -> Self {
        self.empty_result_text = text.into();
        self
    }

    pub fn with_query_config(mut self, query_config: QueryConfig) -> Self {
        self.query_config = Some(query_config);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn TurnObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Whether the tool name contains one of the retrieval markers.
    pub fn is_retrieval_tool(&self, tool_name: &str) -> bool {
        self.markers
            .iter()
            .filter(|marker| !marker.is_empty())
            .any(|marker| tool_name.contains(marker.as_str()))
    }

    async fn retrieve(&self, query: String) -> Result<String> {
        let request = RagQueryRequest {
            content: query,
            vector_db_ids: self.vector_db_ids.clone(),
            query_config: self.query_config.clone(),
        };

        let result = self.api.query_rag(&request).await?;
        Ok(result
            .first_text()
            .map(str::to_string)
            .unwrap_or_else(|| self.empty_result_text.clone()))
    }
}

/// The retrieval query carried by a call's arguments.
///
/// A plain string is the query itself; a mapping uses `query`, falling back
/// to `content` when `query` is missing or empty.
pub fn extract_query(arguments: &ToolArguments) -> Option<String> {
    let query = match arguments {
        ToolArguments::Text(text) => Some(text.as_str()),
        ToolArguments::Fields(_) => arguments
            .field_str("query")
            .filter(|q| !q.trim().is_empty())
            .or_else(|| arguments.field_str("content")),
        ToolArguments::Other(_) => None,
    };

    query
        .filter(|q| !q.trim().is_empty())
        .map(str::to_string)
}

#[async_trait]
impl ToolResolver for RagToolResolver {
    async fn resolve(&self, calls: &[ToolCall]) -> Result<Vec<ToolResponse>> {
        let mut responses = Vec::with_capacity(calls.len());

        for call in calls {
            if !self.is_retrieval_tool(&call.tool_name) {
                self.observer.on_tool_call_skipped(call, "not a retrieval tool");
                continue;
            }

            let query = match extract_query(&call.arguments) {
                Some(query) => query,
                None => {
                    log::warn!(
                        "No query found in arguments of tool call {}: {:?}",
                        call.call_id,
                        call.arguments
                    );
                    self.observer.on_tool_call_skipped(call, "no query in arguments");
                    continue;
                }
            };

            log::info!("Running retrieval for tool call {}: {}", call.call_id, query);
            let text = self.retrieve(query).await?;
            let response = ToolResponse::text(call.call_id.clone(), call.tool_name.clone(), text);
            self.observer.on_tool_response(call, &response);
            responses.push(response);
        }

        Ok(responses)
    }
}
