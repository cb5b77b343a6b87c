//! Configuration types for the turn client

use std::time::Duration;

use llama_turn_types::QueryConfig;
use serde::{Deserialize, Serialize};

use crate::driver::DEFAULT_MAX_ROUNDS;
use crate::errors::TurnError;

/// Default text sent back when retrieval finds nothing usable.
pub const EMPTY_RAG_RESULT: &str = "[No relevant context found in RAG]";

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlamaTurnConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub turn: TurnConfig,
    #[serde(default)]
    pub rag: RagConfig,
    #[serde(default)]
    pub agent: AgentSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Connection settings for the Llama Stack server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout, covering the whole streamed body.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub auth: ServerAuth,
}

impl ServerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            auth: ServerAuth::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerAuth {
    /// Literal API key.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
}

/// Resume-loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnConfig {
    /// Upper bound on create/resume requests for a single turn.
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
        }
    }
}

/// Client-side RAG tool resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    #[serde(default = "default_vector_db_ids")]
    pub vector_db_ids: Vec<String>,
    /// Substrings that mark a tool call as a retrieval call.
    #[serde(default = "default_tool_markers")]
    pub tool_markers: Vec<String>,
    #[serde(default = "default_empty_result_text")]
    pub empty_result_text: String,
    #[serde(default)]
    pub query_config: Option<QueryConfig>,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            vector_db_ids: default_vector_db_ids(),
            tool_markers: default_tool_markers(),
            empty_result_text: default_empty_result_text(),
            query_config: None,
        }
    }
}

/// Agent created by the `ask` command when no agent id is given
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_instructions")]
    pub instructions: String,
    #[serde(default = "default_agent_name")]
    pub name: String,
    #[serde(default = "default_max_infer_iters")]
    pub max_infer_iters: u32,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            model: default_model(),
            instructions: default_instructions(),
            name: default_agent_name(),
            max_infer_iters: default_max_infer_iters(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl LlamaTurnConfig {
    pub fn validate(&self) -> Result<(), TurnError> {
        if self.server.base_url.trim().is_empty() {
            return Err(TurnError::Config("Server base_url cannot be empty".to_string()));
        }

        if self.server.timeout_secs == 0 {
            return Err(TurnError::Config(
                "Server timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.turn.max_rounds == 0 {
            return Err(TurnError::Config(
                "Turn max_rounds must be greater than 0".to_string(),
            ));
        }

        if self.rag.tool_markers.iter().all(|m| m.is_empty()) {
            return Err(TurnError::Config(
                "RAG tool_markers must contain at least one non-empty marker".to_string(),
            ));
        }

        Ok(())
    }
}

fn default_base_url() -> String {
    "http://localhost:8321".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_max_rounds() -> u32 {
    DEFAULT_MAX_ROUNDS
}

fn default_max_infer_iters() -> u32 {
    10
}

fn default_vector_db_ids() -> Vec<String> {
    vec!["my-documents".to_string()]
}

fn default_tool_markers() -> Vec<String> {
    vec!["rag".to_string(), "knowledge_search".to_string()]
}

fn default_empty_result_text() -> String {
    EMPTY_RAG_RESULT.to_string()
}

fn default_model() -> String {
    "ollama/llama3.2:3b".to_string()
}

fn default_instructions() -> String {
    "You are a helpful assistant. Use the knowledge_search tool to answer questions \
     about the provided documents."
        .to_string()
}

fn default_agent_name() -> String {
    "RAG Agent".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}
