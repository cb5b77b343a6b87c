//! Request and response bodies for the Llama Stack endpoints.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::types::{Content, Message, ToolResponse};

/// Name of the server-side RAG toolgroup.
pub const RAG_TOOLGROUP: &str = "builtin::rag";

/// A toolgroup reference: either a bare name or a name with arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Toolgroup {
    Name(String),
    WithArgs { name: String, args: Value },
}

/// The `builtin::rag` toolgroup bound to the given vector databases.
pub fn rag_toolgroup(vector_db_ids: &[String]) -> Toolgroup {
    Toolgroup::WithArgs {
        name: RAG_TOOLGROUP.to_string(),
        args: serde_json::json!({ "vector_db_ids": vector_db_ids }),
    }
}

/// Body of `POST /v1/agents/{agent_id}/session/{session_id}/turn`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnCreateRequest {
    pub messages: Vec<Message>,
    pub stream: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub documents: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub toolgroups: Vec<Toolgroup>,
}

impl TurnCreateRequest {
    /// A streaming turn request with no documents or toolgroup overrides.
    pub fn streaming(messages: Vec<Message>) -> Self {
        Self {
            messages,
            stream: true,
            documents: Vec::new(),
            toolgroups: Vec::new(),
        }
    }
}

/// Body of `POST .../turn/{turn_id}/resume`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnResumeRequest {
    pub tool_responses: Vec<ToolResponse>,
    pub stream: bool,
}

impl TurnResumeRequest {
    pub fn streaming(tool_responses: Vec<ToolResponse>) -> Self {
        Self {
            tool_responses,
            stream: true,
        }
    }
}

/// Retrieval tuning passed through to the RAG tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_chunks: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens_in_context: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

/// Body of `POST /v1/tool-runtime/rag-tool/query`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagQueryRequest {
    pub content: String,
    pub vector_db_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_config: Option<QueryConfig>,
}

/// One retrieved item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagItem {
    #[serde(rename = "type", default)]
    pub item_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Response of the RAG query endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RagQueryResult {
    #[serde(default, deserialize_with = "deserialize_rag_content")]
    pub content: Vec<RagItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl RagQueryResult {
    /// The text of the first item whose text is non-empty.
    pub fn first_text(&self) -> Option<&str> {
        self.content
            .iter()
            .filter_map(|item| item.text.as_deref())
            .find(|text| !text.is_empty())
    }
}

/// The service returns `content` as a list of items, a single item, a bare
/// string or null depending on version.
fn deserialize_rag_content<'de, D>(deserializer: D) -> Result<Vec<RagItem>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Items(Vec<RagItem>),
        Item(RagItem),
        Text(String),
        Null(()),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Items(items) => items,
        Raw::Item(item) => vec![item],
        Raw::Text(text) => vec![RagItem {
            item_type: "text".to_string(),
            text: Some(text),
        }],
        Raw::Null(()) => Vec::new(),
    })
}

/// The subset of agent configuration the turn protocol relies on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub model: String,
    pub instructions: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub toolgroups: Vec<Toolgroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_infer_iters: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAgentRequest {
    pub agent_config: AgentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAgentResponse {
    pub agent_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    pub session_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
}

/// A model registered with the stack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    pub identifier: String,
    #[serde(default)]
    pub model_type: Option<String>,
    #[serde(default)]
    pub provider_id: Option<String>,
    #[serde(default)]
    pub provider_resource_id: Option<String>,
    #[serde(default)]
    pub metadata: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelList {
    #[serde(default)]
    pub data: Vec<Model>,
}

/// An OpenAI-compatible chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: Content,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<Content>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Body of `POST /v1/openai/v1/chat/completions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

impl ChatCompletionResponse {
    /// Text of the first choice.
    pub fn text(&self) -> Option<String> {
        self.choices.first().map(|choice| choice.message.content.to_text())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatChoice {
    #[serde(default)]
    pub index: u32,
    pub message: ChatMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// One `data:` chunk of a streamed chat completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

impl ChatCompletionChunk {
    /// Content delta of the first choice, if non-empty.
    pub fn delta_text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.delta.content.as_deref())
            .filter(|text| !text.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub delta: ChunkDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkDelta {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_turn_create_request_shape() {
        let mut request = TurnCreateRequest::streaming(vec![Message::user("Who is Dora's owner?")]);
        request.toolgroups.push(rag_toolgroup(&["my-documents".to_string()]));

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["stream"], json!(true));
        assert_eq!(json["messages"][0]["role"], json!("user"));
        assert_eq!(json["toolgroups"][0]["name"], json!("builtin::rag"));
        assert_eq!(
            json["toolgroups"][0]["args"]["vector_db_ids"],
            json!(["my-documents"])
        );
        assert!(json.get("documents").is_none());
    }

    #[test]
    fn test_rag_result_first_non_empty_text() {
        let result: RagQueryResult = serde_json::from_value(json!({
            "content": [
                {"type": "text", "text": ""},
                {"type": "image"},
                {"type": "text", "text": "Dora is a Pug."},
                {"type": "text", "text": "Dora's owner is Ashwin."}
            ],
            "metadata": {"document_ids": ["d1"]}
        }))
        .unwrap();

        assert_eq!(result.first_text(), Some("Dora is a Pug."));
    }

    #[test]
    fn test_rag_result_lenient_content() {
        let empty: RagQueryResult = serde_json::from_value(json!({"content": []})).unwrap();
        assert_eq!(empty.first_text(), None);

        let missing: RagQueryResult = serde_json::from_value(json!({})).unwrap();
        assert!(missing.content.is_empty());

        let null: RagQueryResult = serde_json::from_value(json!({"content": null})).unwrap();
        assert!(null.content.is_empty());

        let text: RagQueryResult = serde_json::from_value(json!({"content": "plain"})).unwrap();
        assert_eq!(text.first_text(), Some("plain"));

        let single: RagQueryResult =
            serde_json::from_value(json!({"content": {"type": "text", "text": "one"}})).unwrap();
        assert_eq!(single.first_text(), Some("one"));
    }

    #[test]
    fn test_chunk_delta_text() {
        let chunk: ChatCompletionChunk = serde_json::from_value(json!({
            "id": "c",
            "choices": [{"index": 0, "delta": {"content": "Hel"}}]
        }))
        .unwrap();
        assert_eq!(chunk.delta_text(), Some("Hel"));

        let finish: ChatCompletionChunk = serde_json::from_value(json!({
            "choices": [{"index": 0, "delta": {}, "finish_reason": "stop"}]
        }))
        .unwrap();
        assert_eq!(finish.delta_text(), None);
    }
}
