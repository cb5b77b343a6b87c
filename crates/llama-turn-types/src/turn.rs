//! Agent turn snapshots and their execution steps.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{Content, Message, ToolCall};

/// One request/response cycle of an agent conversation.
///
/// The server owns and mutates the turn; the client only ever holds the
/// snapshot carried by the terminal event of a stream segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Unique identifier of the turn, used to address the resume endpoint.
    pub turn_id: String,
    /// The session owning the turn.
    #[serde(default, deserialize_with = "crate::types::null_as_default")]
    pub session_id: String,
    /// Messages that started the turn.
    #[serde(default, deserialize_with = "crate::types::null_as_default")]
    pub input_messages: Vec<Message>,
    /// Execution steps recorded so far, in order.
    #[serde(default, deserialize_with = "crate::types::null_as_default")]
    pub steps: Vec<Step>,
    /// The final assistant message, once the turn has completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_message: Option<Message>,
    /// When the turn started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    /// When the turn completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

impl Turn {
    /// The output message flattened to text, if there is one.
    pub fn answer(&self) -> Option<String> {
        self.output_message.as_ref().map(Message::text)
    }

    /// Tool calls awaiting local execution.
    ///
    /// Calls come from the turn's tool-execution steps. When no step carries
    /// any, the calls attached to the output message are used instead.
    pub fn pending_tool_calls(&self) -> Vec<ToolCall> {
        let from_steps: Vec<ToolCall> = self
            .steps
            .iter()
            .filter_map(|step| match step {
                Step::ToolExecution(step) => Some(step.tool_calls.iter().cloned()),
                _ => None,
            })
            .flatten()
            .collect();

        if !from_steps.is_empty() {
            return from_steps;
        }

        self.output_message
            .as_ref()
            .map(|message| message.tool_calls.clone())
            .unwrap_or_default()
    }

    /// Wall-clock duration of the turn, when both timestamps parse.
    pub fn duration(&self) -> Option<chrono::Duration> {
        let started = parse_timestamp(self.started_at.as_deref()?)?;
        let completed = parse_timestamp(self.completed_at.as_deref()?)?;
        Some(completed - started)
    }
}

/// Timestamps arrive either as RFC 3339 or as naive ISO 8601 (assumed UTC).
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// An execution step of a turn, discriminated by `step_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step_type", rename_all = "snake_case")]
pub enum Step {
    /// A model inference.
    Inference(InferenceStep),
    /// One or more tool invocations.
    ToolExecution(ToolExecutionStep),
    /// A safety shield check.
    ShieldCall(ShieldCallStep),
    /// A memory/vector retrieval performed by the server.
    MemoryRetrieval(MemoryRetrievalStep),
    /// A step type this client does not interpret.
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InferenceStep {
    #[serde(default, deserialize_with = "crate::types::null_as_default")]
    pub step_id: String,
    #[serde(default, deserialize_with = "crate::types::null_as_default")]
    pub turn_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_response: Option<Message>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolExecutionStep {
    #[serde(default, deserialize_with = "crate::types::null_as_default")]
    pub step_id: String,
    #[serde(default, deserialize_with = "crate::types::null_as_default")]
    pub turn_id: String,
    /// Calls the agent wants executed.
    #[serde(default, deserialize_with = "crate::types::null_as_default")]
    pub tool_calls: Vec<ToolCall>,
    /// Responses already attached by the server, kept opaque.
    #[serde(default, deserialize_with = "crate::types::null_as_default")]
    pub tool_responses: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShieldCallStep {
    #[serde(default, deserialize_with = "crate::types::null_as_default")]
    pub step_id: String,
    #[serde(default, deserialize_with = "crate::types::null_as_default")]
    pub turn_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub violation: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryRetrievalStep {
    #[serde(default, deserialize_with = "crate::types::null_as_default")]
    pub step_id: String,
    #[serde(default, deserialize_with = "crate::types::null_as_default")]
    pub turn_id: String,
    #[serde(default)]
    pub vector_db_ids: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inserted_context: Option<Content>,
}
