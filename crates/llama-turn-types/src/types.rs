//! Message, content and tool-call types shared by the turn and chat APIs.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Decode an explicit `null` the same way as an absent field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Message roles in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A system message.
    System,
    /// A user message.
    User,
    /// An assistant message.
    Assistant,
    /// A tool result message.
    Tool,
    /// Any role this client does not know about.
    #[serde(other)]
    Unknown,
}

/// A single typed content item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentItem {
    /// Plain text.
    Text {
        /// The text itself.
        text: String,
    },
    /// An image reference, kept opaque.
    Image {
        /// The image payload (url or base64 data).
        #[serde(default)]
        image: Value,
    },
    /// A content type this client does not interpret.
    #[serde(other)]
    Unsupported,
}

impl ContentItem {
    /// Create a text content item.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// The text carried by this item, if it is a text item.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// Message content: a bare string, one item, or a list of items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    /// A bare string.
    Text(String),
    /// A single typed item.
    Item(ContentItem),
    /// A list of typed items.
    Items(Vec<ContentItem>),
}

impl Content {
    /// Flatten the content to text, concatenating text items in order.
    pub fn to_text(&self) -> String {
        match self {
            Content::Text(text) => text.clone(),
            Content::Item(item) => item.as_text().unwrap_or_default().to_string(),
            Content::Items(items) => items.iter().filter_map(ContentItem::as_text).collect(),
        }
    }

    /// Whether the flattened text is empty.
    pub fn is_empty(&self) -> bool {
        match self {
            Content::Text(text) => text.is_empty(),
            Content::Item(item) => item.as_text().map_or(true, str::is_empty),
            Content::Items(items) => items
                .iter()
                .all(|item| item.as_text().map_or(true, str::is_empty)),
        }
    }
}

impl Default for Content {
    fn default() -> Self {
        Content::Text(String::new())
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Content::Text(text)
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Content::Text(text.to_string())
    }
}

/// A message in a turn or chat completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Who produced the message.
    pub role: Role,
    /// The message body.
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: Content,
    /// Why generation stopped (assistant messages only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
    /// Tool calls requested by the assistant.
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub tool_calls: Vec<ToolCall>,
    /// The call this message answers (tool messages only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
}

impl Message {
    fn with_role(role: Role, content: impl Into<Content>) -> Self {
        Self {
            role,
            content: content.into(),
            stop_reason: None,
            tool_calls: Vec::new(),
            call_id: None,
        }
    }

    pub fn system(content: impl Into<Content>) -> Self {
        Self::with_role(Role::System, content)
    }

    pub fn user(content: impl Into<Content>) -> Self {
        Self::with_role(Role::User, content)
    }

    pub fn assistant(content: impl Into<Content>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// The message content flattened to text.
    pub fn text(&self) -> String {
        self.content.to_text()
    }
}

/// Arguments of a tool call.
///
/// The service sends either a plain string or a JSON object; anything else
/// is preserved as `Other` so the call still decodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolArguments {
    /// A plain string argument.
    Text(String),
    /// A key-value mapping.
    Fields(Map<String, Value>),
    /// Any other JSON value (numbers, arrays, null).
    Other(Value),
}

impl ToolArguments {
    /// The string value of `field` when the arguments are a mapping.
    pub fn field_str(&self, field: &str) -> Option<&str> {
        match self {
            ToolArguments::Fields(fields) => fields.get(field).and_then(Value::as_str),
            _ => None,
        }
    }

    /// The plain string, when the arguments are one.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ToolArguments::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl Default for ToolArguments {
    fn default() -> Self {
        ToolArguments::Other(Value::Null)
    }
}

/// A tool call emitted by the agent mid-turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for the tool call.
    #[serde(default, deserialize_with = "null_as_default")]
    pub call_id: String,
    /// The name of the tool to invoke.
    #[serde(default, deserialize_with = "null_as_default")]
    pub tool_name: String,
    /// The arguments to pass to the tool.
    #[serde(default)]
    pub arguments: ToolArguments,
    /// The raw JSON form of the arguments, when the service includes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments_json: Option<String>,
}

impl ToolCall {
    pub fn new(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        arguments: ToolArguments,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            arguments,
            arguments_json: None,
        }
    }
}

/// The locally computed result of a tool call, sent back on resume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    /// The call this response answers.
    pub call_id: String,
    /// The tool that was called.
    pub tool_name: String,
    /// The response payload.
    pub content: ContentItem,
}

impl ToolResponse {
    /// Create a text tool response.
    pub fn text(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            content: ContentItem::text(text),
        }
    }

    /// The response text, if the content is a text item.
    pub fn text_content(&self) -> Option<&str> {
        self.content.as_text()
    }
}
