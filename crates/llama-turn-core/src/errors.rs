//! Error types for driving agent turns against a Llama Stack server
//!
//! Every failure that can end a turn is a [`TurnError`] variant, so callers
//! get either the final answer or a typed reason. Per-line stream decode
//! problems are not errors here: the event parser skips such lines and
//! carries on.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TurnError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Server returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("Failed to read event stream: {0}")]
    StreamRead(#[from] std::io::Error),
    #[error("Event stream ended without a terminal event")]
    NoTerminalEvent,
    #[error("Turn '{turn_id}' is awaiting input but carries no tool calls")]
    NoToolCalls { turn_id: String },
    #[error("No tool responses could be produced for turn '{turn_id}'")]
    NoToolResponses { turn_id: String },
    #[error("Turn did not complete within {max_rounds} rounds")]
    MaxRoundsExceeded { max_rounds: u32 },
    #[error("Turn cancelled")]
    Cancelled,
    #[error("Failed to decode response body: {0}")]
    Decode(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl TurnError {
    /// The HTTP status code, when the failure came from a non-success response.
    pub fn status(&self) -> Option<u16> {
        match self {
            TurnError::HttpStatus { status, .. } => Some(*status),
            TurnError::Transport(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for TurnError {
    fn from(err: serde_json::Error) -> Self {
        TurnError::Decode(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TurnError>;

/// Why a single stream line was skipped.
#[derive(Error, Debug)]
pub enum LineError {
    #[error("line is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("line does not decode as an event: {0}")]
    Json(#[from] serde_json::Error),
}
