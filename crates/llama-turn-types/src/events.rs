//! Events carried by the agent turn SSE stream.
//!
//! Each `data:` line of the stream holds an envelope of the form
//! `{"event":{"payload":{"event_type": ..., ...}}}`. The payload is decoded
//! loosely first and then classified into a [`StreamEvent`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::turn::Turn;

/// Outer wrapper of one SSE data line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SseEnvelope {
    pub event: EventEnvelope,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub payload: EventPayload,
}

/// The loosely typed payload of a stream event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventPayload {
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub delta: Value,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub step_details: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn: Option<Turn>,
}

/// Which kind of terminal event ended a stream segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalKind {
    /// The turn finished and carries its output message.
    Complete,
    /// The turn is paused waiting for client-side tool responses.
    AwaitingInput,
}

/// A classified stream event.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    TurnStart {
        turn_id: Option<String>,
    },
    StepStart {
        step_type: Option<String>,
        step_id: Option<String>,
    },
    StepProgress {
        step_type: Option<String>,
        step_id: Option<String>,
        delta: Value,
    },
    StepComplete {
        step_type: Option<String>,
        step_id: Option<String>,
    },
    TurnComplete(Turn),
    TurnAwaitingInput(Turn),
    /// Any other event type, or a turn event without a turn.
    Other {
        event_type: String,
    },
}

impl StreamEvent {
    /// Decode the JSON text of one `data:` line.
    pub fn from_data(data: &str) -> serde_json::Result<Self> {
        let envelope: SseEnvelope = serde_json::from_str(data)?;
        Ok(Self::from(envelope.event.payload))
    }

    /// The event type string as sent on the wire.
    pub fn event_type(&self) -> &str {
        match self {
            StreamEvent::TurnStart { .. } => "turn_start",
            StreamEvent::StepStart { .. } => "step_start",
            StreamEvent::StepProgress { .. } => "step_progress",
            StreamEvent::StepComplete { .. } => "step_complete",
            StreamEvent::TurnComplete(_) => "turn_complete",
            StreamEvent::TurnAwaitingInput(_) => "turn_awaiting_input",
            StreamEvent::Other { event_type } => event_type,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal_kind().is_some()
    }

    pub fn terminal_kind(&self) -> Option<TerminalKind> {
        match self {
            StreamEvent::TurnComplete(_) => Some(TerminalKind::Complete),
            StreamEvent::TurnAwaitingInput(_) => Some(TerminalKind::AwaitingInput),
            _ => None,
        }
    }

    /// Consume a terminal event, returning its kind and turn snapshot.
    pub fn into_terminal(self) -> Option<(TerminalKind, Turn)> {
        match self {
            StreamEvent::TurnComplete(turn) => Some((TerminalKind::Complete, turn)),
            StreamEvent::TurnAwaitingInput(turn) => Some((TerminalKind::AwaitingInput, turn)),
            _ => None,
        }
    }

    /// Incremental text of a `step_progress` event, when it carries any.
    pub fn text_delta(&self) -> Option<&str> {
        match self {
            StreamEvent::StepProgress { delta, .. } => {
                match delta.get("type").and_then(Value::as_str) {
                    Some("text") | None => delta.get("text").and_then(Value::as_str),
                    Some(_) => None,
                }
            }
            _ => None,
        }
    }
}

impl From<EventPayload> for StreamEvent {
    fn from(payload: EventPayload) -> Self {
        let EventPayload {
            event_type,
            turn_id,
            step_type,
            step_id,
            delta,
            turn,
            ..
        } = payload;

        match (event_type.as_str(), turn) {
            ("turn_start", _) => StreamEvent::TurnStart { turn_id },
            ("step_start", _) => StreamEvent::StepStart { step_type, step_id },
            ("step_progress", _) => StreamEvent::StepProgress {
                step_type,
                step_id,
                delta,
            },
            ("step_complete", _) => StreamEvent::StepComplete { step_type, step_id },
            ("turn_complete", Some(turn)) => StreamEvent::TurnComplete(turn),
            ("turn_awaiting_input", Some(turn)) => StreamEvent::TurnAwaitingInput(turn),
            _ => StreamEvent::Other { event_type },
        }
    }
}
