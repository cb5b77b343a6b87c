//! Observation hooks for the turn driver
//!
//! The driver and the event parser report requests, stream events, skipped
//! lines, tool resolution and state transitions to a [`TurnObserver`]. The
//! default [`LogObserver`] turns each of these into a `log` record; tests and
//! embedders can supply their own implementation to collect them instead.

use llama_turn_types::{StreamEvent, ToolCall, ToolResponse};

use crate::driver::TurnState;
use crate::errors::LineError;

/// Which endpoint a round of the resume loop called.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnRequest {
    Create { agent_id: String, session_id: String },
    Resume { turn_id: String, tool_responses: usize },
}

/// Receives progress notifications while a turn is driven.
///
/// All methods default to doing nothing.
pub trait TurnObserver: Send + Sync {
    fn on_request(&self, _round: u32, _request: &TurnRequest) {}

    fn on_event(&self, _event: &StreamEvent) {}

    fn on_skipped_line(&self, _line: &str, _error: &LineError) {}

    fn on_tool_call_skipped(&self, _call: &ToolCall, _reason: &str) {}

    fn on_tool_response(&self, _call: &ToolCall, _response: &ToolResponse) {}

    fn on_transition(&self, _from: TurnState, _to: TurnState) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl TurnObserver for NoopObserver {}

/// Observer writing every notification to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl TurnObserver for LogObserver {
    fn on_request(&self, round: u32, request: &TurnRequest) {
        match request {
            TurnRequest::Create {
                agent_id,
                session_id,
            } => log::info!(
                "Round {}: creating turn for agent {} in session {}",
                round,
                agent_id,
                session_id
            ),
            TurnRequest::Resume {
                turn_id,
                tool_responses,
            } => log::info!(
                "Round {}: resuming turn {} with {} tool response(s)",
                round,
                turn_id,
                tool_responses
            ),
        }
    }

    fn on_event(&self, event: &StreamEvent) {
        match event {
            StreamEvent::StepProgress { .. } => {
                log::trace!("Stream event: {}", event.event_type())
            }
            _ => log::debug!("Stream event: {}", event.event_type()),
        }
    }

    fn on_tool_call_skipped(&self, call: &ToolCall, reason: &str) {
        log::info!("Skipping tool call {} ({}): {}", call.call_id, call.tool_name, reason);
    }

    fn on_tool_response(&self, call: &ToolCall, response: &ToolResponse) {
        log::debug!(
            "Resolved tool call {} ({}) with {} bytes of text",
            call.call_id,
            call.tool_name,
            response.text_content().map_or(0, str::len)
        );
    }

    fn on_transition(&self, from: TurnState, to: TurnState) {
        match to {
            TurnState::Failed => log::warn!("Turn state {:?} -> {:?}", from, to),
            _ => log::debug!("Turn state {:?} -> {:?}", from, to),
        }
    }
}
