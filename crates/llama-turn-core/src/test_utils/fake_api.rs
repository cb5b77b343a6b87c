// src/test_utils/fake_api.rs
use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use llama_turn_types::{RagQueryRequest, RagQueryResult, TurnCreateRequest, TurnResumeRequest};
use serde_json::{json, Value};

use crate::client::{EventBody, StackApi};
use crate::errors::{Result, TurnError};

/// A turn request seen by the fake.
#[derive(Debug, Clone)]
pub enum RecordedCall {
    Create {
        agent_id: String,
        session_id: String,
        request: TurnCreateRequest,
    },
    Resume {
        agent_id: String,
        session_id: String,
        turn_id: String,
        request: TurnResumeRequest,
    },
}

/// In-memory `StackApi` replaying scripted stream bodies and RAG results.
#[derive(Default)]
pub struct FakeStackApi {
    streams: Mutex<VecDeque<Result<String>>>,
    rag_results: Mutex<VecDeque<Result<RagQueryResult>>>,
    calls: Mutex<Vec<RecordedCall>>,
    rag_requests: Mutex<Vec<RagQueryRequest>>,
    delay: Option<Duration>,
}

impl FakeStackApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every turn request, to exercise cancellation.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push_stream(&self, body: String) {
        self.streams.lock().unwrap().push_back(Ok(body));
    }

    pub fn push_error(&self, error: TurnError) {
        self.streams.lock().unwrap().push_back(Err(error));
    }

    pub fn push_rag_result(&self, result: Value) {
        let result = serde_json::from_value(result).unwrap();
        self.rag_results.lock().unwrap().push_back(Ok(result));
    }

    pub fn push_rag_error(&self, error: TurnError) {
        self.rag_results.lock().unwrap().push_back(Err(error));
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn rag_requests(&self) -> Vec<RagQueryRequest> {
        self.rag_requests.lock().unwrap().clone()
    }

    async fn next_body(&self) -> Result<EventBody> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.streams.lock().unwrap().pop_front();
        match next {
            Some(Ok(body)) => Ok(Box::pin(Cursor::new(body.into_bytes()))),
            Some(Err(e)) => Err(e),
            None => Err(TurnError::HttpStatus {
                status: 503,
                body: "fake ran out of scripted streams".to_string(),
            }),
        }
    }
}

#[async_trait]
impl StackApi for FakeStackApi {
    async fn create_turn(
        &self,
        agent_id: &str,
        session_id: &str,
        request: &TurnCreateRequest,
    ) -> Result<EventBody> {
        self.calls.lock().unwrap().push(RecordedCall::Create {
            agent_id: agent_id.to_string(),
            session_id: session_id.to_string(),
            request: request.clone(),
        });
        self.next_body().await
    }

    async fn resume_turn(
        &self,
        agent_id: &str,
        session_id: &str,
        turn_id: &str,
        request: &TurnResumeRequest,
    ) -> Result<EventBody> {
        self.calls.lock().unwrap().push(RecordedCall::Resume {
            agent_id: agent_id.to_string(),
            session_id: session_id.to_string(),
            turn_id: turn_id.to_string(),
            request: request.clone(),
        });
        self.next_body().await
    }

    async fn query_rag(&self, request: &RagQueryRequest) -> Result<RagQueryResult> {
        self.rag_requests.lock().unwrap().push(request.clone());
        let next = self.rag_results.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(RagQueryResult::default()))
    }
}

/// A `data:` line carrying `turn_complete` with a text answer.
pub fn complete_line(turn_id: &str, answer: &str) -> String {
    let payload = json!({
        "event": {"payload": {
            "event_type": "turn_complete",
            "turn": {
                "turn_id": turn_id,
                "session_id": "s1",
                "output_message": {"role": "assistant", "content": answer, "stop_reason": "end_of_turn"}
            }
        }}
    });
    format!("data: {}", payload)
}

/// A `data:` line carrying `turn_awaiting_input` with the given tool calls.
pub fn awaiting_input_line(turn_id: &str, tool_calls: Value) -> String {
    let payload = json!({
        "event": {"payload": {
            "event_type": "turn_awaiting_input",
            "turn": {
                "turn_id": turn_id,
                "session_id": "s1",
                "steps": [{"step_type": "tool_execution", "step_id": "x1", "tool_calls": tool_calls}]
            }
        }}
    });
    format!("data: {}", payload)
}
