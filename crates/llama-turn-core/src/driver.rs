//! The resume loop driving one agent turn to completion
//!
//! A turn starts with a create request. Each response body is read up to its
//! terminal event: `turn_complete` ends the loop with the answer, while
//! `turn_awaiting_input` hands the pending tool calls to the resolver and
//! resumes the same turn with the responses. Requests are strictly
//! sequential and the number of rounds is bounded.

use std::future::Future;
use std::sync::Arc;

use llama_turn_types::{
    Message, TerminalKind, Turn, TurnCreateRequest, TurnResumeRequest,
};
use tokio_util::sync::CancellationToken;

use crate::client::{EventBody, StackApi};
use crate::config::LlamaTurnConfig;
use crate::errors::{Result, TurnError};
use crate::observer::{LogObserver, TurnObserver, TurnRequest};
use crate::resolver::{RagToolResolver, ToolResolver};
use crate::sse::TurnEventReader;

/// Default bound on create/resume requests per turn.
pub const DEFAULT_MAX_ROUNDS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Initiating,
    AwaitingEvent,
    AwaitingInput,
    Completed,
    Failed,
}

/// Result of a turn driven to completion.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Snapshot carried by the `turn_complete` event.
    pub turn: Turn,
    /// The output message flattened to text; empty when the turn has none.
    pub answer: String,
    /// Number of create/resume requests issued.
    pub rounds: u32,
    /// Total tool responses sent across all resumes.
    pub tool_responses_sent: usize,
}

/// Where the next request of the loop goes.
enum NextRequest {
    Create(TurnCreateRequest),
    Resume {
        turn_id: String,
        request: TurnResumeRequest,
    },
}

pub struct TurnDriver {
    api: Arc<dyn StackApi>,
    resolver: Arc<dyn ToolResolver>,
    observer: Arc<dyn TurnObserver>,
    max_rounds: u32,
}

impl TurnDriver {
    pub fn new(api: Arc<dyn StackApi>, resolver: Arc<dyn ToolResolver>) -> Self {
        Self {
            api,
            resolver,
            observer: Arc::new(LogObserver),
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }

    /// A driver resolving retrieval calls as described by `config`.
    pub fn from_config(api: Arc<dyn StackApi>, config: &LlamaTurnConfig) -> Self {
        let resolver = RagToolResolver::from_config(api.clone(), &config.rag);
        Self::new(api, Arc::new(resolver)).with_max_rounds(config.turn.max_rounds)
    }

    pub fn with_observer(mut self, observer: Arc<dyn TurnObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn max_rounds(&self) -> u32 {
        self.max_rounds
    }

    /// Drive a turn started with `messages` until it completes.
    pub async fn run_turn(
        &self,
        agent_id: &str,
        session_id: &str,
        messages: Vec<Message>,
    ) -> Result<TurnOutcome> {
        self.run_turn_with_cancel(agent_id, session_id, messages, &CancellationToken::new())
            .await
    }

    /// Like [`run_turn`](Self::run_turn), aborting with
    /// [`TurnError::Cancelled`] as soon as `cancel` fires.
    pub async fn run_turn_with_cancel(
        &self,
        agent_id: &str,
        session_id: &str,
        messages: Vec<Message>,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome> {
        self.run_request_with_cancel(
            agent_id,
            session_id,
            TurnCreateRequest::streaming(messages),
            cancel,
        )
        .await
    }

    /// Drive a turn from a fully specified create request.
    pub async fn run_request_with_cancel(
        &self,
        agent_id: &str,
        session_id: &str,
        mut request: TurnCreateRequest,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome> {
        request.stream = true;
        let mut state = TurnState::Initiating;

        match self
            .drive(agent_id, session_id, request, cancel, &mut state)
            .await
        {
            Ok(outcome) => {
                self.transition(&mut state, TurnState::Completed);
                Ok(outcome)
            }
            Err(e) => {
                self.transition(&mut state, TurnState::Failed);
                log::error!("Turn failed: {}", e);
                Err(e)
            }
        }
    }

    async fn drive(
        &self,
        agent_id: &str,
        session_id: &str,
        request: TurnCreateRequest,
        cancel: &CancellationToken,
        state: &mut TurnState,
    ) -> Result<TurnOutcome> {
        let mut next = NextRequest::Create(request);
        let mut rounds = 0u32;
        let mut tool_responses_sent = 0usize;

        loop {
            if rounds >= self.max_rounds {
                return Err(TurnError::MaxRoundsExceeded {
                    max_rounds: self.max_rounds,
                });
            }
            rounds += 1;

            self.transition(state, TurnState::AwaitingEvent);
            let body = until_cancelled(cancel, self.send(agent_id, session_id, rounds, &next)).await?;

            let mut reader = TurnEventReader::new(body).with_observer(self.observer.clone());
            let (kind, turn) = until_cancelled(cancel, reader.read_to_terminal()).await?;
            drop(reader);

            match kind {
                TerminalKind::Complete => {
                    let answer = turn.answer().unwrap_or_else(|| {
                        log::warn!("Turn {} completed without an output message", turn.turn_id);
                        String::new()
                    });
                    return Ok(TurnOutcome {
                        turn,
                        answer,
                        rounds,
                        tool_responses_sent,
                    });
                }
                TerminalKind::AwaitingInput => {
                    self.transition(state, TurnState::AwaitingInput);

                    let calls = turn.pending_tool_calls();
                    if calls.is_empty() {
                        return Err(TurnError::NoToolCalls {
                            turn_id: turn.turn_id,
                        });
                    }

                    let responses = until_cancelled(cancel, self.resolver.resolve(&calls)).await?;
                    if responses.is_empty() {
                        return Err(TurnError::NoToolResponses {
                            turn_id: turn.turn_id,
                        });
                    }

                    tool_responses_sent += responses.len();
                    next = NextRequest::Resume {
                        turn_id: turn.turn_id,
                        request: TurnResumeRequest::streaming(responses),
                    };
                }
            }
        }
    }

    async fn send(
        &self,
        agent_id: &str,
        session_id: &str,
        round: u32,
        next: &NextRequest,
    ) -> Result<EventBody> {
        match next {
            NextRequest::Create(request) => {
                self.observer.on_request(
                    round,
                    &TurnRequest::Create {
                        agent_id: agent_id.to_string(),
                        session_id: session_id.to_string(),
                    },
                );
                self.api.create_turn(agent_id, session_id, request).await
            }
            NextRequest::Resume { turn_id, request } => {
                self.observer.on_request(
                    round,
                    &TurnRequest::Resume {
                        turn_id: turn_id.clone(),
                        tool_responses: request.tool_responses.len(),
                    },
                );
                self.api
                    .resume_turn(agent_id, session_id, turn_id, request)
                    .await
            }
        }
    }

    fn transition(&self, state: &mut TurnState, to: TurnState) {
        let from = *state;
        if from != to {
            *state = to;
            self.observer.on_transition(from, to);
        }
    }
}

/// Await `future` unless `cancel` fires first, in which case the future is dropped.
async fn until_cancelled<F, T>(cancel: &CancellationToken, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(TurnError::Cancelled),
        result = future => result,
    }
}
