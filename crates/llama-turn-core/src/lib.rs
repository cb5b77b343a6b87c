//! Streaming agent-turn client for the Llama Stack API.
//!
//! The crate drives an agent turn against a remote Llama Stack server: it
//! opens the turn's server-sent event stream, reads it up to the terminal
//! event, resolves retrieval tool calls locally when the turn pauses for
//! input, and resumes the turn until it completes.
//!
//! # Architecture Overview
//!
//! - **Client** ([`client`]): the [`StackApi`] abstraction and its `reqwest` implementation
//! - **Event parsing** ([`sse`]): line-oriented SSE decoding with early exit on terminal events
//! - **Tool resolution** ([`resolver`]): RAG-backed answers for pending tool calls
//! - **Resume loop** ([`driver`]): the bounded, cancellable create/resume state machine
//! - **Observation** ([`observer`]): hooks for requests, events and state transitions
//! - **Configuration** ([`config`]): YAML configuration with environment overrides

pub mod client;
pub mod config;
pub mod driver;
pub mod errors;
pub mod observer;
pub mod resolver;
pub mod sse;

pub use client::{EventBody, LlamaStackClient, StackApi};
pub use config::*;
pub use driver::{TurnDriver, TurnOutcome, TurnState};
pub use errors::{LineError, TurnError};
pub use observer::{LogObserver, NoopObserver, TurnObserver, TurnRequest};
pub use resolver::{RagToolResolver, ToolResolver};
pub use sse::TurnEventReader;

pub use llama_turn_types as types;

#[cfg(test)]
pub mod test_utils;
