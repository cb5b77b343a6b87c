//! Wire types for the Llama Stack agent turn, retrieval and chat APIs
//!
//! This crate holds the serde contract between the `llama-turn` client and a
//! Llama Stack server. Payloads from the server are decoded leniently: every
//! optional field defaults, unknown step and content types decode to an
//! `Other`/`Unsupported` variant, and loosely typed values (tool arguments,
//! message content, retrieval content) are modelled as untagged unions.
//!
//! ## Example
//!
//! ```rust
//! use llama_turn_types::{StreamEvent, TerminalKind};
//!
//! let line = r#"{"event":{"payload":{"event_type":"turn_complete","turn":{"turn_id":"t1","output_message":{"role":"assistant","content":"Dora is a Pug."}}}}}"#;
//! let event = StreamEvent::from_data(line).unwrap();
//!
//! assert_eq!(event.terminal_kind(), Some(TerminalKind::Complete));
//! ```

pub mod events;
pub mod requests;
pub mod turn;
pub mod types;

pub use events::*;
pub use requests::*;
pub use turn::*;
pub use types::*;
