//! Generation backend and persona.
//!
//! This module provides:
//! * [`Turn`] / [`Role`] — conversation history entries.
//! * [`ChatBackend`] — async trait for chat completion, embeddings and
//!   warm-up, all cancellable.
//! * [`ApiBackend`] — OpenAI-compatible REST implementation.
//! * [`Personality`] — agent name, welcome message, system prompt, SSML.
//! * [`LlmError`] — error variants, with [`LlmError::Cancelled`] kept apart
//!   from real failures.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use tokio_util::sync::CancellationToken;
//! use voice_call_agent::config::AppConfig;
//! use voice_call_agent::llm::{ApiBackend, ChatBackend, Turn};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let backend = ApiBackend::from_config(&config.llm);
//!     let cancel = CancellationToken::new();
//!
//!     let history = vec![Turn::system("Be brief."), Turn::user("What's a haiku?")];
//!     let reply = backend.complete_chat(&history, &cancel).await.unwrap();
//!     println!("{}", reply.text);
//! }
//! ```

pub mod backend;
pub mod persona;
pub mod turn;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use backend::{to_wire_messages, ApiBackend, ChatBackend, LlmError, RETRIEVED_CONTEXT_PREFIX};
pub use persona::{escape_xml, Personality, SkillSummary, DEFAULT_AGENT_NAME};
pub use turn::{Role, Turn};
