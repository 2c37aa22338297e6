//! Conversation control: turning utterances into generation requests and
//! responses into speech, skills or silence.
//!
//! # Layout
//!
//! ```text
//! conversation/
//! ├── response.rs      — control tokens and skill triggers
//! ├── state.rs         — filler / apology escalation while a request stalls
//! └── orchestrator.rs  — the tick loop that owns history and the outstanding request
//! ```

pub mod orchestrator;
pub mod response;
pub mod state;

pub use orchestrator::{Collaborators, ConversationEnd, ConversationOrchestrator};
pub use response::{ResponseAction, EXIT_TOKEN, LISTENING_TOKEN};
pub use state::{StallState, StallStep};
