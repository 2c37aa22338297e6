//! A voice agent that joins a call, listens, thinks out loud with a
//! generation backend and answers with synthesized speech and an animated
//! avatar.
//!
//! ```text
//! recognizer ─▶ speech::RecognitionEventBridge ─▶ conversation::ConversationOrchestrator
//!                                                   │        ▲
//!                                                   │        └── knowledge, llm
//!                                                   ├──▶ skills ─▶ call chat
//!                                                   └──▶ audio::AudioOutputPacer ─▶ media sink
//!                                                              └─ playback events ─▶ video renderer
//! ```

pub mod audio;
pub mod call;
pub mod config;
pub mod conversation;
pub mod knowledge;
pub mod llm;
pub mod media;
pub mod skills;
pub mod speech;
pub mod video;
