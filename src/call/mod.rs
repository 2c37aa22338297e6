//! The call: its text chat and the session that ties every subsystem
//! together for one meeting.

pub mod chat;
pub mod session;

pub use chat::{render_for_console, ChatError, ChatPoster, ConsoleChat};
pub use session::{CallServices, CallSession, SessionError};
