//! The call's text chat.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("chat post failed: {0}")]
    Post(String),
}

/// Posts HTML messages to the call chat.
#[async_trait]
pub trait ChatPoster: Send + Sync {
    async fn post_html(&self, html: &str) -> Result<(), ChatError>;
}

/// Prints chat messages to stdout with the markup removed.
#[derive(Debug, Default)]
pub struct ConsoleChat;

impl ConsoleChat {
    pub fn new() -> Self {
        Self
    }
}

/// Render chat HTML as a single console line.
pub fn render_for_console(html: &str) -> String {
    crate::speech::strip_markup(html)
}

#[async_trait]
impl ChatPoster for ConsoleChat {
    async fn post_html(&self, html: &str) -> Result<(), ChatError> {
        println!("[chat] {}", render_for_console(html));
        Ok(())
    }
}
