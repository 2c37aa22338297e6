//! Conversation history entries.

/// Who a [`Turn`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Persona and instructions.  Always the first turn of a history.
    System,
    User,
    Assistant,
    /// Knowledge snippets injected ahead of the latest user turn.
    RetrievedContext,
}

impl Role {
    /// Wire name used by OpenAI-compatible chat APIs.
    ///
    /// Retrieved context has no role of its own and travels as a system
    /// message.
    pub fn wire_name(self) -> &'static str {
        match self {
            Role::System | Role::RetrievedContext => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One message of the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    pub fn retrieved(text: impl Into<String>) -> Self {
        Self::new(Role::RetrievedContext, text)
    }
}
