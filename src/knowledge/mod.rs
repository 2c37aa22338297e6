//! Knowledge collaborators and the budgeted retrieved-context window.
//!
//! * [`KnowledgeSource`] — named source queried once per user utterance.
//! * [`MetadataKnowledgeSource`] — answers with the current date and time.
//! * [`RetrievedItem`] — one timestamped answer.
//! * [`ContextWindow`] — recency-ordered working set rendered under a
//!   character budget.

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::Instant;

pub mod context;
pub mod metadata;

pub use context::{ContextWindow, SEPARATOR};
pub use metadata::MetadataKnowledgeSource;

#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("knowledge request failed: {0}")]
    Request(String),
}

/// A source of background text for the generation backend.
///
/// Queries carry no cancellation; the caller bounds them with a timeout.
#[async_trait]
pub trait KnowledgeSource: Send + Sync {
    fn name(&self) -> &str;

    async fn query(&self, text: &str) -> Result<String, KnowledgeError>;
}

/// One knowledge answer, tagged with the arrival time of the utterance it
/// answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievedItem {
    pub retrieved_at: Instant,
    pub text: String,
}

impl RetrievedItem {
    pub fn new(retrieved_at: Instant, text: impl Into<String>) -> Self {
        Self {
            retrieved_at,
            text: text.into(),
        }
    }
}
