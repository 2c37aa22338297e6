use async_trait::async_trait;

use super::{KnowledgeError, KnowledgeSource};

/// Answers every query with the current local date and time, so the agent
/// can talk about "today" without a tool call.
#[derive(Debug, Default)]
pub struct MetadataKnowledgeSource;

impl MetadataKnowledgeSource {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl KnowledgeSource for MetadataKnowledgeSource {
    fn name(&self) -> &str {
        "metadata"
    }

    async fn query(&self, _text: &str) -> Result<String, KnowledgeError> {
        let now = chrono::Local::now();
        Ok(format!("Today's date: {}", now.format("%A, %-d %B %Y %H:%M %Z")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn answers_with_todays_date() {
        let source = MetadataKnowledgeSource::new();
        assert_eq!(source.name(), "metadata");

        let answer = source.query("what day is it?").await.unwrap();
        let year = chrono::Local::now().format("%Y").to_string();
        assert!(answer.starts_with("Today's date: "));
        assert!(answer.contains(&year));
    }
}
