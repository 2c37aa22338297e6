//! `[LINKSEARCH]`: look something up in the documentation search API and
//! drop the top hit into the chat.

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::SkillsConfig;
use crate::llm::escape_xml;

use super::{Skill, SkillContext, SkillError};

#[derive(Debug, Deserialize)]
struct SearchResults {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub description: String,
}

pub struct LinkSearchSkill {
    client: reqwest::Client,
    endpoint: String,
}

impl LinkSearchSkill {
    pub fn from_config(config: &SkillsConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            endpoint: config.link_search_url.clone(),
        }
    }

    async fn top_hit(&self, query: &str) -> Result<Option<SearchHit>, SkillError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("search", query),
                ("locale", "en-us"),
                ("$top", "1"),
                ("expandScope", "true"),
                ("partnerId", "LearnSite"),
            ])
            .send()
            .await?
            .error_for_status()?;
        let body: SearchResults = response
            .json()
            .await
            .map_err(|e| SkillError::Request(e.to_string()))?;
        Ok(body.results.into_iter().next())
    }
}

/// Chat HTML for one search hit.
pub fn render_hit(hit: &SearchHit) -> String {
    format!(
        "<p><a href=\"{}\"><b>{}</b></a></p><p>{}</p>",
        escape_xml(&hit.url),
        escape_xml(&hit.title),
        escape_xml(&hit.description)
    )
}

#[async_trait]
impl Skill for LinkSearchSkill {
    fn name(&self) -> &str {
        "LINKSEARCH"
    }

    fn description(&self) -> &str {
        "followed by a search query when the user asks you to search for a link in Azure or Microsoft Documentation."
    }

    async fn invoke(&self, input: &str, ctx: &SkillContext) -> Result<(), SkillError> {
        ctx.ack_speak("").await?;

        let Some(hit) = self.top_hit(input).await? else {
            log::info!("link-search: no results for {input:?}");
            return Ok(());
        };
        log::info!("link-search: {input:?} -> {}", hit.url);
        ctx.post_chat(&render_hit(&hit)).await
    }
}
