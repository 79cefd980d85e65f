use anyhow::{Context, Result};
use engage_core::Sleep;
use follow_ledger::BlobStore;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::api::SocialApi;
use super::Bot;

/// A promotable article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub text: String,
}

impl Article {
    /// `"{text} #tag1 #tag2 {url}"` using the first `tag_count` tags.
    pub fn compose(&self, tag_count: usize) -> String {
        let tags = self
            .tags
            .iter()
            .take(tag_count)
            .map(|tag| format!("#{tag}"));
        std::iter::once(self.text.clone())
            .chain(tags)
            .chain(std::iter::once(self.url.clone()))
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A published article and the id the platform assigned to the post.
#[derive(Debug, Clone, PartialEq)]
pub struct Published {
    pub article_id: String,
    pub post_id: String,
    pub text: String,
}

impl<A: SocialApi, B: BlobStore, R: Rng, S: Sleep> Bot<A, B, R, S> {
    /// Publish a randomly chosen article with a random prefix of its tags.
    /// `None` when no articles are configured.
    pub fn post_random_article(&mut self) -> Result<Option<Published>> {
        let Some(article) = self.scheduler.choose(&self.config.articles).cloned() else {
            warn!("No articles configured, nothing to post");
            return Ok(None);
        };

        let tag_count = self.scheduler.count_between(1, article.tags.len());
        let text = article.compose(tag_count);
        info!("Posting: {} ({text})", article.id);
        let post_id = self
            .api
            .publish(&text)
            .with_context(|| format!("Failed to publish article {}", article.id))?;

        Ok(Some(Published {
            article_id: article.id,
            post_id,
            text,
        }))
    }
}
