//! Boundary to the social platform.
//!
//! No platform client ships with engagebot; runs receive any [`SocialApi`]
//! implementation and only see the value types below.

use chrono::{DateTime, Utc};
use engage_core::{PostSignals, UserSignals};
use follow_ledger::UserId;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("rate limited")]
    RateLimited { retry_after_secs: Option<u64> },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("rejected by platform: {0}")]
    Rejected(String),
    #[error("transport error: {0}")]
    Transport(String),
}

/// An account as returned by search and timeline queries.
#[derive(Debug, Clone, PartialEq)]
pub struct SocialUser {
    pub id: UserId,
    pub name: String,
    pub screen_name: String,
    pub followers_count: u64,
    /// Accounts this user follows.
    pub friends_count: u64,
    pub created_at: DateTime<Utc>,
    /// Whether the bot account already follows this user.
    pub following: bool,
}

impl SocialUser {
    pub fn signals(&self) -> UserSignals {
        UserSignals {
            friends_count: self.friends_count,
            followers_count: self.followers_count,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub id: String,
    pub author: SocialUser,
    pub text: String,
    /// Hashtags without the leading `#`.
    pub hashtags: Vec<String>,
    pub lang: Option<String>,
    pub favorite_count: u64,
    pub repost_count: u64,
    pub created_at: DateTime<Utc>,
    /// Whether the bot account already favorited this post.
    pub favorited: bool,
    pub is_repost: bool,
    pub in_reply_to: Option<String>,
}

impl Post {
    /// Neither a repost nor a reply.
    pub fn is_original(&self) -> bool {
        !self.is_repost && self.in_reply_to.is_none()
    }

    pub fn signals(&self) -> PostSignals {
        PostSignals {
            favorite_count: self.favorite_count,
            repost_count: self.repost_count,
            created_at: self.created_at,
        }
    }

    /// Case-insensitive match of any tag against the post's hashtags or text.
    pub fn mentions_any(&self, tags: &[String]) -> bool {
        let text = self.text.to_lowercase();
        tags.iter().map(|tag| tag.to_lowercase()).any(|tag| {
            text.contains(&tag) || self.hashtags.iter().any(|h| h.to_lowercase() == tag)
        })
    }

    pub fn lang_is(&self, lang: &str) -> bool {
        self.lang
            .as_deref()
            .is_some_and(|l| l.eq_ignore_ascii_case(lang))
    }
}

/// Operations the automation performs against the platform.
pub trait SocialApi {
    /// Most recent posts matching `query`, at most `count`.
    fn search_recent(&mut self, query: &str, lang: &str, count: usize) -> Result<Vec<Post>, ApiError>;
    fn user_timeline(&mut self, user: &UserId, count: usize) -> Result<Vec<Post>, ApiError>;
    fn follow(&mut self, user: &UserId) -> Result<(), ApiError>;
    fn unfollow(&mut self, user: &UserId) -> Result<(), ApiError>;
    fn reply(&mut self, post_id: &str, text: &str) -> Result<(), ApiError>;
    fn favorite(&mut self, post_id: &str) -> Result<(), ApiError>;
    fn repost(&mut self, post_id: &str) -> Result<(), ApiError>;
    /// Publish a status update, returning the new post id.
    fn publish(&mut self, text: &str) -> Result<String, ApiError>;
}
