use std::collections::BTreeSet;

use anyhow::{Context, Result};
use engage_core::{rank_by, RunPolicy, Sleep};
use follow_ledger::{BlobStore, Store, UserId};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::api::{Post, SocialApi, SocialUser};
use super::Bot;

/// Knobs of the hashtag search, follow and engage run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FollowConfig {
    pub do_nothing_probability: f64,
    pub max_delay_secs: u64,
    /// Candidates to interact with before stopping.
    pub max_interactions: usize,
    pub search_count: usize,
    pub timeline_count: usize,
    pub language: String,
    pub follow_probability: f64,
    pub comment_probability: f64,
    pub favorite_probability: f64,
    pub repost_probability: f64,
    /// Posts per candidate that may receive an interaction.
    pub posts_per_user: usize,
    pub pause_min_secs: f64,
    pub pause_max_secs: f64,
    pub hashtag_sets: Vec<Vec<String>>,
    pub comments: Vec<String>,
}

impl FollowConfig {
    pub fn policy(&self) -> RunPolicy {
        RunPolicy::new(self.do_nothing_probability, self.max_delay_secs)
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for FollowConfig {
    fn default() -> Self {
        Self {
            do_nothing_probability: 0.6,
            max_delay_secs: 120,
            max_interactions: 10,
            search_count: 250,
            timeline_count: 20,
            language: "en".to_string(),
            follow_probability: 0.6,
            comment_probability: 0.05,
            favorite_probability: 0.5,
            repost_probability: 0.05,
            posts_per_user: 2,
            pause_min_secs: 2.0,
            pause_max_secs: 12.0,
            hashtag_sets: vec![
                strings(&["Python", "DataScience", "Machinelearning"]),
                strings(&["Python", "Keras"]),
                strings(&["Python", "DataScience"]),
                strings(&["Python", "Pandas"]),
                strings(&["Python", "PyTorch", "Machinelearning"]),
                strings(&["Python", "Scikitlearn"]),
                strings(&["Python", "Statistics"]),
            ],
            comments: strings(&[
                "Nice piece!",
                "Interesting",
                "👍",
                "I am going to read up on this",
                "Thanks for sharing!",
                "This is helpful",
                "Insightful",
                "thought-provoking",
                "Will check this out",
            ]),
        }
    }
}

/// What a follow run did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FollowReport {
    pub hashtags: Vec<String>,
    /// Distinct authors found by the search.
    pub candidates: usize,
    pub interacted: Vec<UserId>,
    pub followed: Vec<UserId>,
    pub replies: usize,
    pub favorites: usize,
    pub reposts: usize,
}

/// `#a AND #b AND ...`
pub fn search_query(hashtags: &[String]) -> String {
    hashtags
        .iter()
        .map(|tag| format!("#{tag}"))
        .collect::<Vec<_>>()
        .join(" AND ")
}

impl<A: SocialApi, B: BlobStore, R: Rng, S: Sleep> Bot<A, B, R, S> {
    /// Scheduled follow run. `None` when the scheduler skipped it.
    pub fn fetch_follow(&mut self) -> Result<Option<FollowReport>> {
        let policy = self.config.follow.policy();
        if !self.scheduler.gate(&policy) {
            return Ok(None);
        }
        self.run_follow().map(Some)
    }

    /// Follow run without the skip gate.
    pub fn run_follow(&mut self) -> Result<FollowReport> {
        let follow = self.config.follow.clone();
        let hashtags = self
            .scheduler
            .choose(&follow.hashtag_sets)
            .cloned()
            .context("No hashtag sets configured")?;

        let candidates = self.rank_candidates(&hashtags, &follow)?;
        info!("Found {} candidates for {}", candidates.len(), search_query(&hashtags));

        self.with_history(|bot, store| {
            let mut report = FollowReport {
                hashtags: hashtags.clone(),
                candidates: candidates.len(),
                ..FollowReport::default()
            };

            for (user, score) in &candidates {
                bot.scheduler
                    .pause_between(follow.pause_min_secs, follow.pause_max_secs);
                if store.contains(user.id.as_str()) {
                    continue;
                }

                info!("Interacting with {} (score {score:.2})", user.name);
                bot.interact_with_user(user, &hashtags, &follow, store, &mut report)?;
                report.interacted.push(user.id.clone());

                if report.interacted.len() >= follow.max_interactions {
                    break;
                }
            }

            Ok(report)
        })
    }

    /// Distinct authors of recent matching posts, best score first.
    fn rank_candidates(
        &mut self,
        hashtags: &[String],
        follow: &FollowConfig,
    ) -> Result<Vec<(SocialUser, f64)>> {
        let query = search_query(hashtags);
        let posts = self
            .api
            .search_recent(&query, &follow.language, follow.search_count)
            .with_context(|| format!("Search for {query:?} failed"))?;

        let mut seen = BTreeSet::new();
        let users: Vec<SocialUser> = posts
            .into_iter()
            .map(|post| post.author)
            .filter(|user| seen.insert(user.id.clone()))
            .collect();

        let now = self.now();
        let scoring = self.config.scoring;
        Ok(rank_by(users, |user| scoring.score_user(&user.signals(), now)))
    }

    fn interact_with_user(
        &mut self,
        user: &SocialUser,
        hashtags: &[String],
        follow: &FollowConfig,
        store: &mut Store,
        report: &mut FollowReport,
    ) -> Result<()> {
        if user.following {
            return Ok(());
        }

        if self.scheduler.chance(follow.follow_probability) {
            info!("Following {}", user.name);
            self.api.follow(&user.id)?;
            store.record_follow(user.id.clone(), self.now().naive_utc());
            report.followed.push(user.id.clone());
        }

        let now = self.now();
        let scoring = self.config.scoring;
        let timeline: Vec<Post> = self
            .api
            .user_timeline(&user.id, follow.timeline_count)?
            .into_iter()
            .filter(Post::is_original)
            .collect();
        let ranked = rank_by(timeline, |post| scoring.score_post(&post.signals(), now));

        let mut engaged = 0;
        for (post, _) in &ranked {
            if post.mentions_any(hashtags) && self.engage_with_post(user, post, follow, report)? {
                engaged += 1;
            }
            if engaged >= follow.posts_per_user {
                break;
            }
        }

        Ok(())
    }

    /// Maybe reply, favorite and repost. Returns whether anything happened.
    fn engage_with_post(
        &mut self,
        user: &SocialUser,
        post: &Post,
        follow: &FollowConfig,
        report: &mut FollowReport,
    ) -> Result<bool> {
        let mut engaged = false;

        if self.scheduler.chance(follow.comment_probability) {
            if let Some(comment) = self.scheduler.choose(&follow.comments) {
                let text = format!("@{} {comment}", user.screen_name);
                info!("Commenting: {} with: {text}", post.id);
                self.api.reply(&post.id, &text)?;
                self.scheduler.pause_between(0.0, 0.5);
                report.replies += 1;
                engaged = true;
            }
        }

        if !post.favorited
            && self.scheduler.chance(follow.favorite_probability)
            && post.lang_is(&follow.language)
        {
            info!("Hearting: {} with text: {}", post.id, post.text);
            self.api.favorite(&post.id)?;
            self.scheduler.pause_between(0.0, 5.0);
            report.favorites += 1;
            engaged = true;
        }

        if self.scheduler.chance(follow.repost_probability) {
            info!("Reposting: {}", post.id);
            self.api.repost(&post.id)?;
            self.scheduler.pause_between(0.0, 1.0);
            report.reposts += 1;
            engaged = true;
        }

        Ok(engaged)
    }
}
