use anyhow::Result;
use engage_core::{RunPolicy, Sleep};
use follow_ledger::{BlobStore, Store, UserId};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::api::SocialApi;
use super::Bot;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnfollowConfig {
    pub do_nothing_probability: f64,
    pub max_delay_secs: u64,
    /// Inclusive bounds of the number of accounts dropped per run.
    pub min_batch: usize,
    pub max_batch: usize,
    pub pause_min_secs: f64,
    pub pause_max_secs: f64,
}

impl UnfollowConfig {
    pub fn policy(&self) -> RunPolicy {
        RunPolicy::new(self.do_nothing_probability, self.max_delay_secs)
    }
}

impl Default for UnfollowConfig {
    fn default() -> Self {
        Self {
            do_nothing_probability: 0.67,
            max_delay_secs: 120,
            min_batch: 1,
            max_batch: 4,
            pause_min_secs: 2.0,
            pause_max_secs: 8.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnfollowReport {
    pub unfollowed: Vec<UserId>,
    pub failed: Vec<UserId>,
}

/// The `count` longest-followed accounts that are still followed, oldest
/// first. Ties keep id order.
pub fn plan_unfollow(store: &Store, count: usize) -> Vec<UserId> {
    let mut active: Vec<_> = store.active().collect();
    active.sort_by_key(|(_, record)| record.followed_at);
    active
        .into_iter()
        .take(count)
        .map(|(id, _)| id.clone())
        .collect()
}

impl<A: SocialApi, B: BlobStore, R: Rng, S: Sleep> Bot<A, B, R, S> {
    /// Scheduled unfollow run. `None` when the scheduler skipped it.
    pub fn unfollow(&mut self) -> Result<Option<UnfollowReport>> {
        let policy = self.config.unfollow.policy();
        if !self.scheduler.gate(&policy) {
            return Ok(None);
        }
        self.run_unfollow().map(Some)
    }

    /// Unfollow run without the skip gate.
    ///
    /// A failing unfollow call is logged and the account stays active in the
    /// history, so a later run retries it.
    pub fn run_unfollow(&mut self) -> Result<UnfollowReport> {
        let settings = self.config.unfollow.clone();

        self.with_history(|bot, store| {
            let count = bot
                .scheduler
                .count_between(settings.min_batch, settings.max_batch);
            let mut report = UnfollowReport::default();

            for id in plan_unfollow(store, count) {
                match bot.api.unfollow(&id) {
                    Ok(()) => {
                        store.record_unfollow(id.as_str(), bot.now().naive_utc());
                        info!("Unfollowing: {id}");
                        report.unfollowed.push(id);
                    }
                    Err(e) => {
                        error!("Unfollowing: {id} did not work with error {e}");
                        report.failed.push(id);
                    }
                }
                bot.scheduler
                    .pause_between(settings.pause_min_secs, settings.pause_max_secs);
            }

            Ok(report)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::api::fake::{Call, FakeApi};
    use super::super::testing::Harness;
    use super::super::BotConfig;
    use super::*;
    use follow_ledger::Format;

    const HISTORY: &str = r#"{
        "old": {"followed_at": "2024-01-01T00:00:00"},
        "gone": {"followed_at": "2023-06-01T00:00:00", "unfollowed_at": "2023-07-01T00:00:00"},
        "mid": {"followed_at": "2024-02-01T00:00:00"},
        "new": {"followed_at": "2024-03-01T00:00:00"}
    }"#;

    fn batch_of(n: usize) -> BotConfig {
        BotConfig {
            unfollow: UnfollowConfig {
                do_nothing_probability: 0.0,
                max_delay_secs: 0,
                min_batch: n,
                max_batch: n,
                ..UnfollowConfig::default()
            },
            ..BotConfig::default()
        }
    }

    #[test]
    fn plan_orders_by_follow_date_and_skips_inactive() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("following.json");
        std::fs::write(&path, HISTORY).unwrap();
        let store = Store::load(&path, Format::Json).unwrap();

        assert_eq!(plan_unfollow(&store, 2), vec![UserId::from("old"), UserId::from("mid")]);
        assert_eq!(plan_unfollow(&store, 10).len(), 3);
        assert!(plan_unfollow(&store, 0).is_empty());
    }

    #[test]
    fn unfollows_oldest_and_records_time() {
        let h = Harness::new();
        h.seed(HISTORY);
        let mut bot = h.bot(FakeApi::default(), batch_of(2), 4);

        let report = bot.unfollow().unwrap().unwrap();

        assert_eq!(report.unfollowed, vec![UserId::from("old"), UserId::from("mid")]);
        // gate delay plus one pause per account
        assert_eq!(bot.scheduler().sleeper().delays.len(), 3);

        let store = Store::load(h.remote_history(), Format::Json).unwrap();
        let old = store.get("old").unwrap();
        assert_eq!(old.followed_at.to_string(), "2024-01-01 00:00:00");
        assert_eq!(old.unfollowed_at.unwrap().to_string(), "2024-06-01 12:00:00");
        assert!(store.get("new").unwrap().is_active());
    }

    #[test]
    fn per_user_failures_are_skipped() {
        let h = Harness::new();
        h.seed(HISTORY);
        let mut api = FakeApi::default();
        api.failing_unfollows.insert("old".into());
        let mut bot = h.bot(api, batch_of(3), 4);

        let report = bot.run_unfollow().unwrap();

        assert_eq!(report.failed, vec![UserId::from("old")]);
        assert_eq!(report.unfollowed, vec![UserId::from("mid"), UserId::from("new")]);
        assert_eq!(bot.api().count(|c| matches!(c, Call::Unfollow(_))), 3);

        let store = Store::load(h.remote_history(), Format::Json).unwrap();
        assert!(store.get("old").unwrap().is_active());
        assert!(!store.get("new").unwrap().is_active());
    }

    #[test]
    fn batch_size_stays_within_bounds() {
        for seed in 0..16 {
            let h = Harness::new();
            h.seed(HISTORY);
            let config = BotConfig {
                unfollow: UnfollowConfig {
                    do_nothing_probability: 0.0,
                    max_delay_secs: 0,
                    min_batch: 1,
                    max_batch: 2,
                    ..UnfollowConfig::default()
                },
                ..BotConfig::default()
            };
            let mut bot = h.bot(FakeApi::default(), config, seed);
            let n = bot.run_unfollow().unwrap().unfollowed.len();
            assert!((1..=2).contains(&n));
        }
    }
}
