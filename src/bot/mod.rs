//! Automation runs: follow, unfollow and article posting.
//!
//! Every run that touches the follow history goes through
//! [`Bot::with_history`], which pulls the ledger, hands it to the run and
//! pushes it back whether the run succeeded or not.

pub mod api;
pub mod follow;
pub mod post;
pub mod unfollow;

pub use api::{ApiError, Post, SocialApi, SocialUser};
pub use follow::{FollowConfig, FollowReport};
pub use post::{Article, Published};
pub use unfollow::{plan_unfollow, UnfollowConfig, UnfollowReport};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use engage_core::{Scheduler, ScoringProfile, Sleep, ThreadSleep};
use follow_ledger::{BlobStore, MissingBlob, RemoteSync, Store, DEFAULT_HISTORY_FILE, DEFAULT_HISTORY_FOLDER};
use rand::rngs::StdRng;
use rand::Rng;
use tracing::{error, info};

/// Everything a run needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub history_file: String,
    pub history_folder: String,
    pub missing_history: MissingBlob,
    pub follow: FollowConfig,
    pub unfollow: UnfollowConfig,
    pub scoring: ScoringProfile,
    pub articles: Vec<Article>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            history_file: DEFAULT_HISTORY_FILE.to_string(),
            history_folder: DEFAULT_HISTORY_FOLDER.to_string(),
            missing_history: MissingBlob::Fail,
            follow: FollowConfig::default(),
            unfollow: UnfollowConfig::default(),
            scoring: ScoringProfile::default(),
            articles: Vec::new(),
        }
    }
}

pub struct Bot<A, B, R = StdRng, S = ThreadSleep> {
    api: A,
    sync: RemoteSync<B>,
    scheduler: Scheduler<R, S>,
    config: BotConfig,
    clock: fn() -> DateTime<Utc>,
}

impl<A: SocialApi, B: BlobStore> Bot<A, B> {
    pub fn new(api: A, sync: RemoteSync<B>, config: BotConfig) -> Self {
        Self {
            api,
            sync,
            scheduler: Scheduler::new(),
            config,
            clock: Utc::now,
        }
    }
}

impl<A: SocialApi, B: BlobStore, R: Rng, S: Sleep> Bot<A, B, R, S> {
    pub fn with_scheduler<R2: Rng, S2: Sleep>(self, scheduler: Scheduler<R2, S2>) -> Bot<A, B, R2, S2> {
        Bot {
            api: self.api,
            sync: self.sync,
            scheduler,
            config: self.config,
            clock: self.clock,
        }
    }

    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn sync(&self) -> &RemoteSync<B> {
        &self.sync
    }

    pub fn scheduler(&self) -> &Scheduler<R, S> {
        &self.scheduler
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Pull the follow history, run `f` on it and push it back.
    ///
    /// The push happens on both paths. When `f` fails, a failing push is only
    /// logged and `f`'s error is returned.
    pub fn with_history<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self, &mut Store) -> Result<T>,
    {
        let mut store = self
            .sync
            .load_or_pull(
                &self.config.history_file,
                &self.config.history_folder,
                self.config.missing_history,
            )
            .context("Failed to pull follow history")?;

        match f(self, &mut store) {
            Ok(value) => {
                info!("Syncing follow history on ordinary termination");
                self.sync
                    .push(&store, &self.config.history_folder)
                    .context("Failed to push follow history")?;
                Ok(value)
            }
            Err(err) => {
                error!("Syncing follow history on error: {err:#}");
                if let Err(push_err) = self.sync.push(&store, &self.config.history_folder) {
                    error!("Follow history push after error failed: {push_err}");
                }
                Err(err)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::api::fake::{now, FakeApi};
    use super::*;
    use engage_core::RecordedSleep;
    use follow_ledger::{BlobError, DirBlobStore};
    use rand::SeedableRng;
    use std::cell::Cell;
    use std::path::Path;
    use tempfile::TempDir;

    pub type TestBot<B = DirBlobStore> = Bot<FakeApi, B, StdRng, RecordedSleep>;

    pub struct Harness {
        pub bucket: TempDir,
        pub tmp: TempDir,
    }

    impl Harness {
        pub fn new() -> Self {
            Self {
                bucket: TempDir::new().unwrap(),
                tmp: TempDir::new().unwrap(),
            }
        }

        pub fn remote_history(&self) -> std::path::PathBuf {
            self.bucket.path().join("history").join("following.json")
        }

        /// Seed the bucket with a JSON ledger.
        pub fn seed(&self, json: &str) {
            let path = self.remote_history();
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, json).unwrap();
        }

        pub fn bot(&self, api: FakeApi, config: BotConfig, seed: u64) -> TestBot {
            let sync = RemoteSync::new(DirBlobStore::new(self.bucket.path()), self.tmp.path());
            self.bot_with(api, sync, config, seed)
        }

        pub fn bot_with<B: BlobStore>(
            &self,
            api: FakeApi,
            sync: RemoteSync<B>,
            config: BotConfig,
            seed: u64,
        ) -> TestBot<B> {
            Bot::new(api, sync, config)
                .with_scheduler(Scheduler::from_parts(
                    StdRng::seed_from_u64(seed),
                    RecordedSleep::default(),
                ))
                .with_clock(now)
        }
    }

    /// Downloads from a directory, counts uploads and can refuse them.
    pub struct CountingBlobs {
        pub inner: DirBlobStore,
        pub uploads: Cell<usize>,
        pub fail_uploads: bool,
    }

    impl BlobStore for CountingBlobs {
        fn download(&self, key: &str, dest: &Path) -> Result<(), BlobError> {
            self.inner.download(key, dest)
        }

        fn upload(&self, src: &Path, key: &str) -> Result<(), BlobError> {
            self.uploads.set(self.uploads.get() + 1);
            if self.fail_uploads {
                return Err(BlobError::Transport("bucket unavailable".into()));
            }
            self.inner.upload(src, key)
        }
    }
}
