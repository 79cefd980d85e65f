pub mod schema;

pub use schema::{Config, LoggingConfig, StorageConfig, APP_DIR_NAME, BLOB_TOKEN_ENV};

use anyhow::{bail, Context, Result};
use engage_core::MAX_PAUSE_SECS;
use follow_ledger::{BlobStore, DirBlobStore, HttpBlobStore, MissingBlob, RemoteSync};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::bot::BotConfig;

/// `~/.engagebot/config.toml`, if a home directory can be resolved.
pub fn default_config_path() -> Option<PathBuf> {
    directories::UserDirs::new().map(|dirs| dirs.home_dir().join(APP_DIR_NAME).join("config.toml"))
}

fn check_probability(name: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        bail!("{name} must be within [0, 1], got {value}");
    }
    Ok(())
}

fn check_pause(name: &str, min: f64, max: f64) -> Result<()> {
    if !(min.is_finite() && max.is_finite()) || min < 0.0 || min > max {
        bail!("{name} pause bounds must satisfy 0 <= min <= max, got {min}..{max}");
    }
    if max > MAX_PAUSE_SECS {
        bail!("{name} pause_max_secs must not exceed {MAX_PAUSE_SECS}, got {max}");
    }
    Ok(())
}

impl Config {
    pub fn load_from_file(path: &str) -> Result<Self> {
        let expanded_path = shellexpand::tilde(path);
        let content = fs::read_to_string(expanded_path.as_ref())
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml(&content)
    }

    /// Parse TOML and apply environment fallbacks.
    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(content).with_context(|| "Failed to parse TOML config")?;

        if config.storage.token.is_none() {
            if let Ok(token) = std::env::var(BLOB_TOKEN_ENV) {
                config.storage.token = Some(token);
            }
        }

        Ok(config)
    }

    pub fn expand_paths(&mut self) {
        self.storage.local_bucket_dir = shellexpand::tilde(&self.storage.local_bucket_dir).to_string();
        if let Some(tmp) = &self.storage.tmp_dir {
            self.storage.tmp_dir = Some(shellexpand::tilde(tmp).to_string());
        }
    }

    pub fn validate(&self) -> Result<()> {
        let storage = &self.storage;
        if storage.bucket.trim().is_empty() {
            bail!("storage.bucket must not be empty");
        }
        if let Some(endpoint) = &storage.endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                bail!("storage.endpoint must start with http:// or https://");
            }
        }
        if storage.history_file.is_empty() || storage.history_file.contains(['/', '\\']) {
            bail!("storage.history_file must be a plain file name: {:?}", storage.history_file);
        }
        if storage.timeout_secs == 0 {
            bail!("storage.timeout_secs must be positive");
        }
        storage.file_mode_bits()?;

        let follow = &self.follow;
        check_probability("follow.do_nothing_probability", follow.do_nothing_probability)?;
        check_probability("follow.follow_probability", follow.follow_probability)?;
        check_probability("follow.comment_probability", follow.comment_probability)?;
        check_probability("follow.favorite_probability", follow.favorite_probability)?;
        check_probability("follow.repost_probability", follow.repost_probability)?;
        check_pause("follow", follow.pause_min_secs, follow.pause_max_secs)?;
        if follow.hashtag_sets.is_empty() || follow.hashtag_sets.iter().any(|set| set.is_empty()) {
            bail!("follow.hashtag_sets must contain at least one non-empty set");
        }
        if follow.search_count == 0 {
            bail!("follow.search_count must be positive");
        }

        let unfollow = &self.unfollow;
        check_probability("unfollow.do_nothing_probability", unfollow.do_nothing_probability)?;
        check_pause("unfollow", unfollow.pause_min_secs, unfollow.pause_max_secs)?;
        if unfollow.min_batch > unfollow.max_batch {
            bail!(
                "unfollow.min_batch ({}) must not exceed unfollow.max_batch ({})",
                unfollow.min_batch,
                unfollow.max_batch
            );
        }

        for (name, curve) in self.scoring.curves() {
            if !curve.is_valid() {
                bail!(
                    "scoring.{name} needs finite values and max_score >= 0, got {:?}",
                    curve
                );
            }
        }

        for article in &self.articles {
            if article.url.trim().is_empty() {
                bail!("article {:?} has no url", article.id);
            }
        }

        Ok(())
    }

    pub fn bot_config(&self) -> BotConfig {
        BotConfig {
            history_file: self.storage.history_file.clone(),
            history_folder: self.storage.history_folder.clone(),
            missing_history: self.storage.missing_blob(),
            follow: self.follow.clone(),
            unfollow: self.unfollow.clone(),
            scoring: self.scoring,
            articles: self.articles.clone(),
        }
    }
}

impl StorageConfig {
    /// Parsed `file_mode`, accepting `"644"`, `"0644"` and `"0o644"`.
    pub fn file_mode_bits(&self) -> Result<Option<u32>> {
        let Some(raw) = &self.file_mode else {
            return Ok(None);
        };
        let digits = raw.trim().trim_start_matches("0o");
        let mode = u32::from_str_radix(digits, 8)
            .with_context(|| format!("storage.file_mode is not an octal number: {raw:?}"))?;
        if mode > 0o7777 {
            bail!("storage.file_mode out of range: {raw:?}");
        }
        Ok(Some(mode))
    }

    pub fn tmp_dir_path(&self) -> PathBuf {
        self.tmp_dir
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir)
    }

    pub fn missing_blob(&self) -> MissingBlob {
        if self.create_if_missing {
            MissingBlob::StartEmpty
        } else {
            MissingBlob::Fail
        }
    }

    /// HTTP store when an endpoint is configured, local directory otherwise.
    pub fn blob_store(&self) -> Result<Box<dyn BlobStore>> {
        match &self.endpoint {
            Some(endpoint) => {
                let store = HttpBlobStore::new(
                    endpoint.clone(),
                    self.bucket.clone(),
                    Duration::from_secs(self.timeout_secs),
                )
                .with_context(|| format!("Failed to create HTTP blob client for {endpoint}"))?
                .with_token(self.token.clone());
                Ok(Box::new(store))
            }
            None => Ok(Box::new(DirBlobStore::new(&self.local_bucket_dir))),
        }
    }

    pub fn remote_sync(&self) -> Result<RemoteSync<Box<dyn BlobStore>>> {
        let tmp_dir = self.tmp_dir_path();
        fs::create_dir_all(&tmp_dir)
            .with_context(|| format!("Failed to create temp dir {}", tmp_dir.display()))?;
        Ok(RemoteSync::new(self.blob_store()?, tmp_dir).with_file_mode(self.file_mode_bits()?))
    }
}
