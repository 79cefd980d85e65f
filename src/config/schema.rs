//! engagebot configuration types.

use engage_core::ScoringProfile;
use serde::{Deserialize, Serialize};

use crate::bot::{Article, FollowConfig, UnfollowConfig};

/// Default config directory name under `$HOME`.
pub const APP_DIR_NAME: &str = ".engagebot";

/// Environment variable consulted when `storage.token` is unset.
pub const BLOB_TOKEN_ENV: &str = "ENGAGEBOT_BLOB_TOKEN";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub follow: FollowConfig,
    #[serde(default)]
    pub unfollow: UnfollowConfig,
    #[serde(default)]
    pub scoring: ScoringProfile,
    #[serde(default)]
    pub articles: Vec<Article>,
}

// ── Storage ─────────────────────────────────────────────────────

/// Where the follow history lives locally and remotely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_bucket")]
    pub bucket: String,
    /// HTTP blob endpoint. When absent the bucket is `local_bucket_dir`.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_local_bucket_dir")]
    pub local_bucket_dir: String,
    /// Working directory for the downloaded ledger. Defaults to the system
    /// temp dir.
    #[serde(default)]
    pub tmp_dir: Option<String>,
    #[serde(default = "default_history_folder")]
    pub history_folder: String,
    #[serde(default = "default_history_file")]
    pub history_file: String,
    /// Start an empty history when the remote one does not exist yet.
    #[serde(default)]
    pub create_if_missing: bool,
    /// Octal permission bits for committed ledger files, e.g. `"644"`.
    #[serde(default)]
    pub file_mode: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Bearer token for the HTTP endpoint. Can also be set via
    /// ENGAGEBOT_BLOB_TOKEN.
    #[serde(default)]
    pub token: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: default_bucket(),
            endpoint: None,
            local_bucket_dir: default_local_bucket_dir(),
            tmp_dir: None,
            history_folder: default_history_folder(),
            history_file: default_history_file(),
            create_if_missing: false,
            file_mode: None,
            timeout_secs: default_timeout_secs(),
            token: None,
        }
    }
}

fn default_bucket() -> String {
    "fb-twitterbot".into()
}
fn default_local_bucket_dir() -> String {
    format!("~/{APP_DIR_NAME}/bucket")
}
fn default_history_folder() -> String {
    follow_ledger::DEFAULT_HISTORY_FOLDER.into()
}
fn default_history_file() -> String {
    follow_ledger::DEFAULT_HISTORY_FILE.into()
}
fn default_timeout_secs() -> u64 {
    30
}

// ── Logging ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// error | warn | info | debug | trace. `RUST_LOG` takes precedence.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}
