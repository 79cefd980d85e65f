//! CLI subcommands for operating the follow history.
//!
//! Provides `engagebot show`, `stats`, `pull`, `push`, `convert` and
//! `plan-unfollow` against the configured bucket.

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use follow_ledger::{Format, OpenMode, Record, Store, StoreOptions, UserId};
use std::path::{Path, PathBuf};

use crate::bot::plan_unfollow;
use crate::config::{Config, StorageConfig};

#[derive(Subcommand, Debug)]
pub enum LedgerCommands {
    /// Print every history entry
    Show {
        /// Only accounts that are still followed
        #[arg(long)]
        active: bool,
    },
    /// Summarize the history
    Stats,
    /// Download the history into the temp directory
    Pull,
    /// Upload the local history (or another file) to the bucket
    Push {
        /// File to upload instead of the local history copy
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Re-encode a history file in another format
    Convert {
        input: PathBuf,
        output: PathBuf,
        /// binary, json or tabular
        #[arg(short, long, default_value = "json")]
        format: Format,
    },
    /// List the accounts the next unfollow run would drop
    PlanUnfollow {
        #[arg(short, long, default_value_t = 4)]
        count: usize,
    },
}

/// Aggregate view of a history.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryStats {
    pub total: usize,
    pub active: usize,
    pub unfollowed: usize,
    pub oldest_active: Option<chrono::NaiveDateTime>,
    pub newest_follow: Option<chrono::NaiveDateTime>,
}

pub fn history_stats(store: &Store) -> HistoryStats {
    let mut stats = HistoryStats {
        total: store.len(),
        ..HistoryStats::default()
    };
    for (_, record) in store {
        if record.is_active() {
            stats.active += 1;
            stats.oldest_active = Some(match stats.oldest_active {
                Some(t) => t.min(record.followed_at),
                None => record.followed_at,
            });
        } else {
            stats.unfollowed += 1;
        }
        stats.newest_follow = Some(match stats.newest_follow {
            Some(t) => t.max(record.followed_at),
            None => record.followed_at,
        });
    }
    stats
}

fn format_entry(id: &UserId, record: &Record) -> String {
    match record.unfollowed_at {
        Some(at) => format!("  {id}: followed {} unfollowed {at}", record.followed_at),
        None => format!("  {id}: followed {}", record.followed_at),
    }
}

/// Re-encode `input` (any format) into `output` as `format`.
pub fn convert(input: &Path, output: &Path, format: Format) -> Result<Store> {
    if !input.exists() {
        bail!("Input file does not exist: {}", input.display());
    }
    let source = Store::open(input, StoreOptions::default().with_mode(OpenMode::ReadOnly))
        .with_context(|| format!("Failed to read {}", input.display()))?;

    let mut target = Store::open(
        output,
        StoreOptions::default()
            .with_format(format)
            .with_mode(OpenMode::New),
    )?;
    for (id, record) in &source {
        target.insert(id.clone(), *record);
    }
    target
        .sync()
        .with_context(|| format!("Failed to write {}", output.display()))?;
    Ok(target)
}

fn pull_history(storage: &StorageConfig) -> Result<Store> {
    storage
        .remote_sync()?
        .load_or_pull(
            &storage.history_file,
            &storage.history_folder,
            storage.missing_blob(),
        )
        .context("Failed to pull follow history")
}

pub fn handle_command(cmd: LedgerCommands, config: &Config) -> Result<()> {
    let storage = &config.storage;

    match cmd {
        LedgerCommands::Show { active } => {
            let store = pull_history(storage)?;
            let entries: Vec<_> = if active {
                store.active().collect()
            } else {
                store.iter().collect()
            };
            if entries.is_empty() {
                println!("No history entries found.");
                return Ok(());
            }
            println!("{} history entries:", entries.len());
            for (id, record) in entries {
                println!("{}", format_entry(id, record));
            }
        }

        LedgerCommands::Stats => {
            let stats = history_stats(&pull_history(storage)?);
            println!("Total:       {}", stats.total);
            println!("Active:      {}", stats.active);
            println!("Unfollowed:  {}", stats.unfollowed);
            if let Some(t) = stats.oldest_active {
                println!("Oldest active follow: {t}");
            }
            if let Some(t) = stats.newest_follow {
                println!("Newest follow:        {t}");
            }
        }

        LedgerCommands::Pull => {
            let store = pull_history(storage)?;
            println!(
                "Pulled {} records into {}",
                store.len(),
                store.path().display()
            );
        }

        LedgerCommands::Push { file } => {
            let sync = storage.remote_sync()?;
            let path = file.unwrap_or_else(|| sync.tmp_dir().join(&storage.history_file));
            if !path.exists() {
                bail!("Nothing to push, {} does not exist", path.display());
            }
            sync.push_file(&path, &storage.history_folder)
                .with_context(|| format!("Failed to push {}", path.display()))?;
            println!("Pushed {} to {}", path.display(), storage.history_folder);
        }

        LedgerCommands::Convert {
            input,
            output,
            format,
        } => {
            let store = convert(&input, &output, format)?;
            println!(
                "Wrote {} records to {} ({format})",
                store.len(),
                output.display()
            );
        }

        LedgerCommands::PlanUnfollow { count } => {
            let store = pull_history(storage)?;
            let plan = plan_unfollow(&store, count);
            if plan.is_empty() {
                println!("Nobody to unfollow.");
            }
            for id in plan {
                if let Some(record) = store.get(id.as_str()) {
                    println!("{}", format_entry(&id, record));
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn ts(d: u32) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn stats_count_active_and_unfollowed() {
        let dir = TempDir::new().unwrap();
        let mut store = Store::load(dir.path().join("h.json"), Format::Json).unwrap();
        store.record_follow("a", ts(3));
        store.record_follow("b", ts(1));
        store.record_follow("c", ts(5));
        store.record_unfollow("b", ts(9));

        let stats = history_stats(&store);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.active, 2);
        assert_eq!(stats.unfollowed, 1);
        assert_eq!(stats.oldest_active, Some(ts(3)));
        assert_eq!(stats.newest_follow, Some(ts(5)));
        assert_eq!(history_stats(&Store::load(dir.path().join("x"), Format::Json).unwrap()), HistoryStats::default());
    }

    #[test]
    fn convert_between_formats() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("following.json");
        std::fs::write(&input, r#"{"u1": {"followed_at": "2024-01-01T00:00:00"}}"#).unwrap();
        let output = dir.path().join("following.bin");

        let store = convert(&input, &output, Format::Binary).unwrap();

        assert_eq!(store.len(), 1);
        let reread = Store::load(&output, Format::Json).unwrap();
        assert_eq!(reread.loaded_format(), Some(Format::Binary));
        assert_eq!(reread.get("u1").map(|r| r.followed_at), Some(ts(1)));
        assert!(convert(&dir.path().join("missing.json"), &output, Format::Json).is_err());
    }

    #[test]
    fn entry_lines() {
        let id = UserId::from("42");
        let mut record = Record::followed(ts(1));
        assert_eq!(format_entry(&id, &record), "  42: followed 2024-01-01 00:00:00");
        record.unfollowed_at = Some(ts(2));
        assert_eq!(
            format_entry(&id, &record),
            "  42: followed 2024-01-01 00:00:00 unfollowed 2024-01-02 00:00:00"
        );
    }
}
