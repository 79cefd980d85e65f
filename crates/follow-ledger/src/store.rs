//! In-memory follow ledger bound to a backing file.
//!
//! The mapping lives entirely in memory; nothing touches the disk until
//! [`Store::sync`]. A sync writes the whole mapping to a temporary file in the
//! same directory and renames it over the backing file, so the file on disk is
//! always either the previous complete version or the new one.

use crate::error::{LedgerError, Result};
use crate::format::{self, Format};
use crate::types::{Record, Records, UserId};
use chrono::NaiveDateTime;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// How an existing backing file is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenMode {
    /// Load the file; `sync` does nothing.
    ReadOnly,
    /// Load the file if present, create it on the first sync.
    #[default]
    Create,
    /// Start empty regardless of what is on disk.
    New,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreOptions {
    /// Output format used by `sync`. Loading always auto-detects.
    pub format: Format,
    pub mode: OpenMode,
    /// Unix permission bits applied after each commit.
    pub file_mode: Option<u32>,
}

impl StoreOptions {
    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    pub fn with_mode(mut self, mode: OpenMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_file_mode(mut self, file_mode: Option<u32>) -> Self {
        self.file_mode = file_mode;
        self
    }
}

#[derive(Debug)]
pub struct Store {
    path: PathBuf,
    records: Records,
    options: StoreOptions,
    /// Format the backing file was decoded from, if it existed.
    loaded_format: Option<Format>,
}

impl Store {
    /// Open `path` in [`OpenMode::Create`] mode, writing back in `format`.
    pub fn load(path: impl Into<PathBuf>, format: Format) -> Result<Self> {
        Self::open(path, StoreOptions::default().with_format(format))
    }

    pub fn open(path: impl Into<PathBuf>, options: StoreOptions) -> Result<Self> {
        let path = path.into();
        let mut store = Self {
            path,
            records: Records::new(),
            options,
            loaded_format: None,
        };

        if options.mode != OpenMode::New {
            if let Some((format, records)) = read_backing_file(&store.path)? {
                tracing::debug!(
                    "Loaded {} ledger records from {} ({format})",
                    records.len(),
                    store.path.display()
                );
                store.records = records;
                store.loaded_format = Some(format);
            }
        }

        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Final path component, used as the remote blob name.
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|name| name.to_str())
    }

    pub fn format(&self) -> Format {
        self.options.format
    }

    pub fn loaded_format(&self) -> Option<Format> {
        self.loaded_format
    }

    pub fn is_read_only(&self) -> bool {
        self.options.mode == OpenMode::ReadOnly
    }

    // ── Map operations ───────────────────────────────────────────

    pub fn get(&self, id: &str) -> Option<&Record> {
        self.records.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Record> {
        self.records.get_mut(id)
    }

    pub fn insert(&mut self, id: impl Into<UserId>, record: Record) -> Option<Record> {
        self.records.insert(id.into(), record)
    }

    pub fn remove(&mut self, id: &str) -> Option<Record> {
        self.records.remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&UserId, &Record)> {
        self.records.iter()
    }

    /// Records that have not been unfollowed yet.
    pub fn active(&self) -> impl Iterator<Item = (&UserId, &Record)> {
        self.records.iter().filter(|(_, record)| record.is_active())
    }

    pub fn records(&self) -> &Records {
        &self.records
    }

    /// Start tracking a follow, replacing any earlier record for `id`.
    pub fn record_follow(&mut self, id: impl Into<UserId>, at: NaiveDateTime) -> Option<Record> {
        self.records.insert(id.into(), Record::followed(at))
    }

    /// Mark `id` as unfollowed. Returns false when `id` is not tracked.
    pub fn record_unfollow(&mut self, id: &str, at: NaiveDateTime) -> bool {
        match self.records.get_mut(id) {
            Some(record) => {
                record.unfollowed_at = Some(at);
                true
            }
            None => false,
        }
    }

    // ── Persistence ──────────────────────────────────────────────

    /// Atomically replace the backing file with the current mapping.
    pub fn sync(&self) -> Result<()> {
        if self.is_read_only() {
            tracing::debug!("Ledger {} is read-only, skipping sync", self.path.display());
            return Ok(());
        }
        let format = self.options.format;
        self.commit_with(|writer| format.encode(&self.records, writer))
    }

    /// Write through `encode` into a same-directory temp file, then rename it
    /// over the backing file. The temp file is removed on any failure.
    pub(crate) fn commit_with<F>(&self, encode: F) -> Result<()>
    where
        F: FnOnce(&mut BufWriter<&mut fs::File>) -> io::Result<()>,
    {
        let write_err = |source: io::Error| LedgerError::Write {
            path: self.path.clone(),
            source,
        };

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let prefix = format!(".{}.", self.file_name().unwrap_or("ledger"));
        let mut tmp = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(write_err)?;

        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            encode(&mut writer).map_err(write_err)?;
            writer.flush().map_err(write_err)?;
        }
        tmp.as_file().sync_all().map_err(write_err)?;

        // tempfile creates 0600 files; keep whatever the previous file had.
        if self.options.file_mode.is_none() {
            if let Ok(meta) = fs::metadata(&self.path) {
                tmp.as_file()
                    .set_permissions(meta.permissions())
                    .map_err(write_err)?;
            }
        }

        tmp.persist(&self.path).map_err(|e| write_err(e.error))?;

        if let Some(mode) = self.options.file_mode {
            apply_file_mode(&self.path, mode).map_err(write_err)?;
        }

        tracing::debug!(
            "Committed {} ledger records to {} ({})",
            self.records.len(),
            self.path.display(),
            self.options.format
        );
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Store {
    type Item = (&'a UserId, &'a Record);
    type IntoIter = std::collections::btree_map::Iter<'a, UserId, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

fn read_backing_file(path: &Path) -> Result<Option<(Format, Records)>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(LedgerError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    format::decode_any(&bytes)
        .map(Some)
        .map_err(|failures| LedgerError::Format {
            path: path.to_path_buf(),
            failures,
        })
}

#[cfg(unix)]
fn apply_file_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn apply_file_mode(path: &Path, mode: u32) -> io::Result<()> {
    tracing::warn!(
        "File mode {mode:o} requested for {} but is only supported on Unix",
        path.display()
    );
    Ok(())
}
