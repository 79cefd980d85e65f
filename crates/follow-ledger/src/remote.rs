//! Blob-storage backup of ledger files.
//!
//! A ledger file named `following.json` lives remotely under
//! `{folder}/following.json`. [`RemoteSync::pull`] downloads it into a local
//! temp directory and opens a [`Store`] there; [`RemoteSync::push`] commits the
//! store locally and uploads the result.

use crate::error::{BlobError, LedgerError, RemoteOp, Result};
use crate::format::Format;
use crate::store::{OpenMode, Store, StoreOptions};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Raw named-blob transfer. Implementations know nothing about ledgers.
pub trait BlobStore {
    /// Fetch `key` into the local file `dest`, replacing it.
    fn download(&self, key: &str, dest: &Path) -> Result<(), BlobError>;
    /// Store the contents of `src` under `key`.
    fn upload(&self, src: &Path, key: &str) -> Result<(), BlobError>;
}

impl<B: BlobStore + ?Sized> BlobStore for Box<B> {
    fn download(&self, key: &str, dest: &Path) -> Result<(), BlobError> {
        (**self).download(key, dest)
    }

    fn upload(&self, src: &Path, key: &str) -> Result<(), BlobError> {
        (**self).upload(src, key)
    }
}

/// Join a remote folder and a file name into a blob key.
pub fn blob_key(folder: &str, name: &str) -> String {
    let folder = folder.trim_matches('/');
    if folder.is_empty() {
        name.to_string()
    } else {
        format!("{folder}/{name}")
    }
}

/// Write `dest` through a temp file in its directory so a failed transfer
/// never leaves a truncated file behind.
fn write_via_temp<F>(dest: &Path, fill: F) -> Result<(), BlobError>
where
    F: FnOnce(&mut fs::File) -> Result<(), BlobError>,
{
    let dir = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    fill(tmp.as_file_mut())?;
    tmp.as_file().sync_all()?;
    tmp.persist(dest).map_err(|e| BlobError::Io(e.error))?;
    Ok(())
}

// ── Directory-backed bucket ──────────────────────────────────────

/// Uses a local directory as the bucket. Keys map to relative paths.
#[derive(Debug, Clone)]
pub struct DirBlobStore {
    root: PathBuf,
}

impl DirBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl BlobStore for DirBlobStore {
    fn download(&self, key: &str, dest: &Path) -> Result<(), BlobError> {
        let mut src = match fs::File::open(self.root.join(key)) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(BlobError::NotFound(key.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        write_via_temp(dest, |file| {
            io::copy(&mut src, file)?;
            Ok(())
        })
    }

    fn upload(&self, src: &Path, key: &str) -> Result<(), BlobError> {
        let mut input = fs::File::open(src)?;
        write_via_temp(&self.root.join(key), |file| {
            io::copy(&mut input, file)?;
            Ok(())
        })
    }
}

// ── HTTP bucket ──────────────────────────────────────────────────

/// Plain `GET`/`PUT` against `{endpoint}/{bucket}/{key}`.
///
/// Suitable for object stores fronted by a token-authenticated gateway or
/// presigned base URL. Request signing is out of scope.
#[derive(Debug, Clone)]
pub struct HttpBlobStore {
    client: reqwest::blocking::Client,
    endpoint: String,
    bucket: String,
    token: Option<String>,
}

impl HttpBlobStore {
    pub fn new(
        endpoint: impl Into<String>,
        bucket: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, BlobError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BlobError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            bucket: bucket.into(),
            token: None,
        })
    }

    /// Send `Authorization: Bearer <token>` with every request.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    fn url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint, self.bucket, key)
    }

    fn authorize(
        &self,
        request: reqwest::blocking::RequestBuilder,
    ) -> reqwest::blocking::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

fn check_status(
    response: reqwest::blocking::Response,
    key: &str,
) -> Result<reqwest::blocking::Response, BlobError> {
    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(BlobError::NotFound(key.to_string()));
    }
    if !status.is_success() {
        return Err(BlobError::Status {
            status: status.as_u16(),
            key: key.to_string(),
        });
    }
    Ok(response)
}

impl BlobStore for HttpBlobStore {
    fn download(&self, key: &str, dest: &Path) -> Result<(), BlobError> {
        let response = self
            .authorize(self.client.get(self.url(key)))
            .send()
            .map_err(|e| BlobError::Transport(e.to_string()))?;
        let mut response = check_status(response, key)?;

        write_via_temp(dest, |file| {
            response
                .copy_to(file)
                .map_err(|e| BlobError::Transport(e.to_string()))?;
            Ok(())
        })
    }

    fn upload(&self, src: &Path, key: &str) -> Result<(), BlobError> {
        let body = fs::read(src)?;
        let response = self
            .authorize(self.client.put(self.url(key)))
            .body(body)
            .send()
            .map_err(|e| BlobError::Transport(e.to_string()))?;
        check_status(response, key)?;
        Ok(())
    }
}

// ── Sync ─────────────────────────────────────────────────────────

/// What `load_or_pull` does when the remote ledger does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingBlob {
    /// Treat it like any other download failure.
    #[default]
    Fail,
    /// Start an empty ledger (first run against a fresh bucket).
    StartEmpty,
}

/// Bridges ledger files in a local temp directory to a [`BlobStore`].
#[derive(Debug, Clone)]
pub struct RemoteSync<B> {
    blobs: B,
    tmp_dir: PathBuf,
    file_mode: Option<u32>,
}

impl<B: BlobStore> RemoteSync<B> {
    pub fn new(blobs: B, tmp_dir: impl Into<PathBuf>) -> Self {
        Self {
            blobs,
            tmp_dir: tmp_dir.into(),
            file_mode: None,
        }
    }

    /// Permission bits applied to pulled ledgers after each commit.
    pub fn with_file_mode(mut self, file_mode: Option<u32>) -> Self {
        self.file_mode = file_mode;
        self
    }

    pub fn blobs(&self) -> &B {
        &self.blobs
    }

    pub fn tmp_dir(&self) -> &Path {
        &self.tmp_dir
    }

    fn store_options(&self) -> StoreOptions {
        StoreOptions::default()
            .with_format(Format::Json)
            .with_file_mode(self.file_mode)
    }

    /// Download `{folder}/{name}` and open it as a JSON ledger.
    ///
    /// A failed download is always an error, never an empty ledger.
    pub fn pull(&self, name: &str, folder: &str) -> Result<Store> {
        self.load_or_pull(name, folder, MissingBlob::Fail)
    }

    pub fn load_or_pull(&self, name: &str, folder: &str, missing: MissingBlob) -> Result<Store> {
        validate_name(name)?;
        let key = blob_key(folder, name);
        let local = self.tmp_dir.join(name);

        match self.blobs.download(&key, &local) {
            Ok(()) => {
                tracing::info!("Downloaded {key} to {}", local.display());
            }
            Err(BlobError::NotFound(_)) if missing == MissingBlob::StartEmpty => {
                tracing::warn!("Remote ledger {key} does not exist yet, starting empty");
                return Store::open(&local, self.store_options().with_mode(OpenMode::New));
            }
            Err(source) => {
                return Err(LedgerError::Connection {
                    op: RemoteOp::Download,
                    key,
                    source,
                })
            }
        }

        Store::open(&local, self.store_options())
    }

    /// Commit `store` locally, then upload it to `{folder}/{file name}`.
    ///
    /// The local commit stays in place when the upload fails, so retrying the
    /// push is safe. Read-only stores upload their backing file unchanged.
    pub fn push(&self, store: &Store, folder: &str) -> Result<()> {
        store.sync()?;
        if !store.path().exists() {
            tracing::info!(
                "Read-only ledger {} has no backing file, nothing to push",
                store.path().display()
            );
            return Ok(());
        }
        self.push_file(store.path(), folder)
    }

    /// Upload an arbitrary local file to `{folder}/{file name}`.
    pub fn push_file(&self, path: &Path, folder: &str) -> Result<()> {
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| LedgerError::InvalidName(path.display().to_string()))?;
        let key = blob_key(folder, name);

        self.blobs
            .upload(path, &key)
            .map_err(|source| LedgerError::Connection {
                op: RemoteOp::Upload,
                key: key.clone(),
                source,
            })?;

        tracing::info!("Uploaded {} to {key}", path.display());
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<()> {
    let plain = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\']);
    if plain {
        Ok(())
    } else {
        Err(LedgerError::InvalidName(name.to_string()))
    }
}
