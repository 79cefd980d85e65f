//! Error types for the follow ledger.

use crate::format::Format;
use std::fmt;
use std::path::PathBuf;

pub type Result<T, E = LedgerError> = std::result::Result<T, E>;

/// Direction of a remote transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOp {
    Download,
    Upload,
}

impl fmt::Display for RemoteOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Download => f.write_str("download"),
            Self::Upload => f.write_str("upload"),
        }
    }
}

/// One failed decoder attempt during format detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeFailure {
    pub format: Format,
    pub reason: String,
}

impl fmt::Display for DecodeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.format, self.reason)
    }
}

/// Failure reported by a [`crate::remote::BlobStore`].
#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("blob {0} does not exist")]
    NotFound(String),
    #[error("blob store answered {status} for {key}")]
    Status { status: u16, key: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The backing file matched none of the known formats.
    #[error("{} is not in a supported format ({})", .path.display(), summarize(.failures))]
    Format {
        path: PathBuf,
        failures: Vec<DecodeFailure>,
    },

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Serializing or committing failed; the previous file is untouched.
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Remote transfer failed. The source keeps the not-found/transport split.
    #[error("could not {op} {key}: {source}")]
    Connection {
        op: RemoteOp,
        key: String,
        #[source]
        source: BlobError,
    },

    #[error("{0:?} is not a plain file name")]
    InvalidName(String),
}

impl LedgerError {
    /// True when a download failed because the blob is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Connection {
                source: BlobError::NotFound(_),
                ..
            }
        )
    }
}

fn summarize(failures: &[DecodeFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
