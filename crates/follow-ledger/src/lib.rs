//! Follow history ledger for engagebot.
//!
//! A [`Store`] keeps the full "who was followed, and when" mapping in memory
//! and commits it atomically to a backing file in one of three formats.
//! [`RemoteSync`] moves that file to and from blob storage so independent,
//! stateless runs share the same history.

pub mod error;
pub mod format;
pub mod remote;
pub mod store;
mod tabular;
pub mod types;

pub use error::{BlobError, DecodeFailure, LedgerError, RemoteOp, Result};
pub use format::{decode_any, Format};
pub use remote::{blob_key, BlobStore, DirBlobStore, HttpBlobStore, MissingBlob, RemoteSync};
pub use store::{OpenMode, Store, StoreOptions};
pub use types::{Record, Records, UserId};

/// Default remote folder for the follow history blob.
pub const DEFAULT_HISTORY_FOLDER: &str = "history";
/// Default file name of the follow history blob.
pub const DEFAULT_HISTORY_FILE: &str = "following.json";
