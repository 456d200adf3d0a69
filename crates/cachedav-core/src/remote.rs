//! The remote-store capability.
//!
//! The proxy never talks to a concrete client type. Everything it needs from
//! the remote side goes through [`RemoteStore`], which is deliberately narrow:
//! stat one path, list one directory, fetch a byte range of one path, and the
//! three mutating calls used by the dual-write operations.

use crate::entry::EntryInfo;
use async_trait::async_trait;
use std::io;
use std::pin::Pin;
use thiserror::Error;
use tokio::io::AsyncRead;

/// Byte stream returned by a ranged fetch.
///
/// Positioned at the requested offset. Dropping the reader closes the
/// underlying stream.
pub type RangeReader = Pin<Box<dyn AsyncRead + Send>>;

/// Errors reported by a [`RemoteStore`].
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The remote store has nothing at this path.
    #[error("Remote path not found: {path}")]
    NotFound { path: String },

    /// The remote store answered with an unexpected status.
    #[error("{method} {path} failed with status {status}")]
    Status {
        method: String,
        path: String,
        status: u16,
    },

    /// The request never produced a response (connection, TLS, timeout).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The response could not be understood.
    #[error("Invalid response for {path}: {reason}")]
    InvalidResponse { path: String, reason: String },

    /// IO error while consuming a response.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl RemoteError {
    /// Returns true if the remote store reported the path as absent.
    pub fn is_not_found(&self) -> bool {
        match self {
            RemoteError::NotFound { .. } => true,
            RemoteError::Status { status, .. } => *status == 404,
            RemoteError::Io(e) => e.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Narrow capability through which the remote store is reached.
///
/// Implementations must be safe for concurrent use on distinct paths.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Metadata for a single path.
    async fn stat(&self, path: &str) -> Result<EntryInfo, RemoteError>;

    /// Direct children of a directory, in the order the store returns them.
    async fn read_dir(&self, path: &str) -> Result<Vec<EntryInfo>, RemoteError>;

    /// Fetch `[offset, offset + length)` of a path.
    ///
    /// `None` for `length` reads to the end of the file.
    async fn read_range(
        &self,
        path: &str,
        offset: u64,
        length: Option<u64>,
    ) -> Result<RangeReader, RemoteError>;

    /// Create a directory and any missing ancestors.
    async fn mkdir_all(&self, path: &str, mode: u32) -> Result<(), RemoteError>;

    /// Remove a path and everything below it.
    async fn remove_all(&self, path: &str) -> Result<(), RemoteError>;

    /// Move `from` to `to`, replacing an existing target when `overwrite` is set.
    async fn rename(&self, from: &str, to: &str, overwrite: bool) -> Result<(), RemoteError>;
}
