//! Read-only, seekable handle over a remote path.
//!
//! The remote store can only hand out byte ranges, so the handle keeps the
//! offset itself and turns every `read` into exactly one ranged fetch.
//! Nothing is cached between reads: reading the same range twice costs two
//! fetches.

use crate::entry::EntryInfo;
use crate::error::{ProxyError, ProxyResult};
use crate::handle::{DirBatch, ProxyFile, Whence};
use crate::remote::{RemoteError, RemoteStore};
use async_trait::async_trait;
use std::fmt;
use std::io;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::sync::Mutex;
use tracing::{debug, error};

/// Offset bookkeeping, guarded by the handle's lock.
#[derive(Debug)]
struct Cursor {
    offset: u64,
    /// Captured at open; never refreshed.
    size: u64,
}

/// Handle for a file (or directory) that exists only on the remote store.
pub struct RemoteFile {
    path: String,
    remote: Arc<dyn RemoteStore>,
    info: EntryInfo,
    cursor: Mutex<Cursor>,
}

impl fmt::Debug for RemoteFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteFile")
            .field("path", &self.path)
            .field("size", &self.info.size)
            .field("is_dir", &self.info.is_dir)
            .finish_non_exhaustive()
    }
}

impl RemoteFile {
    /// Stat `path` on the remote store and open a handle over it.
    pub async fn open(remote: Arc<dyn RemoteStore>, path: &str) -> ProxyResult<Self> {
        let info = remote.stat(path).await.map_err(|e| {
            error!(path = %path, error = %e, "Failed to stat remote file");
            ProxyError::Remote(e)
        })?;

        debug!(path = %path, size = info.size, is_dir = info.is_dir, "Opened remote file");
        Ok(Self::with_info(remote, path, info))
    }

    /// Build a handle from metadata obtained elsewhere.
    pub fn with_info(remote: Arc<dyn RemoteStore>, path: &str, info: EntryInfo) -> Self {
        let size = info.size;
        Self {
            path: path.to_string(),
            remote,
            info,
            cursor: Mutex::new(Cursor { offset: 0, size }),
        }
    }

    /// Current offset.
    pub async fn position(&self) -> u64 {
        self.cursor.lock().await.offset
    }
}

/// Resolve a seek request against `current` and `size`.
///
/// Negative results are rejected; results past the end clamp to `size`.
fn resolve_seek(current: u64, size: u64, offset: i64, whence: Whence) -> ProxyResult<u64> {
    let base = match whence {
        Whence::Start => 0,
        Whence::Current => i128::from(current),
        Whence::End => i128::from(size),
    };
    let candidate = base + i128::from(offset);
    if candidate < 0 {
        return Err(ProxyError::invalid("seek", "negative resulting offset"));
    }
    Ok(u64::try_from(candidate.min(i128::from(size))).unwrap_or(size))
}

#[async_trait]
impl ProxyFile for RemoteFile {
    async fn read(&self, buf: &mut [u8]) -> ProxyResult<usize> {
        let mut cursor = self.cursor.lock().await;

        if self.info.is_dir {
            return Err(ProxyError::invalid("read", "handle is a directory"));
        }

        if cursor.offset >= cursor.size {
            debug!(path = %self.path, offset = cursor.offset, size = cursor.size, "Remote read at EOF");
            return Ok(0);
        }

        if buf.is_empty() {
            return Ok(0);
        }

        let to_read = (buf.len() as u64).min(cursor.size - cursor.offset);
        debug!(path = %self.path, offset = cursor.offset, len = to_read, "Remote ranged read");

        let mut reader = self
            .remote
            .read_range(&self.path, cursor.offset, Some(to_read))
            .await
            .map_err(|e| {
                error!(path = %self.path, error = %e, "Ranged fetch failed");
                ProxyError::Remote(e)
            })?;

        let want = to_read as usize;
        let mut filled = 0;
        while filled < want {
            let n = reader
                .read(&mut buf[filled..want])
                .await
                .map_err(RemoteError::Io)?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        drop(reader);

        if filled == 0 {
            return Err(ProxyError::Remote(RemoteError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "remote stream for {} returned no bytes for {} at offset {}",
                    self.path, to_read, cursor.offset
                ),
            ))));
        }

        cursor.offset += filled as u64;
        debug!(path = %self.path, read = filled, offset = cursor.offset, size = cursor.size, "Remote read complete");
        Ok(filled)
    }

    async fn write(&self, _buf: &[u8]) -> ProxyResult<usize> {
        Err(ProxyError::RemoteWriteUnsupported {
            path: self.path.clone(),
        })
    }

    async fn seek(&self, offset: i64, whence: Whence) -> ProxyResult<u64> {
        let mut cursor = self.cursor.lock().await;

        if self.info.is_dir {
            return Err(ProxyError::invalid("seek", "handle is a directory"));
        }

        let new_offset = resolve_seek(cursor.offset, cursor.size, offset, whence)?;
        debug!(path = %self.path, from = cursor.offset, to = new_offset, size = cursor.size, "Remote seek");
        cursor.offset = new_offset;
        Ok(new_offset)
    }

    async fn stat(&self) -> ProxyResult<EntryInfo> {
        Ok(self.info.clone())
    }

    async fn readdir(&self, count: usize) -> ProxyResult<DirBatch> {
        if !self.info.is_dir {
            return Err(ProxyError::invalid("readdir", "handle is not a directory"));
        }

        let mut entries = self.remote.read_dir(&self.path).await?;
        if count == 0 || entries.len() <= count {
            return Ok(DirBatch::last(entries));
        }
        entries.truncate(count);
        Ok(DirBatch::more(entries))
    }

    async fn close(&self) -> ProxyResult<()> {
        Ok(())
    }
}
