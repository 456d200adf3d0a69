//! Paginated directory handle.
//!
//! Opening a directory yields a [`DirectoryListing`]: the entries are fetched
//! once from the bound [`DirectoryLister`] on the first `readdir` and then
//! served in batches from a forward-only cursor.

use crate::entry::EntryInfo;
use crate::error::{ProxyError, ProxyResult};
use crate::handle::{DirBatch, ProxyFile, Whence};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::trace;

/// Something that can list a directory path.
#[async_trait]
pub trait DirectoryLister: Send + Sync {
    async fn list(&self, path: &str) -> ProxyResult<Vec<EntryInfo>>;
}

#[derive(Debug, Default)]
struct ListingState {
    /// Populated on the first `readdir`, immutable afterwards.
    entries: Option<Vec<EntryInfo>>,
    cursor: usize,
}

/// Directory handle that pages through a listing fetched once.
pub struct DirectoryListing {
    path: String,
    lister: Arc<dyn DirectoryLister>,
    info: EntryInfo,
    state: Mutex<ListingState>,
}

impl fmt::Debug for DirectoryListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryListing")
            .field("path", &self.path)
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

impl DirectoryListing {
    pub fn new(path: impl Into<String>, lister: Arc<dyn DirectoryLister>, info: EntryInfo) -> Self {
        Self {
            path: path.into(),
            lister,
            info,
            state: Mutex::new(ListingState::default()),
        }
    }
}

#[async_trait]
impl ProxyFile for DirectoryListing {
    async fn read(&self, _buf: &mut [u8]) -> ProxyResult<usize> {
        Err(ProxyError::invalid("read", "handle is a directory"))
    }

    async fn write(&self, _buf: &[u8]) -> ProxyResult<usize> {
        Err(ProxyError::invalid("write", "handle is a directory"))
    }

    async fn seek(&self, _offset: i64, _whence: Whence) -> ProxyResult<u64> {
        Err(ProxyError::invalid("seek", "handle is a directory"))
    }

    async fn stat(&self) -> ProxyResult<EntryInfo> {
        Ok(self.info.clone())
    }

    async fn readdir(&self, count: usize) -> ProxyResult<DirBatch> {
        let mut state = self.state.lock().await;

        if state.entries.is_none() {
            let entries = self.lister.list(&self.path).await?;
            trace!(path = %self.path, count = entries.len(), "Fetched directory listing");
            state.entries = Some(entries);
        }

        let ListingState { entries, cursor } = &mut *state;
        let entries = entries.as_deref().unwrap_or_default();

        if *cursor >= entries.len() {
            return Ok(DirBatch::last(Vec::new()));
        }

        if count == 0 {
            let rest = entries[*cursor..].to_vec();
            *cursor = entries.len();
            return Ok(DirBatch::more(rest));
        }

        let end = cursor.saturating_add(count).min(entries.len());
        let batch = entries[*cursor..end].to_vec();
        *cursor = end;
        if end == entries.len() {
            Ok(DirBatch::last(batch))
        } else {
            Ok(DirBatch::more(batch))
        }
    }

    async fn close(&self) -> ProxyResult<()> {
        Ok(())
    }
}
