//! The open-handle contract shared by local files, remote files and
//! directory listings.

use crate::entry::EntryInfo;
use crate::error::{ProxyError, ProxyResult};
use async_trait::async_trait;
use std::fmt;

/// Origin for [`ProxyFile::seek`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    /// Relative to the start of the file.
    Start,
    /// Relative to the current offset.
    Current,
    /// Relative to the end of the file.
    End,
}

impl TryFrom<i32> for Whence {
    type Error = ProxyError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Whence::Start),
            1 => Ok(Whence::Current),
            2 => Ok(Whence::End),
            _ => Err(ProxyError::invalid("seek", "unknown seek origin")),
        }
    }
}

/// One page of directory entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirBatch {
    pub entries: Vec<EntryInfo>,
    /// No entries remain after this batch.
    pub end_of_stream: bool,
}

impl DirBatch {
    pub fn more(entries: Vec<EntryInfo>) -> Self {
        Self {
            entries,
            end_of_stream: false,
        }
    }

    pub fn last(entries: Vec<EntryInfo>) -> Self {
        Self {
            entries,
            end_of_stream: true,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Flags for [`crate::HybridFs::open_file`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct OpenFlags {
    pub read: bool,
    pub write: bool,
    pub append: bool,
    pub truncate: bool,
    pub create: bool,
    pub create_new: bool,
}

impl OpenFlags {
    pub fn read_only() -> Self {
        Self {
            read: true,
            ..Self::default()
        }
    }

    /// True when the caller intends to modify or create the file.
    pub fn has_write_intent(&self) -> bool {
        self.write || self.append || self.truncate || self.create || self.create_new
    }
}

/// An open file or directory handed to the protocol server.
///
/// Methods take `&self`: each implementation guards its own mutable state so
/// a single handle can be shared between concurrent callers.
#[async_trait]
pub trait ProxyFile: Send + Sync + fmt::Debug {
    /// Read into `buf`, returning the number of bytes read. `Ok(0)` signals
    /// end of stream for a non-empty buffer.
    async fn read(&self, buf: &mut [u8]) -> ProxyResult<usize>;

    /// Write `buf` at the current offset.
    async fn write(&self, buf: &[u8]) -> ProxyResult<usize>;

    /// Move the offset and return the new absolute position.
    async fn seek(&self, offset: i64, whence: Whence) -> ProxyResult<u64>;

    /// Metadata for the opened path.
    async fn stat(&self) -> ProxyResult<EntryInfo>;

    /// Next batch of at most `count` entries (`0` for all remaining).
    async fn readdir(&self, count: usize) -> ProxyResult<DirBatch>;

    /// Flush buffered writes. Read-only handles have nothing to flush.
    async fn flush(&self) -> ProxyResult<()> {
        Ok(())
    }

    /// Release the handle.
    async fn close(&self) -> ProxyResult<()>;
}
