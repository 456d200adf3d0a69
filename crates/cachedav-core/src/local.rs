//! The local cache directory.
//!
//! [`LocalStore`] is the narrow local capability the proxy uses; [`CacheDir`]
//! implements it on top of `tokio::fs`, mapping `/`-rooted proxy paths into a
//! cache root whose layout mirrors the remote hierarchy path-for-path.

use crate::entry::EntryInfo;
use crate::error::{ProxyError, ProxyResult};
use crate::handle::{DirBatch, OpenFlags, ProxyFile, Whence};
use async_trait::async_trait;
use std::io::{self, SeekFrom};
use std::path::PathBuf;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::trace;

/// Clean a protocol path into canonical `/`-rooted form.
///
/// Empty and `.` segments are dropped, `..` pops a segment and never climbs
/// above the root.
pub fn clean_path(name: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in name.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    format!("/{}", segments.join("/"))
}

/// Final component of a cleaned path (empty for the root).
pub(crate) fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or_default()
}

/// Local filesystem capability keyed by `/`-rooted proxy paths.
///
/// Errors keep their `io::ErrorKind` so "not found" can be told apart from
/// everything else.
#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn stat(&self, path: &str) -> io::Result<EntryInfo>;

    /// Entries of a directory, sorted by name.
    async fn read_dir(&self, path: &str) -> io::Result<Vec<EntryInfo>>;

    async fn open(&self, path: &str, flags: OpenFlags, mode: u32)
    -> io::Result<Box<dyn ProxyFile>>;

    async fn create_dir_all(&self, path: &str, mode: u32) -> io::Result<()>;

    /// Remove a path recursively. A missing path is not an error.
    async fn remove_all(&self, path: &str) -> io::Result<()>;

    async fn rename(&self, from: &str, to: &str) -> io::Result<()>;
}

/// Cache root on local disk.
#[derive(Debug, Clone)]
pub struct CacheDir {
    root: PathBuf,
}

impl CacheDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the cache root if needed and return a store over it.
    pub async fn ensure(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// Map a proxy path to its location under the cache root.
    pub fn local_path(&self, name: &str) -> PathBuf {
        let cleaned = clean_path(name);
        let relative = cleaned.trim_start_matches('/');
        if relative.is_empty() {
            self.root.clone()
        } else {
            self.root.join(relative)
        }
    }
}

#[async_trait]
impl LocalStore for CacheDir {
    async fn stat(&self, path: &str) -> io::Result<EntryInfo> {
        let meta = fs::metadata(self.local_path(path)).await?;
        Ok(EntryInfo::from_metadata(base_name(&clean_path(path)), &meta))
    }

    async fn read_dir(&self, path: &str) -> io::Result<Vec<EntryInfo>> {
        let mut dir = fs::read_dir(self.local_path(path)).await?;
        let mut entries = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            match entry.metadata().await {
                Ok(meta) => entries.push(EntryInfo::from_metadata(name, &meta)),
                Err(e) => trace!(name = %name, error = %e, "Skipping unreadable cache entry"),
            }
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn open(
        &self,
        path: &str,
        flags: OpenFlags,
        mode: u32,
    ) -> io::Result<Box<dyn ProxyFile>> {
        let local = self.local_path(path);
        let mut options = fs::OpenOptions::new();
        options
            .read(flags.read || !flags.has_write_intent())
            .write(!flags.append && (flags.write || flags.truncate || flags.create || flags.create_new))
            .append(flags.append)
            .truncate(flags.truncate)
            .create(flags.create)
            .create_new(flags.create_new);
        #[cfg(unix)]
        options.mode(mode);
        #[cfg(not(unix))]
        let _ = mode;

        let file = options.open(&local).await?;
        let cleaned = clean_path(path);
        Ok(Box::new(LocalFile {
            name: base_name(&cleaned).to_string(),
            path: cleaned,
            file: Mutex::new(file),
        }))
    }

    async fn create_dir_all(&self, path: &str, mode: u32) -> io::Result<()> {
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(mode);
        #[cfg(not(unix))]
        let _ = mode;
        builder.create(self.local_path(path)).await
    }

    async fn remove_all(&self, path: &str) -> io::Result<()> {
        let local = self.local_path(path);
        let meta = match fs::symlink_metadata(&local).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };
        if meta.is_dir() {
            fs::remove_dir_all(&local).await
        } else {
            fs::remove_file(&local).await
        }
    }

    async fn rename(&self, from: &str, to: &str) -> io::Result<()> {
        fs::rename(self.local_path(from), self.local_path(to)).await
    }
}

/// Handle for a regular file in the cache directory.
#[derive(Debug)]
pub struct LocalFile {
    path: String,
    name: String,
    file: Mutex<fs::File>,
}

#[async_trait]
impl ProxyFile for LocalFile {
    async fn read(&self, buf: &mut [u8]) -> ProxyResult<usize> {
        Ok(self.file.lock().await.read(buf).await?)
    }

    async fn write(&self, buf: &[u8]) -> ProxyResult<usize> {
        Ok(self.file.lock().await.write(buf).await?)
    }

    async fn seek(&self, offset: i64, whence: Whence) -> ProxyResult<u64> {
        let pos = match whence {
            Whence::Start => SeekFrom::Start(
                u64::try_from(offset)
                    .map_err(|_| ProxyError::invalid("seek", "negative resulting offset"))?,
            ),
            Whence::Current => SeekFrom::Current(offset),
            Whence::End => SeekFrom::End(offset),
        };
        Ok(self.file.lock().await.seek(pos).await?)
    }

    async fn stat(&self) -> ProxyResult<EntryInfo> {
        let meta = self.file.lock().await.metadata().await?;
        Ok(EntryInfo::from_metadata(self.name.clone(), &meta))
    }

    async fn readdir(&self, _count: usize) -> ProxyResult<DirBatch> {
        Err(ProxyError::invalid("readdir", "handle is not a directory"))
    }

    async fn flush(&self) -> ProxyResult<()> {
        Ok(self.file.lock().await.flush().await?)
    }

    async fn close(&self) -> ProxyResult<()> {
        trace!(path = %self.path, "Closing cached file");
        self.flush().await
    }
}
