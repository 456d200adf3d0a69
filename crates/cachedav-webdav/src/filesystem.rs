//! WebDAV filesystem implementation for the hybrid cache.
//!
//! This module provides the `DavFileSystem` trait implementation that wraps
//! [`HybridFs`] so WebDAV clients see the local cache and the remote store as
//! one tree.

use crate::dir_entry::ProxyDirEntry;
use crate::error::proxy_error_to_fs_error;
use crate::file::ProxyDavFile;
use crate::metadata::EntryMetaData;
use cachedav_core::{DEFAULT_DIR_MODE, DEFAULT_FILE_MODE, HybridFs, OpenFlags, ProxyFile};
use dav_server::davpath::DavPath;
use dav_server::fs::{
    DavDirEntry, DavFile, DavFileSystem, DavMetaData, FsError, FsFuture, FsStream, OpenOptions,
    ReadDirMeta,
};
use futures::stream;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, instrument, trace, warn};

/// WebDAV filesystem backed by a [`HybridFs`].
#[derive(Clone, Debug)]
pub struct HybridDav {
    fs: Arc<HybridFs>,
}

impl HybridDav {
    pub fn new(fs: HybridFs) -> Self {
        Self { fs: Arc::new(fs) }
    }

    /// Parse a WebDAV path into a `/`-rooted, percent-decoded proxy path.
    fn parse_path(path: &DavPath) -> String {
        let raw = String::from_utf8_lossy(path.as_bytes());
        let normalized = raw.trim_start_matches('/').trim_end_matches('/');
        trace!(raw_path = %raw, normalized = %normalized, "parse_path");
        format!("/{normalized}")
    }

    /// Drain every entry from an opened directory handle.
    async fn drain_listing(handle: &dyn ProxyFile) -> Result<Vec<Box<dyn DavDirEntry>>, FsError> {
        let batch = handle.readdir(0).await.map_err(proxy_error_to_fs_error)?;
        Ok(batch
            .entries
            .into_iter()
            .map(|e| Box::new(ProxyDirEntry::from(e)) as Box<dyn DavDirEntry>)
            .collect())
    }
}

fn open_flags(options: &OpenOptions) -> OpenFlags {
    OpenFlags {
        read: options.read,
        write: options.write,
        append: options.append,
        truncate: options.truncate,
        create: options.create,
        create_new: options.create_new,
    }
}

impl DavFileSystem for HybridDav {
    #[instrument(level = "debug", skip(self), fields(path = %path.as_url_string()))]
    fn open<'a>(&'a self, path: &'a DavPath, options: OpenOptions) -> FsFuture<'a, Box<dyn DavFile>> {
        Box::pin(async move {
            let proxy_path = Self::parse_path(path);
            debug!(proxy_path = %proxy_path, options = ?options, "Opening file");

            let handle = self
                .fs
                .open_file(&proxy_path, open_flags(&options), DEFAULT_FILE_MODE)
                .await
                .map_err(proxy_error_to_fs_error)?;
            Ok(Box::new(ProxyDavFile::new(handle)) as Box<dyn DavFile>)
        })
    }

    #[instrument(level = "debug", skip(self), fields(path = %path.as_url_string()))]
    fn read_dir<'a>(
        &'a self,
        path: &'a DavPath,
        _: ReadDirMeta,
    ) -> FsFuture<'a, FsStream<Box<dyn DavDirEntry>>> {
        Box::pin(async move {
            let proxy_path = Self::parse_path(path);
            debug!(proxy_path = %proxy_path, "Reading directory");

            let handle = self
                .fs
                .open_file(&proxy_path, OpenFlags::read_only(), DEFAULT_FILE_MODE)
                .await
                .map_err(proxy_error_to_fs_error)?;

            let entries = Self::drain_listing(handle.as_ref()).await;
            if let Err(e) = handle.close().await {
                warn!(proxy_path = %proxy_path, error = %e, "Failed to close directory handle");
            }
            let entries = entries?;

            trace!(count = entries.len(), "Directory entries found");
            Ok(Box::pin(stream::iter(entries.into_iter().map(Ok))) as FsStream<_>)
        })
    }

    #[instrument(level = "debug", skip(self), fields(path = %path.as_url_string()))]
    fn metadata<'a>(&'a self, path: &'a DavPath) -> FsFuture<'a, Box<dyn DavMetaData>> {
        Box::pin(async move {
            let proxy_path = Self::parse_path(path);
            let info = self.fs.stat(&proxy_path).await.map_err(proxy_error_to_fs_error)?;
            Ok(Box::new(EntryMetaData(info)) as Box<dyn DavMetaData>)
        })
    }

    #[instrument(level = "debug", skip(self), fields(path = %path.as_url_string()))]
    fn create_dir<'a>(&'a self, path: &'a DavPath) -> FsFuture<'a, ()> {
        Box::pin(async move {
            let proxy_path = Self::parse_path(path);
            debug!(proxy_path = %proxy_path, "Creating directory");
            self.fs
                .mkdir(&proxy_path, DEFAULT_DIR_MODE)
                .await
                .map_err(proxy_error_to_fs_error)
        })
    }

    #[instrument(level = "debug", skip(self), fields(path = %path.as_url_string()))]
    fn remove_dir<'a>(&'a self, path: &'a DavPath) -> FsFuture<'a, ()> {
        Box::pin(async move {
            let proxy_path = Self::parse_path(path);
            debug!(proxy_path = %proxy_path, "Removing directory");
            self.fs
                .remove_all(&proxy_path)
                .await
                .map_err(proxy_error_to_fs_error)
        })
    }

    #[instrument(level = "debug", skip(self), fields(path = %path.as_url_string()))]
    fn remove_file<'a>(&'a self, path: &'a DavPath) -> FsFuture<'a, ()> {
        Box::pin(async move {
            let proxy_path = Self::parse_path(path);
            debug!(proxy_path = %proxy_path, "Removing file");
            self.fs
                .remove_all(&proxy_path)
                .await
                .map_err(proxy_error_to_fs_error)
        })
    }

    #[instrument(level = "debug", skip(self), fields(from = %from.as_url_string(), to = %to.as_url_string()))]
    fn rename<'a>(&'a self, from: &'a DavPath, to: &'a DavPath) -> FsFuture<'a, ()> {
        Box::pin(async move {
            let from_path = Self::parse_path(from);
            let to_path = Self::parse_path(to);
            debug!(from = %from_path, to = %to_path, "Renaming");
            self.fs
                .rename(&from_path, &to_path)
                .await
                .map_err(proxy_error_to_fs_error)
        })
    }

    fn copy<'a>(&'a self, _from: &'a DavPath, _to: &'a DavPath) -> FsFuture<'a, ()> {
        Box::pin(async { Err(FsError::NotImplemented) })
    }

    fn have_props<'a>(&'a self, _path: &'a DavPath) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>> {
        Box::pin(async { false })
    }
}
