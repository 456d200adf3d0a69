//! WebDAV file handle implementation.
//!
//! Adapts a [`ProxyFile`] (cached local file, remote file or directory
//! listing) to dav-server's `DavFile`.

use crate::error::proxy_error_to_fs_error;
use crate::metadata::EntryMetaData;
use bytes::{Buf, Bytes};
use cachedav_core::{ProxyError, ProxyFile, Whence};
use dav_server::fs::{DavFile, DavMetaData, FsError, FsFuture};
use std::io::SeekFrom;
use tracing::trace;

/// A proxy handle served over WebDAV.
#[derive(Debug)]
pub struct ProxyDavFile {
    inner: Box<dyn ProxyFile>,
}

impl ProxyDavFile {
    pub fn new(inner: Box<dyn ProxyFile>) -> Self {
        Self { inner }
    }
}

/// Translate a `SeekFrom` into the handle's `(offset, origin)` form.
fn seek_args(pos: SeekFrom) -> Result<(i64, Whence), ProxyError> {
    match pos {
        SeekFrom::Start(n) => i64::try_from(n)
            .map(|n| (n, Whence::Start))
            .map_err(|_| ProxyError::invalid("seek", "offset out of range")),
        SeekFrom::Current(n) => Ok((n, Whence::Current)),
        SeekFrom::End(n) => Ok((n, Whence::End)),
    }
}

impl DavFile for ProxyDavFile {
    fn metadata(&mut self) -> FsFuture<'_, Box<dyn DavMetaData>> {
        Box::pin(async move {
            let info = self.inner.stat().await.map_err(proxy_error_to_fs_error)?;
            Ok(Box::new(EntryMetaData(info)) as Box<dyn DavMetaData>)
        })
    }

    fn read_bytes(&mut self, count: usize) -> FsFuture<'_, Bytes> {
        Box::pin(async move {
            let mut buf = vec![0u8; count];
            let n = self
                .inner
                .read(&mut buf)
                .await
                .map_err(proxy_error_to_fs_error)?;
            buf.truncate(n);
            trace!(requested = count, read = n, "read_bytes");
            Ok(Bytes::from(buf))
        })
    }

    fn write_bytes(&mut self, buf: Bytes) -> FsFuture<'_, ()> {
        Box::pin(async move {
            let mut rest = &buf[..];
            while !rest.is_empty() {
                let n = self
                    .inner
                    .write(rest)
                    .await
                    .map_err(proxy_error_to_fs_error)?;
                if n == 0 {
                    return Err(FsError::GeneralFailure);
                }
                rest = &rest[n..];
            }
            Ok(())
        })
    }

    fn write_buf(&mut self, mut buf: Box<dyn Buf + Send>) -> FsFuture<'_, ()> {
        Box::pin(async move {
            let bytes = buf.copy_to_bytes(buf.remaining());
            self.write_bytes(bytes).await
        })
    }

    fn seek(&mut self, pos: SeekFrom) -> FsFuture<'_, u64> {
        Box::pin(async move {
            let (offset, whence) = seek_args(pos).map_err(proxy_error_to_fs_error)?;
            self.inner
                .seek(offset, whence)
                .await
                .map_err(proxy_error_to_fs_error)
        })
    }

    fn flush(&mut self) -> FsFuture<'_, ()> {
        Box::pin(async move { self.inner.flush().await.map_err(proxy_error_to_fs_error) })
    }
}
