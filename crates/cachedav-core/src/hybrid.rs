//! The hybrid filesystem.
//!
//! Every operation consults the local cache directory first and falls back to
//! (or merges with) the remote store. Mutations are applied to both stores
//! and succeed when either side does.

use crate::dir_listing::{DirectoryListing, DirectoryLister};
use crate::entry::EntryInfo;
use crate::error::{DualOp, ProxyError, ProxyResult};
use crate::handle::{OpenFlags, ProxyFile};
use crate::local::{LocalStore, clean_path};
use crate::remote::{RemoteError, RemoteStore};
use crate::remote_file::RemoteFile;
use async_trait::async_trait;
use std::collections::HashSet;
use std::fmt;
use std::io;
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};

/// Local cache directory in front of a remote store.
///
/// Holds no per-request state; clones share the same stores.
#[derive(Clone)]
pub struct HybridFs {
    local: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteStore>,
}

impl fmt::Debug for HybridFs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HybridFs").finish_non_exhaustive()
    }
}

impl HybridFs {
    pub fn new(local: Arc<dyn LocalStore>, remote: Arc<dyn RemoteStore>) -> Self {
        Self { local, remote }
    }

    /// Metadata for `path`.
    ///
    /// A path present in the cache is answered locally, except the root,
    /// whose metadata always comes from the remote store.
    #[instrument(level = "debug", skip(self))]
    pub async fn stat(&self, path: &str) -> ProxyResult<EntryInfo> {
        let path = clean_path(path);

        if path != "/"
            && let Ok(info) = self.local.stat(&path).await
        {
            debug!("Stat (local)");
            return Ok(info);
        }

        debug!("Stat (remote)");
        Ok(self.remote.stat(&path).await?)
    }

    /// Merged listing of `path`.
    ///
    /// Local entries come first; remote entries are appended unless a local
    /// entry has the same name. A failed remote listing is tolerated.
    #[instrument(level = "debug", skip(self))]
    pub async fn readdir(&self, path: &str) -> ProxyResult<Vec<EntryInfo>> {
        let path = clean_path(path);

        let mut entries = match self.local.read_dir(&path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                error!(error = %e, "Local directory listing failed");
                return Err(e.into());
            }
        };
        let local_count = entries.len();
        let local_names: HashSet<String> = entries.iter().map(|e| e.name.clone()).collect();

        match self.remote.read_dir(&path).await {
            Ok(remote) => {
                entries.extend(remote.into_iter().filter(|e| !local_names.contains(&e.name)));
            }
            Err(e) => warn!(error = %e, "Remote directory listing failed, returning local entries only"),
        }

        debug!(local = local_count, total = entries.len(), "Readdir merged");
        Ok(entries)
    }

    /// Open `path`.
    ///
    /// Cached directories become a [`DirectoryListing`] over the merged
    /// listing, cached files are returned as-is. Paths missing from the cache
    /// open as a read-only [`RemoteFile`] when there is no write intent.
    #[instrument(level = "debug", skip(self))]
    pub async fn open_file(
        &self,
        path: &str,
        flags: OpenFlags,
        mode: u32,
    ) -> ProxyResult<Box<dyn ProxyFile>> {
        let path = clean_path(path);

        match self.local.open(&path, flags, mode).await {
            Ok(file) => {
                let info = file.stat().await?;
                if !info.is_dir {
                    debug!("Opened local file");
                    return Ok(file);
                }
                if let Err(e) = file.close().await {
                    debug!(error = %e, "Closing raw directory handle failed");
                }
                debug!("Opening directory as merged listing");
                let lister: Arc<dyn DirectoryLister> = Arc::new(self.clone());
                return Ok(Box::new(DirectoryListing::new(path, lister, info)));
            }
            Err(e) => debug!(error = %e, "Local open failed"),
        }

        if flags.has_write_intent() {
            error!("Cannot write to a file that is not cached locally");
            return Err(ProxyError::NotFound { path });
        }

        debug!("Opening remote file");
        Ok(Box::new(RemoteFile::open(Arc::clone(&self.remote), &path).await?))
    }

    /// Create `path` and missing ancestors in both stores.
    #[instrument(level = "debug", skip(self))]
    pub async fn mkdir(&self, path: &str, mode: u32) -> ProxyResult<()> {
        let path = clean_path(path);
        let local = self.local.create_dir_all(&path, mode).await;
        let remote = self.remote.mkdir_all(&path, mode).await;
        combine(DualOp::Mkdir, path, local, remote)
    }

    /// Remove `path` recursively from both stores.
    #[instrument(level = "debug", skip(self))]
    pub async fn remove_all(&self, path: &str) -> ProxyResult<()> {
        let path = clean_path(path);
        let local = self.local.remove_all(&path).await;
        let remote = self.remote.remove_all(&path).await;
        combine(DualOp::RemoveAll, path, local, remote)
    }

    /// Rename `from` to `to` in both stores, overwriting on the remote side.
    #[instrument(level = "debug", skip(self))]
    pub async fn rename(&self, from: &str, to: &str) -> ProxyResult<()> {
        let from = clean_path(from);
        let to = clean_path(to);
        let local = self.local.rename(&from, &to).await;
        let remote = self.remote.rename(&from, &to, true).await;
        combine(DualOp::Rename, from, local, remote)
    }
}

#[async_trait]
impl DirectoryLister for HybridFs {
    async fn list(&self, path: &str) -> ProxyResult<Vec<EntryInfo>> {
        self.readdir(path).await
    }
}

/// Fold the two outcomes of a dual-write: success if either side succeeded.
fn combine(
    op: DualOp,
    path: String,
    local: io::Result<()>,
    remote: Result<(), RemoteError>,
) -> ProxyResult<()> {
    match (local, remote) {
        (Ok(()), Ok(())) => Ok(()),
        (Err(e), Ok(())) => {
            warn!(%op, path = %path, error = %e, "Local side failed, remote succeeded");
            Ok(())
        }
        (Ok(()), Err(e)) => {
            warn!(%op, path = %path, error = %e, "Remote side failed, local succeeded");
            Ok(())
        }
        (Err(local), Err(remote)) => {
            error!(%op, path = %path, local = %local, remote = %remote, "Both stores failed");
            Err(ProxyError::Combined {
                op,
                path,
                local,
                remote,
            })
        }
    }
}
