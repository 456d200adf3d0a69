//! Hybrid local-cache / remote-store filesystem.
//!
//! A local cache directory sits in front of a remote store that can only be
//! reached through a narrow capability ([`RemoteStore`]): stat one path, list
//! one directory, fetch a byte range, and three mutating calls.
//!
//! # Policies
//!
//! - **Reads**: a path present in the cache is served from disk. Anything else
//!   opens as a read-only [`RemoteFile`] that issues one ranged fetch per read.
//! - **Listings**: local and remote entries are merged; local wins on name
//!   collision and a failing remote listing is tolerated.
//! - **Mutations**: `mkdir`, `remove_all` and `rename` are applied to both
//!   stores and succeed when either side does.
//!
//! # Example
//!
//! ```ignore
//! use cachedav_core::{CacheDir, HybridFs, OpenFlags};
//! use std::sync::Arc;
//!
//! let cache = CacheDir::ensure("/cache").await?;
//! let fs = HybridFs::new(Arc::new(cache), Arc::new(remote_client));
//!
//! let file = fs.open_file("/movies/a.mkv", OpenFlags::read_only(), 0o644).await?;
//! let mut buf = vec![0u8; 64 * 1024];
//! let n = file.read(&mut buf).await?;
//! ```

mod dir_listing;
mod entry;
mod error;
mod handle;
mod hybrid;
mod local;
mod remote;
mod remote_file;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use dir_listing::{DirectoryLister, DirectoryListing};
pub use entry::{DEFAULT_DIR_MODE, DEFAULT_FILE_MODE, EntryInfo};
pub use error::{DualOp, ErrorCategory, ProxyError, ProxyResult};
pub use handle::{DirBatch, OpenFlags, ProxyFile, Whence};
pub use hybrid::HybridFs;
pub use local::{CacheDir, LocalFile, LocalStore, clean_path};
pub use remote::{RangeReader, RemoteError, RemoteStore};
pub use remote_file::RemoteFile;
