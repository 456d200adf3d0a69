//! Metadata snapshots for local and remote entries.

use std::fs::Metadata;
use std::time::SystemTime;

/// Default permission bits for directories that carry none.
pub const DEFAULT_DIR_MODE: u32 = 0o755;

/// Default permission bits for files that carry none.
pub const DEFAULT_FILE_MODE: u32 = 0o644;

/// Metadata for one path, from either store.
///
/// A snapshot: it is never refreshed after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    /// Final path component (empty for the root).
    pub name: String,
    /// Size in bytes (0 for directories).
    pub size: u64,
    /// Whether this entry is a directory.
    pub is_dir: bool,
    /// Last modification time.
    pub modified: SystemTime,
    /// Permission bits.
    pub mode: u32,
}

impl EntryInfo {
    /// Metadata for a regular file.
    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            is_dir: false,
            modified: SystemTime::UNIX_EPOCH,
            mode: DEFAULT_FILE_MODE,
        }
    }

    /// Metadata for a directory.
    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: 0,
            is_dir: true,
            modified: SystemTime::UNIX_EPOCH,
            mode: DEFAULT_DIR_MODE,
        }
    }

    #[must_use]
    pub fn with_modified(mut self, modified: SystemTime) -> Self {
        self.modified = modified;
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }

    /// Build from local filesystem metadata.
    pub fn from_metadata(name: impl Into<String>, meta: &Metadata) -> Self {
        let is_dir = meta.is_dir();
        Self {
            name: name.into(),
            size: if is_dir { 0 } else { meta.len() },
            is_dir,
            modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            mode: permission_bits(meta, is_dir),
        }
    }
}

#[cfg(unix)]
fn permission_bits(meta: &Metadata, _is_dir: bool) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn permission_bits(meta: &Metadata, is_dir: bool) -> u32 {
    let mode = if is_dir { DEFAULT_DIR_MODE } else { DEFAULT_FILE_MODE };
    if meta.permissions().readonly() {
        mode & !0o222
    } else {
        mode
    }
}
