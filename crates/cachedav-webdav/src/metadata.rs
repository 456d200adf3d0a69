//! WebDAV metadata for proxy entries.

use cachedav_core::EntryInfo;
use dav_server::fs::{DavMetaData, FsError};
use std::time::SystemTime;

/// [`EntryInfo`] exposed to dav-server.
#[derive(Debug, Clone)]
pub struct EntryMetaData(pub EntryInfo);

impl From<EntryInfo> for EntryMetaData {
    fn from(info: EntryInfo) -> Self {
        Self(info)
    }
}

impl DavMetaData for EntryMetaData {
    fn len(&self) -> u64 {
        self.0.size
    }

    fn modified(&self) -> Result<SystemTime, FsError> {
        Ok(self.0.modified)
    }

    fn is_dir(&self) -> bool {
        self.0.is_dir
    }

    fn created(&self) -> Result<SystemTime, FsError> {
        // Neither store tracks creation time
        self.modified()
    }

    fn executable(&self) -> Result<bool, FsError> {
        Ok(!self.0.is_dir && self.0.mode & 0o111 != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_file_metadata() {
        let modified = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let meta = EntryMetaData::from(EntryInfo::file("a.bin", 42).with_modified(modified));
        assert_eq!(meta.len(), 42);
        assert!(meta.is_file());
        assert!(!meta.is_dir());
        assert_eq!(meta.modified().unwrap(), modified);
        assert!(!meta.executable().unwrap());
    }

    #[test]
    fn test_directory_metadata() {
        let meta = EntryMetaData::from(EntryInfo::directory("docs"));
        assert!(meta.is_dir());
        assert_eq!(meta.len(), 0);
        assert!(!meta.executable().unwrap());
    }

    #[test]
    fn test_executable_bit() {
        let meta = EntryMetaData::from(EntryInfo::file("run.sh", 10).with_mode(0o755));
        assert!(meta.executable().unwrap());
    }
}
