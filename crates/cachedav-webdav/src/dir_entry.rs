//! WebDAV directory entries for merged listings.

use crate::metadata::EntryMetaData;
use cachedav_core::EntryInfo;
use dav_server::fs::{DavDirEntry, DavMetaData, FsFuture};

/// One entry of a directory listing, from either store.
#[derive(Debug, Clone)]
pub struct ProxyDirEntry(EntryInfo);

impl From<EntryInfo> for ProxyDirEntry {
    fn from(info: EntryInfo) -> Self {
        Self(info)
    }
}

impl DavDirEntry for ProxyDirEntry {
    fn name(&self) -> Vec<u8> {
        self.0.name.as_bytes().to_vec()
    }

    fn metadata(&self) -> FsFuture<'_, Box<dyn DavMetaData>> {
        let meta = EntryMetaData(self.0.clone());
        Box::pin(async move { Ok(Box::new(meta) as Box<dyn DavMetaData>) })
    }

    fn is_dir(&self) -> FsFuture<'_, bool> {
        let is_dir = self.0.is_dir;
        Box::pin(async move { Ok(is_dir) })
    }

    fn is_file(&self) -> FsFuture<'_, bool> {
        let is_file = !self.0.is_dir;
        Box::pin(async move { Ok(is_file) })
    }

    fn is_symlink(&self) -> FsFuture<'_, bool> {
        Box::pin(async { Ok(false) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_name() {
        let entry = ProxyDirEntry::from(EntryInfo::file("фильм.mkv", 1));
        assert_eq!(entry.name(), "фильм.mkv".as_bytes());
    }

    #[tokio::test]
    async fn test_entry_kind() {
        let file = ProxyDirEntry::from(EntryInfo::file("a.txt", 3));
        assert!(file.is_file().await.unwrap());
        assert!(!file.is_dir().await.unwrap());
        assert_eq!(file.metadata().await.unwrap().len(), 3);

        let dir = ProxyDirEntry::from(EntryInfo::directory("docs"));
        assert!(dir.is_dir().await.unwrap());
        assert!(!dir.is_file().await.unwrap());
    }
}
