//! In-memory [`RemoteStore`] for tests.
//!
//! Keeps a flat, insertion-ordered list of nodes keyed by `/`-rooted path,
//! counts every call per operation, and can be told to fail whole classes
//! of calls so fallback and dual-write policies can be exercised without a
//! network.

use crate::entry::EntryInfo;
use crate::remote::{RangeReader, RemoteError, RemoteStore};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[derive(Debug, Clone)]
struct Node {
    path: String,
    info: EntryInfo,
    content: Vec<u8>,
}

/// Counters for each remote operation.
#[derive(Debug, Default)]
struct Calls {
    stat: AtomicUsize,
    read_dir: AtomicUsize,
    range: AtomicUsize,
    mkdir: AtomicUsize,
    remove: AtomicUsize,
    rename: AtomicUsize,
}

/// Remote store double backed by memory.
#[derive(Debug)]
pub struct MemoryRemote {
    nodes: Mutex<Vec<Node>>,
    calls: Calls,
    last_range: Mutex<Option<(String, u64, Option<u64>)>>,
    fail_stat: AtomicBool,
    fail_read_dir: AtomicBool,
    fail_ranges: AtomicBool,
    fail_mutations: AtomicBool,
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(i) => &path[..i],
    }
}

fn name_of(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or_default()
}

fn is_within(path: &str, root: &str) -> bool {
    path == root || (path.starts_with(root) && path.as_bytes().get(root.len()) == Some(&b'/'))
}

impl MemoryRemote {
    /// An empty store containing only the root directory.
    pub fn new() -> Self {
        Self {
            nodes: Mutex::new(vec![Node {
                path: "/".to_string(),
                info: EntryInfo::directory(""),
                content: Vec::new(),
            }]),
            calls: Calls::default(),
            last_range: Mutex::new(None),
            fail_stat: AtomicBool::new(false),
            fail_read_dir: AtomicBool::new(false),
            fail_ranges: AtomicBool::new(false),
            fail_mutations: AtomicBool::new(false),
        }
    }

    /// Add or replace a file, creating missing parent directories.
    pub fn add_file(&self, path: &str, content: &[u8]) {
        let info = EntryInfo::file(name_of(path), content.len() as u64);
        self.insert(path, info, content.to_vec());
    }

    /// Add a directory, creating missing parent directories.
    pub fn add_dir(&self, path: &str) {
        self.insert(path, EntryInfo::directory(name_of(path)), Vec::new());
    }

    fn insert(&self, path: &str, info: EntryInfo, content: Vec<u8>) {
        let parent = parent_of(path);
        if parent != "/" && !self.exists(parent) {
            self.add_dir(parent);
        }

        let mut nodes = self.nodes.lock();
        if let Some(node) = nodes.iter_mut().find(|n| n.path == path) {
            node.info = info;
            node.content = content;
        } else {
            nodes.push(Node {
                path: path.to_string(),
                info,
                content,
            });
        }
    }

    pub fn exists(&self, path: &str) -> bool {
        self.nodes.lock().iter().any(|n| n.path == path)
    }

    pub fn fail_stat(&self, fail: bool) {
        self.fail_stat.store(fail, Ordering::SeqCst);
    }

    pub fn fail_read_dir(&self, fail: bool) {
        self.fail_read_dir.store(fail, Ordering::SeqCst);
    }

    pub fn fail_ranges(&self, fail: bool) {
        self.fail_ranges.store(fail, Ordering::SeqCst);
    }

    /// Make `mkdir_all`, `remove_all` and `rename` fail.
    pub fn fail_mutations(&self, fail: bool) {
        self.fail_mutations.store(fail, Ordering::SeqCst);
    }

    pub fn stat_calls(&self) -> usize {
        self.calls.stat.load(Ordering::SeqCst)
    }

    pub fn read_dir_calls(&self) -> usize {
        self.calls.read_dir.load(Ordering::SeqCst)
    }

    pub fn range_calls(&self) -> usize {
        self.calls.range.load(Ordering::SeqCst)
    }

    pub fn mkdir_calls(&self) -> usize {
        self.calls.mkdir.load(Ordering::SeqCst)
    }

    pub fn remove_calls(&self) -> usize {
        self.calls.remove.load(Ordering::SeqCst)
    }

    pub fn rename_calls(&self) -> usize {
        self.calls.rename.load(Ordering::SeqCst)
    }

    /// Arguments of the most recent ranged fetch.
    pub fn last_range(&self) -> Option<(String, u64, Option<u64>)> {
        self.last_range.lock().clone()
    }

    fn check(flag: &AtomicBool, method: &str, path: &str, status: u16) -> Result<(), RemoteError> {
        if flag.load(Ordering::SeqCst) {
            return Err(RemoteError::Status {
                method: method.to_string(),
                path: path.to_string(),
                status,
            });
        }
        Ok(())
    }

    fn not_found(path: &str) -> RemoteError {
        RemoteError::NotFound {
            path: path.to_string(),
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn stat(&self, path: &str) -> Result<EntryInfo, RemoteError> {
        self.calls.stat.fetch_add(1, Ordering::SeqCst);
        Self::check(&self.fail_stat, "PROPFIND", path, 500)?;
        self.nodes
            .lock()
            .iter()
            .find(|n| n.path == path)
            .map(|n| n.info.clone())
            .ok_or_else(|| Self::not_found(path))
    }

    async fn read_dir(&self, path: &str) -> Result<Vec<EntryInfo>, RemoteError> {
        self.calls.read_dir.fetch_add(1, Ordering::SeqCst);
        Self::check(&self.fail_read_dir, "PROPFIND", path, 500)?;
        let nodes = self.nodes.lock();
        match nodes.iter().find(|n| n.path == path) {
            Some(dir) if dir.info.is_dir => {}
            Some(_) => {
                return Err(RemoteError::Status {
                    method: "PROPFIND".to_string(),
                    path: path.to_string(),
                    status: 409,
                });
            }
            None => return Err(Self::not_found(path)),
        }
        Ok(nodes
            .iter()
            .filter(|n| n.path != "/" && n.path != path && parent_of(&n.path) == path)
            .map(|n| n.info.clone())
            .collect())
    }

    async fn read_range(
        &self,
        path: &str,
        offset: u64,
        length: Option<u64>,
    ) -> Result<RangeReader, RemoteError> {
        self.calls.range.fetch_add(1, Ordering::SeqCst);
        *self.last_range.lock() = Some((path.to_string(), offset, length));
        Self::check(&self.fail_ranges, "GET", path, 503)?;

        let nodes = self.nodes.lock();
        let node = nodes
            .iter()
            .find(|n| n.path == path && !n.info.is_dir)
            .ok_or_else(|| Self::not_found(path))?;

        let len = node.content.len();
        let start = usize::try_from(offset).unwrap_or(len).min(len);
        let end = match length {
            Some(l) => start.saturating_add(usize::try_from(l).unwrap_or(len)).min(len),
            None => len,
        };
        Ok(Box::pin(Cursor::new(node.content[start..end].to_vec())))
    }

    async fn mkdir_all(&self, path: &str, _mode: u32) -> Result<(), RemoteError> {
        self.calls.mkdir.fetch_add(1, Ordering::SeqCst);
        Self::check(&self.fail_mutations, "MKCOL", path, 500)?;
        if path != "/" && !self.exists(path) {
            self.add_dir(path);
        }
        Ok(())
    }

    async fn remove_all(&self, path: &str) -> Result<(), RemoteError> {
        self.calls.remove.fetch_add(1, Ordering::SeqCst);
        Self::check(&self.fail_mutations, "DELETE", path, 500)?;
        self.nodes
            .lock()
            .retain(|n| n.path == "/" || !is_within(&n.path, path));
        Ok(())
    }

    async fn rename(&self, from: &str, to: &str, overwrite: bool) -> Result<(), RemoteError> {
        self.calls.rename.fetch_add(1, Ordering::SeqCst);
        Self::check(&self.fail_mutations, "MOVE", from, 500)?;

        let mut nodes = self.nodes.lock();
        if !nodes.iter().any(|n| n.path == from) {
            return Err(Self::not_found(from));
        }
        if nodes.iter().any(|n| n.path == to) {
            if !overwrite {
                return Err(RemoteError::Status {
                    method: "MOVE".to_string(),
                    path: to.to_string(),
                    status: 412,
                });
            }
            nodes.retain(|n| !is_within(&n.path, to));
        }
        for node in nodes.iter_mut().filter(|n| is_within(&n.path, from)) {
            node.path = format!("{to}{}", &node.path[from.len()..]);
            if node.path == to {
                node.info.name = name_of(to).to_string();
            }
        }
        Ok(())
    }
}
