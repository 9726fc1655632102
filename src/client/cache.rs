//! Cache capabilities the client writes into
//!
//! The client only writes to the change cache; lookups are the caller's
//! business. The file cache is consulted before and populated after a
//! content fetch.

use parking_lot::RwLock;
use std::collections::HashMap;

use super::query::{ChangeField, normalize_fields};
use super::types::{ChangeInfo, FileContent};

/// Receives every change fetched by the client.
pub trait ChangeCache: Send + Sync {
    /// Store `change` as fetched with `fields`.
    fn set(&self, change_id: &str, fields: &[ChangeField], change: &ChangeInfo);
}

/// File contents keyed by `(project, commit, path)`.
pub trait FileCache: Send + Sync {
    /// Whether an entry exists.
    fn has(&self, project: &str, commit: &str, path: &str) -> bool;
    /// Cached entry, if any.
    fn get(&self, project: &str, commit: &str, path: &str) -> Option<FileContent>;
    /// Store an entry.
    fn set(&self, project: &str, commit: &str, path: &str, content: FileContent);
}

type ChangeKey = (String, Vec<ChangeField>);

/// In-memory [`ChangeCache`].
#[derive(Debug, Default)]
pub struct MemoryChangeCache {
    entries: RwLock<HashMap<ChangeKey, ChangeInfo>>,
}

impl MemoryChangeCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry stored for `change_id` with exactly this annotation set.
    pub fn get(&self, change_id: &str, fields: &[ChangeField]) -> Option<ChangeInfo> {
        let key = (change_id.to_string(), normalize_fields(fields));
        self.entries.read().get(&key).cloned()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl ChangeCache for MemoryChangeCache {
    fn set(&self, change_id: &str, fields: &[ChangeField], change: &ChangeInfo) {
        let key = (change_id.to_string(), normalize_fields(fields));
        self.entries.write().insert(key, change.clone());
    }
}

type FileKey = (String, String, String);

fn file_key(project: &str, commit: &str, path: &str) -> FileKey {
    (project.to_string(), commit.to_string(), path.to_string())
}

/// In-memory [`FileCache`].
#[derive(Debug, Default)]
pub struct MemoryFileCache {
    entries: RwLock<HashMap<FileKey, FileContent>>,
}

impl MemoryFileCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl FileCache for MemoryFileCache {
    fn has(&self, project: &str, commit: &str, path: &str) -> bool {
        self.entries
            .read()
            .contains_key(&file_key(project, commit, path))
    }

    fn get(&self, project: &str, commit: &str, path: &str) -> Option<FileContent> {
        self.entries
            .read()
            .get(&file_key(project, commit, path))
            .cloned()
    }

    fn set(&self, project: &str, commit: &str, path: &str, content: FileContent) {
        self.entries
            .write()
            .insert(file_key(project, commit, path), content);
    }
}
