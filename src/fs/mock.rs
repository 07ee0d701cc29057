// src/fs/mock.rs

//! In-memory [`FileSystem`] for tests.
//!
//! Directories are implicit: adding `a/b/c.txt` creates `a` and `a/b`.
//! Paths are used verbatim, so tests should stick to one spelling per file.

use super::FileSystem;
use anyhow::{anyhow, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone)]
enum MockEntry {
    File(Vec<u8>),
    Dir(BTreeSet<String>),
}

#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    entries: Arc<Mutex<BTreeMap<PathBuf, MockEntry>>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(PathBuf::from("."), MockEntry::Dir(BTreeSet::new()));
        Self {
            entries: Arc::new(Mutex::new(entries)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<PathBuf, MockEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create or overwrite a file.
    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let path = path.as_ref().to_path_buf();
        let mut entries = self.lock();
        link_into_parent(&mut entries, &path);
        entries.insert(path, MockEntry::File(content.into()));
    }

    /// Delete a file; returns whether it existed.
    pub fn remove_file(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        let mut entries = self.lock();
        let removed = matches!(entries.get(path), Some(MockEntry::File(_)));
        if removed {
            entries.remove(path);
            unlink_from_parent(&mut entries, path);
        }
        removed
    }

    /// Current content of a file, if present.
    pub fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        match self.lock().get(path.as_ref()) {
            Some(MockEntry::File(content)) => Some(content.clone()),
            _ => None,
        }
    }
}

fn parent_of(path: &Path) -> Option<PathBuf> {
    let parent = path.parent()?;
    if parent.as_os_str().is_empty() {
        Some(PathBuf::from("."))
    } else {
        Some(parent.to_path_buf())
    }
}

fn link_into_parent(entries: &mut BTreeMap<PathBuf, MockEntry>, path: &Path) {
    let Some(parent) = parent_of(path) else {
        return;
    };
    if parent == path {
        return;
    }
    if !entries.contains_key(&parent) {
        link_into_parent(entries, &parent);
        entries.insert(parent.clone(), MockEntry::Dir(BTreeSet::new()));
    }
    if let (Some(MockEntry::Dir(children)), Some(name)) =
        (entries.get_mut(&parent), path.file_name())
    {
        children.insert(name.to_string_lossy().into_owned());
    }
}

fn unlink_from_parent(entries: &mut BTreeMap<PathBuf, MockEntry>, path: &Path) {
    if let (Some(parent), Some(name)) = (parent_of(path), path.file_name()) {
        if let Some(MockEntry::Dir(children)) = entries.get_mut(&parent) {
            children.remove(name.to_string_lossy().as_ref());
        }
    }
}

impl FileSystem for MockFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        match self.lock().get(path) {
            Some(MockEntry::File(content)) => {
                String::from_utf8(content.clone()).map_err(|e| anyhow!("Invalid UTF-8: {}", e))
            }
            Some(MockEntry::Dir(_)) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn open_read(&self, path: &Path) -> Result<Box<dyn Read + Send>> {
        match self.lock().get(path) {
            Some(MockEntry::File(content)) => Ok(Box::new(Cursor::new(content.clone()))),
            Some(MockEntry::Dir(_)) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.add_file(path, contents);
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let content = self
            .contents(from)
            .ok_or_else(|| anyhow!("File not found: {:?}", from))?;
        self.remove_file(from);
        self.add_file(to, content);
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.lock().contains_key(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        matches!(self.lock().get(path), Some(MockEntry::File(_)))
    }

    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.lock().get(path), Some(MockEntry::Dir(_)))
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        match self.lock().get(path) {
            Some(MockEntry::Dir(children)) => {
                Ok(children.iter().map(|name| path.join(name)).collect())
            }
            _ => Err(anyhow!("Not a directory or not found: {:?}", path)),
        }
    }
}
