//! Storage capability behind the index
//!
//! The index store never touches the filesystem directly: it reads, writes
//! and locks named blobs through a [`Storage`]. [`FsStorage`] keeps them in
//! a directory and locks with git's `<name>.lock` files; [`MemoryStorage`]
//! keeps them in memory for tests.

use anyhow::Context;
use bytes::Bytes;
use fake::rand;
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::trace;

pub trait Storage {
    /// Held while the named blob is locked, released on drop
    type Guard;

    fn read(&self, name: &str) -> anyhow::Result<Option<Bytes>>;

    /// Replace the named blob; readers see either the old or the new content
    fn write(&self, name: &str, data: &[u8]) -> anyhow::Result<()>;

    /// Take the exclusive lock on a blob, failing if someone else holds it
    fn lock(&self, name: &str) -> anyhow::Result<Self::Guard>;

    /// Process-wide identity of a blob, used to serialize threads
    fn lock_key(&self, name: &str) -> String;
}

/// Write `data` to a temporary sibling of `path`, then rename it into place
pub fn write_atomic(path: &Path, data: &[u8]) -> anyhow::Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("Invalid path {}", path.display()))?;
    std::fs::create_dir_all(parent)
        .with_context(|| format!("Unable to create directory {}", parent.display()))?;

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_path = parent.join(format!(".{file_name}.tmp-{}", rand::random::<u32>()));

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&temp_path)
        .with_context(|| format!("Unable to open temporary file {}", temp_path.display()))?;

    let written = file
        .write_all(data)
        .and_then(|_| file.sync_all())
        .with_context(|| format!("Unable to write temporary file {}", temp_path.display()))
        .and_then(|_| {
            std::fs::rename(&temp_path, path)
                .with_context(|| format!("Unable to rename file to {}", path.display()))
        });

    if written.is_err() {
        let _ = std::fs::remove_file(&temp_path);
    }
    written
}

/// Directory-backed storage
#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsStorage { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

/// `<name>.lock` file, removed when dropped
#[derive(Debug)]
pub struct LockFile {
    path: PathBuf,
}

impl LockFile {
    pub fn acquire(path: PathBuf) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Unable to create directory {}", parent.display()))?;
        }

        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(_) => Ok(LockFile { path }),
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => anyhow::bail!(
                "Unable to create '{}': File exists. Another process seems to be holding the lock",
                path.display()
            ),
            Err(err) => {
                Err(err).with_context(|| format!("Unable to create lock file {}", path.display()))
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            trace!(path = %self.path.display(), %err, "lock file already gone");
        }
    }
}

impl Storage for FsStorage {
    type Guard = LockFile;

    fn read(&self, name: &str) -> anyhow::Result<Option<Bytes>> {
        let path = self.path_of(name);
        match std::fs::read(&path) {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("Unable to read {}", path.display())),
        }
    }

    fn write(&self, name: &str, data: &[u8]) -> anyhow::Result<()> {
        write_atomic(&self.path_of(name), data)
    }

    fn lock(&self, name: &str) -> anyhow::Result<LockFile> {
        LockFile::acquire(self.path_of(&format!("{name}.lock")))
    }

    fn lock_key(&self, name: &str) -> String {
        let path = self.path_of(name);
        path.canonicalize()
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned()
    }
}

static MEMORY_STORAGE_IDS: AtomicUsize = AtomicUsize::new(0);

/// In-memory storage; clones share the same blobs and locks
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    id: usize,
    files: Arc<Mutex<HashMap<String, Bytes>>>,
    locks: Arc<Mutex<HashSet<String>>>,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        MemoryStorage {
            id: MEMORY_STORAGE_IDS.fetch_add(1, Ordering::Relaxed),
            files: Arc::default(),
            locks: Arc::default(),
        }
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_locked(&self, name: &str) -> bool {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(name)
    }
}

#[derive(Debug)]
pub struct MemoryLock {
    name: String,
    locks: Arc<Mutex<HashSet<String>>>,
}

impl Drop for MemoryLock {
    fn drop(&mut self) {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.name);
    }
}

impl Storage for MemoryStorage {
    type Guard = MemoryLock;

    fn read(&self, name: &str) -> anyhow::Result<Option<Bytes>> {
        Ok(self
            .files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned())
    }

    fn write(&self, name: &str, data: &[u8]) -> anyhow::Result<()> {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), Bytes::copy_from_slice(data));
        Ok(())
    }

    fn lock(&self, name: &str) -> anyhow::Result<MemoryLock> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if !locks.insert(name.to_string()) {
            anyhow::bail!("Unable to lock '{name}': already locked");
        }

        Ok(MemoryLock {
            name: name.to_string(),
            locks: self.locks.clone(),
        })
    }

    fn lock_key(&self, name: &str) -> String {
        format!("memory:{}:{name}", self.id)
    }
}
