//! Git index (staging area)
//!
//! [`Index`] is the in-memory model of the index file: entries keyed by
//! (path, stage) in on-disk order, plus the extension blocks that follow
//! them. [`IndexStore`] persists it through a [`Storage`] and owns the
//! exclusive-mutation protocol.
//!
//! ## Index File Format
//!
//! The index file contains:
//! - Header: Signature, version, and entry count
//! - Entries: Sorted list of tracked files with metadata
//! - Extensions: Opaque blocks such as the cached tree
//! - Checksum: SHA-1 hash of the entire index for integrity verification

use crate::areas::storage::Storage;
use crate::artifacts::index::checksum::Checksum;
use crate::artifacts::index::extension::Extension;
use crate::artifacts::index::index_entry::{IndexEntry, MAX_STAGE};
use crate::artifacts::index::index_header::IndexHeader;
use crate::artifacts::index::{CHECKSUM_SIZE, HEADER_SIZE, SIGNATURE, VERSION};
use crate::artifacts::objects::object::{Packable, Unpackable};
use crate::errors::BitError;
use bytes::Bytes;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, LazyLock, Mutex, PoisonError};
use tracing::debug;

/// Version needed for entries carrying extended flags
const EXTENDED_VERSION: u32 = 3;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Index {
    /// Tracked files keyed by (path, stage); `String` ordering is byte ordering
    entries: BTreeMap<(String, u8), IndexEntry>,
    extensions: Vec<Extension>,
    /// Version read from disk when it is higher than the entries need
    pinned_version: Option<u32>,
}

impl Index {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode an index file, verifying its checksum
    pub fn parse(data: &[u8]) -> anyhow::Result<Self> {
        let mut reader = Checksum::reader(data);

        let header = IndexHeader::deserialize(Bytes::copy_from_slice(reader.read(HEADER_SIZE)?))?;

        let mut entries = BTreeMap::new();
        let mut previous: Option<(String, u8)> = None;
        for _ in 0..header.entries_count {
            let entry = IndexEntry::read_from(&mut reader, header.version)?;
            let key = (entry.path.clone(), entry.stage);

            if let Some(previous) = &previous {
                if previous == &key {
                    anyhow::bail!(BitError::format(format!(
                        "duplicate index entry {} (stage {})",
                        key.0, key.1
                    )));
                }
                if previous > &key {
                    anyhow::bail!(BitError::format(format!(
                        "index entries out of order at {}",
                        key.0
                    )));
                }
            }

            previous = Some(key.clone());
            entries.insert(key, entry);
        }

        let mut extensions = Vec::new();
        while reader.remaining() > CHECKSUM_SIZE {
            extensions.push(Extension::read_from(&mut reader)?);
        }

        reader.verify()?;

        let mut index = Index {
            entries,
            extensions,
            pinned_version: None,
        };
        if header.version > index.version() {
            index.pinned_version = Some(header.version);
        }

        Ok(index)
    }

    /// Encode the index, checksum included
    pub fn serialize(&self) -> anyhow::Result<Bytes> {
        let mut writer = Checksum::writer();

        let header = IndexHeader::new(
            String::from(SIGNATURE),
            self.version(),
            self.entries.len() as u32,
        );
        writer.write(&header.serialize()?);

        for entry in self.entries.values() {
            writer.write(&entry.serialize()?);
        }
        for extension in &self.extensions {
            writer.write(&extension.serialize());
        }

        Ok(writer.write_checksum())
    }

    /// Version the index is written with
    ///
    /// 3 if an entry carries extended flags, otherwise the version the file
    /// was read with (2 for a new index), so a parsed index re-encodes to
    /// the same bytes.
    pub fn version(&self) -> u32 {
        let required = if self.entries.values().any(|entry| entry.flags.needs_extended()) {
            EXTENDED_VERSION
        } else {
            VERSION
        };
        required.max(self.pinned_version.unwrap_or(VERSION))
    }

    /// Add or replace an entry
    ///
    /// A merged entry (stage 0) replaces the conflict stages of its path and
    /// a conflict stage replaces the merged entry. A file replaces a
    /// directory of the same name and the other way round.
    pub fn insert(&mut self, entry: IndexEntry) -> anyhow::Result<()> {
        IndexEntry::validate_path(&entry.path)?;
        if entry.stage > MAX_STAGE {
            anyhow::bail!(BitError::Validation(format!("invalid stage {}", entry.stage)));
        }

        self.discard_conflicts(&entry);
        self.entries
            .insert((entry.path.clone(), entry.stage), entry);
        self.invalidate_caches();

        Ok(())
    }

    /// Remove every stage of `path`; returns whether anything was removed
    pub fn remove(&mut self, path: &str) -> bool {
        let removed = self.remove_stages(path);
        if removed {
            self.invalidate_caches();
        }
        removed
    }

    pub fn entry(&self, path: &str, stage: u8) -> Option<&IndexEntry> {
        self.entries.get(&(path.to_string(), stage))
    }

    /// Entries in on-disk order
    pub fn entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.values()
    }

    pub fn into_entries(self) -> impl Iterator<Item = IndexEntry> {
        self.entries.into_values()
    }

    pub fn is_conflicted(&self) -> bool {
        self.entries.values().any(IndexEntry::is_conflicted)
    }

    pub fn is_tracked(&self, path: &str) -> bool {
        (0..=MAX_STAGE).any(|stage| self.entry(path, stage).is_some())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.invalidate_caches();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn extensions(&self) -> &[Extension] {
        &self.extensions
    }

    /// Append an extension block, replacing one with the same signature
    pub fn set_extension(&mut self, extension: Extension) {
        self.extensions
            .retain(|existing| existing.signature != extension.signature);
        self.extensions.push(extension);
    }

    fn discard_conflicts(&mut self, entry: &IndexEntry) {
        if entry.stage == 0 {
            self.remove_stages(&entry.path);
        } else {
            self.entries.remove(&(entry.path.clone(), 0));
        }

        // files in place of the parent directories
        let mut parent = entry.path.as_str();
        while let Some((dir, _)) = parent.rsplit_once('/') {
            self.remove_stages(dir);
            parent = dir;
        }

        // entries below a directory of the same name
        let prefix = format!("{}/", entry.path);
        let children = self
            .entries
            .range((prefix.clone(), 0)..)
            .take_while(|((path, _), _)| path.starts_with(&prefix))
            .map(|(key, _)| key.clone())
            .collect::<Vec<_>>();
        for key in children {
            self.entries.remove(&key);
        }
    }

    fn remove_stages(&mut self, path: &str) -> bool {
        (0..=MAX_STAGE).fold(false, |removed, stage| {
            self.entries.remove(&(path.to_string(), stage)).is_some() || removed
        })
    }

    fn invalidate_caches(&mut self) {
        self.extensions.retain(|extension| !extension.is_cache());
    }
}

/// In-process locks, one per storage lock key
static PROCESS_LOCKS: LazyLock<Mutex<HashMap<String, Arc<Mutex<()>>>>> =
    LazyLock::new(Default::default);

fn process_lock(key: &str) -> Arc<Mutex<()>> {
    PROCESS_LOCKS
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .entry(key.to_string())
        .or_default()
        .clone()
}

/// Persisted index with exclusive, all-or-nothing mutation
#[derive(Debug, Clone)]
pub struct IndexStore<S> {
    storage: S,
    name: String,
}

impl<S: Storage> IndexStore<S> {
    pub fn new(storage: S, name: impl Into<String>) -> Self {
        IndexStore {
            storage,
            name: name.into(),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Read-only snapshot; a missing or empty file is an empty index
    pub fn load(&self) -> anyhow::Result<Index> {
        match self.storage.read(&self.name)? {
            Some(data) if !data.is_empty() => Index::parse(&data),
            _ => Ok(Index::new()),
        }
    }

    /// Run `f` on the current index while holding both locks, then persist it
    ///
    /// If `f` (or reading the current index) fails, nothing is written and
    /// the error is returned as is. Locks are released in every case.
    pub fn acquire<T>(
        &self,
        f: impl FnOnce(&mut Index) -> anyhow::Result<T>,
    ) -> anyhow::Result<T> {
        let process_lock = process_lock(&self.storage.lock_key(&self.name));
        let _thread_guard = process_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let _storage_guard = self.storage.lock(&self.name)?;

        let mut index = self.load()?;
        let result = f(&mut index)?;

        let data = index.serialize()?;
        self.storage.write(&self.name, &data)?;
        debug!(
            index = %self.name,
            entries = index.len(),
            version = index.version(),
            "wrote index"
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::areas::storage::MemoryStorage;
    use crate::artifacts::index::extension::{TREE, UNTRACKED};
    use crate::artifacts::index::index_entry::{EntryFlags, EntryMetadata};
    use crate::artifacts::objects::object::hash;
    use crate::artifacts::objects::object_type::ObjectType;
    use rstest::{fixture, rstest};

    fn entry(path: &str) -> IndexEntry {
        let oid = hash(ObjectType::Blob, path.as_bytes());
        IndexEntry::new(
            path.to_string(),
            oid,
            EntryMetadata {
                size: path.len() as u32,
                mtime: 1_700_000_000,
                ..Default::default()
            },
        )
    }

    fn staged(path: &str, stage: u8) -> IndexEntry {
        entry(path).with_stage(stage).unwrap()
    }

    fn paths(index: &Index) -> Vec<(String, u8)> {
        index
            .entries()
            .map(|entry| (entry.path.clone(), entry.stage))
            .collect()
    }

    #[fixture]
    fn store() -> IndexStore<MemoryStorage> {
        IndexStore::new(MemoryStorage::new(), "index")
    }

    #[test]
    fn empty_index_is_header_and_checksum() {
        let bytes = Index::new().serialize().unwrap();

        pretty_assertions::assert_eq!(bytes.len(), HEADER_SIZE + CHECKSUM_SIZE);
        pretty_assertions::assert_eq!(&bytes[..4], b"DIRC");
        pretty_assertions::assert_eq!(Index::parse(&bytes).unwrap(), Index::new());
    }

    #[test]
    fn parse_of_serialize_yields_sorted_entries() {
        let mut index = Index::new();
        for path in ["zeta", "a/b", "a-b", "a.c", "Z"] {
            index.insert(entry(path)).unwrap();
        }

        let bytes = index.serialize().unwrap();
        let parsed = Index::parse(&bytes).unwrap();

        pretty_assertions::assert_eq!(
            paths(&parsed),
            vec![
                ("Z".to_string(), 0),
                ("a-b".to_string(), 0),
                ("a.c".to_string(), 0),
                ("a/b".to_string(), 0),
                ("zeta".to_string(), 0),
            ]
        );
        pretty_assertions::assert_eq!(parsed.serialize().unwrap(), bytes);
    }

    #[test]
    fn version_follows_extended_flags() {
        let mut index = Index::new();
        index.insert(entry("plain")).unwrap();
        pretty_assertions::assert_eq!(index.version(), 2);

        index
            .insert(entry("sparse").with_flags(EntryFlags::SKIP_WORKTREE))
            .unwrap();
        let bytes = index.serialize().unwrap();

        pretty_assertions::assert_eq!(&bytes[4..8], &[0, 0, 0, 3]);
        pretty_assertions::assert_eq!(Index::parse(&bytes).unwrap(), index);
    }

    #[test]
    fn version_three_without_extended_entries_is_kept() {
        let bytes = raw_index_with_version(EXTENDED_VERSION, &[entry("plain")]);

        let mut index = Index::parse(&bytes).unwrap();

        pretty_assertions::assert_eq!(index.version(), 3);
        pretty_assertions::assert_eq!(index.serialize().unwrap(), bytes);

        index.insert(entry("another")).unwrap();
        let rewritten = index.serialize().unwrap();
        pretty_assertions::assert_eq!(&rewritten[4..8], &[0, 0, 0, 3]);
    }

    #[test]
    fn merged_entry_replaces_conflict_stages() {
        let mut index = Index::new();
        for stage in 1..=3 {
            index.insert(staged("file", stage)).unwrap();
        }
        assert!(index.is_conflicted());

        index.insert(entry("file")).unwrap();

        pretty_assertions::assert_eq!(paths(&index), vec![("file".to_string(), 0)]);

        index.insert(staged("file", 2)).unwrap();
        pretty_assertions::assert_eq!(paths(&index), vec![("file".to_string(), 2)]);
    }

    #[rstest]
    #[case::file_replaces_directory(&["dir/a", "dir/b", "dirt"], "dir", &["dir", "dirt"])]
    #[case::directory_replaces_file(&["dir", "other"], "dir/a/b", &["dir/a/b", "other"])]
    fn file_and_directory_conflicts(
        #[case] existing: &[&str],
        #[case] inserted: &str,
        #[case] expected: &[&str],
    ) {
        let mut index = Index::new();
        for path in existing {
            index.insert(entry(path)).unwrap();
        }

        index.insert(entry(inserted)).unwrap();

        let remaining = index.entries().map(|e| e.path.as_str()).collect::<Vec<_>>();
        pretty_assertions::assert_eq!(remaining, expected.to_vec());
    }

    #[test]
    fn remove_drops_every_stage() {
        let mut index = Index::new();
        index.insert(staged("file", 1)).unwrap();
        index.insert(staged("file", 3)).unwrap();
        index.insert(entry("keep")).unwrap();

        assert!(index.remove("file"));
        assert!(!index.remove("file"));
        pretty_assertions::assert_eq!(paths(&index), vec![("keep".to_string(), 0)]);
    }

    #[test]
    fn mutation_drops_cache_extensions_only() {
        let mut index = Index::new();
        index.set_extension(Extension::new(TREE, Bytes::from_static(b"cached")));
        index.set_extension(Extension::new(UNTRACKED, Bytes::from_static(b"cached")));
        index.set_extension(Extension::new(*b"link", Bytes::from_static(b"shared")));

        let parsed = Index::parse(&index.serialize().unwrap()).unwrap();
        pretty_assertions::assert_eq!(parsed.extensions().len(), 3);

        let mut mutated = parsed.clone();
        mutated.insert(entry("new")).unwrap();

        let names = mutated
            .extensions()
            .iter()
            .map(Extension::name)
            .collect::<Vec<_>>();
        pretty_assertions::assert_eq!(names, vec!["link".to_string()]);
    }

    #[test]
    fn rejects_invalid_paths() {
        let mut index = Index::new();

        assert!(index.insert(entry("../escape")).is_err());
        assert!(index.is_empty());
    }

    fn raw_index(entries: &[IndexEntry]) -> Bytes {
        raw_index_with_version(VERSION, entries)
    }

    fn raw_index_with_version(version: u32, entries: &[IndexEntry]) -> Bytes {
        let mut writer = Checksum::writer();
        let header = IndexHeader::new(String::from(SIGNATURE), version, entries.len() as u32);
        writer.write(&header.serialize().unwrap());
        for entry in entries {
            writer.write(&entry.serialize().unwrap());
        }
        writer.write_checksum()
    }

    #[rstest]
    #[case::duplicate(&["same", "same"], "duplicate")]
    #[case::unsorted(&["b", "a"], "out of order")]
    fn rejects_badly_ordered_entries(#[case] paths: &[&str], #[case] message: &str) {
        let entries = paths.iter().map(|path| entry(path)).collect::<Vec<_>>();

        let err = Index::parse(&raw_index(&entries)).unwrap_err();

        assert!(err.to_string().contains(message), "{err}");
        assert!(matches!(BitError::kind_of(&err), Some(BitError::Format(_))));
    }

    #[test]
    fn rejects_corrupted_checksum() {
        let mut bytes = raw_index(&[entry("a")]).to_vec();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;

        assert!(Index::parse(&bytes).is_err());
    }

    #[test]
    fn rejects_truncated_index() {
        let bytes = raw_index(&[entry("a"), entry("b")]);

        assert!(Index::parse(&bytes[..bytes.len() - 30]).is_err());
    }

    #[rstest]
    fn acquire_persists_changes(store: IndexStore<MemoryStorage>) {
        store
            .acquire(|index| index.insert(entry("file.txt")))
            .unwrap();

        let loaded = store.load().unwrap();
        pretty_assertions::assert_eq!(paths(&loaded), vec![("file.txt".to_string(), 0)]);
        assert!(!store.storage().is_locked("index"));
    }

    #[rstest]
    fn failed_callback_leaves_index_untouched(store: IndexStore<MemoryStorage>) {
        store.acquire(|index| index.insert(entry("kept"))).unwrap();
        let before = store.storage().read("index").unwrap();

        let result: anyhow::Result<()> = store.acquire(|index| {
            index.clear();
            index.insert(entry("lost"))?;
            anyhow::bail!("callback failed")
        });

        assert!(result.is_err());
        pretty_assertions::assert_eq!(store.storage().read("index").unwrap(), before);
        assert!(!store.storage().is_locked("index"));
    }

    #[rstest]
    fn held_storage_lock_fails_fast(store: IndexStore<MemoryStorage>) {
        let _held = store.storage().lock("index").unwrap();

        let result = store.acquire(|index| index.insert(entry("file")));

        assert!(result.is_err());
        pretty_assertions::assert_eq!(store.storage().read("index").unwrap(), None);
    }

    #[rstest]
    fn concurrent_mutations_are_serialized(store: IndexStore<MemoryStorage>) {
        let handles = (0..8)
            .map(|n| {
                let store = store.clone();
                std::thread::spawn(move || {
                    store.acquire(|index| index.insert(entry(&format!("file-{n}"))))
                })
            })
            .collect::<Vec<_>>();

        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        pretty_assertions::assert_eq!(store.load().unwrap().len(), 8);
    }
}
