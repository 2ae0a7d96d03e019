//! Git tree object
//!
//! Trees represent directory snapshots. They contain entries for files (blobs),
//! subdirectories (other trees), symlinks and gitlinks, each with a name and mode.
//!
//! ## Format
//!
//! Payload: concatenated `<mode> <name>\0<20-byte-sha1>` entries.
//!
//! Entries are ordered byte-wise by name, where a subtree compares as if its
//! name ended in `/`. The order is part of the hash, so decoding rejects any
//! payload that is not already in canonical order.

use crate::artifacts::index::entry_mode::EntryMode;
use crate::artifacts::objects::object::Unpackable;
use crate::artifacts::objects::object::{Object, Packable};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::OBJECT_ID_RAW_LENGTH;
use crate::errors::BitError;
use bytes::Bytes;
use derive_new::new;
use std::cmp::Ordering;
use std::collections::HashSet;

/// One named entry of a tree
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct TreeEntry {
    pub mode: EntryMode,
    pub name: String,
    pub oid: ObjectId,
    /// Mode as spelled in a decoded tree, when it differs from the canonical one
    #[new(default)]
    legacy_mode: Option<String>,
}

impl TreeEntry {
    /// Mode text written to the tree payload
    pub fn mode_text(&self) -> &str {
        self.legacy_mode.as_deref().unwrap_or(self.mode.as_str())
    }

    pub fn is_tree(&self) -> bool {
        self.mode.is_tree()
    }

    pub fn object_type(&self) -> ObjectType {
        match self.mode {
            EntryMode::Directory => ObjectType::Tree,
            EntryMode::Gitlink => ObjectType::Commit,
            _ => ObjectType::Blob,
        }
    }

    /// Compare two entries with git's tree ordering rule
    pub fn tree_order(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(other.sort_key())
    }

    fn sort_key(&self) -> impl Iterator<Item = u8> + '_ {
        let suffix: &[u8] = if self.is_tree() { b"/" } else { b"" };
        self.name.bytes().chain(suffix.iter().copied())
    }

    fn validate_name(name: &str) -> anyhow::Result<()> {
        if name.is_empty() || name.contains('/') || name.contains('\0') {
            anyhow::bail!(BitError::format(format!("invalid tree entry name {name:?}")));
        }
        Ok(())
    }
}

/// Fails on the first name used twice, whatever the entry kinds
fn check_unique_names<'e>(names: impl Iterator<Item = &'e str>) -> anyhow::Result<()> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            anyhow::bail!(BitError::format(format!("duplicate tree entry {name:?}")));
        }
    }
    Ok(())
}

/// Git tree object representing a directory snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tree {
    entries: Vec<TreeEntry>,
}

impl Tree {
    /// Build a tree from entries in any order
    ///
    /// Entries are sorted canonically; duplicate or invalid names are rejected.
    pub fn new(mut entries: Vec<TreeEntry>) -> anyhow::Result<Self> {
        for entry in &entries {
            TreeEntry::validate_name(&entry.name)?;
        }

        check_unique_names(entries.iter().map(|entry| entry.name.as_str()))?;
        entries.sort_by(|a, b| a.tree_order(b));

        Ok(Tree { entries })
    }

    pub fn entries(&self) -> &[TreeEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> impl Iterator<Item = TreeEntry> {
        self.entries.into_iter()
    }

    pub fn entry(&self, name: &str) -> Option<&TreeEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Packable for Tree {
    fn serialize(&self) -> anyhow::Result<Bytes> {
        let mut content = Vec::new();

        for entry in &self.entries {
            content.extend_from_slice(entry.mode_text().as_bytes());
            content.push(b' ');
            content.extend_from_slice(entry.name.as_bytes());
            content.push(0);
            entry.oid.write_h40_to(&mut content)?;
        }

        Ok(Bytes::from(content))
    }
}

impl Unpackable for Tree {
    fn deserialize(data: Bytes) -> anyhow::Result<Self> {
        let mut entries: Vec<TreeEntry> = Vec::new();
        let mut rest = &data[..];

        while !rest.is_empty() {
            let space = rest
                .iter()
                .position(|&b| b == b' ')
                .ok_or_else(|| BitError::format("unexpected end of tree entry mode"))?;
            let mode_text = std::str::from_utf8(&rest[..space])
                .map_err(|_| BitError::format("tree entry mode is not ASCII"))?;
            let mode = EntryMode::from_octal_str(mode_text)?;
            rest = &rest[space + 1..];

            let nul = rest
                .iter()
                .position(|&b| b == 0)
                .ok_or_else(|| BitError::format("unexpected end of tree entry name"))?;
            let name = std::str::from_utf8(&rest[..nul])
                .map_err(|_| BitError::format("tree entry name is not valid UTF-8"))?
                .to_string();
            TreeEntry::validate_name(&name)?;
            rest = &rest[nul + 1..];

            if rest.len() < OBJECT_ID_RAW_LENGTH {
                anyhow::bail!(BitError::format(format!(
                    "unexpected end of object ID for tree entry {name:?}"
                )));
            }
            let oid = ObjectId::from_raw(&rest[..OBJECT_ID_RAW_LENGTH])?;
            rest = &rest[OBJECT_ID_RAW_LENGTH..];

            let mut entry = TreeEntry::new(mode, name, oid);
            if !mode.is_canonical(mode_text) {
                entry.legacy_mode = Some(mode_text.to_string());
            }
            if let Some(previous) = entries.last()
                && previous.tree_order(&entry) != Ordering::Less
            {
                anyhow::bail!(BitError::format(format!(
                    "tree entries out of order: {:?} before {:?}",
                    previous.name, entry.name
                )));
            }
            entries.push(entry);
        }

        // a blob and a subtree of the same name pass the order check
        check_unique_names(entries.iter().map(|entry| entry.name.as_str()))?;

        Ok(Tree { entries })
    }
}

impl Object for Tree {
    fn object_type(&self) -> ObjectType {
        ObjectType::Tree
    }

    fn display(&self) -> String {
        self.entries
            .iter()
            .map(|entry| {
                format!(
                    "{:06o} {} {}\t{}",
                    entry.mode.as_u32(),
                    entry.object_type(),
                    entry.oid,
                    entry.name
                )
            })
            .collect::<Vec<String>>()
            .join("\n")
    }
}
