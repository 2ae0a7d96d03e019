//! Index entry representation
//!
//! Each entry in the index represents a tracked file with:
//! - File path
//! - Content hash (object ID)
//! - File metadata (mode, size, timestamps)
//! - Merge stage (0 for normal entries, 1-3 for conflicts)
//!
//! ## Entry Format
//!
//! ```text
//! 10 x u32   ctime, ctime_nsec, mtime, mtime_nsec, dev, ino, mode, uid, gid, size
//! 20 bytes   object ID
//! u16        flags: assume-valid | extended | stage(2) | name length(12)
//! u16        extended flags (v3, only when the extended bit is set)
//! path       followed by 1-8 NUL bytes so the entry length is a multiple of 8
//! ```

use crate::artifacts::index::checksum::Checksum;
use crate::artifacts::index::entry_mode::{EntryMode, FileMode};
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::BitError;
use bitflags::bitflags;
use byteorder::{ByteOrder, WriteBytesExt};
use derive_new::new;
use is_executable::IsExecutable;
use std::cmp::Ordering;
use std::fs::Metadata;
use std::io::Write;
use std::os::unix::prelude::MetadataExt;
use std::path::Path;

/// Block size for entry alignment (8 bytes)
pub const ENTRY_BLOCK: usize = 8;

/// Size of the fixed part of an entry, flags included
pub const ENTRY_FIXED_SIZE: usize = 62;

/// Names this long or longer store 0xFFF in the flags and rely on the NUL
const MAX_NAME_LENGTH: usize = 0x0FFF;

const FLAG_ASSUME_VALID: u16 = 0x8000;
const FLAG_EXTENDED: u16 = 0x4000;
const STAGE_MASK: u16 = 0x3000;
const STAGE_SHIFT: u16 = 12;

const EXTENDED_SKIP_WORKTREE: u16 = 0x4000;
const EXTENDED_INTENT_TO_ADD: u16 = 0x2000;

pub const MAX_STAGE: u8 = 3;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct EntryFlags: u8 {
        const ASSUME_VALID = 0b001;
        const SKIP_WORKTREE = 0b010;
        const INTENT_TO_ADD = 0b100;
    }
}

impl EntryFlags {
    /// Whether the entry can only be stored in a version 3 index
    pub fn needs_extended(&self) -> bool {
        self.intersects(EntryFlags::SKIP_WORKTREE | EntryFlags::INTENT_TO_ADD)
    }
}

/// Stat data cached for a tracked file
///
/// All values are truncated to 32 bits, as stored on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct EntryMetadata {
    pub ctime: u32,
    pub ctime_nsec: u32,
    pub mtime: u32,
    pub mtime_nsec: u32,
    pub dev: u32,
    pub ino: u32,
    pub mode: EntryMode,
    pub uid: u32,
    pub gid: u32,
    pub size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct IndexEntry {
    /// Slash-separated path relative to the work tree
    pub path: String,
    pub oid: ObjectId,
    pub metadata: EntryMetadata,
    #[new(default)]
    pub stage: u8,
    #[new(default)]
    pub flags: EntryFlags,
}

impl IndexEntry {
    pub fn with_stage(mut self, stage: u8) -> anyhow::Result<Self> {
        if stage > MAX_STAGE {
            anyhow::bail!(BitError::Validation(format!("invalid stage {stage}")));
        }
        self.stage = stage;
        Ok(self)
    }

    pub fn with_flags(mut self, flags: EntryFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn key(&self) -> (&str, u8) {
        (&self.path, self.stage)
    }

    pub fn is_conflicted(&self) -> bool {
        self.stage != 0
    }

    /// Order of entries inside the index: path bytes, then stage
    pub fn index_order(&self, other: &Self) -> Ordering {
        self.path
            .as_bytes()
            .cmp(other.path.as_bytes())
            .then(self.stage.cmp(&other.stage))
    }

    pub fn stat_match(&self, other: &EntryMetadata) -> bool {
        (self.metadata.size == 0 || self.metadata.size == other.size)
            && self.metadata.mode == other.mode
    }

    pub fn times_match(&self, other: &EntryMetadata) -> bool {
        self.metadata.ctime == other.ctime
            && self.metadata.ctime_nsec == other.ctime_nsec
            && self.metadata.mtime == other.mtime
            && self.metadata.mtime_nsec == other.mtime_nsec
    }

    pub fn validate_path(path: &str) -> anyhow::Result<()> {
        let valid = !path.is_empty()
            && !path.starts_with('/')
            && !path.ends_with('/')
            && !path.contains('\0')
            && path
                .split('/')
                .all(|component| !matches!(component, "" | "." | ".." | ".git"));

        if !valid {
            anyhow::bail!(BitError::Validation(format!("invalid index path {path:?}")));
        }
        Ok(())
    }

    pub fn serialize(&self) -> anyhow::Result<Vec<u8>> {
        let mut flags = (self.stage as u16) << STAGE_SHIFT;
        flags |= self.path.len().min(MAX_NAME_LENGTH) as u16;
        if self.flags.contains(EntryFlags::ASSUME_VALID) {
            flags |= FLAG_ASSUME_VALID;
        }
        if self.flags.needs_extended() {
            flags |= FLAG_EXTENDED;
        }

        let mut entry_bytes = Vec::with_capacity(ENTRY_FIXED_SIZE + self.path.len() + ENTRY_BLOCK);
        for value in [
            self.metadata.ctime,
            self.metadata.ctime_nsec,
            self.metadata.mtime,
            self.metadata.mtime_nsec,
            self.metadata.dev,
            self.metadata.ino,
            self.metadata.mode.as_u32(),
            self.metadata.uid,
            self.metadata.gid,
            self.metadata.size,
        ] {
            entry_bytes.write_u32::<byteorder::NetworkEndian>(value)?;
        }
        entry_bytes.write_all(&self.oid.to_raw())?;
        entry_bytes.write_u16::<byteorder::NetworkEndian>(flags)?;

        if self.flags.needs_extended() {
            let mut extended = 0;
            if self.flags.contains(EntryFlags::SKIP_WORKTREE) {
                extended |= EXTENDED_SKIP_WORKTREE;
            }
            if self.flags.contains(EntryFlags::INTENT_TO_ADD) {
                extended |= EXTENDED_INTENT_TO_ADD;
            }
            entry_bytes.write_u16::<byteorder::NetworkEndian>(extended)?;
        }

        entry_bytes.write_all(self.path.as_bytes())?;

        // there must be at least one NUL byte at the end
        entry_bytes.push(0);
        while entry_bytes.len() % ENTRY_BLOCK != 0 {
            entry_bytes.push(0);
        }

        Ok(entry_bytes)
    }

    /// Read one entry of an index with the given version
    pub fn read_from(reader: &mut Checksum<&[u8]>, version: u32) -> anyhow::Result<Self> {
        let fixed = reader.read(ENTRY_FIXED_SIZE)?;
        let field = |n: usize| byteorder::NetworkEndian::read_u32(&fixed[n * 4..n * 4 + 4]);

        let mode = EntryMode::try_from(field(6))?;
        if mode.is_tree() {
            anyhow::bail!(BitError::format("directory entry in index"));
        }
        let metadata = EntryMetadata {
            ctime: field(0),
            ctime_nsec: field(1),
            mtime: field(2),
            mtime_nsec: field(3),
            dev: field(4),
            ino: field(5),
            mode,
            uid: field(7),
            gid: field(8),
            size: field(9),
        };
        let oid = ObjectId::from_raw(&fixed[40..60])?;
        let flags_word = byteorder::NetworkEndian::read_u16(&fixed[60..62]);

        let mut flags = EntryFlags::empty();
        if flags_word & FLAG_ASSUME_VALID != 0 {
            flags |= EntryFlags::ASSUME_VALID;
        }
        let stage = ((flags_word & STAGE_MASK) >> STAGE_SHIFT) as u8;
        let name_length = (flags_word & MAX_NAME_LENGTH as u16) as usize;
        let mut consumed = ENTRY_FIXED_SIZE;

        if flags_word & FLAG_EXTENDED != 0 {
            if version < 3 {
                anyhow::bail!(BitError::format(
                    "extended entry flags in a version 2 index"
                ));
            }
            let extended = byteorder::NetworkEndian::read_u16(reader.read(2)?);
            consumed += 2;

            if extended & !(EXTENDED_SKIP_WORKTREE | EXTENDED_INTENT_TO_ADD) != 0 {
                anyhow::bail!(BitError::format(format!(
                    "unknown extended entry flags {extended:#06x}"
                )));
            }
            if extended & EXTENDED_SKIP_WORKTREE != 0 {
                flags |= EntryFlags::SKIP_WORKTREE;
            }
            if extended & EXTENDED_INTENT_TO_ADD != 0 {
                flags |= EntryFlags::INTENT_TO_ADD;
            }
        }

        let path = if name_length < MAX_NAME_LENGTH {
            reader.read(name_length)?.to_vec()
        } else {
            let mut path = Vec::with_capacity(MAX_NAME_LENGTH + 1);
            loop {
                match reader.read(1)?[0] {
                    0 => break,
                    byte => path.push(byte),
                }
            }
            // the terminating NUL counts as the first padding byte
            consumed += 1;
            path
        };
        consumed += path.len();

        let padding = if name_length < MAX_NAME_LENGTH {
            ENTRY_BLOCK - consumed % ENTRY_BLOCK
        } else {
            (ENTRY_BLOCK - consumed % ENTRY_BLOCK) % ENTRY_BLOCK
        };
        if reader.read(padding)?.iter().any(|&b| b != 0) {
            anyhow::bail!(BitError::format(format!(
                "entry path of {} bytes is not NUL-padded",
                path.len()
            )));
        }

        let path = String::from_utf8(path)
            .map_err(|_| BitError::format("index path is not valid UTF-8"))?;
        if path.contains('\0') {
            anyhow::bail!(BitError::format(format!("invalid index path {path:?}")));
        }

        Ok(IndexEntry {
            path,
            oid,
            metadata,
            stage,
            flags,
        })
    }
}

impl TryFrom<(&Path, Metadata)> for EntryMetadata {
    type Error = anyhow::Error;

    fn try_from((file_path, metadata): (&Path, Metadata)) -> Result<Self, Self::Error> {
        let mode = if metadata.is_dir() {
            anyhow::bail!(BitError::Validation(format!(
                "{} is a directory",
                file_path.display()
            )));
        } else if metadata.file_type().is_symlink() {
            EntryMode::Symlink
        } else {
            match file_path.is_executable() {
                true => EntryMode::File(FileMode::Executable),
                false => EntryMode::File(FileMode::Regular),
            }
        };

        Ok(Self {
            ctime: metadata.ctime() as u32,
            ctime_nsec: metadata.ctime_nsec() as u32,
            mtime: metadata.mtime() as u32,
            mtime_nsec: metadata.mtime_nsec() as u32,
            dev: metadata.dev() as u32,
            ino: metadata.ino() as u32,
            mode,
            uid: metadata.uid(),
            gid: metadata.gid(),
            size: metadata.size() as u32,
        })
    }
}
