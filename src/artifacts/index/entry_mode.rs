//! File modes shared by tree entries and index entries

use crate::errors::BitError;

const TYPE_MASK: u32 = 0o170000;
const OWNER_EXECUTE: u32 = 0o100;

#[derive(Debug, Clone, Copy, Eq, Ord, Default, PartialEq, PartialOrd, Hash)]
pub enum FileMode {
    #[default]
    Regular,
    Executable,
}

#[derive(Debug, Clone, Copy, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub enum EntryMode {
    File(FileMode),
    Symlink,
    Gitlink,
    Directory,
}

impl Default for EntryMode {
    fn default() -> Self {
        EntryMode::File(FileMode::Regular)
    }
}

impl EntryMode {
    /// Octal text used in tree objects (no leading zero for directories)
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryMode::File(FileMode::Regular) => "100644",
            EntryMode::File(FileMode::Executable) => "100755",
            EntryMode::Symlink => "120000",
            EntryMode::Gitlink => "160000",
            EntryMode::Directory => "40000",
        }
    }

    pub fn as_u32(&self) -> u32 {
        match self {
            EntryMode::File(FileMode::Regular) => 0o100644,
            EntryMode::File(FileMode::Executable) => 0o100755,
            EntryMode::Symlink => 0o120000,
            EntryMode::Gitlink => 0o160000,
            EntryMode::Directory => 0o40000,
        }
    }

    pub fn is_tree(&self) -> bool {
        matches!(self, EntryMode::Directory)
    }

    /// Parse the octal text of a tree entry
    ///
    /// Like git, only the object type bits and the owner execute bit
    /// matter, so legacy spellings such as `100664` or `040000` are read
    /// as the canonical mode they stand for.
    pub fn from_octal_str(mode: &str) -> anyhow::Result<Self> {
        let value = match mode.len() {
            1..=7 if mode.bytes().all(|b| (b'0'..=b'7').contains(&b)) => {
                u32::from_str_radix(mode, 8).ok()
            }
            _ => None,
        }
        .ok_or_else(|| BitError::format(format!("invalid entry mode {mode:?}")))?;

        match value & TYPE_MASK {
            0o100000 if value & OWNER_EXECUTE != 0 => Ok(EntryMode::File(FileMode::Executable)),
            0o100000 => Ok(EntryMode::File(FileMode::Regular)),
            0o120000 => Ok(EntryMode::Symlink),
            0o160000 => Ok(EntryMode::Gitlink),
            0o040000 => Ok(EntryMode::Directory),
            _ => Err(BitError::format(format!("invalid entry mode {mode:?}")).into()),
        }
    }

    /// Whether `mode` is the spelling git writes for this mode
    pub fn is_canonical(&self, mode: &str) -> bool {
        self.as_str() == mode
    }
}

impl TryFrom<u32> for EntryMode {
    type Error = anyhow::Error;

    fn try_from(mode: u32) -> anyhow::Result<Self> {
        match mode {
            0o100644 => Ok(EntryMode::File(FileMode::Regular)),
            0o100755 => Ok(EntryMode::File(FileMode::Executable)),
            0o120000 => Ok(EntryMode::Symlink),
            0o160000 => Ok(EntryMode::Gitlink),
            0o40000 => Ok(EntryMode::Directory),
            _ => Err(BitError::format(format!("invalid entry mode {mode:o}")).into()),
        }
    }
}

impl From<FileMode> for EntryMode {
    fn from(mode: FileMode) -> Self {
        EntryMode::File(mode)
    }
}
