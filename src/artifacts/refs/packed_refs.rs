//! The `packed-refs` file
//!
//! ```text
//! # pack-refs with: peeled fully-peeled sorted
//! <40-hex> refs/heads/master
//! <40-hex> refs/tags/v1.0
//! ^<40-hex>
//! ```
//!
//! `#` lines are comments; a `^` line carries the peeled target of the
//! annotated tag on the line before it.

use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::BitError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedRef {
    pub oid: ObjectId,
    pub name: String,
    pub peeled: Option<ObjectId>,
}

impl PackedRef {
    /// The line as it appears in the file
    pub fn line(&self) -> String {
        format!("{} {}", self.oid, self.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackedRefs {
    entries: Vec<PackedRef>,
}

impl PackedRefs {
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let mut entries: Vec<PackedRef> = Vec::new();

        for (number, line) in text.lines().enumerate() {
            let line = line.trim_end_matches('\r');
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(peeled) = line.strip_prefix('^') {
                let previous = entries.last_mut().ok_or_else(|| {
                    BitError::format(format!(
                        "packed-refs line {}: peeled value without a ref",
                        number + 1
                    ))
                })?;
                previous.peeled = Some(ObjectId::try_parse(peeled.trim().to_string())?);
                continue;
            }

            let (oid, name) = line.split_once(' ').ok_or_else(|| {
                BitError::format(format!(
                    "packed-refs line {}: unexpected line {line:?}",
                    number + 1
                ))
            })?;

            entries.push(PackedRef {
                oid: ObjectId::try_parse(oid.to_string())?,
                name: name.trim().to_string(),
                peeled: None,
            });
        }

        Ok(PackedRefs { entries })
    }

    pub fn entries(&self) -> &[PackedRef] {
        &self.entries
    }

    pub fn get(&self, name: &str) -> Option<&PackedRef> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    /// Entries whose line ends with `text`
    ///
    /// This is a plain suffix match on `"<oid> <name>"`: `master` matches
    /// `refs/heads/master` and `refs/heads/feature/master` alike.
    pub fn matching_suffix(&self, text: &str) -> Vec<&PackedRef> {
        self.entries
            .iter()
            .filter(|entry| entry.line().ends_with(text))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
