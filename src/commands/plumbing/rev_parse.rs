use crate::areas::refs::ResolvedRef;
use crate::areas::repository::Repository;
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::BitError;

/// Shortest abbreviation accepted for an object ID
const MIN_ABBREV_LENGTH: usize = 4;

impl Repository {
    /// Object named by a full or abbreviated ID, or by a reference
    pub fn resolve_object(&self, name: &str) -> anyhow::Result<ObjectId> {
        let ref_error = match self.refs().resolve_oid(name) {
            Ok(oid) => return Ok(oid),
            Err(err) if matches!(BitError::kind_of(&err), Some(BitError::NotFound(_))) => err,
            Err(err) => return Err(err),
        };

        let is_abbreviation = name.len() >= MIN_ABBREV_LENGTH
            && name.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !is_abbreviation {
            return Err(ref_error);
        }

        let mut candidates = self.database().find_objects_by_prefix(name)?;
        match candidates.len() {
            0 => Err(ref_error),
            1 => Ok(candidates.remove(0)),
            _ => anyhow::bail!(BitError::AmbiguousReference(format!(
                "short object ID {name} matches {} objects",
                candidates.len()
            ))),
        }
    }

    pub fn rev_parse(&mut self, name: &str, depth: Option<usize>) -> anyhow::Result<()> {
        let resolved = match depth {
            Some(depth) => self.refs().resolve(name, Some(depth))?,
            None => ResolvedRef::Oid(self.resolve_object(name)?),
        };

        writeln!(self.writer(), "{resolved}")?;

        Ok(())
    }
}
