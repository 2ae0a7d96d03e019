use crate::areas::repository::Repository;
use crate::artifacts::objects::object::{hash, GitObject};
use crate::artifacts::objects::object_type::ObjectType;
use anyhow::Context;
use bytes::Bytes;
use std::path::Path;

impl Repository {
    pub fn hash_object(
        &mut self,
        object_path: &Path,
        object_type: ObjectType,
        write: bool,
    ) -> anyhow::Result<()> {
        let object_data = std::fs::read(object_path)
            .with_context(|| format!("Unable to read {}", object_path.display()))?;

        // anything but a blob must at least decode
        if object_type != ObjectType::Blob {
            GitObject::deserialize(object_type, Bytes::from(object_data.clone())).with_context(
                || format!("{} is not a valid {object_type}", object_path.display()),
            )?;
        }

        let object_id = match write {
            true => self.database().write_raw(object_type, &object_data)?,
            false => hash(object_type, &object_data),
        };

        writeln!(self.writer(), "{object_id}")?;

        Ok(())
    }
}
