use crate::areas::repository::Repository;
use anyhow::Context;
use std::path::Path;

impl Repository {
    pub fn unpack_objects(&mut self, pack_path: &Path) -> anyhow::Result<()> {
        let data = std::fs::read(pack_path)
            .with_context(|| format!("Unable to read pack file {}", pack_path.display()))?;

        let written = self.database().unpack(data)?;

        for object_id in written {
            writeln!(self.writer(), "{object_id}")?;
        }

        Ok(())
    }
}
