use crate::areas::repository::Repository;
use crate::artifacts::refs::REFS_DIR;

impl Repository {
    pub fn show_ref(&mut self) -> anyhow::Result<()> {
        let refs = self.refs().list_refs(REFS_DIR)?;

        for (name, oid) in refs {
            writeln!(self.writer(), "{oid} {name}")?;
        }

        Ok(())
    }
}
