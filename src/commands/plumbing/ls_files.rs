use crate::areas::repository::Repository;

impl Repository {
    pub fn ls_files(&mut self, stage: bool) -> anyhow::Result<()> {
        let index = self.index().load()?;

        for entry in index.entries() {
            if stage {
                writeln!(
                    self.writer(),
                    "{} {} {}\t{}",
                    entry.metadata.mode.as_str(),
                    entry.oid,
                    entry.stage,
                    entry.path
                )?;
            } else {
                writeln!(self.writer(), "{}", entry.path)?;
            }
        }

        Ok(())
    }
}
