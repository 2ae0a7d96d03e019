use crate::areas::repository::Repository;
use crate::artifacts::pack::packfile::Packfile;
use std::collections::BTreeMap;
use std::path::Path;

impl Repository {
    /// Check a pack file; `verbose` lists its objects as `git verify-pack -v`
    pub fn verify_pack(&mut self, pack_path: &Path, verbose: bool) -> anyhow::Result<()> {
        let pack = Packfile::open(pack_path)?;
        let objects = pack.objects()?;

        if !verbose {
            writeln!(self.writer(), "{}: ok", pack_path.display())?;
            return Ok(());
        }

        let mut chains = BTreeMap::<usize, usize>::new();
        for object in &objects {
            let mut line = format!(
                "{} {:<6} {} {} {}",
                object.oid,
                object.object_type.as_str(),
                object.size,
                object.packed_size,
                object.offset
            );
            if let Some(base) = &object.base {
                line.push_str(&format!(" {} {base}", object.depth));
            }
            writeln!(self.writer(), "{line}")?;

            *chains.entry(object.depth).or_default() += 1;
        }

        for (depth, count) in chains {
            match depth {
                0 => writeln!(self.writer(), "non delta: {count} objects")?,
                depth => writeln!(self.writer(), "chain length = {depth}: {count} objects")?,
            }
        }
        writeln!(self.writer(), "{}: ok", pack_path.display())?;

        Ok(())
    }
}
