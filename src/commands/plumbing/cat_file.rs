use crate::areas::repository::Repository;
use crate::artifacts::objects::object::Object;
use crate::artifacts::objects::object_type::ObjectType;

/// What `cat-file` prints about an object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatFileMode {
    Pretty,
    Type,
    Size,
}

impl Repository {
    pub fn cat_file(&mut self, mode: CatFileMode, object: &str) -> anyhow::Result<()> {
        let object_id = self.resolve_object(object)?;
        let raw = self.database().read(&object_id)?;

        match mode {
            CatFileMode::Type => writeln!(self.writer(), "{}", raw.object_type)?,
            CatFileMode::Size => writeln!(self.writer(), "{}", raw.size())?,
            // blobs are printed byte for byte
            CatFileMode::Pretty if raw.object_type == ObjectType::Blob => {
                self.writer().write_all(&raw.data)?
            }
            CatFileMode::Pretty if raw.object_type == ObjectType::Tree => {
                let mut display = raw.parse()?.display();
                if !display.is_empty() {
                    display.push('\n');
                }
                write!(self.writer(), "{display}")?
            }
            // commits and tags are checked, then printed in their own encoding
            CatFileMode::Pretty => {
                raw.parse()?;
                self.writer().write_all(&raw.data)?
            }
        }

        Ok(())
    }
}
