use crate::areas::repository::Repository;
use crate::artifacts::index::index_entry::{EntryMetadata, IndexEntry};
use crate::artifacts::objects::object_type::ObjectType;
use crate::errors::BitError;
use anyhow::Context;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

impl Repository {
    /// Store the given files as blobs and stage them
    ///
    /// Without `add`, only paths the index already tracks are accepted.
    pub fn update_index(&mut self, files: &[String], add: bool) -> anyhow::Result<()> {
        let mut staged = Vec::with_capacity(files.len());

        for file in files {
            let (file_path, entry_path) = self.work_tree_path(Path::new(file))?;
            let metadata = std::fs::symlink_metadata(&file_path)
                .with_context(|| format!("Unable to stat {}", file_path.display()))?;

            // a symlink is stored as its target
            let content = if metadata.file_type().is_symlink() {
                std::fs::read_link(&file_path)?.as_os_str().as_bytes().to_vec()
            } else {
                std::fs::read(&file_path)
                    .with_context(|| format!("Unable to read {}", file_path.display()))?
            };

            let oid = self.database().write_raw(ObjectType::Blob, &content)?;
            let stat = EntryMetadata::try_from((file_path.as_path(), metadata))?;
            staged.push(IndexEntry::new(entry_path, oid, stat));
        }

        self.index().acquire(|index| {
            for entry in staged {
                if !add && !index.is_tracked(&entry.path) {
                    anyhow::bail!(BitError::Validation(format!(
                        "{}: cannot add to the index - missing --add option?",
                        entry.path
                    )));
                }
                index.insert(entry)?;
            }
            Ok(())
        })
    }

    /// Absolute path of `file` and its slash-separated path inside the work tree
    fn work_tree_path(&self, file: &Path) -> anyhow::Result<(PathBuf, String)> {
        let work_dir = self.path();
        let absolute = match file.is_absolute() {
            true => file.to_path_buf(),
            false => work_dir.join(file),
        };

        // resolve the directory only, so a symlink is staged as itself
        let file_name = absolute
            .file_name()
            .with_context(|| format!("Invalid path {}", file.display()))?;
        let parent = absolute
            .parent()
            .with_context(|| format!("Invalid path {}", file.display()))?
            .canonicalize()
            .with_context(|| format!("Unable to resolve {}", file.display()))?;
        let absolute = parent.join(file_name);

        let relative = absolute.strip_prefix(work_dir).map_err(|_| {
            BitError::Validation(format!("{} is outside repository", file.display()))
        })?;
        let entry_path = relative
            .components()
            .map(|component| {
                component.as_os_str().to_str().ok_or_else(|| {
                    BitError::Validation(format!("{} is not valid UTF-8", file.display()))
                })
            })
            .collect::<Result<Vec<_>, _>>()?
            .join("/");

        Ok((absolute, entry_path))
    }
}
