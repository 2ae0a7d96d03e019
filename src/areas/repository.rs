use crate::areas::database::Database;
use crate::areas::index::IndexStore;
use crate::areas::refs::Refs;
use crate::areas::storage::FsStorage;
use crate::config::RepositoryConfig;
use anyhow::Context;
use std::cell::{RefCell, RefMut};
use std::path::Path;

pub struct Repository {
    config: RepositoryConfig,
    writer: RefCell<Box<dyn std::io::Write>>,
    database: Database,
    index: IndexStore<FsStorage>,
    refs: Refs,
}

impl Repository {
    pub fn new(config: RepositoryConfig, writer: Box<dyn std::io::Write>) -> anyhow::Result<Self> {
        let index_file = config.index_file();
        let index_dir = index_file
            .parent()
            .with_context(|| format!("Invalid index path {}", index_file.display()))?;
        let index_name = index_file
            .file_name()
            .with_context(|| format!("Invalid index path {}", index_file.display()))?
            .to_string_lossy()
            .into_owned();

        let index = IndexStore::new(FsStorage::new(index_dir), index_name);
        let database = Database::new(config.objects_dir().to_path_buf().into_boxed_path());
        let refs = Refs::new(config.git_dir().to_path_buf().into_boxed_path());

        Ok(Repository {
            config,
            writer: RefCell::new(writer),
            database,
            index,
            refs,
        })
    }

    /// Repository rooted at `path`, honoring git's environment overrides
    pub fn open(path: &Path, writer: Box<dyn std::io::Write>) -> anyhow::Result<Self> {
        if !path.exists() {
            std::fs::create_dir_all(path)
                .with_context(|| format!("Unable to create directory {}", path.display()))?;
        }
        let path = path.canonicalize()?;

        Self::new(RepositoryConfig::from_env(path), writer)
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    pub fn path(&self) -> &Path {
        self.config.work_dir()
    }

    pub fn writer(&'_ self) -> RefMut<'_, Box<dyn std::io::Write>> {
        self.writer.borrow_mut()
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn index(&self) -> &IndexStore<FsStorage> {
        &self.index
    }

    pub fn refs(&self) -> &Refs {
        &self.refs
    }
}
