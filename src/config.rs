//! Repository layout
//!
//! Every path the storage core touches is derived once from the work tree,
//! optionally redirected by git's environment variables.

use std::path::{Path, PathBuf};

pub const GIT_DIR_ENV: &str = "GIT_DIR";
pub const GIT_OBJECT_DIRECTORY_ENV: &str = "GIT_OBJECT_DIRECTORY";
pub const GIT_INDEX_FILE_ENV: &str = "GIT_INDEX_FILE";

const GIT_DIR: &str = ".git";
const OBJECTS_DIR: &str = "objects";
const INDEX_FILE: &str = "index";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryConfig {
    pub work_dir: PathBuf,
    pub git_dir: PathBuf,
    pub objects_dir: PathBuf,
    pub index_file: PathBuf,
}

impl RepositoryConfig {
    /// Standard layout: `<work_dir>/.git`
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self::with_overrides(work_dir, |_| None)
    }

    /// Layout honoring `GIT_DIR`, `GIT_OBJECT_DIRECTORY` and `GIT_INDEX_FILE`
    pub fn from_env(work_dir: impl Into<PathBuf>) -> Self {
        Self::with_overrides(work_dir, |name| {
            std::env::var_os(name).filter(|value| !value.is_empty()).map(PathBuf::from)
        })
    }

    /// Layout with overrides looked up by variable name
    ///
    /// Relative overrides are taken relative to the work tree.
    pub fn with_overrides(
        work_dir: impl Into<PathBuf>,
        lookup: impl Fn(&str) -> Option<PathBuf>,
    ) -> Self {
        let work_dir = work_dir.into();
        let under_work_dir = |path: PathBuf| match path.is_absolute() {
            true => path,
            false => work_dir.join(path),
        };

        let git_dir = lookup(GIT_DIR_ENV)
            .map(under_work_dir)
            .unwrap_or_else(|| work_dir.join(GIT_DIR));
        let objects_dir = lookup(GIT_OBJECT_DIRECTORY_ENV)
            .map(under_work_dir)
            .unwrap_or_else(|| git_dir.join(OBJECTS_DIR));
        let index_file = lookup(GIT_INDEX_FILE_ENV)
            .map(under_work_dir)
            .unwrap_or_else(|| git_dir.join(INDEX_FILE));

        RepositoryConfig {
            work_dir,
            git_dir,
            objects_dir,
            index_file,
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    pub fn objects_dir(&self) -> &Path {
        &self.objects_dir
    }

    pub fn index_file(&self) -> &Path {
        &self.index_file
    }
}
