use crate::areas::repository::Repository;
use crate::artifacts::refs::{HEAD, HEADS_PREFIX};
use anyhow::Context;
use std::fs;

const DEFAULT_BRANCH: &str = "master";

impl Repository {
    pub fn init(&mut self) -> anyhow::Result<()> {
        let objects_path = self.database().objects_path().to_path_buf();
        fs::create_dir_all(self.database().pack_path())
            .with_context(|| format!("Failed to create {}", objects_path.display()))?;

        fs::create_dir_all(self.refs().heads_path())
            .context("Failed to create .git/refs/heads directory")?;

        fs::create_dir_all(self.refs().tags_path())
            .context("Failed to create .git/refs/tags directory")?;

        // re-running init keeps the current branch
        if self.refs().read_ref(HEAD)?.is_none() {
            self.refs()
                .write_symbolic_ref(HEAD, &format!("{HEADS_PREFIX}{DEFAULT_BRANCH}"))
                .context("Failed to create initial HEAD reference")?;
        }

        writeln!(
            self.writer(),
            "Initialized empty Git repository in {}",
            self.config().git_dir().display()
        )?;

        Ok(())
    }
}
